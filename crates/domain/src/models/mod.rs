//! Domain models for Clubhouse.

/// Declares a status-like enum stored as TEXT.
///
/// Generates `as_str`, `ALL`, `Display` and `FromStr`; the serde name of each
/// variant is the same text that is written to the database.
#[macro_export]
macro_rules! db_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $($variant:ident => $text:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        $vis enum $name {
            $(
                #[serde(rename = $text)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Returns the string representation for database storage.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.to_ascii_uppercase().as_str() {
                    $($text => Ok($name::$variant),)+
                    _ => Err(format!(
                        "Invalid {}: {}. Must be one of: {}",
                        stringify!($name),
                        s,
                        [$($text),+].join(", ")
                    )),
                }
            }
        }
    };
}

pub mod attendance;
pub mod audit_log;
pub mod booking;
pub mod bulk;
pub mod churn;
pub mod class_pack;
pub mod class_session;
pub mod compliance;
pub mod contract;
pub mod dunning;
pub mod equipment;
pub mod forecast;
pub mod gym_class;
pub mod invoice;
pub mod kiosk;
pub mod member;
pub mod membership_plan;
pub mod platform;
pub mod subscription;
pub mod sync_job;
pub mod tenant;
pub mod tenant_contract;
pub mod user;
pub mod wearable;
pub mod zatca;

pub use attendance::{AttendanceRecord, AttendanceStatus, Location};
pub use audit_log::{ActorType, AuditAction, AuditLog, CreateAuditLogInput, FieldChange};
pub use booking::{Booking, BookingStatus, RosterEntry, UpcomingBooking};
pub use bulk::{BulkItemResult, BulkResponse};
pub use churn::{ChurnIntervention, ChurnModel, ChurnPrediction, RiskLevel};
pub use class_pack::{ClassPack, ClassPackBalance, ClassPackBalanceStatus};
pub use class_session::{ClassSession, SessionStatus};
pub use compliance::{DataExportRequest, ExportRequestStatus, SecurityEvent, Severity};
pub use contract::{ContractStatus, MembershipContract};
pub use dunning::{DunningSequence, DunningStatus, DunningStep};
pub use equipment::{EquipmentProvider, EquipmentProviderConfig, EquipmentUnit, EquipmentWorkout};
pub use forecast::{Forecast, ForecastModel, ForecastType, ForecastView};
pub use gym_class::{ClassStatus, GymClass};
pub use invoice::{Invoice, InvoiceLineItem, InvoiceStatus};
pub use kiosk::{KioskDevice, KioskSession};
pub use member::{Member, MemberStatus};
pub use membership_plan::MembershipPlan;
pub use platform::{GlobalSetting, MaintenanceWindow};
pub use subscription::{Subscription, SubscriptionStatus};
pub use sync_job::{SyncJob, SyncJobStatus};
pub use tenant::{Tenant, TenantStatus};
pub use tenant_contract::{TenantContract, TenantContractStatus};
pub use user::{Role, User};
pub use wearable::{WearableConnection, WearablePlatform};
pub use zatca::{ZatcaStatus, ZatcaSubmission};
