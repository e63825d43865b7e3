//! Repository implementations for database operations.

pub mod attendance;
pub mod audit_log;
pub mod booking;
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
pub mod location;
pub mod member;
pub mod membership_plan;
pub mod numbering;
pub mod platform;
pub mod subscription;
pub mod sync_job;
pub mod tenant;
pub mod tenant_contract;
pub mod user;
pub mod wearable;
pub mod zatca;

pub use attendance::AttendanceRepository;
pub use audit_log::AuditLogRepository;
pub use booking::BookingRepository;
pub use churn::{ChurnRepository, NewPrediction};
pub use class_pack::ClassPackRepository;
pub use class_session::{ClassSessionRepository, NewSession};
pub use compliance::ComplianceRepository;
pub use contract::ContractRepository;
pub use dunning::DunningRepository;
pub use equipment::EquipmentRepository;
pub use forecast::{ForecastRepository, NewForecast};
pub use gym_class::GymClassRepository;
pub use invoice::{InvoiceRepository, NewInvoice};
pub use kiosk::KioskRepository;
pub use location::LocationRepository;
pub use member::MemberRepository;
pub use membership_plan::MembershipPlanRepository;
pub use numbering::{next_number, NumberSeries};
pub use platform::PlatformRepository;
pub use subscription::SubscriptionRepository;
pub use sync_job::SyncJobRepository;
pub use tenant::TenantRepository;
pub use tenant_contract::TenantContractRepository;
pub use user::UserRepository;
pub use wearable::WearableRepository;
pub use zatca::ZatcaRepository;
