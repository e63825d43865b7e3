//! Database entity definitions.
//!
//! Entities are direct mappings to database rows.

pub mod audit_log;
pub mod booking;
pub mod churn;
pub mod class_pack;
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
pub mod platform;
pub mod subscription;
pub mod sync_job;
pub mod tenant;
pub mod tenant_contract;
pub mod user;
pub mod wearable;
pub mod zatca;

pub use audit_log::AuditLogEntity;
pub use booking::{BookingEntity, RosterEntryEntity, UpcomingBookingEntity};
pub use churn::{ChurnInterventionEntity, ChurnModelEntity, ChurnPredictionEntity, RiskCountEntity};
pub use class_pack::{ClassPackBalanceEntity, ClassPackEntity};
pub use compliance::{DataExportRequestEntity, SecurityEventEntity, SeverityCountEntity};
pub use contract::MembershipContractEntity;
pub use dunning::{DunningSequenceEntity, DunningStepEntity};
pub use equipment::{
    EquipmentProviderConfigEntity, EquipmentProviderEntity, EquipmentUnitEntity,
    EquipmentWorkoutEntity, WorkoutStatsEntity,
};
pub use forecast::{ForecastEntity, ForecastModelEntity, PeriodValueEntity};
pub use gym_class::{ClassSessionEntity, GymClassEntity};
pub use invoice::InvoiceEntity;
pub use kiosk::{KioskDeviceEntity, KioskSessionEntity};
pub use location::{AttendanceEntity, LocationEntity};
pub use member::{MemberEntity, StatusCountEntity};
pub use membership_plan::MembershipPlanEntity;
pub use platform::{GlobalSettingEntity, MaintenanceWindowEntity};
pub use subscription::SubscriptionEntity;
pub use sync_job::SyncJobEntity;
pub use tenant::TenantEntity;
pub use tenant_contract::TenantContractEntity;
pub use user::UserEntity;
pub use wearable::{
    WearableConnectionEntity, WearableDailyActivityEntity, WearablePlatformEntity,
    WearableWorkoutEntity, WearableWorkoutStatsEntity,
};
pub use zatca::ZatcaSubmissionEntity;
