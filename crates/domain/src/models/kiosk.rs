//! Self-service kiosks at club locations and their member sessions.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::error::{ensure_state, DomainError};

db_enum! {
    pub enum KioskStatus {
        Active => "ACTIVE",
        Inactive => "INACTIVE",
        Maintenance => "MAINTENANCE",
    }
}

db_enum! {
    pub enum KioskSessionStatus {
        Active => "ACTIVE",
        Completed => "COMPLETED",
        Expired => "EXPIRED",
    }
}

db_enum! {
    pub enum IdentificationMethod {
        MemberId => "MEMBER_ID",
        Email => "EMAIL",
    }
}

/// Idle sessions older than this are expired by the background job.
pub const SESSION_IDLE_TIMEOUT_MINUTES: i64 = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KioskDevice {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub location_id: Uuid,
    pub code: String,
    pub name: String,
    pub status: KioskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_heartbeat_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl KioskDevice {
    pub fn heartbeat(&mut self, now: DateTime<Utc>) {
        self.last_heartbeat_at = Some(now);
    }

    pub fn is_online(&self, now: DateTime<Utc>, grace: Duration) -> bool {
        self.last_heartbeat_at.map_or(false, |t| now - t <= grace)
    }

    pub fn ensure_accepting_sessions(&self) -> Result<(), DomainError> {
        ensure_state(
            self.status == KioskStatus::Active,
            format!("Kiosk is not active (status {})", self.status),
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KioskSession {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub device_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub member_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identification_method: Option<IdentificationMethod>,
    pub status: KioskSessionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attendance_id: Option<Uuid>,
    pub started_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
}

impl KioskSession {
    pub fn start(device: &KioskDevice, now: DateTime<Utc>) -> Result<Self, DomainError> {
        device.ensure_accepting_sessions()?;
        Ok(Self {
            id: Uuid::new_v4(),
            tenant_id: device.tenant_id,
            device_id: device.id,
            member_id: None,
            identification_method: None,
            status: KioskSessionStatus::Active,
            attendance_id: None,
            started_at: now,
            last_activity_at: now,
            ended_at: None,
        })
    }

    fn ensure_active(&self) -> Result<(), DomainError> {
        ensure_state(
            self.status == KioskSessionStatus::Active,
            format!("Kiosk session is {}", self.status),
        )
    }

    pub fn identify(
        &mut self,
        member_id: Uuid,
        method: IdentificationMethod,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        self.ensure_active()?;
        self.member_id = Some(member_id);
        self.identification_method = Some(method);
        self.last_activity_at = now;
        Ok(())
    }

    /// Member to check in; the session must be active and identified.
    pub fn member_for_check_in(&self) -> Result<Uuid, DomainError> {
        self.ensure_active()?;
        ensure_state(self.attendance_id.is_none(), "Member already checked in during this session")?;
        self.member_id
            .ok_or_else(|| DomainError::state("No member identified in this session"))
    }

    pub fn record_check_in(&mut self, attendance_id: Uuid, now: DateTime<Utc>) {
        self.attendance_id = Some(attendance_id);
        self.last_activity_at = now;
    }

    pub fn end(&mut self, now: DateTime<Utc>) -> Result<(), DomainError> {
        self.ensure_active()?;
        self.status = KioskSessionStatus::Completed;
        self.ended_at = Some(now);
        Ok(())
    }

    pub fn is_idle(&self, now: DateTime<Utc>) -> bool {
        self.status == KioskSessionStatus::Active
            && now - self.last_activity_at > Duration::minutes(SESSION_IDLE_TIMEOUT_MINUTES)
    }

    pub fn expire(&mut self, now: DateTime<Utc>) -> bool {
        if self.is_idle(now) {
            self.status = KioskSessionStatus::Expired;
            self.ended_at = Some(now);
            true
        } else {
            false
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateKioskRequest {
    pub location_id: Uuid,
    #[validate(regex(
        path = *KIOSK_CODE_REGEX,
        message = "Code must be 3-32 uppercase letters, digits or hyphens"
    ))]
    pub code: String,
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,
}

lazy_static::lazy_static! {
    pub static ref KIOSK_CODE_REGEX: regex::Regex =
        regex::Regex::new(r"^[A-Z0-9][A-Z0-9-]{1,30}[A-Z0-9]$").unwrap();
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateKioskRequest {
    pub location_id: Option<Uuid>,
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: Option<String>,
    pub status: Option<KioskStatus>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct StartKioskSessionRequest {
    pub device_id: Uuid,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct IdentifyMemberRequest {
    pub method: IdentificationMethod,
    #[validate(length(min = 1, max = 255, message = "Value is required"))]
    pub value: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(status: KioskStatus) -> KioskDevice {
        KioskDevice {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            location_id: Uuid::new_v4(),
            code: "LOBBY-1".into(),
            name: "Lobby".into(),
            status,
            last_heartbeat_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_only_active_kiosks_start_sessions() {
        assert!(KioskSession::start(&device(KioskStatus::Maintenance), Utc::now()).is_err());
        let s = KioskSession::start(&device(KioskStatus::Active), Utc::now()).unwrap();
        assert_eq!(s.status, KioskSessionStatus::Active);
    }

    #[test]
    fn test_check_in_requires_identification() {
        let now = Utc::now();
        let mut s = KioskSession::start(&device(KioskStatus::Active), now).unwrap();
        assert!(s.member_for_check_in().is_err());

        let member = Uuid::new_v4();
        s.identify(member, IdentificationMethod::Email, now).unwrap();
        assert_eq!(s.member_for_check_in().unwrap(), member);

        s.record_check_in(Uuid::new_v4(), now);
        assert!(s.member_for_check_in().is_err());
    }

    #[test]
    fn test_end_and_expire() {
        let now = Utc::now();
        let mut s = KioskSession::start(&device(KioskStatus::Active), now).unwrap();
        assert!(!s.expire(now + Duration::minutes(SESSION_IDLE_TIMEOUT_MINUTES)));
        assert!(s.expire(now + Duration::minutes(SESSION_IDLE_TIMEOUT_MINUTES + 1)));
        assert_eq!(s.status, KioskSessionStatus::Expired);
        assert!(s.end(now).is_err());
        assert!(s.identify(Uuid::new_v4(), IdentificationMethod::MemberId, now).is_err());
    }

    #[test]
    fn test_heartbeat() {
        let mut d = device(KioskStatus::Active);
        let now = Utc::now();
        assert!(!d.is_online(now, Duration::minutes(2)));
        d.heartbeat(now);
        assert!(d.is_online(now + Duration::minutes(1), Duration::minutes(2)));
    }

    #[test]
    fn test_kiosk_code_format() {
        assert!(KIOSK_CODE_REGEX.is_match("LOBBY-1"));
        assert!(KIOSK_CODE_REGEX.is_match("K01"));
        assert!(!KIOSK_CODE_REGEX.is_match("lobby-1"));
        assert!(!KIOSK_CODE_REGEX.is_match("-LOBBY"));
        assert!(!KIOSK_CODE_REGEX.is_match("K1"));
    }
}
