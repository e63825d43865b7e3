//! Membership contracts: signature, cooling-off, notice period and early termination.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::error::{ensure_state, DomainError};
use crate::models::invoice::amount_too_large;

db_enum! {
    pub enum ContractStatus {
        PendingSignature => "PENDING_SIGNATURE",
        Active => "ACTIVE",
        InNoticePeriod => "IN_NOTICE_PERIOD",
        Suspended => "SUSPENDED",
        Cancelled => "CANCELLED",
        Voided => "VOIDED",
        Expired => "EXPIRED",
    }
}

db_enum! {
    pub enum TerminationFeeType {
        None => "NONE",
        FlatFee => "FLAT_FEE",
        RemainingMonths => "REMAINING_MONTHS",
        Percentage => "PERCENTAGE",
    }
}

pub const DEFAULT_COOLING_OFF_DAYS: i32 = 7;
pub const DEFAULT_CONTRACT_NOTICE_DAYS: i32 = 30;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MembershipContract {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub contract_number: String,
    pub member_id: Uuid,
    pub plan_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription_id: Option<Uuid>,
    pub status: ContractStatus,
    pub start_date: NaiveDate,
    pub commitment_months: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commitment_end_date: Option<NaiveDate>,
    pub notice_period_days: i32,
    pub cooling_off_days: i32,
    /// Monthly fee locked at signing, in minor units.
    pub monthly_fee: i64,
    pub termination_fee_type: TerminationFeeType,
    /// Flat amount in minor units, or a percentage for `PERCENTAGE`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub termination_fee_value: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancellation_requested_at: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancellation_effective_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancellation_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effective_end_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Whole calendar months from `from` until `to`, zero if `to` is not later.
pub fn whole_months_between(from: NaiveDate, to: NaiveDate) -> i64 {
    if to <= from {
        return 0;
    }
    let mut months =
        (to.year() - from.year()) as i64 * 12 + to.month() as i64 - from.month() as i64;
    if to.day() < from.day() {
        months -= 1;
    }
    months.max(0)
}

impl MembershipContract {
    fn signed_on(&self) -> NaiveDate {
        self.signed_at
            .map(|t| t.date_naive())
            .unwrap_or(self.start_date)
    }

    /// Last day on which the member may void the contract without penalty.
    pub fn cooling_off_end_date(&self) -> NaiveDate {
        self.signed_on() + Duration::days(self.cooling_off_days as i64)
    }

    pub fn is_within_cooling_off(&self, today: NaiveDate) -> bool {
        self.signed_at.is_some() && today <= self.cooling_off_end_date()
    }

    pub fn is_within_commitment(&self, today: NaiveDate) -> bool {
        self.commitment_end_date.map_or(false, |end| today < end)
    }

    pub fn commitment_months_remaining(&self, today: NaiveDate) -> i64 {
        self.commitment_end_date
            .map_or(0, |end| whole_months_between(today, end))
    }

    /// Fee due when leaving before the commitment ends, in minor units.
    pub fn early_termination_fee(&self, today: NaiveDate) -> Result<i64, DomainError> {
        if !self.is_within_commitment(today) {
            return Ok(0);
        }
        let remaining_value = self
            .monthly_fee
            .checked_mul(self.commitment_months_remaining(today))
            .ok_or_else(amount_too_large)?;
        match self.termination_fee_type {
            TerminationFeeType::None => Ok(0),
            TerminationFeeType::FlatFee => Ok(self.termination_fee_value.unwrap_or(0)),
            TerminationFeeType::RemainingMonths => Ok(remaining_value),
            TerminationFeeType::Percentage => remaining_value
                .checked_mul(self.termination_fee_value.unwrap_or(0))
                .map(|v| v / 100)
                .ok_or_else(amount_too_large),
        }
    }

    pub fn allows_access(&self) -> bool {
        matches!(
            self.status,
            ContractStatus::Active | ContractStatus::InNoticePeriod
        )
    }

    pub fn sign(&mut self, now: DateTime<Utc>) -> Result<(), DomainError> {
        ensure_state(
            self.status == ContractStatus::PendingSignature,
            "Contract is not pending signature",
        )?;
        self.signed_at = Some(now);
        self.status = ContractStatus::Active;
        Ok(())
    }

    /// Voids a signed contract during the cooling-off period.
    pub fn cancel_within_cooling_off(
        &mut self,
        today: NaiveDate,
        reason: Option<String>,
    ) -> Result<(), DomainError> {
        ensure_state(
            self.status == ContractStatus::Active,
            format!("Cannot void contract in status {}", self.status),
        )?;
        ensure_state(
            self.is_within_cooling_off(today),
            "Cooling-off period has expired",
        )?;
        self.status = ContractStatus::Voided;
        self.cancellation_requested_at = Some(today);
        self.cancellation_effective_date = Some(today);
        self.cancellation_reason = reason;
        Ok(())
    }

    pub fn request_cancellation(
        &mut self,
        today: NaiveDate,
        reason: Option<String>,
    ) -> Result<NaiveDate, DomainError> {
        ensure_state(self.status == ContractStatus::Active, "Contract is not active")?;
        let effective = today + Duration::days(self.notice_period_days as i64);
        self.cancellation_requested_at = Some(today);
        self.cancellation_effective_date = Some(effective);
        self.cancellation_reason = reason;
        self.status = ContractStatus::InNoticePeriod;
        Ok(effective)
    }

    pub fn complete_cancellation(&mut self, today: NaiveDate) -> Result<(), DomainError> {
        ensure_state(
            self.status == ContractStatus::InNoticePeriod,
            "Contract is not in notice period",
        )?;
        self.status = ContractStatus::Cancelled;
        self.effective_end_date = Some(self.cancellation_effective_date.unwrap_or(today));
        Ok(())
    }

    pub fn withdraw_cancellation(&mut self) -> Result<(), DomainError> {
        ensure_state(
            self.status == ContractStatus::InNoticePeriod,
            "Contract is not in notice period",
        )?;
        self.status = ContractStatus::Active;
        self.cancellation_requested_at = None;
        self.cancellation_effective_date = None;
        self.cancellation_reason = None;
        Ok(())
    }

    pub fn suspend(&mut self) -> Result<(), DomainError> {
        ensure_state(
            self.allows_access(),
            format!("Cannot suspend contract in status {}", self.status),
        )?;
        self.status = ContractStatus::Suspended;
        Ok(())
    }

    pub fn reactivate(&mut self) -> Result<(), DomainError> {
        ensure_state(
            self.status == ContractStatus::Suspended,
            "Contract is not suspended",
        )?;
        self.status = ContractStatus::Active;
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_fee_terms"))]
pub struct CreateContractRequest {
    pub member_id: Uuid,
    pub plan_id: Uuid,
    pub subscription_id: Option<Uuid>,
    pub start_date: NaiveDate,

    #[validate(range(min = 0, max = 60, message = "Commitment must be 0-60 months"))]
    #[serde(default)]
    pub commitment_months: i32,

    #[validate(range(min = 0, max = 180, message = "Notice period must be 0-180 days"))]
    pub notice_period_days: Option<i32>,

    #[validate(range(min = 0, max = 30, message = "Cooling-off period must be 0-30 days"))]
    pub cooling_off_days: Option<i32>,

    #[validate(range(min = 0, max = 100000000000i64, message = "Monthly fee must be 0-100000000000"))]
    pub monthly_fee: i64,

    pub termination_fee_type: Option<TerminationFeeType>,

    #[validate(range(
        min = 0,
        max = 100000000000i64,
        message = "Termination fee value must be 0-100000000000"
    ))]
    pub termination_fee_value: Option<i64>,
}

/// A percentage fee is a share of the remaining commitment, so at most 100.
fn validate_fee_terms(request: &CreateContractRequest) -> Result<(), ValidationError> {
    if request.termination_fee_type == Some(TerminationFeeType::Percentage)
        && request.termination_fee_value.map_or(false, |v| v > 100)
    {
        let mut err = ValidationError::new("percentage_range");
        err.message = Some("Percentage termination fee must be 0-100".into());
        return Err(err);
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ContractCancellationRequest {
    #[validate(length(max = 500, message = "Reason must be at most 500 characters"))]
    pub reason: Option<String>,
}

/// Early termination quote.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TerminationQuote {
    pub contract_id: Uuid,
    pub within_cooling_off: bool,
    pub within_commitment: bool,
    pub months_remaining: i64,
    pub fee: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn contract(status: ContractStatus) -> MembershipContract {
        MembershipContract {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            contract_number: "CON-2024-00001".into(),
            member_id: Uuid::new_v4(),
            plan_id: Uuid::new_v4(),
            subscription_id: None,
            status,
            start_date: date(2024, 1, 1),
            commitment_months: 12,
            commitment_end_date: Some(date(2025, 1, 1)),
            notice_period_days: DEFAULT_CONTRACT_NOTICE_DAYS,
            cooling_off_days: DEFAULT_COOLING_OFF_DAYS,
            monthly_fee: 30000,
            termination_fee_type: TerminationFeeType::RemainingMonths,
            termination_fee_value: None,
            signed_at: None,
            cancellation_requested_at: None,
            cancellation_effective_date: None,
            cancellation_reason: None,
            effective_end_date: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn signed_on(d: NaiveDate) -> DateTime<Utc> {
        d.and_hms_opt(10, 0, 0).unwrap().and_utc()
    }

    #[test]
    fn test_sign_then_cannot_sign_again() {
        let mut c = contract(ContractStatus::PendingSignature);
        c.sign(signed_on(date(2024, 1, 1))).unwrap();
        assert_eq!(c.status, ContractStatus::Active);
        assert!(c.sign(Utc::now()).is_err());
    }

    #[test]
    fn test_cooling_off_voids() {
        let mut c = contract(ContractStatus::PendingSignature);
        c.sign(signed_on(date(2024, 1, 1))).unwrap();
        assert_eq!(c.cooling_off_end_date(), date(2024, 1, 8));

        c.cancel_within_cooling_off(date(2024, 1, 8), Some("Changed mind".into()))
            .unwrap();
        assert_eq!(c.status, ContractStatus::Voided);
    }

    #[test]
    fn test_cooling_off_expired() {
        let mut c = contract(ContractStatus::PendingSignature);
        c.sign(signed_on(date(2024, 1, 1))).unwrap();
        assert_eq!(
            c.cancel_within_cooling_off(date(2024, 1, 9), None),
            Err(DomainError::state("Cooling-off period has expired"))
        );
    }

    #[test]
    fn test_notice_period_flow() {
        let mut c = contract(ContractStatus::Active);
        let effective = c.request_cancellation(date(2024, 3, 1), None).unwrap();
        assert_eq!(effective, date(2024, 3, 31));
        assert_eq!(c.status, ContractStatus::InNoticePeriod);
        assert!(c.allows_access());

        c.complete_cancellation(date(2024, 3, 31)).unwrap();
        assert_eq!(c.status, ContractStatus::Cancelled);
        assert_eq!(c.effective_end_date, Some(date(2024, 3, 31)));
        assert!(!c.allows_access());
    }

    #[test]
    fn test_withdraw() {
        let mut c = contract(ContractStatus::Active);
        c.request_cancellation(date(2024, 3, 1), None).unwrap();
        c.withdraw_cancellation().unwrap();
        assert_eq!(c.status, ContractStatus::Active);
        assert!(c.cancellation_effective_date.is_none());
    }

    #[test]
    fn test_transitions_follow_fixed_order() {
        let mut c = contract(ContractStatus::PendingSignature);
        assert!(c.request_cancellation(date(2024, 1, 1), None).is_err());
        assert!(c.complete_cancellation(date(2024, 1, 1)).is_err());
        assert!(c.suspend().is_err());
        c.sign(Utc::now()).unwrap();
        c.suspend().unwrap();
        assert!(c.request_cancellation(date(2024, 1, 1), None).is_err());
        c.reactivate().unwrap();
        assert!(c.reactivate().is_err());
    }

    #[test]
    fn test_whole_months() {
        assert_eq!(whole_months_between(date(2024, 1, 15), date(2024, 4, 15)), 3);
        assert_eq!(whole_months_between(date(2024, 1, 15), date(2024, 4, 14)), 2);
        assert_eq!(whole_months_between(date(2024, 5, 1), date(2024, 4, 1)), 0);
    }

    #[test]
    fn test_termination_fees() {
        let today = date(2024, 7, 1);
        let mut c = contract(ContractStatus::Active);
        assert_eq!(c.commitment_months_remaining(today), 6);
        assert_eq!(c.early_termination_fee(today), Ok(180000));

        c.termination_fee_type = TerminationFeeType::Percentage;
        c.termination_fee_value = Some(50);
        assert_eq!(c.early_termination_fee(today), Ok(90000));

        c.termination_fee_type = TerminationFeeType::FlatFee;
        c.termination_fee_value = Some(25000);
        assert_eq!(c.early_termination_fee(today), Ok(25000));

        c.termination_fee_type = TerminationFeeType::None;
        assert_eq!(c.early_termination_fee(today), Ok(0));

        c.termination_fee_type = TerminationFeeType::FlatFee;
        assert_eq!(c.early_termination_fee(date(2025, 2, 1)), Ok(0));
    }

    #[test]
    fn test_percentage_fee_overflow_is_an_error() {
        let today = date(2024, 7, 1);
        let mut c = contract(ContractStatus::Active);
        c.termination_fee_type = TerminationFeeType::Percentage;
        c.termination_fee_value = Some(10_000_000_000_000_000);
        assert_eq!(
            c.early_termination_fee(today),
            Err(DomainError::argument("Amount too large"))
        );

        c.termination_fee_type = TerminationFeeType::RemainingMonths;
        c.monthly_fee = i64::MAX / 2;
        assert!(c.early_termination_fee(today).is_err());
    }

    fn create_request(fee_type: TerminationFeeType, value: i64) -> CreateContractRequest {
        CreateContractRequest {
            member_id: Uuid::new_v4(),
            plan_id: Uuid::new_v4(),
            subscription_id: None,
            start_date: date(2024, 1, 1),
            commitment_months: 12,
            notice_period_days: None,
            cooling_off_days: None,
            monthly_fee: 30000,
            termination_fee_type: Some(fee_type),
            termination_fee_value: Some(value),
        }
    }

    #[test]
    fn test_percentage_fee_above_100_is_rejected() {
        assert!(create_request(TerminationFeeType::Percentage, 100).validate().is_ok());
        assert!(create_request(TerminationFeeType::Percentage, 250).validate().is_err());
        // Flat fees are amounts, not percentages
        assert!(create_request(TerminationFeeType::FlatFee, 250).validate().is_ok());
    }

    #[test]
    fn test_fee_amounts_are_bounded() {
        let mut request = create_request(TerminationFeeType::FlatFee, 10_000_000_000_000_000);
        assert!(request.validate().is_err());
        request.termination_fee_value = Some(0);
        request.monthly_fee = 100_000_000_001;
        assert!(request.validate().is_err());
    }
}
