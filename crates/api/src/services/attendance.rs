//! Club check-in, shared by the staff endpoint and the kiosk flow.

use chrono::{DateTime, Utc};
use domain::models::attendance::{validate_check_in, CheckInMethod};
use domain::models::AttendanceRecord;
use persistence::repositories::{
    AttendanceRepository, LocationRepository, MemberRepository, SubscriptionRepository,
};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::ApiError;

pub struct AttendanceService {
    pool: PgPool,
}

impl AttendanceService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Records a check-in, deducting a class from limited plans.
    ///
    /// The member's active subscription row stays locked until the visit is
    /// inserted, so two concurrent check-ins for the same member serialize.
    pub async fn check_in(
        &self,
        tenant_id: Uuid,
        member_id: Uuid,
        location_id: Uuid,
        method: CheckInMethod,
        checked_in_by: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Result<AttendanceRecord, ApiError> {
        let member = MemberRepository::new(self.pool.clone())
            .find_by_id(tenant_id, member_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("Member not found".to_string()))?;
        let location = LocationRepository::new(self.pool.clone())
            .find_by_id(tenant_id, location_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("Location not found".to_string()))?;

        let mut tx = self.pool.begin().await?;

        let mut subscription = SubscriptionRepository::lock_active_for_member(
            &mut tx,
            tenant_id,
            member_id,
            now.date_naive(),
        )
        .await?;
        let open_visit = AttendanceRepository::lock_open_for_member(&mut tx, tenant_id, member_id).await?;

        validate_check_in(
            &member,
            &location,
            subscription.as_mut(),
            open_visit.as_ref(),
            now,
        )?;

        let subscription_id = match &subscription {
            Some(sub) => {
                SubscriptionRepository::save(&mut *tx, sub).await?;
                Some(sub.id)
            }
            None => None,
        };

        let record = AttendanceRepository::insert_check_in(
            &mut tx,
            tenant_id,
            member_id,
            location_id,
            subscription_id,
            method,
            checked_in_by,
            now,
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            tenant_id = %tenant_id,
            member_id = %member_id,
            location_id = %location_id,
            method = %method,
            "Member checked in"
        );

        Ok(record)
    }
}
