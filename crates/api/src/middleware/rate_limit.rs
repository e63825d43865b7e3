//! Rate limiting middleware.
//!
//! One `governor` limiter per authenticated user. Idle limiters are swept
//! once the map reaches its size cap.

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use governor::{
    clock::{Clock, DefaultClock},
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter as GovRateLimiter,
};
use serde_json::json;
use std::{
    collections::HashMap,
    num::NonZeroU32,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, RwLock,
    },
    time::Instant,
};
use uuid::Uuid;

use crate::app::AppState;
use crate::middleware::user_auth::UserAuth;

type UserRateLimiter = GovRateLimiter<NotKeyed, InMemoryState, DefaultClock>;

const FALLBACK_LIMIT: NonZeroU32 = match NonZeroU32::new(100) {
    Some(n) => n,
    None => panic!("limit must be non-zero"),
};

/// Map size at which idle limiters are swept before adding another.
const DEFAULT_MAX_TRACKED: usize = 10_000;

/// A limiter unused for a full quota window has refilled, so dropping it loses nothing.
const IDLE_AFTER_MS: u64 = 60_000;

struct TrackedLimiter {
    limiter: UserRateLimiter,
    last_seen_ms: AtomicU64,
}

/// Rate limiter state shared across all requests, keyed by user id.
pub struct RateLimiterState {
    limiters: RwLock<HashMap<Uuid, Arc<TrackedLimiter>>>,
    rate_limit_per_minute: u32,
    max_tracked: usize,
    epoch: Instant,
}

impl RateLimiterState {
    pub fn new(rate_limit_per_minute: u32) -> Self {
        Self::with_max_tracked(rate_limit_per_minute, DEFAULT_MAX_TRACKED)
    }

    pub fn with_max_tracked(rate_limit_per_minute: u32, max_tracked: usize) -> Self {
        Self {
            limiters: RwLock::new(HashMap::new()),
            rate_limit_per_minute,
            max_tracked,
            epoch: Instant::now(),
        }
    }

    fn now_ms(&self) -> u64 {
        u64::try_from(self.epoch.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    fn get_or_create_limiter(&self, user_id: Uuid, now_ms: u64) -> Arc<TrackedLimiter> {
        {
            let limiters = self.limiters.read().unwrap_or_else(|e| e.into_inner());
            if let Some(limiter) = limiters.get(&user_id) {
                return limiter.clone();
            }
        }

        let mut limiters = self.limiters.write().unwrap_or_else(|e| e.into_inner());
        if limiters.len() >= self.max_tracked && !limiters.contains_key(&user_id) {
            let removed = retain_active(&mut limiters, now_ms);
            tracing::debug!(removed, remaining = limiters.len(), "Swept idle rate limiters");
        }
        limiters
            .entry(user_id)
            .or_insert_with(|| {
                let per_minute = NonZeroU32::new(self.rate_limit_per_minute).unwrap_or(FALLBACK_LIMIT);
                Arc::new(TrackedLimiter {
                    limiter: GovRateLimiter::direct(Quota::per_minute(per_minute)),
                    last_seen_ms: AtomicU64::new(now_ms),
                })
            })
            .clone()
    }

    /// `Err` carries the seconds to wait before retrying.
    pub fn check(&self, user_id: Uuid) -> Result<(), u64> {
        let now_ms = self.now_ms();
        let tracked = self.get_or_create_limiter(user_id, now_ms);
        tracked.last_seen_ms.store(now_ms, Ordering::Relaxed);
        tracked.limiter.check().map_err(|not_until| {
            not_until
                .wait_time_from(DefaultClock::default().now())
                .as_secs()
                .max(1)
        })
    }

    /// Drops limiters idle for a full window. Returns how many were removed.
    pub fn prune_idle(&self) -> usize {
        self.prune_idle_at(self.now_ms())
    }

    fn prune_idle_at(&self, now_ms: u64) -> usize {
        let mut limiters = self.limiters.write().unwrap_or_else(|e| e.into_inner());
        retain_active(&mut limiters, now_ms)
    }

    pub fn active_limiters(&self) -> usize {
        self.limiters.read().unwrap_or_else(|e| e.into_inner()).len()
    }
}

fn retain_active(limiters: &mut HashMap<Uuid, Arc<TrackedLimiter>>, now_ms: u64) -> usize {
    let before = limiters.len();
    limiters.retain(|_, tracked| {
        now_ms.saturating_sub(tracked.last_seen_ms.load(Ordering::Relaxed)) < IDLE_AFTER_MS
    });
    before - limiters.len()
}

impl std::fmt::Debug for RateLimiterState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiterState")
            .field("rate_limit_per_minute", &self.rate_limit_per_minute)
            .field("max_tracked", &self.max_tracked)
            .field("active_limiters", &self.active_limiters())
            .finish()
    }
}

/// Must run after authentication; unauthenticated requests pass through.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let user_id = match req.extensions().get::<UserAuth>() {
        Some(auth) => auth.user_id,
        None => return next.run(req).await,
    };

    if let Some(ref rate_limiter) = state.rate_limiter {
        if let Err(retry_after) = rate_limiter.check(user_id) {
            metrics::counter!("rate_limited_requests_total").increment(1);
            return rate_limited_response(state.config.security.rate_limit_per_minute, retry_after);
        }
    }

    next.run(req).await
}

fn rate_limited_response(limit: u32, retry_after: u64) -> Response {
    let body = json!({
        "error": "rate_limited",
        "message": format!("Rate limit of {} requests/minute exceeded", limit),
        "retryAfter": retry_after
    });

    let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
    if let Ok(value) = HeaderValue::from_str(&retry_after.to_string()) {
        response.headers_mut().insert(header::RETRY_AFTER, value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limiter_allows_requests() {
        let state = RateLimiterState::new(100);
        assert!(state.check(Uuid::new_v4()).is_ok());
    }

    #[test]
    fn test_rate_limiter_exhaustion() {
        let state = RateLimiterState::new(3);
        let user = Uuid::new_v4();
        for _ in 0..3 {
            assert!(state.check(user).is_ok());
        }
        let retry_after = state.check(user).unwrap_err();
        assert!(retry_after >= 1);
    }

    #[test]
    fn test_rate_limiter_is_per_user() {
        let state = RateLimiterState::new(1);
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        assert!(state.check(first).is_ok());
        assert!(state.check(first).is_err());
        assert!(state.check(second).is_ok());
        assert_eq!(state.active_limiters(), 2);
    }

    #[test]
    fn test_zero_limit_falls_back() {
        let state = RateLimiterState::new(0);
        assert!(state.check(Uuid::new_v4()).is_ok());
    }

    #[test]
    fn test_idle_limiters_are_pruned() {
        let state = RateLimiterState::new(10);
        let idle = Uuid::new_v4();
        assert!(state.check(idle).is_ok());
        assert_eq!(state.prune_idle(), 0);

        let later = state.now_ms() + IDLE_AFTER_MS;
        assert_eq!(state.prune_idle_at(later), 1);
        assert_eq!(state.active_limiters(), 0);
    }

    #[test]
    fn test_sweep_runs_when_map_is_full() {
        let state = RateLimiterState::with_max_tracked(10, 2);
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        assert!(state.check(first).is_ok());
        assert!(state.check(second).is_ok());

        let later = state.now_ms() + IDLE_AFTER_MS;
        let third = state.get_or_create_limiter(Uuid::new_v4(), later);
        third.last_seen_ms.store(later, Ordering::Relaxed);
        assert_eq!(state.active_limiters(), 1);
    }

    #[test]
    fn test_sweep_keeps_active_limiters() {
        let state = RateLimiterState::with_max_tracked(1, 1);
        let busy = Uuid::new_v4();
        assert!(state.check(busy).is_ok());
        assert!(state.check(Uuid::new_v4()).is_ok());
        assert_eq!(state.active_limiters(), 2);
        assert!(state.check(busy).is_err());
    }

    #[test]
    fn test_rate_limited_response() {
        let response = rate_limited_response(60, 5);
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get(header::RETRY_AFTER).unwrap(), "5");
    }
}
