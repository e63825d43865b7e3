//! HTTP middleware components.

pub mod logging;
pub mod metrics;
pub mod rate_limit;
pub mod rbac;
pub mod security_headers;
pub mod tenant_guard;
pub mod trace_id;
pub mod user_auth;

pub use metrics::{init_metrics, metrics_handler, metrics_middleware, record_business_event};
pub use rate_limit::{rate_limit_middleware, RateLimiterState};
pub use rbac::{require_club_admin, require_platform_admin, require_staff, require_trainer};
pub use security_headers::security_headers_middleware;
pub use tenant_guard::tenant_guard;
pub use trace_id::{trace_id, RequestId, REQUEST_ID_HEADER};
pub use user_auth::{require_user_auth, UserAuth};
