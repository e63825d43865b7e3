use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use domain::services::AuditLogBuilder;
use persistence::repositories::AuditLogRepository;
use shared::jwt::{JwtConfig, JwtError};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::Config;
use crate::services::build_jwt_config;
use crate::middleware::{
    metrics_handler, metrics_middleware, rate_limit_middleware, require_club_admin,
    require_platform_admin, require_staff, require_trainer, require_user_auth,
    security_headers_middleware, tenant_guard, trace_id, RateLimiterState,
};
use crate::routes::{
    attendance, audit_logs, auth, bookings, churn, class_packs, classes, compliance, contracts,
    dunning, equipment, forecasting, health, invoices, kiosk, locations, members, platform, plans,
    sessions, subscriptions, tenant_contracts, tenants, users, wearables, zatca,
};

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<Config>,
    pub jwt: Arc<JwtConfig>,
    pub rate_limiter: Option<Arc<RateLimiterState>>,
}

impl AppState {
    /// Writes an audit entry in the background; failures are only logged.
    pub fn audit(&self, builder: AuditLogBuilder) {
        AuditLogRepository::new(self.pool.clone()).insert_async(builder.build());
    }
}

/// Builds the RS256 token config from the configured key pair.
pub fn jwt_from_config(config: &Config) -> Result<JwtConfig, JwtError> {
    build_jwt_config(&config.jwt)
}

pub fn create_app(config: Config, pool: PgPool) -> Result<Router, JwtError> {
    let jwt = jwt_from_config(&config)?;
    Ok(create_app_with_jwt(config, pool, jwt))
}

pub fn create_app_with_jwt(config: Config, pool: PgPool, jwt: JwtConfig) -> Router {
    let config = Arc::new(config);

    // Create rate limiter if rate limiting is enabled (rate_limit_per_minute > 0)
    let rate_limiter = if config.security.rate_limit_per_minute > 0 {
        Some(Arc::new(RateLimiterState::new(
            config.security.rate_limit_per_minute,
        )))
    } else {
        None
    };

    let state = AppState {
        pool,
        config: config.clone(),
        jwt: Arc::new(jwt),
        rate_limiter,
    };

    // Build CORS layer based on configuration
    let cors = if config.security.cors_origins.is_empty() {
        // Default: allow any origin (for development)
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        use tower_http::cors::AllowOrigin;
        let origins: Vec<_> = config
            .security
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    };

    // Any signed-in club user, members included. Handlers restrict members to
    // their own profile.
    let member_routes = Router::new()
        .route("/api/members/me", get(members::get_my_member))
        .route("/api/classes", get(classes::list_classes))
        .route("/api/classes/:class_id", get(classes::get_class))
        .route("/api/sessions", get(sessions::list_sessions))
        .route("/api/sessions/:session_id", get(sessions::get_session))
        .route("/api/class-packs", get(class_packs::list_packs))
        .route("/api/bookings", post(bookings::create_booking))
        .route("/api/bookings/:booking_id", get(bookings::get_booking))
        .route("/api/bookings/:booking_id/cancel", post(bookings::cancel_booking))
        .route(
            "/api/members/:member_id/bookings",
            get(bookings::list_member_bookings),
        )
        .route(
            "/api/members/:member_id/bookings/upcoming",
            get(bookings::upcoming_member_bookings),
        );

    // Trainers run their sessions.
    let trainer_routes = Router::new()
        .route("/api/sessions/:session_id/start", post(sessions::start_session))
        .route("/api/sessions/:session_id/complete", post(sessions::complete_session))
        .route("/api/sessions/:session_id/roster", get(sessions::roster))
        .route("/api/sessions/:session_id/no-shows", post(sessions::process_no_shows))
        .route(
            "/api/sessions/:session_id/bookings",
            get(bookings::list_session_bookings),
        )
        .route("/api/bookings/:booking_id/check-in", post(bookings::check_in_booking))
        .route("/api/bookings/bulk-check-in", post(bookings::bulk_check_in_bookings))
        .route("/api/bookings/:booking_id/no-show", post(bookings::mark_no_show))
        .route(
            "/api/churn/interventions/:intervention_id/execute",
            post(churn::execute_intervention),
        )
        .route(
            "/api/churn/interventions/:intervention_id/outcome",
            post(churn::record_intervention_outcome),
        )
        .route_layer(middleware::from_fn(require_trainer));

    // Front desk and club operations.
    let staff_routes = Router::new()
        // Members
        .route(
            "/api/members",
            post(members::create_member).get(members::list_members),
        )
        .route("/api/members/counts", get(members::member_counts))
        .route("/api/members/bulk-status", post(members::bulk_change_status))
        .route(
            "/api/members/:member_id",
            get(members::get_member)
                .put(members::update_member)
                .delete(members::delete_member),
        )
        .route(
            "/api/members/:member_id/:action",
            post(members::change_member_status),
        )
        // Plans (read)
        .route("/api/plans", get(plans::list_plans))
        .route("/api/plans/:plan_id", get(plans::get_plan))
        // Subscriptions
        .route(
            "/api/subscriptions",
            post(subscriptions::create_subscription).get(subscriptions::list_subscriptions),
        )
        .route(
            "/api/subscriptions/:subscription_id",
            get(subscriptions::get_subscription),
        )
        .route(
            "/api/members/:member_id/subscriptions/active",
            get(subscriptions::get_active_subscription),
        )
        .route(
            "/api/subscriptions/:subscription_id/freeze",
            post(subscriptions::freeze_subscription),
        )
        .route(
            "/api/subscriptions/:subscription_id/unfreeze",
            post(subscriptions::unfreeze_subscription),
        )
        .route(
            "/api/subscriptions/:subscription_id/cancel",
            post(subscriptions::cancel_subscription),
        )
        .route(
            "/api/subscriptions/:subscription_id/renew",
            post(subscriptions::renew_subscription),
        )
        .route(
            "/api/subscriptions/:subscription_id/expire",
            post(subscriptions::expire_subscription),
        )
        .route(
            "/api/subscriptions/:subscription_id/confirm-payment",
            post(subscriptions::confirm_payment),
        )
        .route(
            "/api/subscriptions/:subscription_id/past-due",
            post(subscriptions::mark_past_due),
        )
        .route(
            "/api/subscriptions/:subscription_id/suspend",
            post(subscriptions::suspend_subscription),
        )
        .route(
            "/api/subscriptions/:subscription_id/reactivate",
            post(subscriptions::reactivate_subscription),
        )
        .route(
            "/api/subscriptions/:subscription_id/request-cancellation",
            post(subscriptions::request_cancellation),
        )
        .route(
            "/api/subscriptions/:subscription_id/complete-cancellation",
            post(subscriptions::complete_cancellation),
        )
        .route(
            "/api/subscriptions/:subscription_id/withdraw-cancellation",
            post(subscriptions::withdraw_cancellation),
        )
        .route(
            "/api/subscriptions/:subscription_id/use-class",
            post(subscriptions::use_class),
        )
        .route(
            "/api/subscriptions/:subscription_id/use-guest-pass",
            post(subscriptions::use_guest_pass),
        )
        // Locations (read)
        .route("/api/locations", get(locations::list_locations))
        .route("/api/locations/:location_id", get(locations::get_location))
        // Attendance
        .route("/api/attendance/check-in", post(attendance::check_in))
        .route("/api/attendance/check-out", post(attendance::check_out))
        .route("/api/attendance/summary", get(attendance::summary))
        .route(
            "/api/members/:member_id/attendance",
            get(attendance::member_history),
        )
        .route(
            "/api/members/:member_id/attendance/current",
            get(attendance::current_check_in),
        )
        .route(
            "/api/members/:member_id/attendance/count",
            get(attendance::member_visit_count),
        )
        // Classes and sessions
        .route("/api/classes", post(classes::create_class))
        .route(
            "/api/classes/:class_id",
            put(classes::update_class).delete(classes::delete_class),
        )
        .route("/api/classes/:class_id/activate", post(classes::activate_class))
        .route("/api/classes/:class_id/deactivate", post(classes::deactivate_class))
        .route("/api/classes/:class_id/archive", post(classes::archive_class))
        .route("/api/sessions", post(sessions::create_session))
        .route("/api/sessions/:session_id", delete(sessions::delete_session))
        .route("/api/sessions/:session_id/cancel", post(sessions::cancel_session))
        // Bookings (staff side)
        .route("/api/bookings/bulk", post(bookings::bulk_create_bookings))
        .route("/api/bookings/bulk-cancel", post(bookings::bulk_cancel_bookings))
        .route("/api/bookings/:booking_id", delete(bookings::delete_booking))
        // Class packs
        .route("/api/class-packs", post(class_packs::create_pack))
        .route(
            "/api/class-packs/:pack_id",
            get(class_packs::get_pack)
                .put(class_packs::update_pack)
                .delete(class_packs::delete_pack),
        )
        .route("/api/class-packs/:pack_id/activate", post(class_packs::activate_pack))
        .route(
            "/api/class-packs/:pack_id/deactivate",
            post(class_packs::deactivate_pack),
        )
        .route("/api/class-packs/balances", post(class_packs::grant_balance))
        .route(
            "/api/class-packs/balances/:balance_id",
            get(class_packs::get_balance),
        )
        .route(
            "/api/class-packs/balances/:balance_id/use",
            post(class_packs::use_credit),
        )
        .route(
            "/api/class-packs/balances/:balance_id/refund",
            post(class_packs::refund_credit),
        )
        .route(
            "/api/class-packs/balances/:balance_id/cancel",
            post(class_packs::cancel_balance),
        )
        .route(
            "/api/members/:member_id/class-packs",
            get(class_packs::member_balances),
        )
        .route(
            "/api/members/:member_id/class-packs/credits",
            get(class_packs::member_credits),
        )
        // Contracts
        .route(
            "/api/contracts",
            post(contracts::create_contract).get(contracts::list_contracts),
        )
        .route("/api/contracts/:contract_id", get(contracts::get_contract))
        .route("/api/contracts/:contract_id/sign", post(contracts::sign_contract))
        .route("/api/contracts/:contract_id/void", post(contracts::void_contract))
        .route(
            "/api/contracts/:contract_id/request-cancellation",
            post(contracts::request_cancellation),
        )
        .route(
            "/api/contracts/:contract_id/complete-cancellation",
            post(contracts::complete_cancellation),
        )
        .route(
            "/api/contracts/:contract_id/withdraw-cancellation",
            post(contracts::withdraw_cancellation),
        )
        .route("/api/contracts/:contract_id/suspend", post(contracts::suspend_contract))
        .route(
            "/api/contracts/:contract_id/reactivate",
            post(contracts::reactivate_contract),
        )
        .route(
            "/api/contracts/:contract_id/termination-quote",
            get(contracts::termination_quote),
        )
        // Invoices
        .route(
            "/api/invoices",
            post(invoices::create_invoice).get(invoices::list_invoices),
        )
        .route(
            "/api/invoices/from-subscription",
            post(invoices::create_subscription_invoice),
        )
        .route("/api/invoices/counts", get(invoices::invoice_counts))
        .route(
            "/api/invoices/:invoice_id",
            get(invoices::get_invoice).delete(invoices::delete_invoice),
        )
        .route("/api/invoices/:invoice_id/issue", post(invoices::issue_invoice))
        .route("/api/invoices/:invoice_id/payments", post(invoices::record_payment))
        .route("/api/invoices/:invoice_id/cancel", post(invoices::cancel_invoice))
        // Dunning
        .route(
            "/api/dunning",
            post(dunning::start_dunning).get(dunning::list_dunning),
        )
        .route("/api/dunning/:sequence_id", get(dunning::get_dunning))
        .route("/api/dunning/:sequence_id/timeline", get(dunning::timeline))
        .route("/api/dunning/:sequence_id/retry", post(dunning::record_retry))
        .route("/api/dunning/:sequence_id/suspend", post(dunning::suspend))
        .route("/api/dunning/:sequence_id/deactivate", post(dunning::deactivate))
        .route("/api/dunning/:sequence_id/resolve", post(dunning::resolve))
        .route("/api/dunning/:sequence_id/escalate", post(dunning::escalate))
        .route(
            "/api/dunning/:sequence_id/steps/:step_id/sent",
            post(dunning::mark_step_sent),
        )
        // Equipment units and workouts
        .route(
            "/api/equipment/units",
            post(equipment::create_unit).get(equipment::list_units),
        )
        .route(
            "/api/equipment/units/:unit_id",
            get(equipment::get_unit)
                .put(equipment::update_unit)
                .delete(equipment::delete_unit),
        )
        .route(
            "/api/equipment/units/:unit_id/connected",
            post(equipment::mark_connected),
        )
        .route(
            "/api/equipment/units/:unit_id/disconnected",
            post(equipment::mark_disconnected),
        )
        .route("/api/equipment/workouts", post(equipment::record_workout))
        .route(
            "/api/members/:member_id/equipment/workouts",
            get(equipment::member_workouts),
        )
        .route(
            "/api/members/:member_id/equipment/stats",
            get(equipment::member_stats),
        )
        .route(
            "/api/equipment/configs/:config_id/sync-jobs",
            post(equipment::start_sync).get(equipment::list_sync_jobs),
        )
        .route(
            "/api/equipment/configs/:config_id/sync-jobs/latest",
            get(equipment::latest_sync_job),
        )
        .route("/api/equipment/sync-jobs/:job_id", get(equipment::get_sync_job))
        .route(
            "/api/equipment/sync-jobs/:job_id/complete",
            post(equipment::complete_sync_job),
        )
        .route(
            "/api/equipment/sync-jobs/:job_id/fail",
            post(equipment::fail_sync_job),
        )
        // Wearables
        .route("/api/wearables/connections", post(wearables::create_connection))
        .route(
            "/api/members/:member_id/wearables",
            get(wearables::member_connections),
        )
        .route(
            "/api/wearables/connections/:connection_id",
            get(wearables::get_connection)
                .put(wearables::update_connection)
                .delete(wearables::delete_connection),
        )
        .route(
            "/api/wearables/connections/:connection_id/tokens",
            put(wearables::update_tokens),
        )
        .route(
            "/api/wearables/connections/:connection_id/disconnect",
            post(wearables::disconnect),
        )
        .route("/api/wearables/activities", put(wearables::upsert_daily_activity))
        .route("/api/wearables/workouts", post(wearables::record_workout))
        .route(
            "/api/members/:member_id/wearables/workouts",
            get(wearables::member_workouts),
        )
        .route(
            "/api/members/:member_id/wearables/workouts/stats",
            get(wearables::member_workout_stats),
        )
        .route(
            "/api/members/:member_id/wearables/activity-stats",
            get(wearables::member_activity_stats),
        )
        .route(
            "/api/wearables/connections/:connection_id/sync-jobs",
            post(wearables::start_sync).get(wearables::list_sync_jobs),
        )
        .route(
            "/api/wearables/sync-jobs/:job_id/complete",
            post(wearables::complete_sync_job),
        )
        .route(
            "/api/wearables/sync-jobs/:job_id/fail",
            post(wearables::fail_sync_job),
        )
        // Churn predictions and interventions
        .route(
            "/api/churn/predictions",
            post(churn::record_prediction).get(churn::list_predictions),
        )
        .route(
            "/api/churn/predictions/:prediction_id",
            get(churn::get_prediction),
        )
        .route(
            "/api/churn/predictions/:prediction_id/outcome",
            post(churn::record_prediction_outcome),
        )
        .route("/api/forecasting/models", get(forecasting::list_models))
        .route("/api/forecasting/models/active", get(forecasting::active_models))
        .route("/api/forecasting/models/:model_id", get(forecasting::get_model))
        .route("/api/forecasting/revenue", get(forecasting::revenue_forecasts))
        .route("/api/forecasting/membership", get(forecasting::membership_forecasts))
        .route("/api/forecasting/forecasts", get(forecasting::list_forecasts))
        .route(
            "/api/forecasting/forecasts/:forecast_id",
            get(forecasting::get_forecast),
        )
        .route("/api/churn/at-risk", get(churn::at_risk_members))
        .route("/api/churn/risk-distribution", get(churn::risk_distribution))
        .route(
            "/api/churn/interventions",
            post(churn::create_intervention).get(churn::list_interventions),
        )
        .route(
            "/api/churn/interventions/:intervention_id",
            get(churn::get_intervention).delete(churn::delete_intervention),
        )
        .route(
            "/api/churn/interventions/:intervention_id/assign",
            post(churn::assign_intervention),
        )
        .route(
            "/api/churn/interventions/:intervention_id/cancel",
            post(churn::cancel_intervention),
        )
        // E-invoicing
        .route(
            "/api/zatca/submissions",
            post(zatca::create_submission).get(zatca::list_submissions),
        )
        .route(
            "/api/zatca/submissions/:submission_id",
            get(zatca::get_submission),
        )
        .route(
            "/api/zatca/submissions/:submission_id/submitted",
            post(zatca::mark_submitted),
        )
        .route(
            "/api/zatca/submissions/:submission_id/response",
            post(zatca::record_response),
        )
        .route(
            "/api/zatca/submissions/:submission_id/resubmit",
            post(zatca::resubmit),
        )
        // Kiosks
        .route("/api/kiosks", get(kiosk::list_devices))
        .route("/api/kiosks/:device_id", get(kiosk::get_device))
        .route("/api/kiosks/by-code/:code", get(kiosk::get_device_by_code))
        .route("/api/kiosks/:device_id/heartbeat", post(kiosk::heartbeat))
        .route("/api/kiosk-sessions", post(kiosk::start_session))
        .route("/api/kiosk-sessions/:session_id", get(kiosk::get_session))
        .route(
            "/api/kiosk-sessions/:session_id/identify",
            post(kiosk::identify),
        )
        .route(
            "/api/kiosk-sessions/:session_id/check-in",
            post(kiosk::check_in),
        )
        .route("/api/kiosk-sessions/:session_id/end", post(kiosk::end_session))
        // Security events are reported by front desk staff
        .route(
            "/api/compliance/security-events",
            post(compliance::record_security_event),
        )
        .route_layer(middleware::from_fn(require_staff));

    // Club configuration, user management, compliance review.
    let club_admin_routes = Router::new()
        .route("/api/users", post(users::create_user).get(users::list_users))
        .route(
            "/api/users/:user_id",
            get(users::get_user).put(users::update_user),
        )
        .route("/api/plans", post(plans::create_plan))
        .route(
            "/api/plans/:plan_id",
            put(plans::update_plan).delete(plans::delete_plan),
        )
        .route("/api/plans/:plan_id/activate", post(plans::activate_plan))
        .route("/api/plans/:plan_id/deactivate", post(plans::deactivate_plan))
        .route("/api/locations", post(locations::create_location))
        .route(
            "/api/locations/:location_id",
            put(locations::update_location).delete(locations::delete_location),
        )
        .route("/api/kiosks", post(kiosk::create_device))
        .route(
            "/api/kiosks/:device_id",
            put(kiosk::update_device).delete(kiosk::delete_device),
        )
        .route(
            "/api/equipment/configs",
            post(equipment::create_config).get(equipment::list_configs),
        )
        .route(
            "/api/equipment/configs/:config_id",
            get(equipment::get_config)
                .put(equipment::update_config)
                .delete(equipment::delete_config),
        )
        .route(
            "/api/equipment/configs/:config_id/oauth-tokens",
            put(equipment::set_oauth_tokens),
        )
        .route("/api/forecasting/models", post(forecasting::create_model))
        .route(
            "/api/forecasting/models/:model_id/activate",
            post(forecasting::activate_model),
        )
        .route("/api/forecasting/generate", post(forecasting::generate))
        .route(
            "/api/forecasting/forecasts/:forecast_id/actual",
            post(forecasting::record_actual),
        )
        .route(
            "/api/churn/models",
            post(churn::create_model).get(churn::list_models),
        )
        .route("/api/churn/models/active", get(churn::active_model))
        .route(
            "/api/churn/models/:model_id/activate",
            post(churn::activate_model),
        )
        .route(
            "/api/churn/models/:model_id/metrics",
            put(churn::update_model_metrics),
        )
        .route(
            "/api/compliance/exports",
            post(compliance::create_export).get(compliance::list_exports),
        )
        .route("/api/compliance/exports/:export_id", get(compliance::get_export))
        .route(
            "/api/compliance/exports/:export_id/approve",
            post(compliance::approve_export),
        )
        .route(
            "/api/compliance/exports/:export_id/reject",
            post(compliance::reject_export),
        )
        .route(
            "/api/compliance/exports/:export_id/process",
            post(compliance::process_export),
        )
        .route(
            "/api/compliance/exports/:export_id/complete",
            post(compliance::complete_export),
        )
        .route(
            "/api/compliance/exports/:export_id/fail",
            post(compliance::fail_export),
        )
        .route(
            "/api/compliance/security-events",
            get(compliance::list_security_events),
        )
        .route(
            "/api/compliance/security-events/counts",
            get(compliance::security_event_counts),
        )
        .route(
            "/api/compliance/security-events/:event_id",
            get(compliance::get_security_event),
        )
        .route(
            "/api/compliance/security-events/:event_id/investigate",
            post(compliance::investigate_security_event),
        )
        .route("/api/audit-logs", get(audit_logs::list_audit_logs))
        .route("/api/audit-logs/:log_id", get(audit_logs::get_audit_log))
        .route_layer(middleware::from_fn(require_club_admin));

    // Club routes. Middleware order: auth, then the tenant guard (suspension
    // and maintenance), then per-user rate limiting.
    let club_routes = Router::new()
        .merge(member_routes)
        .merge(trainer_routes)
        .merge(staff_routes)
        .merge(club_admin_routes)
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .route_layer(middleware::from_fn_with_state(state.clone(), tenant_guard))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_user_auth,
        ));

    // Platform administration. Not subject to maintenance windows.
    let platform_routes = Router::new()
        .route(
            "/api/platform/tenants",
            post(tenants::create_tenant).get(tenants::list_tenants),
        )
        .route(
            "/api/platform/tenants/:tenant_id",
            get(tenants::get_tenant).put(tenants::update_tenant),
        )
        .route(
            "/api/platform/tenants/:tenant_id/suspend",
            post(tenants::suspend_tenant),
        )
        .route(
            "/api/platform/tenants/:tenant_id/reactivate",
            post(tenants::reactivate_tenant),
        )
        .route(
            "/api/platform/tenant-contracts",
            post(tenant_contracts::create_contract).get(tenant_contracts::list_contracts),
        )
        .route(
            "/api/platform/tenant-contracts/:contract_id",
            get(tenant_contracts::get_contract),
        )
        .route(
            "/api/platform/tenant-contracts/:contract_id/send",
            post(tenant_contracts::send_contract),
        )
        .route(
            "/api/platform/tenant-contracts/:contract_id/sign",
            post(tenant_contracts::sign_contract),
        )
        .route(
            "/api/platform/tenant-contracts/:contract_id/activate",
            post(tenant_contracts::activate_contract),
        )
        .route(
            "/api/platform/tenant-contracts/:contract_id/terminate",
            post(tenant_contracts::terminate_contract),
        )
        .route(
            "/api/platform/tenant-contracts/:contract_id/cancel",
            post(tenant_contracts::cancel_contract),
        )
        .route(
            "/api/platform/settings",
            get(platform::list_settings).post(platform::create_setting),
        )
        .route(
            "/api/platform/settings/:key",
            get(platform::get_setting).put(platform::update_setting),
        )
        .route(
            "/api/platform/maintenance",
            post(platform::create_window).get(platform::list_windows),
        )
        .route(
            "/api/platform/maintenance/:window_id",
            get(platform::get_window).put(platform::update_window),
        )
        .route(
            "/api/platform/maintenance/:window_id/cancel",
            post(platform::cancel_window),
        )
        .route("/api/platform/audit-logs", get(audit_logs::list_audit_logs))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .route_layer(middleware::from_fn(require_platform_admin))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_user_auth,
        ));

    // Signed in, but reachable during maintenance.
    let session_routes = Router::new()
        .route("/api/auth/me", get(auth::me))
        .route("/api/maintenance/current", get(platform::current_window))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_user_auth,
        ));

    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/api/health", get(health::health_check))
        .route("/api/health/ready", get(health::ready))
        .route("/api/health/live", get(health::live))
        .route("/metrics", get(metrics_handler))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/refresh", post(auth::refresh))
        .route("/api/equipment/providers", get(equipment::list_providers))
        .route("/api/wearables/platforms", get(wearables::list_platforms));

    Router::new()
        .merge(public_routes)
        .merge(session_routes)
        .merge(club_routes)
        .merge(platform_routes)
        // Global middleware (order matters: bottom layers run first)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            security_headers_middleware,
        ))
        .layer(DefaultBodyLimit::max(config.server.max_body_size))
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_secs,
        )))
        .layer(middleware::from_fn(metrics_middleware)) // Prometheus metrics
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(trace_id)) // Request ID and logging
        .layer(cors)
        .with_state(state)
}
