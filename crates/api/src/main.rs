use anyhow::Result;
use clubhouse_api::jobs::{
    DunningJob, JobScheduler, KioskSessionExpiryJob, OverdueInvoicesJob, PoolMetricsJob,
    SubscriptionExpiryJob,
};
use clubhouse_api::{app, config, middleware};
use sqlx::PgPool;
use std::time::Duration;
use tracing::{info, warn};

fn build_scheduler(config: &config::Config, pool: &PgPool) -> JobScheduler {
    let jobs = &config.jobs;
    let mut scheduler = JobScheduler::new();
    scheduler.register(SubscriptionExpiryJob::new(
        pool.clone(),
        jobs.subscription_expiry_interval_secs,
        jobs.batch_size,
    ));
    scheduler.register(OverdueInvoicesJob::new(
        pool.clone(),
        jobs.overdue_invoice_interval_secs,
    ));
    scheduler.register(DunningJob::new(
        pool.clone(),
        config.billing.clone(),
        jobs.dunning_interval_secs,
        jobs.batch_size,
    ));
    scheduler.register(KioskSessionExpiryJob::new(
        pool.clone(),
        jobs.kiosk_session_expiry_interval_secs,
    ));
    scheduler.register(PoolMetricsJob::new(
        pool.clone(),
        jobs.pool_metrics_interval_secs,
    ));
    scheduler
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let config = config::Config::load()?;

    middleware::logging::init_logging(&config.logging);
    if let Err(e) = middleware::init_metrics() {
        warn!(error = %e, "Prometheus recorder not installed");
    }

    info!("Starting Clubhouse API v{}", env!("CARGO_PKG_VERSION"));

    let db_config = persistence::db::DatabaseConfig::from(&config.database);
    let pool = persistence::db::create_pool(&db_config).await?;

    info!("Running database migrations...");
    sqlx::migrate!("../persistence/src/migrations")
        .run(&pool)
        .await?;
    info!("Migrations completed");

    let scheduler = if config.jobs.enabled {
        let mut scheduler = build_scheduler(&config, &pool);
        scheduler.start();
        Some(scheduler)
    } else {
        info!("Background jobs disabled");
        None
    };

    let app = app::create_app(config.clone(), pool)?;

    let addr = config.socket_addr()?;
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(scheduler) = scheduler {
        scheduler.shutdown();
        scheduler.wait_for_shutdown(Duration::from_secs(10)).await;
    }

    Ok(())
}
