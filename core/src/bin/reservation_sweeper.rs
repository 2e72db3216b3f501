//! Reservation sweeper
//!
//! One-shot cleanup of expired stock holds, intended to be run by an
//! external scheduler (cron, systemd timer). Exits after a single sweep;
//! availability checks treat expired holds as released even when no sweep
//! has run yet.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use warehouse_stock_core::services::ReservationService;
use warehouse_stock_core::{db, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "wsm_sweeper=debug,warehouse_stock_core=debug,sqlx=warn".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::load()?;

    tracing::info!("Starting reservation sweep");
    tracing::info!("Environment: {}", config.environment);

    let db_pool = db::connect(&config.database).await?;
    tracing::info!("Database connection established");

    let reservations = ReservationService::new(db_pool);
    let released = reservations.expire_stale().await?;

    tracing::info!("Sweep finished, {} reservations released", released);

    Ok(())
}
