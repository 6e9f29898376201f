//! # powder-pay
//!
//! Booking payment service for ski trips.
//!
//! ## Usage
//!
//! ```bash
//! export STRIPE_SECRET_KEY=sk_test_...
//! export STRIPE_PUBLISHABLE_KEY=pk_test_...
//! export STRIPE_WEBHOOK_SECRET=whsec_...
//! export OPERATOR_API_KEY=...
//!
//! powder-pay
//!
//! # daily, from cron
//! curl -X POST -H "Authorization: Bearer $OPERATOR_API_KEY" \
//!   http://localhost:8080/api/v1/admin/balances/process
//! ```

use ski_api::{load_package_catalog, routes, AppConfig, AppState};
use ski_core::MemoryStore;
use ski_stripe::StripeProcessor;
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let json_logs = std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));
    tracing_subscriber::registry()
        .with(json_logs.then(|| fmt::layer().json()))
        .with((!json_logs).then(fmt::layer))
        .with(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .init();

    let config = AppConfig::from_env()?;
    let catalog = load_package_catalog(config.packages_path.as_deref())?;
    let processor = StripeProcessor::from_env()
        .map_err(|e| anyhow::anyhow!("Failed to initialize Stripe: {}", e))?;

    if processor.config().is_live_mode() && !config.is_production() {
        warn!(environment = %config.environment, "live Stripe keys outside production");
    }

    let addr = config.socket_addr()?;
    info!(environment = %config.environment, packages = catalog.len(), "starting powder-pay");

    let state = AppState::new(
        config,
        Arc::new(processor),
        Arc::new(MemoryStore::new()),
        catalog,
    );
    let app = routes::create_router(state);

    info!("listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
