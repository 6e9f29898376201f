//! # Application State
//!
//! Shared state for the Axum application: the four lifecycle components, the
//! store they share, the package catalog and configuration.

use chrono::NaiveDate;
use ski_core::{
    BookingError, BookingPolicy, CheckoutBuilder, CheckoutUrls, CouponValidator,
    InstallmentScheduler, PackageCatalog, SharedProcessor, SharedStore, WebhookReconciler,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

const PACKAGE_PATHS: [&str; 3] = [
    "config/packages.toml",
    "../config/packages.toml",
    "../../config/packages.toml",
];

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Base URL for checkout redirects
    pub base_url: String,
    /// Environment (development, staging, production)
    pub environment: String,
    /// Bearer token for the admin endpoints
    pub operator_api_key: String,
    /// Explicit package catalog path; the usual locations are searched otherwise
    pub packages_path: Option<String>,
    /// Fallback balance due date for packages without one
    pub balance_due_date: Option<NaiveDate>,
}

impl AppConfig {
    /// Load from environment variables
    pub fn from_env() -> Result<Self, BookingError> {
        dotenvy::dotenv().ok();

        let operator_api_key = std::env::var("OPERATOR_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| BookingError::Configuration("OPERATOR_API_KEY not set".to_string()))?;

        let balance_due_date = match std::env::var("BALANCE_DUE_DATE") {
            Ok(raw) => Some(raw.trim().parse::<NaiveDate>().map_err(|e| {
                BookingError::Configuration(format!("BALANCE_DUE_DATE: {}", e))
            })?),
            Err(_) => None,
        };

        Ok(Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            base_url: std::env::var("BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8080".to_string()),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            operator_api_key,
            packages_path: std::env::var("PACKAGES_PATH").ok(),
            balance_due_date,
        })
    }

    /// Get the socket address to bind to
    pub fn socket_addr(&self) -> Result<SocketAddr, BookingError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| BookingError::Configuration(format!("invalid HOST/PORT: {}", e)))
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn policy(&self) -> BookingPolicy {
        match self.balance_due_date {
            Some(date) => BookingPolicy::default().with_default_balance_due_date(date),
            None => BookingPolicy::default(),
        }
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<PackageCatalog>,
    pub coupons: Arc<CouponValidator>,
    pub checkout: Arc<CheckoutBuilder>,
    pub reconciler: Arc<WebhookReconciler>,
    pub scheduler: Arc<InstallmentScheduler>,
    pub store: SharedStore,
    pub config: Arc<AppConfig>,
}

impl AppState {
    /// Wire every component over one processor and one store
    pub fn new(
        config: AppConfig,
        processor: SharedProcessor,
        store: SharedStore,
        catalog: PackageCatalog,
    ) -> Self {
        let policy = config.policy();
        let catalog = Arc::new(catalog);
        let coupons = Arc::new(CouponValidator::new(processor.clone(), policy.clone()));
        let checkout = Arc::new(CheckoutBuilder::new(
            processor.clone(),
            store.clone(),
            catalog.clone(),
            coupons.clone(),
            policy.clone(),
            CheckoutUrls::new(&config.base_url),
        ));
        let reconciler = Arc::new(WebhookReconciler::new(processor.clone(), store.clone()));
        let scheduler = Arc::new(InstallmentScheduler::new(processor, store.clone(), policy));

        Self {
            catalog,
            coupons,
            checkout,
            reconciler,
            scheduler,
            store,
            config: Arc::new(config),
        }
    }
}

/// Load the package catalog from `explicit`, else the first standard location found
pub fn load_package_catalog(explicit: Option<&str>) -> anyhow::Result<PackageCatalog> {
    if let Some(path) = explicit {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path, e))?;
        return parse_catalog(path, &content);
    }

    for path in PACKAGE_PATHS {
        if let Ok(content) = std::fs::read_to_string(path) {
            return parse_catalog(path, &content);
        }
    }

    warn!("No package catalog found, using empty catalog");
    Ok(PackageCatalog::new())
}

fn parse_catalog(path: &str, content: &str) -> anyhow::Result<PackageCatalog> {
    let catalog = PackageCatalog::from_toml(content)
        .map_err(|e| anyhow::anyhow!("Failed to parse {}: {}", path, e))?;
    info!(count = catalog.len(), path, "loaded packages");
    Ok(catalog)
}
