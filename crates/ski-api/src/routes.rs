//! # Routes
//!
//! Axum router for the booking payment API.

use crate::handlers;
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Create the main application router
///
/// Routes:
/// - Public:
///   - GET  /api/v1/packages - Active packages
///   - POST /api/v1/checkout - Create checkout session
///   - POST /api/v1/coupons/validate - Validate coupon for a group size
///
/// - Operator (Bearer OPERATOR_API_KEY):
///   - POST /api/v1/admin/balances/process - Collect due balances
///   - POST /api/v1/admin/bookings/{id}/balance-link - Manual fallback link
///   - GET  /api/v1/admin/bookings/{id} - Booking, guests, transactions
///
/// - Webhooks:
///   - POST /webhook/stripe - Stripe webhook handler
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let public_routes = Router::new()
        .route("/packages", get(handlers::list_packages))
        .route("/checkout", post(handlers::create_checkout))
        .route("/coupons/validate", post(handlers::validate_coupon))
        .layer(cors);

    let admin_routes = Router::new()
        .route("/balances/process", post(handlers::process_balances))
        .route(
            "/bookings/{booking_id}/balance-link",
            post(handlers::create_balance_link),
        )
        .route("/bookings/{booking_id}", get(handlers::get_booking));

    let api_routes = Router::new()
        .merge(public_routes)
        .nest("/admin", admin_routes);

    // Raw body; no CORS
    let webhook_routes = Router::new().route("/stripe", post(handlers::stripe_webhook));

    Router::new()
        .route("/health", get(handlers::health))
        .route("/", get(handlers::health))
        .nest("/api/v1", api_routes)
        .nest("/webhook", webhook_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
