//! # ski-api
//!
//! HTTP API layer for powder-pay.
//!
//! ## Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | GET | `/health` | Health check |
//! | GET | `/api/v1/packages` | List packages |
//! | POST | `/api/v1/checkout` | Create checkout session |
//! | POST | `/api/v1/coupons/validate` | Validate coupon |
//! | POST | `/webhook/stripe` | Stripe webhook |
//! | POST | `/api/v1/admin/balances/process` | Collect due balances (operator) |
//! | POST | `/api/v1/admin/bookings/{id}/balance-link` | Fallback payment link (operator) |
//! | GET | `/api/v1/admin/bookings/{id}` | Booking detail (operator) |

pub mod handlers;
pub mod routes;
pub mod state;

pub use routes::create_router;
pub use state::{load_package_catalog, AppConfig, AppState};
