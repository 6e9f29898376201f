//! # Request Handlers
//!
//! Axum request handlers for the booking payment API.
//! Customers see `public_message()` only; operators get structured detail.

use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::{NaiveDate, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use ski_core::{
    collected_total, BalanceBatchReport, Booking, BookingDraft, BookingError, CheckoutRedirect,
    CouponResult, Guest, Money, PaymentPlan, PaymentTransaction, WebhookAck,
};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

// =============================================================================
// Request/Response Types
// =============================================================================

/// Create checkout request
#[derive(Debug, Deserialize)]
pub struct CreateCheckoutRequest {
    /// Client-held booking draft
    pub booking: BookingDraft,
    pub payment_mode: PaymentPlan,
    #[serde(default)]
    pub coupon_code: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ValidateCouponRequest {
    pub code: String,
    pub group_size: u32,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProcessBalancesRequest {
    /// Defaults to today (UTC)
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
pub struct BalanceLinkResponse {
    pub booking_id: Uuid,
    pub link_id: String,
    pub url: String,
}

/// Operator view of one booking
#[derive(Debug, Serialize)]
pub struct BookingDetail {
    pub booking: Booking,
    pub guests: Vec<Guest>,
    pub transactions: Vec<PaymentTransaction>,
    /// Sum of succeeded transactions
    pub collected: Money,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, code: u16) -> Self {
        Self {
            error: error.into(),
            code,
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

fn booking_error_to_response(err: BookingError) -> ApiError {
    let code = err.status_code();
    let mut response = ErrorResponse::new(err.public_message(), code);
    if let Some(suggestion) = err.suggestion() {
        response = response.with_details(suggestion);
    }
    (
        StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        Json(response),
    )
}

/// Check `Authorization: Bearer <OPERATOR_API_KEY>`
fn require_operator(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let provided = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .unwrap_or_default();

    if provided.is_empty() || !keys_match(provided, &state.config.operator_api_key) {
        warn!(security = true, "operator request with bad credentials");
        return Err(booking_error_to_response(BookingError::Unauthorized(
            "operator credentials required".to_string(),
        )));
    }
    Ok(())
}

/// Constant-time comparison via HMAC digests, independent of key length
fn keys_match(provided: &str, expected: &str) -> bool {
    let digest = |key: &str| -> Option<Hmac<Sha256>> {
        let mut mac = Hmac::<Sha256>::new_from_slice(b"powder-pay-operator").ok()?;
        mac.update(key.as_bytes());
        Some(mac)
    };
    match (digest(provided), digest(expected)) {
        (Some(provided), Some(expected)) => provided
            .verify_slice(&expected.finalize().into_bytes())
            .is_ok(),
        _ => false,
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Health check endpoint
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "powder-pay",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Active packages
pub async fn list_packages(State(state): State<AppState>) -> impl IntoResponse {
    let packages: Vec<_> = state.catalog.active_packages().collect();
    Json(serde_json::json!({
        "packages": packages,
        "count": packages.len()
    }))
}

#[instrument(skip(state, request), fields(package_id = %request.booking.package_id, mode = %request.payment_mode))]
pub async fn create_checkout(
    State(state): State<AppState>,
    Json(request): Json<CreateCheckoutRequest>,
) -> Result<Json<CheckoutRedirect>, ApiError> {
    let redirect = state
        .checkout
        .build_session(
            request.booking,
            request.payment_mode,
            request.coupon_code.as_deref().filter(|c| !c.trim().is_empty()),
        )
        .await
        .map_err(|e| {
            warn!(error = %e, "checkout not created");
            booking_error_to_response(e)
        })?;

    Ok(Json(redirect))
}

#[instrument(skip(state, request), fields(group_size = request.group_size))]
pub async fn validate_coupon(
    State(state): State<AppState>,
    Json(request): Json<ValidateCouponRequest>,
) -> Result<Json<CouponResult>, ApiError> {
    state
        .coupons
        .validate(&request.code, request.group_size)
        .await
        .map(Json)
        .map_err(booking_error_to_response)
}

/// Stripe webhook. Takes the raw body: the signature covers exact bytes.
#[instrument(skip(state, headers, body))]
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, ApiError> {
    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            warn!(security = true, "webhook without signature header");
            (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::new("Missing Stripe-Signature header", 400)),
            )
        })?;

    let ack = state
        .reconciler
        .handle(&body, signature)
        .await
        .map_err(booking_error_to_response)?;

    info!(status = ack.as_str(), booking_id = ?ack.booking_id(), "webhook acknowledged");
    Ok(Json(ack))
}

/// Collect balances due on `date` (default today). Called by the daily cron.
#[instrument(skip_all)]
pub async fn process_balances(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<BalanceBatchReport>, ApiError> {
    require_operator(&state, &headers)?;

    let request: ProcessBalancesRequest = if body.is_empty() {
        ProcessBalancesRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| {
            booking_error_to_response(BookingError::Validation(format!("bad request body: {}", e)))
        })?
    };
    let date = request.date.unwrap_or_else(|| Utc::now().date_naive());

    let report = state.scheduler.process_due(date).await.map_err(|e| {
        error!(alert = true, error = %e, %date, "balance run aborted");
        (
            StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            Json(ErrorResponse::new("Balance run failed", e.status_code()).with_details(e.to_string())),
        )
    })?;

    Ok(Json(report))
}

#[instrument(skip(state, headers), fields(booking_id = %booking_id))]
pub async fn create_balance_link(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<BalanceLinkResponse>, ApiError> {
    require_operator(&state, &headers)?;

    let link = state
        .scheduler
        .create_balance_link(booking_id)
        .await
        .map_err(operator_error)?;

    Ok(Json(BalanceLinkResponse {
        booking_id,
        link_id: link.id,
        url: link.url,
    }))
}

#[instrument(skip(state, headers), fields(booking_id = %booking_id))]
pub async fn get_booking(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<BookingDetail>, ApiError> {
    require_operator(&state, &headers)?;

    let booking = state
        .store
        .get_booking(booking_id)
        .await
        .map_err(operator_error)?
        .ok_or_else(|| {
            booking_error_to_response(BookingError::BookingNotFound {
                booking_id: booking_id.to_string(),
            })
        })?;
    let guests = state
        .store
        .get_guests_by_booking_id(booking_id)
        .await
        .map_err(operator_error)?;
    let transactions = state
        .store
        .get_transactions_by_booking_id(booking_id)
        .await
        .map_err(operator_error)?;

    Ok(Json(BookingDetail {
        collected: collected_total(&transactions),
        booking,
        guests,
        transactions,
    }))
}

/// Operators see the underlying error text
fn operator_error(err: BookingError) -> ApiError {
    let code = err.status_code();
    (
        StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        Json(ErrorResponse::new(err.public_message(), code).with_details(err.to_string())),
    )
}
