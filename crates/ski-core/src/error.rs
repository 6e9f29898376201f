//! # Booking Error Types
//!
//! Typed error handling for the booking payment lifecycle.
//! All core operations return `Result<T, BookingError>`.

use thiserror::Error;

/// Coarse error category used for propagation policy and HTTP mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input shape; reject, never retry
    Validation,
    /// Bad webhook signature or operator credential
    Authentication,
    /// Coupon, package or booking absent
    NotFound,
    /// Coupon ineligible, balance already paid, wrong plan
    BusinessRule,
    /// Payment processor call failed
    Upstream,
    /// Store read/write failed
    Persistence,
    /// Missing or invalid configuration
    Configuration,
    /// Should not happen
    Internal,
}

/// Core error type for all booking operations
#[derive(Debug, Error)]
pub enum BookingError {
    /// Invalid request data
    #[error("Invalid request: {0}")]
    Validation(String),

    /// Webhook signature verification failed
    #[error("Invalid webhook signature: {0}")]
    InvalidSignature(String),

    /// Missing or wrong operator credential
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// No active promotion code matches
    #[error("Coupon not found: {code}")]
    CouponNotFound { code: String },

    /// Coupon exists but can no longer be redeemed
    #[error("Coupon expired: {code}")]
    CouponExpired { code: String },

    /// Group-size gate on the group discount code
    #[error("Coupon {code} requires a group of at least {required} (group has {group_size})")]
    IneligibleForCoupon {
        code: String,
        required: u32,
        group_size: u32,
        suggestion: String,
    },

    /// Package unknown or not bookable
    #[error("Package not found: {package_id}")]
    PackageNotFound { package_id: String },

    /// Booking does not exist
    #[error("Booking not found: {booking_id}")]
    BookingNotFound { booking_id: String },

    /// Operation not allowed in the booking's current state
    #[error("Business rule violation: {0}")]
    BusinessRule(String),

    /// Completed checkout carried no usable booking metadata
    #[error("Missing booking metadata: {0}")]
    MissingBookingMetadata(String),

    /// Authentic webhook that could not be decoded
    #[error("Webhook parse error: {0}")]
    WebhookParse(String),

    /// Checkout session could not be created upstream
    #[error("Payment processor unavailable: {0}")]
    ProcessorUnavailable(String),

    /// Payment provider API error
    #[error("Provider error [{provider}]: {message}")]
    Provider { provider: String, message: String },

    /// Network/HTTP error communicating with provider
    #[error("Network error: {0}")]
    Network(String),

    /// Upstream call exceeded its time bound
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Store failure
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Configuration errors (missing keys, invalid config)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl BookingError {
    /// Category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            BookingError::Validation(_) | BookingError::WebhookParse(_) => ErrorKind::Validation,
            BookingError::InvalidSignature(_) | BookingError::Unauthorized(_) => {
                ErrorKind::Authentication
            }
            BookingError::CouponNotFound { .. }
            | BookingError::PackageNotFound { .. }
            | BookingError::BookingNotFound { .. } => ErrorKind::NotFound,
            BookingError::CouponExpired { .. }
            | BookingError::IneligibleForCoupon { .. }
            | BookingError::BusinessRule(_)
            | BookingError::MissingBookingMetadata(_) => ErrorKind::BusinessRule,
            BookingError::ProcessorUnavailable(_)
            | BookingError::Provider { .. }
            | BookingError::Network(_)
            | BookingError::Timeout(_) => ErrorKind::Upstream,
            BookingError::Persistence(_) => ErrorKind::Persistence,
            BookingError::Configuration(_) => ErrorKind::Configuration,
            BookingError::Serialization(_) => ErrorKind::Internal,
        }
    }

    /// Returns true if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BookingError::Network(_) | BookingError::Timeout(_) | BookingError::Provider { .. }
        )
    }

    /// Returns the HTTP status code appropriate for this error
    pub fn status_code(&self) -> u16 {
        match self {
            BookingError::Validation(_) => 400,
            BookingError::InvalidSignature(_) => 400,
            BookingError::Unauthorized(_) => 401,
            BookingError::CouponNotFound { .. } => 404,
            BookingError::CouponExpired { .. } => 410,
            BookingError::IneligibleForCoupon { .. } => 422,
            BookingError::PackageNotFound { .. } => 404,
            BookingError::BookingNotFound { .. } => 404,
            BookingError::BusinessRule(_) => 409,
            BookingError::MissingBookingMetadata(_) => 422,
            BookingError::WebhookParse(_) => 400,
            BookingError::ProcessorUnavailable(_) => 502,
            BookingError::Provider { .. } => 502,
            BookingError::Network(_) => 503,
            BookingError::Timeout(_) => 504,
            BookingError::Persistence(_) => 500,
            BookingError::Configuration(_) => 500,
            BookingError::Serialization(_) => 500,
        }
    }

    /// Message safe to show a customer. Processor and store detail stays in the logs.
    pub fn public_message(&self) -> String {
        match self.kind() {
            ErrorKind::Upstream => {
                "Payment service is temporarily unavailable, please try again".to_string()
            }
            ErrorKind::Persistence | ErrorKind::Configuration | ErrorKind::Internal => {
                "Internal server error".to_string()
            }
            _ => self.to_string(),
        }
    }

    /// Suggestion attached to the error, if any
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            BookingError::IneligibleForCoupon { suggestion, .. } => Some(suggestion),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for BookingError {
    fn from(err: serde_json::Error) -> Self {
        BookingError::Serialization(err.to_string())
    }
}

/// Result type alias for booking operations
pub type BookingResult<T> = Result<T, BookingError>;
