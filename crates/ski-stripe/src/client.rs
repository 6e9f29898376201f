//! # Stripe HTTP Client
//!
//! Thin wrapper over `reqwest`: form-encoded requests, auth and version
//! headers, idempotency keys and Stripe's error envelope.

use crate::config::StripeConfig;
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use ski_core::{BookingError, BookingResult};
use thiserror::Error;
use tracing::{debug, error};

pub(crate) const PROVIDER: &str = "stripe";

/// Stripe's `{"error": {...}}` body
#[derive(Debug, Clone, Deserialize)]
pub struct StripeErrorBody {
    #[serde(rename = "type", default)]
    pub error_type: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub decline_code: Option<String>,
    #[serde(default)]
    pub payment_intent: Option<serde_json::Value>,
}

impl StripeErrorBody {
    pub fn is_card_error(&self) -> bool {
        self.error_type.as_deref() == Some("card_error")
    }

    /// Most specific reason Stripe gave
    pub fn reason(&self) -> String {
        self.decline_code
            .clone()
            .or_else(|| self.code.clone())
            .or_else(|| self.message.clone())
            .unwrap_or_else(|| "unknown".to_string())
    }
}

#[derive(Debug, Deserialize)]
struct StripeErrorResponse {
    error: StripeErrorBody,
}

#[derive(Debug, Error)]
pub enum StripeFailure {
    #[error("network error: {0}")]
    Transport(String),

    #[error("HTTP {status}: {}", .body.reason())]
    Api { status: u16, body: StripeErrorBody },

    #[error("unexpected response: {0}")]
    Decode(String),
}

impl From<StripeFailure> for BookingError {
    fn from(failure: StripeFailure) -> Self {
        match failure {
            StripeFailure::Transport(message) => BookingError::Network(message),
            other => BookingError::Provider {
                provider: PROVIDER.to_string(),
                message: other.to_string(),
            },
        }
    }
}

pub struct StripeClient {
    config: StripeConfig,
    http: Client,
}

impl StripeClient {
    pub fn new(config: StripeConfig) -> BookingResult<Self> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| BookingError::Configuration(format!("HTTP client: {}", e)))?;
        Ok(Self { config, http })
    }

    pub fn config(&self) -> &StripeConfig {
        &self.config
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.config.api_base_url, path);
        self.http
            .request(method, url)
            .header("Authorization", self.config.auth_header())
            .header("Stripe-Version", &self.config.api_version)
    }

    /// POST form-encoded params
    pub async fn post_form<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(String, String)],
        idempotency_key: Option<&str>,
    ) -> Result<T, StripeFailure> {
        let mut request = self.request(Method::POST, path).form(params);
        if let Some(key) = idempotency_key {
            request = request.header("Idempotency-Key", key);
        }
        debug!(path, params = params.len(), "stripe POST");
        self.send(request).await
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, StripeFailure> {
        debug!(path, "stripe GET");
        self.send(self.request(Method::GET, path).query(query)).await
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, StripeFailure> {
        let response = request
            .send()
            .await
            .map_err(|e| StripeFailure::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| StripeFailure::Transport(e.to_string()))?;

        if !status.is_success() {
            error!(status = status.as_u16(), "Stripe API error");
            let body = serde_json::from_str::<StripeErrorResponse>(&body)
                .map(|r| r.error)
                .unwrap_or(StripeErrorBody {
                    error_type: None,
                    message: Some(body),
                    code: None,
                    decline_code: None,
                    payment_intent: None,
                });
            return Err(StripeFailure::Api {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|e| StripeFailure::Decode(e.to_string()))
    }
}

/// Append `metadata[key]=value` pairs under `prefix`
pub(crate) fn push_metadata<'a>(
    params: &mut Vec<(String, String)>,
    prefix: &str,
    metadata: impl IntoIterator<Item = (&'a String, &'a String)>,
) {
    let mut pairs: Vec<_> = metadata.into_iter().collect();
    pairs.sort();
    for (key, value) in pairs {
        params.push((format!("{}[{}]", prefix, key), value.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_error_reason_prefers_decline_code() {
        let body: StripeErrorResponse = serde_json::from_str(
            r#"{"error":{"type":"card_error","code":"card_declined","decline_code":"insufficient_funds","message":"Your card has insufficient funds."}}"#,
        )
        .unwrap();
        assert!(body.error.is_card_error());
        assert_eq!(body.error.reason(), "insufficient_funds");
    }

    #[test]
    fn test_transport_failure_is_network_error() {
        let err: BookingError = StripeFailure::Transport("refused".into()).into();
        assert!(matches!(err, BookingError::Network(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_push_metadata_is_sorted() {
        let metadata = HashMap::from([
            ("b".to_string(), "2".to_string()),
            ("a".to_string(), "1".to_string()),
        ]);
        let mut params = Vec::new();
        push_metadata(&mut params, "metadata", &metadata);
        assert_eq!(
            params,
            vec![
                ("metadata[a]".to_string(), "1".to_string()),
                ("metadata[b]".to_string(), "2".to_string()),
            ]
        );
    }
}
