//! Settlement backend confirmation client.
//!
//! After a transfer is final on chain the backend is told about it so it can
//! verify the transaction and pay out the fiat side:
//!
//! ```text
//! POST <backend>/api/payments/initiate
//! {"transactionHash": "...", "userAddress": "...", "paymentType": "bank", "details": {...}}
//! ```
//!
//! Failures carry a JSON body with an `error` field.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
#[cfg(feature = "http-client")]
use std::time::Duration;

use crate::config::BackendConfig;
use crate::request::{PaymentCategory, PaymentDetails};

/// Path of the confirmation endpoint.
pub const INITIATE_PATH: &str = "/api/payments/initiate";

/// Backend failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    /// The request never got a response.
    #[error("{0}")]
    Network(String),
    /// 5xx response.
    #[error("{message}")]
    Server { status: u16, message: String },
    /// Any other non-success response.
    #[error("{message}")]
    Rejected { status: u16, message: String },
    #[error("unexpected backend response: {0}")]
    Decode(String),
    #[error("backend HTTP client not compiled - enable the 'http-client' feature")]
    Unavailable,
}

impl BackendError {
    /// Network errors and 5xx responses are worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Server { .. })
    }

    /// The backend's own error text when it sent one.
    pub fn message(&self) -> String {
        match self {
            Self::Server { message, .. } | Self::Rejected { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }

    /// Map an error status and body.
    pub fn from_status(status: u16, body: &str) -> Self {
        #[derive(Deserialize)]
        struct ErrorBody {
            error: Option<String>,
            message: Option<String>,
        }

        let message = serde_json::from_str::<ErrorBody>(body)
            .ok()
            .and_then(|b| b.error.or(b.message))
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| {
                if body.trim().is_empty() {
                    format!("Request failed with status code {}", status)
                } else {
                    body.trim().to_string()
                }
            });

        if (500..600).contains(&status) {
            Self::Server { status, message }
        } else {
            Self::Rejected { status, message }
        }
    }
}

/// Body of the confirmation request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmationRequest {
    pub transaction_hash: String,
    pub user_address: String,
    pub payment_type: PaymentCategory,
    pub details: PaymentDetails,
}

/// Confirms a final transaction with the settlement backend.
#[async_trait]
pub trait ConfirmationBackend: Send + Sync {
    async fn confirm(&self, request: &ConfirmationRequest)
        -> Result<serde_json::Value, BackendError>;
}

/// HTTP implementation of [`ConfirmationBackend`].
pub struct HttpConfirmationBackend {
    config: BackendConfig,
    #[cfg(feature = "http-client")]
    client: reqwest::Client,
}

impl HttpConfirmationBackend {
    #[cfg(feature = "http-client")]
    pub fn new(config: BackendConfig) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| BackendError::Network(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { config, client })
    }

    #[cfg(not(feature = "http-client"))]
    pub fn new(config: BackendConfig) -> Result<Self, BackendError> {
        Ok(Self { config })
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    #[cfg(any(feature = "http-client", test))]
    fn endpoint(&self) -> String {
        format!("{}{}", self.config.url.trim_end_matches('/'), INITIATE_PATH)
    }
}

#[async_trait]
impl ConfirmationBackend for HttpConfirmationBackend {
    #[cfg(feature = "http-client")]
    async fn confirm(
        &self,
        request: &ConfirmationRequest,
    ) -> Result<serde_json::Value, BackendError> {
        let response = self
            .client
            .post(self.endpoint())
            .json(request)
            .send()
            .await
            .map_err(|e| BackendError::Network(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| BackendError::Network(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(BackendError::from_status(status.as_u16(), &body));
        }
        if body.trim().is_empty() {
            return Ok(serde_json::Value::Null);
        }
        serde_json::from_str(&body).map_err(|e| BackendError::Decode(e.to_string()))
    }

    #[cfg(not(feature = "http-client"))]
    async fn confirm(
        &self,
        _request: &ConfirmationRequest,
    ) -> Result<serde_json::Value, BackendError> {
        Err(BackendError::Unavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_body_extraction() {
        let err = BackendError::from_status(400, r#"{"error":"Transaction not found on chain"}"#);
        assert_eq!(err.message(), "Transaction not found on chain");
        assert!(!err.is_retryable());

        let err = BackendError::from_status(503, "");
        assert!(err.is_retryable());
        assert_eq!(err.message(), "Request failed with status code 503");

        let err = BackendError::from_status(502, "Bad Gateway");
        assert_eq!(err.to_string(), "Bad Gateway");
    }

    #[test]
    fn test_network_errors_retry() {
        assert!(BackendError::Network("connection refused".into()).is_retryable());
        assert!(!BackendError::Decode("eof".into()).is_retryable());
    }

    #[test]
    fn test_request_body_shape() {
        let request = ConfirmationRequest {
            transaction_hash: "0xabc".into(),
            user_address: "0x1".into(),
            payment_type: PaymentCategory::Airtime,
            details: PaymentDetails::default(),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["transactionHash"], "0xabc");
        assert_eq!(json["userAddress"], "0x1");
        assert_eq!(json["paymentType"], "airtime");
    }

    #[test]
    fn test_endpoint() {
        let backend =
            HttpConfirmationBackend::new(BackendConfig::new("http://api.example/")).unwrap();
        assert_eq!(backend.endpoint(), "http://api.example/api/payments/initiate");
    }
}
