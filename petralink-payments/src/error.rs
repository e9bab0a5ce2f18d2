//! Error types for payment execution.

use std::time::Duration;

use petralink_lib::PetraLinkError;

use crate::backend::BackendError;
use crate::chain::ChainError;

/// Result type for payment operations.
pub type Result<T> = std::result::Result<T, PaymentError>;

#[derive(thiserror::Error, Debug)]
pub enum PaymentError {
    /// Neither an in-page wallet nor a connected deep-link session is available.
    #[error("No valid wallet connection method available")]
    NoSigningMethod,

    /// The deep-link response did not arrive in time.
    #[error("Transaction signing timeout")]
    SigningTimeout(Duration),

    /// The user declined the transaction in the wallet.
    #[error("Transaction rejected by user")]
    SigningRejected,

    /// The wallet answered but the answer was unusable.
    #[error("Transaction signing failed: {0}")]
    SigningFailed(String),

    /// The transaction executed but did not succeed.
    #[error("Transaction failed on chain: {vm_status}")]
    ChainFinalityFailure { hash: String, vm_status: String },

    /// Finality could not be determined.
    #[error("Could not confirm transaction: {0}")]
    Chain(#[from] ChainError),

    /// The backend did not confirm the payment within the retry budget.
    #[error("Payment verification failed: {0}")]
    BackendConfirmationFailure(BackendError),

    #[error("Invalid payment request: {0}")]
    InvalidRequest(String),

    /// Another payment is still being executed.
    #[error("A payment is already in progress")]
    PaymentInProgress,

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Session(#[from] PetraLinkError),
}

impl PaymentError {
    /// Short message handed to the `on_error` callback.
    pub fn user_message(&self) -> String {
        match self {
            Self::Session(PetraLinkError::NotConnected) => "Wallet not connected".to_string(),
            Self::Session(e) => e.message(),
            Self::BackendConfirmationFailure(e) => {
                format!("Payment verification failed: {}", e.message())
            }
            other => other.to_string(),
        }
    }

    /// Whether the error happened before anything was submitted on chain.
    pub fn is_pre_submission(&self) -> bool {
        matches!(
            self,
            Self::NoSigningMethod
                | Self::SigningTimeout(_)
                | Self::SigningRejected
                | Self::SigningFailed(_)
                | Self::InvalidRequest(_)
                | Self::PaymentInProgress
                | Self::Configuration(_)
                | Self::Session(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_failure_message() {
        let err = PaymentError::BackendConfirmationFailure(BackendError::Rejected {
            status: 400,
            message: "Transaction not found".into(),
        });
        assert_eq!(
            err.user_message(),
            "Payment verification failed: Transaction not found"
        );
        assert!(!err.is_pre_submission());
    }

    #[test]
    fn test_timeout_message() {
        let err = PaymentError::SigningTimeout(Duration::from_secs(300));
        assert_eq!(err.to_string(), "Transaction signing timeout");
        assert!(err.is_pre_submission());
    }

    #[test]
    fn test_session_errors_pass_through() {
        let err: PaymentError = PetraLinkError::NotConnected.into();
        assert_eq!(err.user_message(), "Wallet not connected");
    }
}
