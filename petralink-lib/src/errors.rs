//! Error types for wallet-session operations.
//!
//! Every failure of the protocol client maps onto [`PetraLinkError`]. Errors
//! are split into two groups: precondition violations that leave the session
//! untouched (`UnsupportedPlatform`, `NotConnected`, `RequestAlreadyInFlight`)
//! and handshake failures that have already cleared all keying material
//! (`HandshakeRejected`, `HandshakeDecode`). Both are recoverable from the
//! caller's point of view.

use std::fmt;

use crate::codec::CodecError;
use crate::crypto::CryptoError;
use crate::transport::ResponsePath;

/// Error codes for FFI and JS integration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum PetraLinkErrorCode {
    /// Deep linking attempted outside a mobile runtime
    UnsupportedPlatform = 1000,
    /// Wallet rejected the connection
    HandshakeRejected = 2000,
    /// Connection response could not be decoded
    HandshakeDecode = 2001,
    /// Operation requires an established session
    NotConnected = 3000,
    /// A request for the same response path is outstanding
    RequestAlreadyInFlight = 3001,
    /// Encryption/decryption failure
    Crypto = 4000,
    /// Encoding/decoding failure
    Codec = 4001,
    /// Serialization error
    Serialization = 4002,
    /// Invalid configuration value
    Configuration = 5000,
    /// Storage error
    Storage = 7000,
    /// Internal/unexpected error
    Internal = 9999,
}

/// Error type for the wallet-session client.
#[derive(Debug)]
pub enum PetraLinkError {
    /// Deep links are only routed to the wallet app on mobile devices.
    UnsupportedPlatform,

    /// The wallet user rejected the connection request.
    HandshakeRejected,

    /// The connection response was malformed or could not be completed.
    HandshakeDecode(String),

    /// A signing request was made without an established session.
    NotConnected,

    /// A deep-link request expecting a response on this path is outstanding.
    RequestAlreadyInFlight {
        /// Response path the outstanding request will return on
        path: ResponsePath,
    },

    /// Session encryption failed.
    Crypto(String),

    /// A value could not be encoded or decoded.
    Codec {
        /// Field or parameter name
        field: String,
        /// Reason for failure
        reason: String,
    },

    /// Serialization/deserialization error.
    Serialization(String),

    /// Invalid configuration.
    Configuration(String),

    /// Persistent storage failed.
    Storage(String),

    /// Internal/unexpected error.
    Internal(String),
}

impl PetraLinkError {
    /// Get the error code for FFI/JS integration.
    pub fn code(&self) -> PetraLinkErrorCode {
        match self {
            Self::UnsupportedPlatform => PetraLinkErrorCode::UnsupportedPlatform,
            Self::HandshakeRejected => PetraLinkErrorCode::HandshakeRejected,
            Self::HandshakeDecode(_) => PetraLinkErrorCode::HandshakeDecode,
            Self::NotConnected => PetraLinkErrorCode::NotConnected,
            Self::RequestAlreadyInFlight { .. } => PetraLinkErrorCode::RequestAlreadyInFlight,
            Self::Crypto(_) => PetraLinkErrorCode::Crypto,
            Self::Codec { .. } => PetraLinkErrorCode::Codec,
            Self::Serialization(_) => PetraLinkErrorCode::Serialization,
            Self::Configuration(_) => PetraLinkErrorCode::Configuration,
            Self::Storage(_) => PetraLinkErrorCode::Storage,
            Self::Internal(_) => PetraLinkErrorCode::Internal,
        }
    }

    /// Get the error message as an owned String (useful for FFI).
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// Returns true if the user can simply try again (e.g. reconnect).
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedPlatform
                | Self::HandshakeRejected
                | Self::HandshakeDecode(_)
                | Self::NotConnected
                | Self::RequestAlreadyInFlight { .. }
                | Self::Storage(_)
        )
    }

    /// Returns true if this error ended a connection attempt.
    pub fn is_handshake_failure(&self) -> bool {
        matches!(self, Self::HandshakeRejected | Self::HandshakeDecode(_))
    }

    /// Create a codec error for a named field.
    pub fn codec(field: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::Codec {
            field: field.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a handshake decode error.
    pub fn handshake(reason: impl fmt::Display) -> Self {
        Self::HandshakeDecode(reason.to_string())
    }
}

impl fmt::Display for PetraLinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedPlatform => {
                write!(f, "deep linking is only available on mobile devices")
            }
            Self::HandshakeRejected => write!(f, "connection rejected by user"),
            Self::HandshakeDecode(reason) => {
                write!(f, "failed to establish secure connection: {}", reason)
            }
            Self::NotConnected => write!(f, "not connected to wallet"),
            Self::RequestAlreadyInFlight { path } => {
                write!(f, "a wallet request is already pending on {}", path)
            }
            Self::Crypto(msg) => write!(f, "crypto error: {}", msg),
            Self::Codec { field, reason } => write!(f, "invalid {}: {}", field, reason),
            Self::Serialization(msg) => write!(f, "serialization error: {}", msg),
            Self::Configuration(msg) => write!(f, "configuration error: {}", msg),
            Self::Storage(msg) => write!(f, "storage error: {}", msg),
            Self::Internal(msg) => write!(f, "internal error: {}", msg),
        }
    }
}

impl std::error::Error for PetraLinkError {}

impl From<serde_json::Error> for PetraLinkError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<CryptoError> for PetraLinkError {
    fn from(err: CryptoError) -> Self {
        Self::Crypto(err.to_string())
    }
}

impl From<CodecError> for PetraLinkError {
    fn from(err: CodecError) -> Self {
        Self::Codec {
            field: "value".to_string(),
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = PetraLinkError::RequestAlreadyInFlight {
            path: ResponsePath::Response,
        };
        assert_eq!(err.code(), PetraLinkErrorCode::RequestAlreadyInFlight);
        assert!(err.is_recoverable());
        assert!(err.to_string().contains("/api/v1/response"));
    }

    #[test]
    fn test_handshake_failures() {
        assert!(PetraLinkError::HandshakeRejected.is_handshake_failure());
        assert!(PetraLinkError::handshake("missing data").is_handshake_failure());
        assert!(!PetraLinkError::NotConnected.is_handshake_failure());
        assert_eq!(
            PetraLinkError::HandshakeRejected.to_string(),
            "connection rejected by user"
        );
    }

    #[test]
    fn test_helper_constructors() {
        let err = PetraLinkError::codec("nonce", "wrong length");
        assert_eq!(err.code(), PetraLinkErrorCode::Codec);
        assert_eq!(err.to_string(), "invalid nonce: wrong length");
        assert!(!PetraLinkError::Internal("x".into()).is_recoverable());
    }
}
