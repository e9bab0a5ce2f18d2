//! Binary ⇄ text encoding helpers.
//!
//! The wallet protocol moves three kinds of text across the URL boundary:
//!
//! - **base64** (standard alphabet, padded) for the JSON envelope carried in the
//!   `data` query parameter, and for key material in the session store;
//! - **hex** for public keys, ciphertext, and nonces inside the envelope;
//! - **JSON** as the canonical serialization of every envelope and payload.
//!
//! The wallet prefixes its hex public key with `0x`; decoding accepts both forms.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{de::DeserializeOwned, Serialize};

/// Codec error types.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("invalid base64: {0}")]
    Base64(String),
    #[error("invalid hex: {0}")]
    Hex(String),
    #[error("invalid JSON: {0}")]
    Json(String),
    #[error("invalid length: expected {expected} bytes, got {actual}")]
    Length { expected: usize, actual: usize },
}

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Encode raw bytes as standard padded base64.
pub fn to_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode standard padded base64.
pub fn from_base64(text: &str) -> CodecResult<Vec<u8>> {
    STANDARD
        .decode(text.trim())
        .map_err(|e| CodecError::Base64(e.to_string()))
}

/// Encode raw bytes as lower-case hex without a prefix.
pub fn to_hex(bytes: &[u8]) -> String {
    hex::encode(bytes)
}

/// Decode hex, accepting an optional `0x`/`0X` prefix.
pub fn from_hex(text: &str) -> CodecResult<Vec<u8>> {
    let trimmed = text.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    hex::decode(digits).map_err(|e| CodecError::Hex(e.to_string()))
}

/// Convert a decoded byte vector into a fixed-size array.
pub fn to_array<const N: usize>(bytes: Vec<u8>) -> CodecResult<[u8; N]> {
    let actual = bytes.len();
    bytes
        .try_into()
        .map_err(|_| CodecError::Length { expected: N, actual })
}

/// Decode a 32-byte key from hex.
pub fn decode_key_hex(text: &str) -> CodecResult<[u8; 32]> {
    to_array(from_hex(text)?)
}

/// Decode a 32-byte key from base64.
pub fn decode_key_base64(text: &str) -> CodecResult<[u8; 32]> {
    to_array(from_base64(text)?)
}

/// Serialize a value to its canonical JSON bytes.
pub fn to_json_bytes<T: Serialize + ?Sized>(value: &T) -> CodecResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| CodecError::Json(e.to_string()))
}

/// Encode a value as base64(JSON), the form used for the `data` URL parameter.
pub fn encode_envelope<T: Serialize + ?Sized>(value: &T) -> CodecResult<String> {
    Ok(to_base64(&to_json_bytes(value)?))
}

/// Decode a base64(JSON) envelope.
pub fn decode_envelope<T: DeserializeOwned>(text: &str) -> CodecResult<T> {
    let bytes = from_base64(text)?;
    serde_json::from_slice(&bytes).map_err(|e| CodecError::Json(e.to_string()))
}
