//! Deep-link transport.
//!
//! Outbound requests are URLs on the wallet's scheme:
//!
//! ```text
//! petra://api/v1/<operation>?data=<base64 JSON envelope>
//! ```
//!
//! Inbound responses arrive as navigations to one of three fixed same-origin
//! paths, carrying `response=approved|rejected` and `data=<base64 JSON>`:
//!
//! ```text
//! /api/v1/connect     connect handshake result
//! /api/v1/response    signAndSubmit / signMessage result
//! /api/v1/disconnect  disconnect acknowledgement
//! ```
//!
//! There is no request identifier on the wire. A response is correlated with
//! its request only by the redirect path the request named.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::codec;
use crate::config::DeepLinkConfig;
use crate::crypto::{Nonce, PublicKey};
use crate::{PetraLinkError, Result};

/// Operations the wallet accepts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DeepLinkOperation {
    Connect,
    Disconnect,
    SignAndSubmit,
    SignMessage,
}

impl DeepLinkOperation {
    /// Path segment appended to the wallet link base.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::Disconnect => "disconnect",
            Self::SignAndSubmit => "signAndSubmit",
            Self::SignMessage => "signMessage",
        }
    }

    /// Path the wallet is told to redirect to once it is done.
    pub fn response_path(&self) -> ResponsePath {
        match self {
            Self::Connect => ResponsePath::Connect,
            Self::Disconnect => ResponsePath::Disconnect,
            Self::SignAndSubmit | Self::SignMessage => ResponsePath::Response,
        }
    }

    pub fn from_path_segment(segment: &str) -> Option<Self> {
        match segment {
            "connect" => Some(Self::Connect),
            "disconnect" => Some(Self::Disconnect),
            "signAndSubmit" => Some(Self::SignAndSubmit),
            "signMessage" => Some(Self::SignMessage),
            _ => None,
        }
    }
}

impl std::fmt::Display for DeepLinkOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The three fixed redirect targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResponsePath {
    Connect,
    Response,
    Disconnect,
}

impl ResponsePath {
    pub const ALL: [ResponsePath; 3] = [Self::Connect, Self::Response, Self::Disconnect];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connect => "/api/v1/connect",
            Self::Response => "/api/v1/response",
            Self::Disconnect => "/api/v1/disconnect",
        }
    }

    /// Match a URL path against the fixed response paths.
    pub fn from_path(path: &str) -> Option<Self> {
        let path = path.trim_end_matches('/');
        Self::ALL.into_iter().find(|p| p.as_str() == path)
    }
}

impl std::fmt::Display for ResponsePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Application identity shown to the user by the wallet.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppInfo {
    pub domain: String,
    pub name: String,
}

/// JSON envelope carried in the `data` parameter of a request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestEnvelope {
    pub app_info: AppInfo,
    pub redirect_link: String,
    /// Hex-encoded session public key.
    pub dapp_encryption_public_key: String,
    /// Hex-encoded ciphertext (signing operations only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
    /// Hex-encoded nonce (signing operations only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
}

/// Data of an approved connect response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectApproval {
    /// Wallet's public encryption key, hex with optional `0x` prefix.
    pub petra_public_encrypted_key: String,
    /// Wallet account address.
    pub address: String,
}

/// Value of the `response` query parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResponseStatus {
    Approved,
    Rejected,
}

impl ResponseStatus {
    /// Anything other than `approved` (including a missing parameter) counts
    /// as a rejection.
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some("approved") => Self::Approved,
            _ => Self::Rejected,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

/// A navigation that landed on one of the response paths.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundResponse {
    pub path: ResponsePath,
    pub status: ResponseStatus,
    /// Raw base64 JSON from the `data` parameter.
    pub data: Option<String>,
}

impl InboundResponse {
    /// Inspect a URL; `None` when its path is not a response path.
    pub fn from_url(url: &Url) -> Option<Self> {
        let path = ResponsePath::from_path(url.path())?;
        let mut status = None;
        let mut data = None;
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "response" => status = Some(value.into_owned()),
                "data" => data = Some(value.into_owned()).filter(|v| !v.is_empty()),
                _ => {}
            }
        }
        Some(Self {
            path,
            status: ResponseStatus::parse(status.as_deref()),
            data,
        })
    }
}

/// Host capabilities the transport depends on.
///
/// In a browser this is `window.location`; in tests it records URLs.
pub trait Navigator: Send + Sync {
    /// Whether the runtime is a mobile device that can route to the wallet app.
    fn is_mobile(&self) -> bool;

    /// Hand the URL to the OS. One-way: delivery is never observable.
    fn navigate(&self, url: &Url);

    /// Drop the response parameters from the current location once a response
    /// has been handled, so a reload does not replay it.
    fn consume_response_location(&self) {}
}

/// User-agent test for mobile browsers.
pub fn is_mobile_user_agent(user_agent: &str) -> bool {
    const MARKERS: [&str; 8] = [
        "android",
        "webos",
        "iphone",
        "ipad",
        "ipod",
        "blackberry",
        "iemobile",
        "opera mini",
    ];
    let ua = user_agent.to_lowercase();
    MARKERS.iter().any(|m| ua.contains(m))
}

/// Builds request URLs and recognises response URLs.
#[derive(Clone, Debug)]
pub struct DeepLinkTransport {
    wallet_base: Url,
    origin: Url,
    app_info: AppInfo,
}

impl DeepLinkTransport {
    pub fn new(config: &DeepLinkConfig) -> Result<Self> {
        let wallet_base = config.wallet_base_url()?;
        let origin = config.origin_url()?;
        let app_info = AppInfo {
            domain: origin.origin().ascii_serialization(),
            name: config.app_name.clone(),
        };
        Ok(Self {
            wallet_base,
            origin,
            app_info,
        })
    }

    pub fn app_info(&self) -> &AppInfo {
        &self.app_info
    }

    /// Absolute redirect link for a response path.
    pub fn redirect_link(&self, path: ResponsePath) -> String {
        let mut url = self.origin.clone();
        url.set_path(path.as_str());
        url.set_query(None);
        url.set_fragment(None);
        url.to_string()
    }

    /// Envelope for `connect` / `disconnect`.
    pub fn session_envelope(
        &self,
        operation: DeepLinkOperation,
        public_key: &PublicKey,
    ) -> RequestEnvelope {
        RequestEnvelope {
            app_info: self.app_info.clone(),
            redirect_link: self.redirect_link(operation.response_path()),
            dapp_encryption_public_key: public_key.to_hex(),
            payload: None,
            nonce: None,
        }
    }

    /// Envelope for `signAndSubmit` / `signMessage`.
    pub fn signing_envelope(
        &self,
        operation: DeepLinkOperation,
        public_key: &PublicKey,
        ciphertext: &[u8],
        nonce: &Nonce,
    ) -> RequestEnvelope {
        RequestEnvelope {
            payload: Some(codec::to_hex(ciphertext)),
            nonce: Some(nonce.to_hex()),
            ..self.session_envelope(operation, public_key)
        }
    }

    /// Encode an envelope onto the wallet URL for `operation`.
    pub fn build_request(
        &self,
        operation: DeepLinkOperation,
        envelope: &RequestEnvelope,
    ) -> Result<Url> {
        let data = codec::encode_envelope(envelope)
            .map_err(|e| PetraLinkError::codec("request envelope", e))?;

        let mut url = self.wallet_base.clone();
        let path = format!("{}/{}", url.path().trim_end_matches('/'), operation.as_str());
        url.set_path(&path);
        url.query_pairs_mut().clear().append_pair("data", &data);
        Ok(url)
    }

    /// Recognise an inbound response URL.
    pub fn parse_response(&self, url: &Url) -> Option<InboundResponse> {
        InboundResponse::from_url(url)
    }
}
