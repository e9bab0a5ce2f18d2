//! Session state owned by the protocol client.

use serde::{Deserialize, Serialize};

use crate::crypto::{KeyPair, PublicKey, SharedSecret};

/// Where the session is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// No keying material held.
    Disconnected,
    /// A keypair has been generated and the connect request dispatched.
    Connecting,
    /// Handshake completed; signing requests are possible.
    Connected,
    /// Reported while a disconnect request is being dispatched.
    Disconnecting,
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnecting => "disconnecting",
        };
        f.write_str(s)
    }
}

/// Mutable session state.
///
/// Invariant: `connected` implies `peer_address`, `shared_secret` and
/// `keypair` are all present.
#[derive(Clone, Debug, Default)]
pub struct SessionState {
    pub connected: bool,
    pub peer_address: Option<String>,
    pub keypair: Option<KeyPair>,
    pub shared_secret: Option<SharedSecret>,
}

impl SessionState {
    /// State right after a connect request has been dispatched.
    pub fn connecting(keypair: KeyPair) -> Self {
        Self {
            keypair: Some(keypair),
            ..Self::default()
        }
    }

    pub fn status(&self) -> SessionStatus {
        if self.connected {
            SessionStatus::Connected
        } else if self.keypair.is_some() {
            SessionStatus::Connecting
        } else {
            SessionStatus::Disconnected
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.connected
            && self.peer_address.is_none()
            && self.keypair.is_none()
            && self.shared_secret.is_none()
    }

    pub fn public_key(&self) -> Option<PublicKey> {
        self.keypair.as_ref().map(|pair| pair.public)
    }

    /// Check the connected invariant.
    pub fn is_consistent(&self) -> bool {
        !self.connected
            || (self.peer_address.is_some()
                && self.shared_secret.is_some()
                && self.keypair.is_some())
    }

    /// Drop all keying material.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot::with_status(self, self.status())
    }
}

/// Read-only view of the session handed to listeners.
///
/// Carries no secret material.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    pub connected: bool,
    pub peer_address: Option<String>,
    /// Hex-encoded local public key.
    pub local_public_key: Option<String>,
}

impl SessionSnapshot {
    pub(crate) fn with_status(state: &SessionState, status: SessionStatus) -> Self {
        Self {
            status,
            connected: state.connected,
            peer_address: state.peer_address.clone(),
            local_public_key: state.public_key().map(|key| key.to_hex()),
        }
    }

    pub fn disconnected() -> Self {
        Self::with_status(&SessionState::default(), SessionStatus::Disconnected)
    }
}
