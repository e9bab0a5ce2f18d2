//! A scripted stand-in for the Petra wallet app.
//!
//! Helpers panic on malformed input: they are meant for tests only.

use serde_json::Value;
use url::Url;

use crate::codec;
use crate::crypto::{self, KeyPair, Nonce, PublicKey, SharedSecret};
use crate::transport::{ConnectApproval, DeepLinkOperation, RequestEnvelope, ResponsePath};

/// A parsed outbound deep link.
#[derive(Clone, Debug)]
pub struct WalletRequest {
    pub operation: DeepLinkOperation,
    pub envelope: RequestEnvelope,
}

impl WalletRequest {
    /// Parse a `petra://api/v1/<operation>?data=...` URL.
    pub fn parse(url: &Url) -> Self {
        let segment = url
            .path_segments()
            .and_then(|s| s.last())
            .expect("request URL has a path");
        let operation = DeepLinkOperation::from_path_segment(segment)
            .unwrap_or_else(|| panic!("unknown operation {}", segment));
        let data = url
            .query_pairs()
            .find(|(k, _)| k == "data")
            .map(|(_, v)| v.into_owned())
            .expect("request URL has a data parameter");
        let envelope = codec::decode_envelope(&data).expect("data is base64 JSON");
        Self {
            operation,
            envelope,
        }
    }

    pub fn dapp_public_key(&self) -> PublicKey {
        PublicKey::from_bytes(
            codec::decode_key_hex(&self.envelope.dapp_encryption_public_key)
                .expect("dappEncryptionPublicKey is a hex key"),
        )
    }

    pub fn redirect(&self) -> Url {
        Url::parse(&self.envelope.redirect_link).expect("redirectLink is absolute")
    }
}

/// Plays the wallet side of the protocol.
pub struct MockWallet {
    keypair: KeyPair,
    address: String,
}

impl Default for MockWallet {
    fn default() -> Self {
        Self::new()
    }
}

impl MockWallet {
    pub fn new() -> Self {
        Self::with_address("0x8f2a6a2b9d4b3c1e0f7a6d5c4b3a29180716253443526170819a0b1c2d3e4f50")
    }

    pub fn with_address(address: impl Into<String>) -> Self {
        Self {
            keypair: crypto::generate_keypair(),
            address: address.into(),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn public_key(&self) -> PublicKey {
        self.keypair.public
    }

    /// Secret the wallet derives for a given dapp key.
    pub fn shared_secret(&self, dapp_public: &PublicKey) -> SharedSecret {
        crypto::derive_shared_secret(dapp_public, &self.keypair.secret)
            .expect("dapp key is contributory")
    }

    /// Approve a connect request URL.
    pub fn approve_connect(&self, request: &Url) -> Url {
        let request = WalletRequest::parse(request);
        assert_eq!(request.operation, DeepLinkOperation::Connect);
        let data = self.connect_approval_data();
        respond(request.redirect(), "approved", Some(&data))
    }

    /// Build an approved connect response for `origin` without a request in
    /// hand (e.g. a response replayed after a reload).
    pub fn approve_connect_url(&self, origin: &str) -> Url {
        let redirect = Url::parse(origin)
            .and_then(|o| o.join(ResponsePath::Connect.as_str()))
            .expect("origin is a base URL");
        respond(redirect, "approved", Some(&self.connect_approval_data()))
    }

    fn connect_approval_data(&self) -> String {
        codec::encode_envelope(&ConnectApproval {
            petra_public_encrypted_key: format!("0x{}", self.keypair.public.to_hex()),
            address: self.address.clone(),
        })
        .expect("approval serializes")
    }

    /// Reject any request.
    pub fn reject(&self, request: &Url) -> Url {
        respond(WalletRequest::parse(request).redirect(), "rejected", None)
    }

    /// Approve with caller-supplied raw `data` (possibly malformed).
    pub fn approve_with_raw_data(&self, request: &Url, data: &str) -> Url {
        respond(WalletRequest::parse(request).redirect(), "approved", Some(data))
    }

    /// Decrypt the payload of a signing request.
    pub fn decrypt_payload(&self, request: &Url) -> Value {
        let request = WalletRequest::parse(request);
        let shared = self.shared_secret(&request.dapp_public_key());
        let payload = codec::from_hex(request.envelope.payload.as_deref().expect("payload"))
            .expect("payload is hex");
        let nonce_hex = request.envelope.nonce.as_deref().expect("nonce");
        let nonce = codec::to_array(codec::from_hex(nonce_hex).expect("nonce is hex"))
            .map(Nonce::from_bytes)
            .expect("nonce is 24 bytes");
        let plaintext = crypto::decrypt(&payload, &nonce, &shared).expect("payload decrypts");
        serde_json::from_slice(&plaintext).expect("payload is JSON")
    }

    /// Approve a signing request, returning `data` to the dapp.
    pub fn approve_sign(&self, request: &Url, data: &Value) -> Url {
        let parsed = WalletRequest::parse(request);
        assert!(matches!(
            parsed.operation,
            DeepLinkOperation::SignAndSubmit | DeepLinkOperation::SignMessage
        ));
        // Decrypting proves the request was encrypted for this wallet.
        let _ = self.decrypt_payload(request);
        let data = codec::encode_envelope(data).expect("data serializes");
        respond(parsed.redirect(), "approved", Some(&data))
    }

    /// Approve a `signAndSubmit` request with a transaction hash.
    pub fn approve_transaction(&self, request: &Url, hash: &str) -> Url {
        self.approve_sign(request, &serde_json::json!({ "hash": hash }))
    }

    /// Acknowledge a disconnect request.
    pub fn acknowledge_disconnect(&self, request: &Url) -> Url {
        let parsed = WalletRequest::parse(request);
        assert_eq!(parsed.operation, DeepLinkOperation::Disconnect);
        respond(parsed.redirect(), "approved", None)
    }
}

fn respond(mut redirect: Url, status: &str, data: Option<&str>) -> Url {
    {
        let mut query = redirect.query_pairs_mut();
        query.clear().append_pair("response", status);
        if let Some(data) = data {
            query.append_pair("data", data);
        }
    }
    redirect
}
