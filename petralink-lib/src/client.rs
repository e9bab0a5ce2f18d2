//! Protocol client: the session state machine.
//!
//! ```text
//! Disconnected ──connect()──▶ Connecting ──approved──▶ Connected
//!      ▲                          │                       │
//!      └──── rejected / decode ───┘        disconnect() ──┘
//! ```
//!
//! Requests leave through the [`Navigator`]; responses come back as
//! navigations that the host routes into [`PetraClient::handle_navigation`].
//! Because the wire carries no request id, at most one request may be
//! outstanding per response path.
//!
//! # Thread Safety
//!
//! The client is `Send + Sync` and meant to be shared behind an `Arc`. State
//! lives behind a `Mutex`; listeners are always invoked after the lock has been
//! released, so they may call back into the client.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use tokio::sync::oneshot;
use url::Url;

use crate::codec;
use crate::config::DeepLinkConfig;
use crate::crypto::{self, KeyPair, Nonce, PublicKey};
use crate::state::{SessionSnapshot, SessionState, SessionStatus};
use crate::store::{KeyValueStore, SessionStore};
use crate::transport::{
    ConnectApproval, DeepLinkOperation, DeepLinkTransport, InboundResponse, Navigator,
    ResponsePath, ResponseStatus,
};
use crate::{PetraLinkError, Result};

/// Error type listeners may return; it is logged and otherwise ignored.
pub type ListenerError = Box<dyn std::error::Error + Send + Sync>;

/// Result returned by listeners.
pub type ListenerResult = std::result::Result<(), ListenerError>;

type StateListener = Arc<dyn Fn(&SessionSnapshot) -> ListenerResult + Send + Sync>;
type SignListener = Arc<dyn Fn(&SignResponse) -> ListenerResult + Send + Sync>;

/// Outcome of a `signAndSubmit` / `signMessage` request.
#[derive(Clone, Debug, PartialEq)]
pub enum SignResponse {
    /// The wallet approved; carries the decoded response data (for
    /// `signAndSubmit` this includes the transaction `hash`).
    Approved(serde_json::Value),
    /// The user declined in the wallet.
    Rejected,
    /// The response could not be decoded.
    Failed(String),
}

impl SignResponse {
    /// Transaction hash of an approved `signAndSubmit`.
    pub fn transaction_hash(&self) -> Option<&str> {
        match self {
            Self::Approved(data) => data.get("hash").and_then(|h| h.as_str()),
            _ => None,
        }
    }
}

/// What a routed navigation did.
#[derive(Clone, Debug, PartialEq)]
pub enum NavigationOutcome {
    /// Not a response path.
    Ignored,
    /// Handshake completed with the given wallet address.
    Connected { address: String },
    /// A signing response was published.
    Signed(SignResponse),
    /// The wallet acknowledged a disconnect.
    Disconnected,
}

/// Handle returned by listener registration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Subscription(u64);

/// One-shot receiver for the next signing response.
///
/// Register it *before* dispatching the request it is waiting for.
#[derive(Debug)]
pub struct SignResponseWaiter {
    rx: oneshot::Receiver<SignResponse>,
}

impl SignResponseWaiter {
    /// Wait for the response. `None` if the session was torn down first.
    pub async fn recv(self) -> Option<SignResponse> {
        self.rx.await.ok()
    }
}

#[derive(Default)]
struct Inner {
    state: SessionState,
    pending: HashSet<ResponsePath>,
    waiters: Vec<oneshot::Sender<SignResponse>>,
}

#[derive(Default)]
struct Listeners {
    next_id: u64,
    state: Vec<(u64, StateListener)>,
    sign: Vec<(u64, SignListener)>,
}

impl Listeners {
    fn next(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

fn lock_error(context: &str) -> PetraLinkError {
    PetraLinkError::Internal(format!("client lock poisoned during {}", context))
}

/// Encrypted deep-link session with the Petra wallet.
pub struct PetraClient {
    transport: DeepLinkTransport,
    store: SessionStore<Arc<dyn KeyValueStore>>,
    navigator: Arc<dyn Navigator>,
    inner: Mutex<Inner>,
    listeners: Mutex<Listeners>,
}

impl PetraClient {
    /// Create a client, restoring any persisted session synchronously.
    pub fn new(
        config: &DeepLinkConfig,
        store: Arc<dyn KeyValueStore>,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self> {
        let transport = DeepLinkTransport::new(config)?;
        let store = SessionStore::new(store);
        let state = store.load().unwrap_or_default();
        if !state.is_empty() {
            tracing::info!("Restored wallet session ({})", state.status());
        }

        Ok(Self {
            transport,
            store,
            navigator,
            inner: Mutex::new(Inner {
                state,
                ..Inner::default()
            }),
            listeners: Mutex::new(Listeners::default()),
        })
    }

    pub fn transport(&self) -> &DeepLinkTransport {
        &self.transport
    }

    fn inner(&self, context: &str) -> Result<MutexGuard<'_, Inner>> {
        self.inner.lock().map_err(|_| lock_error(context))
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner
            .lock()
            .map(|inner| inner.state.snapshot())
            .unwrap_or_else(|_| SessionSnapshot::disconnected())
    }

    pub fn status(&self) -> SessionStatus {
        self.snapshot().status
    }

    pub fn is_connected(&self) -> bool {
        self.inner
            .lock()
            .map(|inner| inner.state.connected)
            .unwrap_or(false)
    }

    pub fn peer_address(&self) -> Option<String> {
        self.inner
            .lock()
            .ok()
            .and_then(|inner| inner.state.peer_address.clone())
    }

    pub fn is_mobile(&self) -> bool {
        self.navigator.is_mobile()
    }

    /// Whether a request awaiting a response on `path` is outstanding.
    pub fn is_pending(&self, path: ResponsePath) -> bool {
        self.inner
            .lock()
            .map(|inner| inner.pending.contains(&path))
            .unwrap_or(false)
    }

    // ------------------------------------------------------------------
    // Listeners
    // ------------------------------------------------------------------

    /// Register a state listener. Listeners run in registration order.
    pub fn on_state_change<F>(&self, listener: F) -> Result<Subscription>
    where
        F: Fn(&SessionSnapshot) -> ListenerResult + Send + Sync + 'static,
    {
        let mut listeners = self
            .listeners
            .lock()
            .map_err(|_| lock_error("on_state_change"))?;
        let id = listeners.next();
        listeners.state.push((id, Arc::new(listener)));
        Ok(Subscription(id))
    }

    /// Register a listener for every signing response.
    pub fn on_sign_response<F>(&self, listener: F) -> Result<Subscription>
    where
        F: Fn(&SignResponse) -> ListenerResult + Send + Sync + 'static,
    {
        let mut listeners = self
            .listeners
            .lock()
            .map_err(|_| lock_error("on_sign_response"))?;
        let id = listeners.next();
        listeners.sign.push((id, Arc::new(listener)));
        Ok(Subscription(id))
    }

    /// Remove a listener. Returns false if it was not registered.
    pub fn unsubscribe(&self, subscription: Subscription) -> bool {
        let Ok(mut listeners) = self.listeners.lock() else {
            return false;
        };
        let before = listeners.state.len() + listeners.sign.len();
        listeners.state.retain(|(id, _)| *id != subscription.0);
        listeners.sign.retain(|(id, _)| *id != subscription.0);
        before != listeners.state.len() + listeners.sign.len()
    }

    /// Register a one-shot waiter for the next signing response.
    pub fn sign_response_waiter(&self) -> Result<SignResponseWaiter> {
        let (tx, rx) = oneshot::channel();
        let mut inner = self.inner("sign_response_waiter")?;
        inner.waiters.retain(|w| !w.is_closed());
        inner.waiters.push(tx);
        Ok(SignResponseWaiter { rx })
    }

    fn notify(&self, snapshot: SessionSnapshot) {
        let listeners: Vec<StateListener> = match self.listeners.lock() {
            Ok(l) => l.state.iter().map(|(_, f)| Arc::clone(f)).collect(),
            Err(_) => {
                tracing::warn!("Listener registry poisoned; skipping notification");
                return;
            }
        };
        for listener in listeners {
            if let Err(e) = listener(&snapshot) {
                tracing::warn!("State listener failed: {}", e);
            }
        }
    }

    fn publish(&self, response: &SignResponse, waiters: Vec<oneshot::Sender<SignResponse>>) {
        for waiter in waiters {
            let _ = waiter.send(response.clone());
        }
        let listeners: Vec<SignListener> = match self.listeners.lock() {
            Ok(l) => l.sign.iter().map(|(_, f)| Arc::clone(f)).collect(),
            Err(_) => {
                tracing::warn!("Listener registry poisoned; skipping sign response");
                return;
            }
        };
        for listener in listeners {
            if let Err(e) = listener(response) {
                tracing::warn!("Sign response listener failed: {}", e);
            }
        }
    }

    fn dispatch(&self, operation: DeepLinkOperation, url: &Url) {
        tracing::debug!(operation = %operation, url = %url, "Dispatching deep link");
        self.navigator.navigate(url);
    }

    fn persist(&self, state: &SessionState) {
        if let Err(e) = self.store.save(state) {
            tracing::warn!("Failed to persist session: {}", e);
        }
    }

    fn wipe_store(&self) {
        if let Err(e) = self.store.clear() {
            tracing::warn!("Failed to clear session store: {}", e);
        }
    }

    // ------------------------------------------------------------------
    // Operations
    // ------------------------------------------------------------------

    /// Start a connection attempt.
    ///
    /// Discards any previous session, generates and persists a fresh keypair
    /// and dispatches the connect request. Completion arrives later through
    /// [`handle_navigation`](Self::handle_navigation).
    pub fn connect(&self) -> Result<()> {
        if !self.navigator.is_mobile() {
            return Err(PetraLinkError::UnsupportedPlatform);
        }

        let keypair = crypto::generate_keypair();
        let envelope = self
            .transport
            .session_envelope(DeepLinkOperation::Connect, &keypair.public);
        let url = self
            .transport
            .build_request(DeepLinkOperation::Connect, &envelope)?;

        let state = {
            let mut inner = self.inner("connect")?;
            if inner.pending.contains(&ResponsePath::Connect) {
                return Err(PetraLinkError::RequestAlreadyInFlight {
                    path: ResponsePath::Connect,
                });
            }
            // Requests of the previous session can no longer be answered.
            inner.pending.clear();
            inner.waiters.clear();
            inner.state = SessionState::connecting(keypair);
            inner.pending.insert(ResponsePath::Connect);
            inner.state.clone()
        };

        if let Err(e) = self.store.save(&state) {
            // Without the persisted keypair the response page cannot finish the handshake.
            self.reset("connect");
            self.wipe_store();
            return Err(e);
        }

        tracing::info!("Connecting to Petra wallet");
        self.notify(state.snapshot());
        self.dispatch(DeepLinkOperation::Connect, &url);
        Ok(())
    }

    /// End the session.
    ///
    /// Without a local public key this only clears the store. Otherwise local
    /// state is cleared before the request is dispatched.
    pub fn disconnect(&self) -> Result<()> {
        let public = self.inner("disconnect")?.state.public_key();
        let Some(public) = public else {
            self.reset("disconnect");
            return self.store.clear();
        };

        let envelope = self
            .transport
            .session_envelope(DeepLinkOperation::Disconnect, &public);
        let url = self
            .transport
            .build_request(DeepLinkOperation::Disconnect, &envelope)?;

        self.reset("disconnect");
        self.wipe_store();

        tracing::info!("Disconnecting from Petra wallet");
        self.notify(SessionSnapshot::with_status(
            &SessionState::default(),
            SessionStatus::Disconnecting,
        ));
        self.dispatch(DeepLinkOperation::Disconnect, &url);
        self.notify(SessionSnapshot::disconnected());
        Ok(())
    }

    /// Ask the wallet to sign and submit a transaction payload.
    pub fn sign_and_submit<T: Serialize + ?Sized>(&self, payload: &T) -> Result<()> {
        self.send_signed(DeepLinkOperation::SignAndSubmit, payload)
    }

    /// Ask the wallet to sign a message payload.
    pub fn sign_message<T: Serialize + ?Sized>(&self, payload: &T) -> Result<()> {
        self.send_signed(DeepLinkOperation::SignMessage, payload)
    }

    fn send_signed<T: Serialize + ?Sized>(
        &self,
        operation: DeepLinkOperation,
        payload: &T,
    ) -> Result<()> {
        let path = operation.response_path();
        let plaintext = codec::to_json_bytes(payload)?;

        let url = {
            let mut inner = self.inner("sign")?;
            let (public, shared) = match (&inner.state, inner.state.connected) {
                (
                    SessionState {
                        keypair: Some(KeyPair { public, .. }),
                        shared_secret: Some(shared),
                        ..
                    },
                    true,
                ) => (*public, shared.clone()),
                _ => return Err(PetraLinkError::NotConnected),
            };
            if inner.pending.contains(&path) {
                return Err(PetraLinkError::RequestAlreadyInFlight { path });
            }

            let nonce = Nonce::generate();
            let ciphertext = crypto::encrypt(&plaintext, &nonce, &shared)?;
            let envelope = self
                .transport
                .signing_envelope(operation, &public, &ciphertext, &nonce);
            let url = self.transport.build_request(operation, &envelope)?;
            inner.pending.insert(path);
            url
        };

        self.dispatch(operation, &url);
        Ok(())
    }

    /// Free the pending slot for `path`, e.g. after giving up on a response.
    pub fn release_pending(&self, path: ResponsePath) {
        if let Ok(mut inner) = self.inner.lock() {
            if inner.pending.remove(&path) {
                tracing::debug!(path = %path, "Released pending request");
            }
        }
    }

    // ------------------------------------------------------------------
    // Inbound
    // ------------------------------------------------------------------

    /// Route a navigation. Call this for every page load / URL change.
    ///
    /// Handshake failures are returned as errors after the session has been
    /// cleared and listeners notified.
    pub fn handle_navigation(&self, url: &Url) -> Result<NavigationOutcome> {
        let Some(response) = self.transport.parse_response(url) else {
            return Ok(NavigationOutcome::Ignored);
        };
        tracing::debug!(
            path = %response.path,
            status = response.status.as_str(),
            "Routing wallet response"
        );

        let outcome = match response.path {
            ResponsePath::Connect => self
                .complete_handshake(&response)
                .map(|address| NavigationOutcome::Connected { address }),
            ResponsePath::Response => {
                self.complete_signing(&response).map(NavigationOutcome::Signed)
            }
            ResponsePath::Disconnect => {
                self.reset("disconnect response");
                self.wipe_store();
                self.notify(SessionSnapshot::disconnected());
                Ok(NavigationOutcome::Disconnected)
            }
        };

        self.navigator.consume_response_location();
        outcome
    }

    /// Parse and route a URL string.
    pub fn handle_navigation_str(&self, url: &str) -> Result<NavigationOutcome> {
        let url = Url::parse(url).map_err(|e| PetraLinkError::codec("response url", e))?;
        self.handle_navigation(&url)
    }

    fn complete_handshake(&self, response: &InboundResponse) -> Result<String> {
        if response.status == ResponseStatus::Rejected {
            tracing::info!("Connection rejected in wallet");
            self.fail_session();
            return Err(PetraLinkError::HandshakeRejected);
        }

        let keypair = {
            let mut inner = self.inner("handshake")?;
            inner.pending.remove(&ResponsePath::Connect);
            inner.state.keypair.clone()
        };

        let derived = keypair
            .ok_or_else(|| PetraLinkError::handshake("no connection attempt in progress"))
            .and_then(|keypair| {
                let data = response
                    .data
                    .as_deref()
                    .ok_or_else(|| PetraLinkError::handshake("missing data"))?;
                let approval: ConnectApproval =
                    codec::decode_envelope(data).map_err(PetraLinkError::handshake)?;
                let peer = codec::decode_key_hex(&approval.petra_public_encrypted_key)
                    .map(PublicKey::from_bytes)
                    .map_err(|e| PetraLinkError::handshake(format!("wallet public key: {}", e)))?;
                if approval.address.is_empty() {
                    return Err(PetraLinkError::handshake("missing wallet address"));
                }
                let shared = crypto::derive_shared_secret(&peer, &keypair.secret)
                    .map_err(PetraLinkError::handshake)?;
                Ok((keypair, shared, approval.address))
            });

        let (keypair, shared, address) = match derived {
            Ok(parts) => parts,
            Err(e) => {
                tracing::warn!("Handshake failed: {}", e);
                self.fail_session();
                return Err(e);
            }
        };

        let state = {
            let mut inner = self.inner("handshake")?;
            inner.state = SessionState {
                connected: true,
                peer_address: Some(address.clone()),
                keypair: Some(keypair),
                shared_secret: Some(shared),
            };
            inner.state.clone()
        };
        self.persist(&state);

        tracing::info!(address = %address, "Connected to Petra wallet");
        self.notify(state.snapshot());
        Ok(address)
    }

    fn complete_signing(&self, response: &InboundResponse) -> Result<SignResponse> {
        let event = match response.status {
            ResponseStatus::Rejected => SignResponse::Rejected,
            ResponseStatus::Approved => match response.data.as_deref() {
                None => SignResponse::Failed("missing data".into()),
                Some(data) => match codec::decode_envelope::<serde_json::Value>(data) {
                    Ok(value) => SignResponse::Approved(value),
                    Err(e) => SignResponse::Failed(e.to_string()),
                },
            },
        };

        let waiters = {
            let mut inner = self.inner("sign response")?;
            inner.pending.remove(&ResponsePath::Response);
            std::mem::take(&mut inner.waiters)
        };

        if let SignResponse::Failed(reason) = &event {
            tracing::warn!("Undecodable sign response, closing session: {}", reason);
            self.fail_session();
        }

        self.publish(&event, waiters);
        Ok(event)
    }

    /// Clear everything and notify.
    fn fail_session(&self) {
        self.reset("fail_session");
        self.wipe_store();
        self.notify(SessionSnapshot::disconnected());
    }

    /// Clear in-memory state, pending slots and waiters.
    fn reset(&self, context: &str) {
        match self.inner.lock() {
            Ok(mut inner) => {
                inner.state.clear();
                inner.pending.clear();
                inner.waiters.clear();
            }
            Err(_) => tracing::warn!("Client lock poisoned during {}", context),
        }
    }
}

impl std::fmt::Debug for PetraClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PetraClient")
            .field("session", &self.snapshot())
            .finish_non_exhaustive()
    }
}
