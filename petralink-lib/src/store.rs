//! Session persistence.
//!
//! The session lives in four independent string slots of a key-value store:
//!
//! | Slot | Contents |
//! |------|----------|
//! | `petra_secret_key` | base64 X25519 private key |
//! | `petra_public_key` | base64 X25519 public key |
//! | `petra_shared_key` | base64 derived shared secret |
//! | `petra_connection_state` | JSON `{"isConnected": bool, "walletAddress": string?}` |
//!
//! The slots are written one at a time, so a crash can leave any subset behind.
//! [`SessionStore::load`] therefore validates the combination as a whole and
//! purges the store on anything it does not recognise.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};

use serde::{Deserialize, Serialize};

use crate::codec;
use crate::crypto::{KeyPair, PublicKey, SecretKey, SharedSecret};
use crate::state::SessionState;
use crate::{PetraLinkError, Result};

pub const SECRET_KEY_SLOT: &str = "petra_secret_key";
pub const PUBLIC_KEY_SLOT: &str = "petra_public_key";
pub const SHARED_KEY_SLOT: &str = "petra_shared_key";
pub const CONNECTION_STATE_SLOT: &str = "petra_connection_state";

/// Every slot owned by the session; they are invalidated together.
pub const STORAGE_KEYS: [&str; 4] = [
    SECRET_KEY_SLOT,
    PUBLIC_KEY_SLOT,
    SHARED_KEY_SLOT,
    CONNECTION_STATE_SLOT,
];

/// Synchronous string key-value storage.
///
/// Synchronous on purpose: the client reads its persisted state in its
/// constructor, before the first navigation is routed.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for std::sync::Arc<T> {
    fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<()> {
        (**self).remove(key)
    }
}

fn lock_error(context: &str) -> PetraLinkError {
    PetraLinkError::Storage(format!("lock poisoned during {}", context))
}

/// In-memory store for tests and short-lived sessions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of occupied slots. Returns 0 if the lock is poisoned.
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.read().map_err(|_| lock_error("get"))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.write().map_err(|_| lock_error("set"))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.write().map_err(|_| lock_error("remove"))?;
        entries.remove(key);
        Ok(())
    }
}

/// Store backed by a single JSON object on disk.
///
/// Each write rewrites the whole file through a temporary sibling and a
/// rename, so the file is never observed half-written.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    guard: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            guard: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File contents, `None` when the file does not exist.
    fn read_bytes(&self) -> Result<Option<Vec<u8>>> {
        match std::fs::read(&self.path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(PetraLinkError::Storage(format!(
                "failed to read {}: {}",
                self.path.display(),
                e
            ))),
        }
    }

    fn parse_map(&self, bytes: &[u8]) -> Result<HashMap<String, String>> {
        if bytes.is_empty() {
            return Ok(HashMap::new());
        }
        serde_json::from_slice(bytes).map_err(|e| {
            PetraLinkError::Storage(format!("corrupt store {}: {}", self.path.display(), e))
        })
    }

    fn read_map(&self) -> Result<HashMap<String, String>> {
        match self.read_bytes()? {
            Some(bytes) => self.parse_map(&bytes),
            None => Ok(HashMap::new()),
        }
    }

    /// Map to update on a write. A corrupt file reads as empty so the write
    /// replaces it; the flag is set when that happened.
    fn read_map_for_update(&self) -> Result<(HashMap<String, String>, bool)> {
        let Some(bytes) = self.read_bytes()? else {
            return Ok((HashMap::new(), false));
        };
        match self.parse_map(&bytes) {
            Ok(map) => Ok((map, false)),
            Err(e) => {
                tracing::warn!("Replacing unreadable session store: {}", e);
                Ok((HashMap::new(), true))
            }
        }
    }

    fn write_map(&self, map: &HashMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    PetraLinkError::Storage(format!(
                        "failed to create {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let tmp = self.path.with_extension("tmp");
        let bytes = serde_json::to_vec_pretty(map)?;
        std::fs::write(&tmp, bytes).map_err(|e| {
            PetraLinkError::Storage(format!("failed to write {}: {}", tmp.display(), e))
        })?;
        std::fs::rename(&tmp, &self.path).map_err(|e| {
            PetraLinkError::Storage(format!(
                "failed to replace {}: {}",
                self.path.display(),
                e
            ))
        })
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let _guard = self.guard.lock().map_err(|_| lock_error("get"))?;
        Ok(self.read_map()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let _guard = self.guard.lock().map_err(|_| lock_error("set"))?;
        let (mut map, _) = self.read_map_for_update()?;
        map.insert(key.to_string(), value.to_string());
        self.write_map(&map)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let _guard = self.guard.lock().map_err(|_| lock_error("remove"))?;
        let (mut map, corrupt) = self.read_map_for_update()?;
        if map.remove(key).is_some() || corrupt {
            self.write_map(&map)?;
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConnectionBlob {
    is_connected: bool,
    #[serde(default)]
    wallet_address: Option<String>,
}

/// Raw slot contents read in one pass.
struct Slots {
    secret: Option<String>,
    public: Option<String>,
    shared: Option<String>,
    blob: Option<String>,
}

impl Slots {
    fn is_empty(&self) -> bool {
        self.secret.is_none()
            && self.public.is_none()
            && self.shared.is_none()
            && self.blob.is_none()
    }
}

/// Persists [`SessionState`] in a [`KeyValueStore`].
pub struct SessionStore<S> {
    backend: S,
}

impl<S: KeyValueStore> SessionStore<S> {
    pub fn new(backend: S) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &S {
        &self.backend
    }

    /// Persist the state. An empty state clears the store.
    pub fn save(&self, state: &SessionState) -> Result<()> {
        let Some(keypair) = state.keypair.as_ref() else {
            return self.clear();
        };

        self.backend
            .set(SECRET_KEY_SLOT, &codec::to_base64(keypair.secret.as_bytes()))?;
        self.backend
            .set(PUBLIC_KEY_SLOT, &codec::to_base64(keypair.public.as_bytes()))?;
        match &state.shared_secret {
            Some(shared) => self
                .backend
                .set(SHARED_KEY_SLOT, &codec::to_base64(shared.as_bytes()))?,
            None => self.backend.remove(SHARED_KEY_SLOT)?,
        }

        let blob = ConnectionBlob {
            is_connected: state.connected,
            wallet_address: state.peer_address.clone(),
        };
        self.backend
            .set(CONNECTION_STATE_SLOT, &serde_json::to_string(&blob)?)
    }

    /// Load the persisted state.
    ///
    /// Returns `None` when nothing usable is stored. Any slot that fails to
    /// read or decode, or a combination of slots that does not describe a
    /// valid session, purges the whole store.
    pub fn load(&self) -> Option<SessionState> {
        let slots = match self.read_slots() {
            Ok(slots) => slots,
            Err(e) => {
                tracing::warn!("Session store unreadable, purging: {}", e);
                self.purge();
                return None;
            }
        };

        if slots.is_empty() {
            return None;
        }

        match Self::decode(&slots) {
            Ok(state) => Some(state),
            Err(reason) => {
                tracing::warn!("Discarding persisted session: {}", reason);
                self.purge();
                None
            }
        }
    }

    /// Remove every slot.
    ///
    /// All removals are attempted; the first failure is returned. Slots left
    /// behind by a failed clear are caught by the next [`load`](Self::load).
    pub fn clear(&self) -> Result<()> {
        let mut first_error = None;
        for key in STORAGE_KEYS {
            if let Err(e) = self.backend.remove(key) {
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn purge(&self) {
        if let Err(e) = self.clear() {
            tracing::warn!("Failed to purge session store: {}", e);
        }
    }

    fn read_slots(&self) -> Result<Slots> {
        Ok(Slots {
            secret: self.backend.get(SECRET_KEY_SLOT)?,
            public: self.backend.get(PUBLIC_KEY_SLOT)?,
            shared: self.backend.get(SHARED_KEY_SLOT)?,
            blob: self.backend.get(CONNECTION_STATE_SLOT)?,
        })
    }

    fn decode(slots: &Slots) -> std::result::Result<SessionState, String> {
        let blob: Option<ConnectionBlob> = slots
            .blob
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(|e| format!("connection state: {}", e))?;

        let secret = slots
            .secret
            .as_deref()
            .map(|s| codec::decode_key_base64(s).map(SecretKey::from_bytes))
            .transpose()
            .map_err(|e| format!("secret key: {}", e))?;
        let public = slots
            .public
            .as_deref()
            .map(|s| codec::decode_key_base64(s).map(PublicKey::from_bytes))
            .transpose()
            .map_err(|e| format!("public key: {}", e))?;
        let shared = slots
            .shared
            .as_deref()
            .map(|s| codec::decode_key_base64(s).map(SharedSecret::from_bytes))
            .transpose()
            .map_err(|e| format!("shared key: {}", e))?;

        let (Some(secret), Some(public)) = (secret, public) else {
            return Err("keypair incomplete".into());
        };
        if secret.public_key() != public {
            return Err("public key does not match secret key".into());
        }
        let keypair = KeyPair { public, secret };

        match blob {
            Some(ConnectionBlob {
                is_connected: true,
                wallet_address,
            }) => {
                let address = wallet_address
                    .filter(|a| !a.is_empty())
                    .ok_or("connected without wallet address")?;
                let shared = shared.ok_or("connected without shared key")?;
                Ok(SessionState {
                    connected: true,
                    peer_address: Some(address),
                    keypair: Some(keypair),
                    shared_secret: Some(shared),
                })
            }
            _ if shared.is_some() => Err("shared key without connection".into()),
            _ => Ok(SessionState::connecting(keypair)),
        }
    }
}
