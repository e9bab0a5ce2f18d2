//! Session persistence in browser `localStorage`.

use petralink_lib::{KeyValueStore, PetraLinkError, Result};
use web_sys::Storage;

/// [`KeyValueStore`] over `window.localStorage`.
///
/// Holds no JS handles: the storage object is looked up on every call so the
/// store can be shared across the client.
#[derive(Clone, Copy, Debug, Default)]
pub struct LocalStorageStore;

impl LocalStorageStore {
    pub fn new() -> Self {
        Self
    }

    fn storage() -> Result<Storage> {
        web_sys::window()
            .ok_or_else(|| PetraLinkError::Storage("No window object".into()))?
            .local_storage()
            .map_err(|_| PetraLinkError::Storage("Could not access localStorage".into()))?
            .ok_or_else(|| PetraLinkError::Storage("localStorage is not available".into()))
    }
}

impl KeyValueStore for LocalStorageStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Self::storage()?
            .get_item(key)
            .map_err(|_| PetraLinkError::Storage(format!("Failed to read {}", key)))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        Self::storage()?
            .set_item(key, value)
            .map_err(|_| PetraLinkError::Storage(format!("Failed to write {}", key)))
    }

    fn remove(&self, key: &str) -> Result<()> {
        Self::storage()?
            .remove_item(key)
            .map_err(|_| PetraLinkError::Storage(format!("Failed to remove {}", key)))
    }
}
