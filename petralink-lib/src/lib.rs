//! Petra wallet deep-link session client.
//!
//! A web client establishes an encrypted session with the Petra mobile wallet
//! using nothing but URL navigation as transport: every request leaves as a
//! `petra://` deep link, every response comes back as a page load on one of
//! three fixed paths.
//!
//! # Features
//!
//! - **Session crypto**: NaCl `box` compatible key agreement and encryption
//! - **Persistence**: session survives page reloads via a [`KeyValueStore`]
//! - **State propagation**: listeners receive immutable [`SessionSnapshot`]s
//! - **Test tooling**: [`test_utils`] with a scripted wallet (`test-utils` feature)
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use petralink_lib::{DeepLinkConfig, MemoryStore, PetraClient};
//!
//! let client = PetraClient::new(
//!     &DeepLinkConfig::new("https://bundle.example"),
//!     Arc::new(MemoryStore::new()),
//!     navigator,
//! )?;
//!
//! client.on_state_change(|snapshot| {
//!     println!("wallet session is {}", snapshot.status);
//!     Ok(())
//! })?;
//!
//! client.connect()?;
//! // ... later, on the page load the wallet redirects to:
//! client.handle_navigation(&current_url)?;
//! ```

pub mod client;
pub mod codec;
pub mod config;
pub mod crypto;
pub mod errors;
pub mod state;
pub mod store;
pub mod transport;

/// Test utilities for wallet-session testing.
///
/// This module is only available with the `test-utils` feature or in test builds.
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use client::{
    ListenerError, ListenerResult, NavigationOutcome, PetraClient, SignResponse,
    SignResponseWaiter, Subscription,
};
pub use config::DeepLinkConfig;
pub use errors::{PetraLinkError, PetraLinkErrorCode};
pub use state::{SessionSnapshot, SessionState, SessionStatus};
pub use store::{FileStore, KeyValueStore, MemoryStore, SessionStore};
pub use transport::{
    is_mobile_user_agent, DeepLinkOperation, DeepLinkTransport, Navigator, ResponsePath,
};

/// Common result alias for wallet-session operations.
pub type Result<T> = std::result::Result<T, PetraLinkError>;
