//! Test utilities for wallet sessions.
//!
//! - [`RecordingNavigator`] records every dispatched deep link instead of
//!   handing it to the OS.
//! - [`MockWallet`] plays the Petra app: it reads request URLs, decrypts
//!   signing payloads and fabricates the response URLs the wallet would
//!   redirect to.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use petralink_lib::test_utils::{MockWallet, RecordingNavigator};
//!
//! let nav = Arc::new(RecordingNavigator::mobile());
//! let client = PetraClient::new(&config, Arc::new(MemoryStore::new()), nav.clone())?;
//! let wallet = MockWallet::new();
//!
//! client.connect()?;
//! client.handle_navigation(&wallet.approve_connect(&nav.last().unwrap()))?;
//! assert!(client.is_connected());
//! ```

mod navigator;
mod wallet;

pub use navigator::RecordingNavigator;
pub use wallet::{MockWallet, WalletRequest};
