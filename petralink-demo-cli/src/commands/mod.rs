//! CLI command implementations

pub mod balance;
pub mod connect;
pub mod disconnect;
pub mod open;
pub mod pay;
pub mod quote;
pub mod sign_message;
pub mod status;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use petralink_lib::{DeepLinkConfig, FileStore, NavigationOutcome, PetraClient, SignResponse};

use crate::navigator::TerminalNavigator;
use crate::ui;

/// File holding the persisted session slots.
pub const SESSION_FILE: &str = "session.json";

/// Options shared by every command.
#[derive(Debug, Clone)]
pub struct Context {
    pub storage_dir: PathBuf,
    pub verbose: bool,
    pub desktop: bool,
}

impl Context {
    pub fn session_path(&self) -> PathBuf {
        self.storage_dir.join(SESSION_FILE)
    }

    /// Open the persisted session, restoring any saved state.
    pub fn session(&self) -> Result<Arc<PetraClient>> {
        open_session(&self.storage_dir, !self.desktop)
    }
}

/// Build a session over the file store in `storage_dir`.
pub fn open_session(storage_dir: &Path, mobile: bool) -> Result<Arc<PetraClient>> {
    let config = DeepLinkConfig::from_env();
    let client = PetraClient::new(
        &config,
        Arc::new(FileStore::new(storage_dir.join(SESSION_FILE))),
        Arc::new(TerminalNavigator::new(mobile)),
    )?;
    Ok(Arc::new(client))
}

/// Ask for the URL the wallet redirected to and route it.
///
/// Returns `None` when the user skips.
pub fn read_response(client: &PetraClient) -> Result<Option<NavigationOutcome>> {
    if !ui::is_interactive() {
        ui::info("Run `petralink open <url>` with the URL the wallet redirects to.");
        return Ok(None);
    }
    let url = ui::input_optional("Paste the URL Petra redirected to (empty to skip)")?;
    let url = url.trim();
    if url.is_empty() {
        return Ok(None);
    }
    Ok(Some(client.handle_navigation_str(url)?))
}

/// Print a routed navigation.
pub fn report_outcome(outcome: &NavigationOutcome) {
    match outcome {
        NavigationOutcome::Ignored => ui::warning("Not a wallet response URL, ignored"),
        NavigationOutcome::Connected { address } => {
            ui::success(&format!("Connected to {}", address))
        }
        NavigationOutcome::Signed(SignResponse::Approved(data)) => {
            ui::success("Request approved");
            ui::json(data);
        }
        NavigationOutcome::Signed(SignResponse::Rejected) => {
            ui::warning("Request rejected in wallet")
        }
        NavigationOutcome::Signed(SignResponse::Failed(reason)) => {
            ui::error(&format!("Wallet response could not be read: {}", reason))
        }
        NavigationOutcome::Disconnected => ui::success("Wallet acknowledged disconnect"),
    }
}
