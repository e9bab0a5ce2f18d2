//! Deep-link configuration.
//!
//! # Environment Variables
//!
//! - `PETRALINK_WALLET_LINK_BASE` - wallet scheme + API prefix (default `petra://api/v1`)
//! - `PETRALINK_DAPP_ORIGIN` - origin the wallet redirects back to
//! - `PETRALINK_APP_NAME` - name shown to the user inside the wallet

use serde::{Deserialize, Serialize};
use url::Url;

use crate::{PetraLinkError, Result};

/// Default wallet deep-link prefix.
pub const DEFAULT_WALLET_LINK_BASE: &str = "petra://api/v1";

/// Default dapp origin (local development server).
pub const DEFAULT_DAPP_ORIGIN: &str = "http://localhost:5173";

/// Default application name shown in the wallet.
pub const DEFAULT_APP_NAME: &str = "Bundle - Spend Crypto on Anything";

/// Configuration for building deep-link requests.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeepLinkConfig {
    /// Wallet scheme and API prefix, e.g. `petra://api/v1`.
    #[serde(default = "default_wallet_link_base")]
    pub wallet_link_base: String,

    /// Origin of this application; response paths are resolved against it.
    #[serde(default = "default_dapp_origin")]
    pub dapp_origin: String,

    /// Display name sent in `appInfo`.
    #[serde(default = "default_app_name")]
    pub app_name: String,
}

fn default_wallet_link_base() -> String {
    DEFAULT_WALLET_LINK_BASE.to_string()
}

fn default_dapp_origin() -> String {
    DEFAULT_DAPP_ORIGIN.to_string()
}

fn default_app_name() -> String {
    DEFAULT_APP_NAME.to_string()
}

impl Default for DeepLinkConfig {
    fn default() -> Self {
        Self {
            wallet_link_base: default_wallet_link_base(),
            dapp_origin: default_dapp_origin(),
            app_name: default_app_name(),
        }
    }
}

impl DeepLinkConfig {
    /// Create a configuration for the given dapp origin.
    pub fn new(dapp_origin: impl Into<String>) -> Self {
        Self {
            dapp_origin: dapp_origin.into(),
            ..Self::default()
        }
    }

    /// Set the wallet link prefix.
    pub fn with_wallet_link_base(mut self, base: impl Into<String>) -> Self {
        self.wallet_link_base = base.into();
        self
    }

    /// Set the application name.
    pub fn with_app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = name.into();
        self
    }

    /// Load configuration from `PETRALINK_*` environment variables, falling back
    /// to defaults for anything unset.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(base) = std::env::var("PETRALINK_WALLET_LINK_BASE") {
            config.wallet_link_base = base;
        }
        if let Ok(origin) = std::env::var("PETRALINK_DAPP_ORIGIN") {
            config.dapp_origin = origin;
        }
        if let Ok(name) = std::env::var("PETRALINK_APP_NAME") {
            config.app_name = name;
        }

        config
    }

    /// Parse the wallet link prefix.
    pub fn wallet_base_url(&self) -> Result<Url> {
        Url::parse(self.wallet_link_base.trim_end_matches('/')).map_err(|e| {
            PetraLinkError::Configuration(format!(
                "invalid wallet link base '{}': {}",
                self.wallet_link_base, e
            ))
        })
    }

    /// Parse the dapp origin.
    pub fn origin_url(&self) -> Result<Url> {
        let url = Url::parse(&self.dapp_origin).map_err(|e| {
            PetraLinkError::Configuration(format!(
                "invalid dapp origin '{}': {}",
                self.dapp_origin, e
            ))
        })?;
        if url.cannot_be_a_base() {
            return Err(PetraLinkError::Configuration(format!(
                "dapp origin '{}' cannot be a base URL",
                self.dapp_origin
            )));
        }
        Ok(url)
    }

    /// Check that both URLs parse.
    pub fn validate(&self) -> Result<()> {
        self.wallet_base_url()?;
        self.origin_url()?;
        Ok(())
    }
}
