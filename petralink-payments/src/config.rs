//! Payment configuration.
//!
//! # Environment Variables
//!
//! - `PETRALINK_TREASURY_ADDRESS` - account receiving payments (required)
//! - `PETRALINK_FIAT_RATE` - fiat units per native unit (default 3500)
//! - `PETRALINK_MIN_NATIVE_AMOUNT` - minimum transfer in native units (default 0.1)
//! - `PETRALINK_SIGN_TIMEOUT_SECS` - deep-link signing timeout (default 300)
//! - `PETRALINK_NODE_URL` - Aptos fullnode REST endpoint
//! - `PETRALINK_BACKEND_URL` - settlement backend base URL

use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::retry::RetryConfig;
use crate::{PaymentError, Result};

/// Aptos testnet fullnode.
pub const DEFAULT_NODE_URL: &str = "https://fullnode.testnet.aptoslabs.com/v1";

/// Local settlement backend.
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:3000";

/// Executor configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PaymentConfig {
    /// Account that receives every transfer.
    #[serde(default)]
    pub treasury_address: Option<String>,

    /// Fiat units per native unit.
    #[serde(default = "default_fiat_rate")]
    pub fiat_per_native: Decimal,

    /// Smallest transfer, in native units.
    #[serde(default = "default_min_native_amount")]
    pub min_native_amount: Decimal,

    /// How long to wait for a deep-link signing response.
    #[serde(default = "default_sign_timeout_secs")]
    pub sign_timeout_secs: u64,

    /// Retry policy for backend confirmation.
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_fiat_rate() -> Decimal {
    dec!(3500)
}

fn default_min_native_amount() -> Decimal {
    dec!(0.1)
}

fn default_sign_timeout_secs() -> u64 {
    300
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            treasury_address: None,
            fiat_per_native: default_fiat_rate(),
            min_native_amount: default_min_native_amount(),
            sign_timeout_secs: default_sign_timeout_secs(),
            retry: RetryConfig::default(),
        }
    }
}

impl PaymentConfig {
    pub fn new(treasury_address: impl Into<String>) -> Self {
        Self {
            treasury_address: Some(treasury_address.into()),
            ..Self::default()
        }
    }

    pub fn with_fiat_rate(mut self, rate: Decimal) -> Self {
        self.fiat_per_native = rate;
        self
    }

    pub fn with_min_native_amount(mut self, amount: Decimal) -> Self {
        self.min_native_amount = amount;
        self
    }

    pub fn with_sign_timeout(mut self, timeout: Duration) -> Self {
        self.sign_timeout_secs = timeout.as_secs();
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn sign_timeout(&self) -> Duration {
        Duration::from_secs(self.sign_timeout_secs)
    }

    /// The configured treasury, or a `Configuration` error.
    pub fn treasury(&self) -> Result<&str> {
        self.treasury_address
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .ok_or_else(|| PaymentError::Configuration("Treasury address not configured".into()))
    }

    /// Load from `PETRALINK_*` environment variables.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(address) = std::env::var("PETRALINK_TREASURY_ADDRESS") {
            config.treasury_address = Some(address);
        }
        if let Ok(rate) = std::env::var("PETRALINK_FIAT_RATE") {
            config.fiat_per_native = parse_decimal("PETRALINK_FIAT_RATE", &rate)?;
        }
        if let Ok(min) = std::env::var("PETRALINK_MIN_NATIVE_AMOUNT") {
            config.min_native_amount = parse_decimal("PETRALINK_MIN_NATIVE_AMOUNT", &min)?;
        }
        if let Ok(secs) = std::env::var("PETRALINK_SIGN_TIMEOUT_SECS") {
            config.sign_timeout_secs = secs.trim().parse().map_err(|e| {
                PaymentError::Configuration(format!("PETRALINK_SIGN_TIMEOUT_SECS: {}", e))
            })?;
        }

        Ok(config)
    }
}

fn parse_decimal(name: &str, value: &str) -> Result<Decimal> {
    Decimal::from_str(value.trim())
        .map_err(|e| PaymentError::Configuration(format!("{}: {}", name, e)))
}

/// Aptos fullnode client configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// REST endpoint, including the `/v1` prefix.
    #[serde(default = "default_node_url")]
    pub url: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Delay between finality polls.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Give up waiting for finality after this long.
    #[serde(default = "default_finality_timeout_secs")]
    pub finality_timeout_secs: u64,
}

fn default_node_url() -> String {
    DEFAULT_NODE_URL.to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_finality_timeout_secs() -> u64 {
    60
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            url: default_node_url(),
            timeout_secs: default_timeout(),
            poll_interval_ms: default_poll_interval_ms(),
            finality_timeout_secs: default_finality_timeout_secs(),
        }
    }
}

impl NodeConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn with_finality_timeout(mut self, timeout: Duration) -> Self {
        self.finality_timeout_secs = timeout.as_secs();
        self
    }

    pub fn from_env() -> Self {
        std::env::var("PETRALINK_NODE_URL")
            .map(Self::new)
            .unwrap_or_default()
    }
}

/// Settlement backend configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_backend_url")]
    pub url: String,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_backend_url() -> String {
    DEFAULT_BACKEND_URL.to_string()
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: default_backend_url(),
            timeout_secs: default_timeout(),
        }
    }
}

impl BackendConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn from_env() -> Self {
        std::env::var("PETRALINK_BACKEND_URL")
            .map(Self::new)
            .unwrap_or_default()
    }
}
