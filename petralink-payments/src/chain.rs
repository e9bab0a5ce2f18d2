//! Chain finality client.
//!
//! Polls the Aptos fullnode REST API until a submitted transaction has left
//! the mempool, then reports whether it executed successfully:
//!
//! ```text
//! GET <node>/transactions/by_hash/<hash>
//! ```
//!
//! A `404` or a `pending_transaction` body both mean "not yet final".
//!
//! The same client reads an account's native balance from its `CoinStore`
//! resource.
//!
//! # Feature Flags
//!
//! Real HTTP requests need the `http-client` feature (on by default). Without
//! it [`AptosRestClient`] compiles but every call returns
//! [`ChainError::Unavailable`].

use async_trait::async_trait;
use serde::Deserialize;
#[cfg(feature = "http-client")]
use std::time::Duration;

use crate::config::NodeConfig;

/// Errors talking to the node.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ChainError {
    #[error("node request failed: {0}")]
    Transport(String),
    #[error("node returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("transaction {hash} not final after {waited_secs}s")]
    Timeout { hash: String, waited_secs: u64 },
    #[error("unexpected node response: {0}")]
    Decode(String),
    #[error("node HTTP client not compiled - enable the 'http-client' feature")]
    Unavailable,
}

/// Final result of a committed transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionOutcome {
    pub hash: String,
    pub success: bool,
    pub vm_status: String,
}

/// Waits for a transaction to become final.
#[async_trait]
pub trait FinalityClient: Send + Sync {
    async fn wait_for_transaction(&self, hash: &str) -> Result<TransactionOutcome, ChainError>;
}

/// Subset of the node's transaction JSON we read.
#[derive(Debug, Deserialize)]
struct NodeTransaction {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    hash: Option<String>,
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    vm_status: Option<String>,
}

impl NodeTransaction {
    fn is_pending(&self) -> bool {
        self.kind == "pending_transaction"
    }

    fn into_outcome(self, requested: &str) -> TransactionOutcome {
        TransactionOutcome {
            hash: self.hash.unwrap_or_else(|| requested.to_string()),
            success: self.success.unwrap_or(false),
            vm_status: self
                .vm_status
                .unwrap_or_else(|| "Unknown error".to_string()),
        }
    }
}

/// `CoinStore` resource of the native coin, percent-encoded for a path.
pub const NATIVE_COIN_STORE: &str = "0x1::coin::CoinStore%3C0x1::aptos_coin::AptosCoin%3E";

#[derive(Debug, Deserialize)]
struct CoinStoreResource {
    data: CoinStoreData,
}

#[derive(Debug, Deserialize)]
struct CoinStoreData {
    coin: CoinValue,
}

#[derive(Debug, Deserialize)]
struct CoinValue {
    value: String,
}

impl CoinStoreResource {
    fn units(&self) -> Result<u64, ChainError> {
        self.data
            .coin
            .value
            .parse()
            .map_err(|e| ChainError::Decode(format!("coin value: {}", e)))
    }
}

/// Aptos fullnode REST client.
pub struct AptosRestClient {
    config: NodeConfig,
    #[cfg(feature = "http-client")]
    client: reqwest::Client,
}

impl AptosRestClient {
    #[cfg(feature = "http-client")]
    pub fn new(config: NodeConfig) -> Result<Self, ChainError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ChainError::Transport(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { config, client })
    }

    #[cfg(not(feature = "http-client"))]
    pub fn new(config: NodeConfig) -> Result<Self, ChainError> {
        Ok(Self { config })
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    #[cfg(any(feature = "http-client", test))]
    fn transaction_url(&self, hash: &str) -> String {
        format!(
            "{}/transactions/by_hash/{}",
            self.config.url.trim_end_matches('/'),
            hash
        )
    }

    #[cfg(any(feature = "http-client", test))]
    fn balance_url(&self, address: &str) -> String {
        format!(
            "{}/accounts/{}/resource/{}",
            self.config.url.trim_end_matches('/'),
            address,
            NATIVE_COIN_STORE
        )
    }

    /// Native balance of `address` in smallest units. An account without a
    /// coin store holds nothing.
    #[cfg(feature = "http-client")]
    pub async fn account_balance(&self, address: &str) -> Result<u64, ChainError> {
        let response = self
            .client
            .get(self.balance_url(address))
            .send()
            .await
            .map_err(|e| ChainError::Transport(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(0);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ChainError::Status {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<CoinStoreResource>()
            .await
            .map_err(|e| ChainError::Decode(e.to_string()))?
            .units()
    }

    #[cfg(not(feature = "http-client"))]
    pub async fn account_balance(&self, _address: &str) -> Result<u64, ChainError> {
        Err(ChainError::Unavailable)
    }

    /// Fetch the transaction once. `None` while the node does not know it yet.
    #[cfg(feature = "http-client")]
    async fn fetch(&self, hash: &str) -> Result<Option<NodeTransaction>, ChainError> {
        let response = self
            .client
            .get(self.transaction_url(hash))
            .send()
            .await
            .map_err(|e| ChainError::Transport(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ChainError::Status {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<NodeTransaction>()
            .await
            .map(Some)
            .map_err(|e| ChainError::Decode(e.to_string()))
    }

    #[cfg(not(feature = "http-client"))]
    async fn fetch(&self, _hash: &str) -> Result<Option<NodeTransaction>, ChainError> {
        Err(ChainError::Unavailable)
    }
}

#[async_trait]
impl FinalityClient for AptosRestClient {
    async fn wait_for_transaction(&self, hash: &str) -> Result<TransactionOutcome, ChainError> {
        let poll = std::time::Duration::from_millis(self.config.poll_interval_ms);
        let limit = std::time::Duration::from_secs(self.config.finality_timeout_secs);
        let started = tokio::time::Instant::now();

        loop {
            match self.fetch(hash).await? {
                Some(tx) if !tx.is_pending() => {
                    let outcome = tx.into_outcome(hash);
                    tracing::debug!(
                        hash = %outcome.hash,
                        success = outcome.success,
                        vm_status = %outcome.vm_status,
                        "Transaction final"
                    );
                    return Ok(outcome);
                }
                _ => {}
            }

            if started.elapsed() >= limit {
                return Err(ChainError::Timeout {
                    hash: hash.to_string(),
                    waited_secs: limit.as_secs(),
                });
            }
            tokio::time::sleep(poll).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_url() {
        let client = AptosRestClient::new(NodeConfig::new("https://node.example/v1/")).unwrap();
        assert_eq!(
            client.transaction_url("0xabc"),
            "https://node.example/v1/transactions/by_hash/0xabc"
        );
    }

    #[test]
    fn test_balance_url() {
        let client = AptosRestClient::new(NodeConfig::new("https://node.example/v1")).unwrap();
        assert_eq!(
            client.balance_url("0xabc"),
            "https://node.example/v1/accounts/0xabc/resource/\
             0x1::coin::CoinStore%3C0x1::aptos_coin::AptosCoin%3E"
        );
    }

    #[test]
    fn test_coin_store_parsing() {
        let resource: CoinStoreResource = serde_json::from_str(
            r#"{"type":"0x1::coin::CoinStore<0x1::aptos_coin::AptosCoin>","data":{"coin":{"value":"28571428"},"frozen":false}}"#,
        )
        .unwrap();
        assert_eq!(resource.units().unwrap(), 28_571_428);

        let bad: CoinStoreResource =
            serde_json::from_str(r#"{"data":{"coin":{"value":"lots"}}}"#).unwrap();
        assert!(matches!(bad.units(), Err(ChainError::Decode(_))));
    }

    #[test]
    fn test_node_transaction_parsing() {
        let pending: NodeTransaction =
            serde_json::from_str(r#"{"type":"pending_transaction","hash":"0x1"}"#).unwrap();
        assert!(pending.is_pending());

        let failed: NodeTransaction = serde_json::from_str(
            r#"{"type":"user_transaction","hash":"0x1","success":false,"vm_status":"Move abort: EINSUFFICIENT_BALANCE"}"#,
        )
        .unwrap();
        let outcome = failed.into_outcome("0x1");
        assert!(!outcome.success);
        assert_eq!(outcome.vm_status, "Move abort: EINSUFFICIENT_BALANCE");
    }
}
