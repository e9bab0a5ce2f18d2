//! Payment execution over Petra wallet sessions.
//!
//! Turns a fiat payment request (bank transfer or airtime) into an Aptos
//! transfer to the treasury, signed either by an in-page wallet or through the
//! deep-link session from `petralink-lib`, then waits for finality and
//! confirms the payment with the settlement backend.
//!
//! # Example
//!
//! ```ignore
//! use petralink_payments::{
//!     AptosRestClient, BackendConfig, HttpConfirmationBackend, NodeConfig, PaymentConfig,
//!     PaymentExecutor, PaymentRequest,
//! };
//!
//! let executor = PaymentExecutor::new(
//!     PaymentConfig::from_env()?,
//!     Arc::new(AptosRestClient::new(NodeConfig::from_env())?),
//!     Arc::new(HttpConfirmationBackend::new(BackendConfig::from_env())?),
//! )
//! .with_deep_link_session(session);
//!
//! executor
//!     .execute(
//!         PaymentRequest::airtime(dec!(1000), "08031234567", "MTN"),
//!         |hash| println!("paid: {hash}"),
//!         |err| eprintln!("failed: {err}"),
//!     )
//!     .await;
//! ```

pub mod backend;
pub mod chain;
pub mod config;
pub mod currency;
pub mod error;
pub mod executor;
pub mod request;
pub mod retry;
pub mod signer;

pub use backend::{BackendError, ConfirmationBackend, ConfirmationRequest, HttpConfirmationBackend};
pub use chain::{AptosRestClient, ChainError, FinalityClient, TransactionOutcome};
pub use config::{BackendConfig, NodeConfig, PaymentConfig};
pub use currency::{quote, ExchangeRate, FixedRate, Quote, UNITS_PER_NATIVE};
pub use error::{PaymentError, Result};
pub use executor::{PaymentExecutor, PaymentReceipt};
pub use request::{PaymentCategory, PaymentDetails, PaymentRequest, TransferPayload};
pub use retry::{with_retry, RetryConfig};
pub use signer::{
    select_signer, DeepLinkSigner, InPageSigner, InPageWallet, SignedTransaction, SigningPath,
    TransactionSigner,
};
