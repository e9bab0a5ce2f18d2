//! Signing-path selection.
//!
//! A payment is signed either by a wallet living in the page (browser
//! extension or in-app browser) or, on mobile, through the deep-link session.
//! Both are exposed as one [`TransactionSigner`] so the rest of the flow is
//! written once.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use petralink_lib::{PetraClient, PetraLinkError, ResponsePath, SignResponse};

use crate::request::TransferPayload;
use crate::{PaymentError, Result};

/// Which path produced a signature.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SigningPath {
    InPage,
    DeepLink,
}

impl std::fmt::Display for SigningPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InPage => f.write_str("in-page"),
            Self::DeepLink => f.write_str("deep-link"),
        }
    }
}

/// A submitted transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignedTransaction {
    pub hash: String,
    /// Account that signed.
    pub sender: String,
    pub path: SigningPath,
}

/// Signs and submits a transfer, returning its hash.
#[async_trait]
pub trait TransactionSigner: Send + Sync {
    fn path(&self) -> SigningPath;

    async fn sign(&self, payload: &TransferPayload) -> Result<SignedTransaction>;
}

/// A wallet available directly in the page.
#[async_trait]
pub trait InPageWallet: Send + Sync {
    /// Whether an account is connected and can sign right now.
    fn is_ready(&self) -> bool;

    fn account_address(&self) -> Option<String>;

    /// Sign and submit; returns the transaction hash.
    async fn sign_and_submit(&self, payload: &TransferPayload) -> Result<String>;
}

/// Signs through an [`InPageWallet`].
pub struct InPageSigner {
    wallet: Arc<dyn InPageWallet>,
}

impl InPageSigner {
    pub fn new(wallet: Arc<dyn InPageWallet>) -> Self {
        Self { wallet }
    }
}

#[async_trait]
impl TransactionSigner for InPageSigner {
    fn path(&self) -> SigningPath {
        SigningPath::InPage
    }

    async fn sign(&self, payload: &TransferPayload) -> Result<SignedTransaction> {
        let sender = self
            .wallet
            .account_address()
            .ok_or(PaymentError::NoSigningMethod)?;
        let hash = self.wallet.sign_and_submit(payload).await?;
        Ok(SignedTransaction {
            hash,
            sender,
            path: SigningPath::InPage,
        })
    }
}

/// Signs through the deep-link session.
///
/// The response waiter is registered before the request leaves, and the wait
/// is bounded by `timeout`. A timed-out request is abandoned, not retried.
pub struct DeepLinkSigner {
    session: Arc<PetraClient>,
    timeout: Duration,
}

impl DeepLinkSigner {
    pub fn new(session: Arc<PetraClient>, timeout: Duration) -> Self {
        Self { session, timeout }
    }
}

#[async_trait]
impl TransactionSigner for DeepLinkSigner {
    fn path(&self) -> SigningPath {
        SigningPath::DeepLink
    }

    async fn sign(&self, payload: &TransferPayload) -> Result<SignedTransaction> {
        let sender = self
            .session
            .peer_address()
            .ok_or(PetraLinkError::NotConnected)?;

        let waiter = self.session.sign_response_waiter()?;
        self.session.sign_and_submit(payload)?;

        let response = match tokio::time::timeout(self.timeout, waiter.recv()).await {
            Ok(response) => response,
            Err(_) => {
                tracing::warn!("No signing response within {:?}", self.timeout);
                self.session.release_pending(ResponsePath::Response);
                return Err(PaymentError::SigningTimeout(self.timeout));
            }
        };

        match response {
            Some(SignResponse::Approved(data)) => {
                let hash = data
                    .get("hash")
                    .and_then(|h| h.as_str())
                    .ok_or_else(|| {
                        PaymentError::SigningFailed("Transaction hash not received".into())
                    })?;
                Ok(SignedTransaction {
                    hash: hash.to_string(),
                    sender,
                    path: SigningPath::DeepLink,
                })
            }
            Some(SignResponse::Rejected) => Err(PaymentError::SigningRejected),
            Some(SignResponse::Failed(reason)) => Err(PaymentError::SigningFailed(reason)),
            None => Err(PetraLinkError::NotConnected.into()),
        }
    }
}

/// Pick the signing path: a ready in-page wallet first, then a connected
/// deep-link session on mobile.
pub fn select_signer(
    in_page: Option<&Arc<dyn InPageWallet>>,
    session: Option<&Arc<PetraClient>>,
    timeout: Duration,
) -> Result<Box<dyn TransactionSigner>> {
    if let Some(wallet) = in_page.filter(|w| w.is_ready() && w.account_address().is_some()) {
        return Ok(Box::new(InPageSigner::new(Arc::clone(wallet))));
    }
    if let Some(session) = session.filter(|s| s.is_mobile() && s.is_connected()) {
        return Ok(Box::new(DeepLinkSigner::new(Arc::clone(session), timeout)));
    }
    Err(PaymentError::NoSigningMethod)
}

#[cfg(test)]
mod tests {
    use super::*;
    use petralink_lib::test_utils::{MockWallet, RecordingNavigator};
    use petralink_lib::{DeepLinkConfig, MemoryStore};

    struct ReadyWallet(bool);

    #[async_trait]
    impl InPageWallet for ReadyWallet {
        fn is_ready(&self) -> bool {
            self.0
        }

        fn account_address(&self) -> Option<String> {
            self.0.then(|| "0xpage".to_string())
        }

        async fn sign_and_submit(&self, _payload: &TransferPayload) -> Result<String> {
            Ok("0xhash".into())
        }
    }

    fn session(mobile: bool) -> (Arc<PetraClient>, Arc<RecordingNavigator>) {
        let nav = Arc::new(if mobile {
            RecordingNavigator::mobile()
        } else {
            RecordingNavigator::desktop()
        });
        let client = PetraClient::new(
            &DeepLinkConfig::new("https://bundle.example"),
            Arc::new(MemoryStore::new()),
            nav.clone(),
        )
        .unwrap();
        (Arc::new(client), nav)
    }

    fn connect(client: &PetraClient, nav: &RecordingNavigator) {
        client.connect().unwrap();
        let wallet = MockWallet::new();
        client
            .handle_navigation(&wallet.approve_connect(&nav.last().unwrap()))
            .unwrap();
    }

    #[test]
    fn test_in_page_wallet_preferred() {
        let (client, nav) = session(true);
        connect(&client, &nav);
        let wallet: Arc<dyn InPageWallet> = Arc::new(ReadyWallet(true));

        let signer = select_signer(Some(&wallet), Some(&client), Duration::from_secs(1)).unwrap();
        assert_eq!(signer.path(), SigningPath::InPage);
    }

    #[test]
    fn test_deep_link_fallback() {
        let (client, nav) = session(true);
        connect(&client, &nav);
        let wallet: Arc<dyn InPageWallet> = Arc::new(ReadyWallet(false));

        let signer = select_signer(Some(&wallet), Some(&client), Duration::from_secs(1)).unwrap();
        assert_eq!(signer.path(), SigningPath::DeepLink);
    }

    #[test]
    fn test_no_signing_method() {
        let (client, _nav) = session(true);
        assert!(matches!(
            select_signer(None, Some(&client), Duration::from_secs(1)),
            Err(PaymentError::NoSigningMethod)
        ));

        let (desktop, _nav) = session(false);
        assert!(matches!(
            select_signer(None, Some(&desktop), Duration::from_secs(1)),
            Err(PaymentError::NoSigningMethod)
        ));
    }

    #[tokio::test]
    async fn test_deep_link_timeout_releases_slot() {
        let (client, nav) = session(true);
        connect(&client, &nav);
        let signer = DeepLinkSigner::new(client.clone(), Duration::from_millis(20));

        let err = signer
            .sign(&TransferPayload::transfer("0xtreasury", 10_000_000))
            .await
            .unwrap_err();

        assert!(matches!(err, PaymentError::SigningTimeout(_)));
        assert!(!client.is_pending(ResponsePath::Response));
    }
}
