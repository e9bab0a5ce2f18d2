//! Payment executor flows against mocked node and backend servers.
//!
//! ```bash
//! cargo test -p petralink-payments --test payment_flow
//! ```

#![cfg(feature = "http-client")]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use petralink_lib::test_utils::{MockWallet, RecordingNavigator, WalletRequest};
use petralink_lib::{DeepLinkConfig, DeepLinkOperation, MemoryStore, PetraClient};
use petralink_payments::{
    AptosRestClient, BackendConfig, ChainError, HttpConfirmationBackend, InPageWallet,
    NodeConfig, PaymentConfig, PaymentError, PaymentExecutor, PaymentRequest, RetryConfig,
    TransferPayload,
};
use rust_decimal_macros::dec;
use serde_json::json;
use wiremock::{
    matchers::{body_partial_json, method, path, path_regex},
    Mock, MockServer, ResponseTemplate,
};

const TREASURY: &str = "0x7reasury";
const TX_HASH: &str = "0x5ea1ed";

// ============================================================================
// Fixtures
// ============================================================================

struct PageWallet {
    submitted: Mutex<Vec<TransferPayload>>,
}

impl PageWallet {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            submitted: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl InPageWallet for PageWallet {
    fn is_ready(&self) -> bool {
        true
    }

    fn account_address(&self) -> Option<String> {
        Some("0xpage".to_string())
    }

    async fn sign_and_submit(
        &self,
        payload: &TransferPayload,
    ) -> petralink_payments::Result<String> {
        self.submitted.lock().unwrap().push(payload.clone());
        Ok(TX_HASH.to_string())
    }
}

struct Servers {
    node: MockServer,
    backend: MockServer,
}

impl Servers {
    async fn start() -> Self {
        Self {
            node: MockServer::start().await,
            backend: MockServer::start().await,
        }
    }

    async fn transaction_final(&self, success: bool, vm_status: &str) {
        Mock::given(method("GET"))
            .and(path(format!("/transactions/by_hash/{}", TX_HASH)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "type": "user_transaction",
                "hash": TX_HASH,
                "success": success,
                "vm_status": vm_status,
            })))
            .mount(&self.node)
            .await;
    }

    async fn backend_ok(&self) {
        Mock::given(method("POST"))
            .and(path("/api/payments/initiate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "processing"})))
            .mount(&self.backend)
            .await;
    }

    fn executor(&self, config: PaymentConfig) -> PaymentExecutor {
        let node = NodeConfig::new(self.node.uri())
            .with_poll_interval(Duration::from_millis(5))
            .with_finality_timeout(Duration::from_secs(5));
        PaymentExecutor::new(
            config,
            Arc::new(AptosRestClient::new(node).unwrap()),
            Arc::new(HttpConfirmationBackend::new(BackendConfig::new(self.backend.uri())).unwrap()),
        )
    }
}

fn config() -> PaymentConfig {
    PaymentConfig::new(TREASURY).with_retry(RetryConfig::immediate(3))
}

fn airtime() -> PaymentRequest {
    PaymentRequest::airtime(dec!(1000), "08031234567", "MTN")
}

fn connected_session() -> (Arc<PetraClient>, Arc<RecordingNavigator>, Arc<MockWallet>) {
    let nav = Arc::new(RecordingNavigator::mobile());
    let client = Arc::new(
        PetraClient::new(
            &DeepLinkConfig::new("https://bundle.example"),
            Arc::new(MemoryStore::new()),
            nav.clone(),
        )
        .unwrap(),
    );
    let wallet = Arc::new(MockWallet::new());
    client.connect().unwrap();
    client
        .handle_navigation(&wallet.approve_connect(&nav.last().unwrap()))
        .unwrap();
    (client, nav, wallet)
}

/// Wait until the session has dispatched a `signAndSubmit` request.
async fn next_sign_request(nav: &RecordingNavigator) -> url::Url {
    for _ in 0..500 {
        if let Some(url) = nav.last() {
            if WalletRequest::parse(&url).operation == DeepLinkOperation::SignAndSubmit {
                return url;
            }
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    panic!("no signAndSubmit request was dispatched");
}

#[derive(Debug, Default)]
struct Outcome {
    successes: Vec<String>,
    errors: Vec<String>,
}

async fn run(executor: &PaymentExecutor, request: PaymentRequest) -> Outcome {
    let outcome = Mutex::new(Outcome::default());
    executor
        .execute(
            request,
            |hash| outcome.lock().unwrap().successes.push(hash.to_string()),
            |err| outcome.lock().unwrap().errors.push(err.to_string()),
        )
        .await;
    outcome.into_inner().unwrap()
}

// ============================================================================
// In-page path
// ============================================================================

#[tokio::test]
async fn test_in_page_payment_succeeds() {
    let servers = Servers::start().await;
    servers.transaction_final(true, "Executed successfully").await;
    Mock::given(method("POST"))
        .and(path("/api/payments/initiate"))
        .and(body_partial_json(json!({
            "transactionHash": TX_HASH,
            "userAddress": "0xpage",
            "paymentType": "airtime",
            "details": {"phoneNumber": "08031234567", "network": "MTN"},
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&servers.backend)
        .await;

    let wallet = PageWallet::new();
    let executor = servers.executor(config()).with_in_page_wallet(wallet.clone());

    let outcome = run(&executor, airtime()).await;

    assert_eq!(outcome.successes, vec![TX_HASH.to_string()]);
    assert!(outcome.errors.is_empty());

    let submitted = wallet.submitted.lock().unwrap();
    assert_eq!(submitted.len(), 1);
    assert_eq!(submitted[0].recipient(), Some(TREASURY));
    assert_eq!(submitted[0].amount(), Some(28_571_428));
    assert!(!executor.is_busy());
}

#[tokio::test]
async fn test_small_amount_raised_to_minimum() {
    let servers = Servers::start().await;
    servers.transaction_final(true, "Executed successfully").await;
    servers.backend_ok().await;

    let wallet = PageWallet::new();
    let executor = servers.executor(config()).with_in_page_wallet(wallet.clone());

    let outcome = run(
        &executor,
        PaymentRequest::airtime(dec!(100), "08031234567", "MTN"),
    )
    .await;

    assert_eq!(outcome.successes.len(), 1);
    assert_eq!(
        wallet.submitted.lock().unwrap()[0].amount(),
        Some(10_000_000)
    );
}

#[tokio::test]
async fn test_chain_failure_reported() {
    let servers = Servers::start().await;
    servers
        .transaction_final(false, "Move abort: EINSUFFICIENT_BALANCE")
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&servers.backend)
        .await;

    let executor = servers.executor(config()).with_in_page_wallet(PageWallet::new());
    let outcome = run(&executor, airtime()).await;

    assert!(outcome.successes.is_empty());
    assert_eq!(
        outcome.errors,
        vec!["Transaction failed on chain: Move abort: EINSUFFICIENT_BALANCE".to_string()]
    );
}

#[tokio::test]
async fn test_pending_transaction_is_polled() {
    let servers = Servers::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/transactions/by_hash/{}", TX_HASH)))
        .respond_with(ResponseTemplate::new(404))
        .up_to_n_times(1)
        .mount(&servers.node)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/transactions/by_hash/{}", TX_HASH)))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"type": "pending_transaction", "hash": TX_HASH})),
        )
        .up_to_n_times(2)
        .mount(&servers.node)
        .await;
    servers.transaction_final(true, "Executed successfully").await;
    servers.backend_ok().await;

    let executor = servers.executor(config()).with_in_page_wallet(PageWallet::new());
    let outcome = run(&executor, airtime()).await;

    assert_eq!(outcome.successes, vec![TX_HASH.to_string()]);
}

// ============================================================================
// Backend confirmation
// ============================================================================

#[tokio::test]
async fn test_backend_retried_until_success() {
    let servers = Servers::start().await;
    servers.transaction_final(true, "Executed successfully").await;
    Mock::given(method("POST"))
        .and(path("/api/payments/initiate"))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({"error": "busy"})))
        .up_to_n_times(2)
        .expect(2)
        .mount(&servers.backend)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/payments/initiate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&servers.backend)
        .await;

    let executor = servers.executor(config()).with_in_page_wallet(PageWallet::new());
    let outcome = run(&executor, airtime()).await;

    assert_eq!(outcome.successes, vec![TX_HASH.to_string()]);
    assert!(outcome.errors.is_empty());
}

#[tokio::test]
async fn test_backend_exhaustion_reports_backend_error() {
    let servers = Servers::start().await;
    servers.transaction_final(true, "Executed successfully").await;
    Mock::given(method("POST"))
        .and(path("/api/payments/initiate"))
        .respond_with(
            ResponseTemplate::new(500).set_body_json(json!({"error": "Nodit unavailable"})),
        )
        .expect(3)
        .mount(&servers.backend)
        .await;

    let executor = servers.executor(config()).with_in_page_wallet(PageWallet::new());
    let outcome = run(&executor, airtime()).await;

    assert!(outcome.successes.is_empty());
    assert_eq!(
        outcome.errors,
        vec!["Payment verification failed: Nodit unavailable".to_string()]
    );
}

#[tokio::test]
async fn test_backend_client_error_not_retried() {
    let servers = Servers::start().await;
    servers.transaction_final(true, "Executed successfully").await;
    Mock::given(method("POST"))
        .and(path("/api/payments/initiate"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({"error": "Invalid account number"})),
        )
        .expect(1)
        .mount(&servers.backend)
        .await;

    let executor = servers.executor(config()).with_in_page_wallet(PageWallet::new());
    let err = executor
        .try_execute(&PaymentRequest::bank(
            dec!(5000),
            "GTBank",
            "0123456789",
            "Ada Obi",
        ))
        .await
        .unwrap_err();

    assert!(matches!(err, PaymentError::BackendConfirmationFailure(_)));
    assert_eq!(
        err.user_message(),
        "Payment verification failed: Invalid account number"
    );
}

// ============================================================================
// Deep-link path
// ============================================================================

#[tokio::test]
async fn test_deep_link_payment_succeeds() {
    let servers = Servers::start().await;
    servers.transaction_final(true, "Executed successfully").await;
    Mock::given(method("POST"))
        .and(path("/api/payments/initiate"))
        .and(body_partial_json(json!({"userAddress": MockWallet::new().address()})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&servers.backend)
        .await;

    let (session, nav, wallet) = connected_session();
    let executor = servers
        .executor(config())
        .with_deep_link_session(session.clone());

    let responder = {
        let session = session.clone();
        let nav = nav.clone();
        let wallet = wallet.clone();
        tokio::spawn(async move {
            let request = next_sign_request(&nav).await;
            let payload = wallet.decrypt_payload(&request);
            session
                .handle_navigation(&wallet.approve_transaction(&request, TX_HASH))
                .unwrap();
            payload
        })
    };

    let outcome = run(&executor, airtime()).await;
    let payload = responder.await.unwrap();

    assert_eq!(outcome.successes, vec![TX_HASH.to_string()]);
    assert_eq!(payload["function"], "0x1::aptos_account::transfer");
    assert_eq!(payload["arguments"], json!([TREASURY, "28571428"]));
}

#[tokio::test]
async fn test_deep_link_rejection() {
    let servers = Servers::start().await;
    let (session, nav, wallet) = connected_session();
    let executor = servers
        .executor(config())
        .with_deep_link_session(session.clone());

    let responder = {
        let session = session.clone();
        tokio::spawn(async move {
            let request = next_sign_request(&nav).await;
            session.handle_navigation(&wallet.reject(&request)).unwrap();
        })
    };

    let outcome = run(&executor, airtime()).await;
    responder.await.unwrap();

    assert_eq!(outcome.errors, vec!["Transaction rejected by user".to_string()]);
    assert!(session.is_connected());
}

#[tokio::test]
async fn test_deep_link_timeout() {
    let servers = Servers::start().await;
    let (session, _nav, _wallet) = connected_session();
    let executor = servers
        .executor(config().with_sign_timeout(Duration::ZERO))
        .with_deep_link_session(session.clone());

    let outcome = run(&executor, airtime()).await;

    assert_eq!(outcome.errors, vec!["Transaction signing timeout".to_string()]);
    assert!(outcome.successes.is_empty());
    assert!(!executor.is_busy());
}

#[tokio::test]
async fn test_concurrent_payment_rejected() {
    let servers = Servers::start().await;
    let (session, nav, wallet) = connected_session();
    let executor = Arc::new(
        servers
            .executor(config())
            .with_deep_link_session(session.clone()),
    );

    let first = {
        let executor = executor.clone();
        tokio::spawn(async move { executor.try_execute(&airtime()).await })
    };

    let request = next_sign_request(&nav).await;
    assert!(executor.is_busy());
    assert!(matches!(
        executor.try_execute(&airtime()).await,
        Err(PaymentError::PaymentInProgress)
    ));

    session.handle_navigation(&wallet.reject(&request)).unwrap();
    assert!(matches!(
        first.await.unwrap(),
        Err(PaymentError::SigningRejected)
    ));
    assert!(!executor.is_busy());
}

// ============================================================================
// Preconditions
// ============================================================================

#[tokio::test]
async fn test_no_signing_method() {
    let servers = Servers::start().await;
    let executor = servers.executor(config());

    let outcome = run(&executor, airtime()).await;
    assert_eq!(
        outcome.errors,
        vec!["No valid wallet connection method available".to_string()]
    );
}

#[tokio::test]
async fn test_missing_treasury() {
    let servers = Servers::start().await;
    let executor = servers
        .executor(PaymentConfig::default())
        .with_in_page_wallet(PageWallet::new());

    let err = executor.try_execute(&airtime()).await.unwrap_err();
    assert!(matches!(err, PaymentError::Configuration(_)));
}

#[tokio::test]
async fn test_invalid_request() {
    let servers = Servers::start().await;
    let executor = servers
        .executor(config())
        .with_in_page_wallet(PageWallet::new());

    let mut request = PaymentRequest::bank(dec!(1000), "GTBank", "", "Ada Obi");
    request.details.account_number = None;
    let err = executor.try_execute(&request).await.unwrap_err();
    assert!(matches!(err, PaymentError::InvalidRequest(_)));
}

// ============================================================================
// Account balance
// ============================================================================

fn node_client(servers: &Servers) -> AptosRestClient {
    AptosRestClient::new(NodeConfig::new(servers.node.uri())).unwrap()
}

#[tokio::test]
async fn test_account_balance_read_from_coin_store() {
    let servers = Servers::start().await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/accounts/0xabc/resource/0x1::coin::CoinStore"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "type": "0x1::coin::CoinStore<0x1::aptos_coin::AptosCoin>",
            "data": {"coin": {"value": "150000000"}, "frozen": false},
        })))
        .expect(1)
        .mount(&servers.node)
        .await;

    let units = node_client(&servers).account_balance("0xabc").await.unwrap();
    assert_eq!(units, 150_000_000);
}

#[tokio::test]
async fn test_account_without_coin_store_has_zero_balance() {
    let servers = Servers::start().await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/accounts/0xfresh/resource/"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error_code": "resource_not_found",
        })))
        .mount(&servers.node)
        .await;

    let units = node_client(&servers).account_balance("0xfresh").await.unwrap();
    assert_eq!(units, 0);
}

#[tokio::test]
async fn test_account_balance_node_error() {
    let servers = Servers::start().await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/accounts/"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .mount(&servers.node)
        .await;

    let err = node_client(&servers).account_balance("0xabc").await.unwrap_err();
    assert!(matches!(err, ChainError::Status { status: 503, .. }));
}
