//! Payment executor.
//!
//! One call runs the whole flow:
//!
//! 1. pick a signing path ([`select_signer`])
//! 2. convert the fiat amount ([`quote`])
//! 3. sign and submit the transfer
//! 4. wait for finality on chain
//! 5. confirm with the backend under the retry policy
//!
//! and ends in exactly one of `on_success(hash)` / `on_error(message)`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use petralink_lib::PetraClient;
use rust_decimal::Decimal;

use crate::backend::{ConfirmationBackend, ConfirmationRequest};
use crate::chain::FinalityClient;
use crate::config::PaymentConfig;
use crate::currency::{quote, ExchangeRate, FixedRate, Quote};
use crate::request::{PaymentRequest, TransferPayload};
use crate::retry::with_retry;
use crate::signer::{select_signer, InPageWallet, SigningPath};
use crate::{PaymentError, Result};

/// A completed payment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PaymentReceipt {
    pub transaction_hash: String,
    pub sender: String,
    pub units: u64,
    pub path: SigningPath,
    /// Backend response body.
    pub confirmation: serde_json::Value,
}

/// Clears the in-progress flag on every exit path.
struct BusyGuard<'a>(&'a AtomicBool);

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| PaymentError::PaymentInProgress)?;
        Ok(Self(flag))
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Runs payments end to end.
pub struct PaymentExecutor {
    config: PaymentConfig,
    rate: Arc<dyn ExchangeRate>,
    in_page: Option<Arc<dyn InPageWallet>>,
    session: Option<Arc<PetraClient>>,
    finality: Arc<dyn FinalityClient>,
    backend: Arc<dyn ConfirmationBackend>,
    busy: AtomicBool,
}

impl PaymentExecutor {
    pub fn new(
        config: PaymentConfig,
        finality: Arc<dyn FinalityClient>,
        backend: Arc<dyn ConfirmationBackend>,
    ) -> Self {
        let rate = Arc::new(FixedRate(config.fiat_per_native));
        Self {
            config,
            rate,
            in_page: None,
            session: None,
            finality,
            backend,
            busy: AtomicBool::new(false),
        }
    }

    pub fn with_in_page_wallet(mut self, wallet: Arc<dyn InPageWallet>) -> Self {
        self.in_page = Some(wallet);
        self
    }

    pub fn with_deep_link_session(mut self, session: Arc<PetraClient>) -> Self {
        self.session = Some(session);
        self
    }

    pub fn with_exchange_rate(mut self, rate: Arc<dyn ExchangeRate>) -> Self {
        self.rate = rate;
        self
    }

    pub fn config(&self) -> &PaymentConfig {
        &self.config
    }

    /// Whether a payment is currently running.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Convert a fiat amount with the configured rate and minimum.
    pub fn quote(&self, fiat_amount: Decimal) -> Result<Quote> {
        quote(fiat_amount, self.rate.as_ref(), self.config.min_native_amount)
    }

    /// Run a payment and report through exactly one callback.
    pub async fn execute<S, E>(&self, request: PaymentRequest, on_success: S, on_error: E)
    where
        S: FnOnce(&str),
        E: FnOnce(&str),
    {
        match self.try_execute(&request).await {
            Ok(receipt) => on_success(&receipt.transaction_hash),
            Err(e) => on_error(&e.user_message()),
        }
    }

    /// Run a payment, returning the receipt or the first error.
    #[tracing::instrument(skip(self, request), fields(category = %request.category))]
    pub async fn try_execute(&self, request: &PaymentRequest) -> Result<PaymentReceipt> {
        let _busy = BusyGuard::acquire(&self.busy)?;

        request.validate()?;
        let signer = select_signer(
            self.in_page.as_ref(),
            self.session.as_ref(),
            self.config.sign_timeout(),
        )?;
        let treasury = self.config.treasury()?;
        let quote = self.quote(request.details.amount)?;
        if quote.clamped() {
            tracing::debug!(
                converted = quote.converted_units,
                minimum = quote.units,
                "Raised transfer to minimum"
            );
        }

        let payload = TransferPayload::transfer(treasury, quote.units);
        tracing::info!(path = %signer.path(), units = quote.units, "Submitting transfer");
        let signed = signer.sign(&payload).await?;
        tracing::info!(hash = %signed.hash, "Transfer submitted, waiting for finality");

        let outcome = self.finality.wait_for_transaction(&signed.hash).await?;
        if !outcome.success {
            return Err(PaymentError::ChainFinalityFailure {
                hash: signed.hash,
                vm_status: outcome.vm_status,
            });
        }

        let confirmation = ConfirmationRequest {
            transaction_hash: signed.hash.clone(),
            user_address: signed.sender.clone(),
            payment_type: request.category,
            details: request.details.clone(),
        };
        let response = with_retry(
            &self.config.retry,
            |e: &crate::backend::BackendError| e.is_retryable(),
            || self.backend.confirm(&confirmation),
        )
        .await
        .map_err(PaymentError::BackendConfirmationFailure)?;

        tracing::info!(hash = %signed.hash, "Payment confirmed");
        Ok(PaymentReceipt {
            transaction_hash: signed.hash,
            sender: signed.sender,
            units: quote.units,
            path: signed.path,
            confirmation: response,
        })
    }
}
