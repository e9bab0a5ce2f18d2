//! Pay command - run a payment over the deep-link session
//!
//! The transfer request is shown as a link/QR code. The URL Petra redirects to
//! is read from stdin, one per line, until the payment settles or the signing
//! timeout runs out.

use std::cell::RefCell;
use std::sync::{Arc, Mutex};

use anyhow::{bail, Result};
use indicatif::ProgressBar;
use petralink_lib::{PetraClient, SignResponse};
use petralink_payments::{
    AptosRestClient, BackendConfig, HttpConfirmationBackend, NodeConfig, PaymentConfig,
    PaymentExecutor, PaymentRequest,
};
use tokio::io::{AsyncBufReadExt, BufReader};

use super::Context;
use crate::ui;

#[tracing::instrument(skip(ctx, request, treasury), fields(category = %request.category))]
pub async fn run(ctx: &Context, request: PaymentRequest, treasury: Option<String>) -> Result<()> {
    ui::header("Pay with Petra");

    let client = ctx.session()?;
    if !client.is_connected() {
        bail!("Wallet not connected. Run `petralink connect` first.");
    }

    let mut config = PaymentConfig::from_env()?;
    if let Some(treasury) = treasury {
        config.treasury_address = Some(treasury);
    }

    let executor = PaymentExecutor::new(
        config,
        Arc::new(AptosRestClient::new(NodeConfig::from_env())?),
        Arc::new(HttpConfirmationBackend::new(BackendConfig::from_env())?),
    )
    .with_deep_link_session(client.clone());

    let quote = executor.quote(request.details.amount)?;
    ui::key_value("Amount", &request.details.amount.to_string());
    ui::key_value("Transfer", &format!("{} APT", quote.native_amount()));
    ui::key_value("Wallet", &client.peer_address().unwrap_or_default());
    if ctx.verbose {
        ui::json(&serde_json::to_value(&request.details)?);
    }

    let progress: Arc<Mutex<Option<ProgressBar>>> = Arc::new(Mutex::new(None));
    let subscription = client.on_sign_response({
        let progress = progress.clone();
        move |response| {
            if matches!(response, SignResponse::Approved(_)) {
                if let Ok(mut slot) = progress.lock() {
                    *slot = Some(ui::spinner("Waiting for finality and confirmation"));
                }
            }
            Ok(())
        }
    })?;
    let responder = tokio::spawn(route_stdin(client.clone()));

    let result: RefCell<Result<String, String>> =
        RefCell::new(Err("payment did not run".to_string()));
    executor
        .execute(
            request,
            |hash| *result.borrow_mut() = Ok(hash.to_string()),
            |err| *result.borrow_mut() = Err(err.to_string()),
        )
        .await;
    responder.abort();
    client.unsubscribe(subscription);
    if let Some(pb) = progress.lock().ok().and_then(|mut slot| slot.take()) {
        pb.finish_and_clear();
    }

    match result.into_inner() {
        Ok(hash) => {
            ui::success("Payment confirmed");
            ui::key_value("Transaction", &hash);
            Ok(())
        }
        Err(message) => bail!(message),
    }
}

/// Feed every line on stdin to the session as an inbound navigation.
async fn route_stdin(client: Arc<PetraClient>) {
    ui::info("After approving in Petra, paste the URL it redirected to:");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match client.handle_navigation_str(line) {
            Ok(outcome) => super::report_outcome(&outcome),
            Err(e) => ui::error(&e.to_string()),
        }
    }
}
