//! Balance command - show an account's APT balance

use anyhow::{anyhow, Result};
use petralink_payments::{AptosRestClient, NodeConfig, PaymentConfig, UNITS_PER_NATIVE};
use rust_decimal::Decimal;

use super::Context;
use crate::ui;

pub async fn run(ctx: &Context, address: Option<String>) -> Result<()> {
    ui::header("Account Balance");

    let address = match address {
        Some(address) => address,
        None => ctx.session()?.peer_address().ok_or_else(|| {
            anyhow!("No address given and no wallet connected. Run `petralink connect` first.")
        })?,
    };
    let config = PaymentConfig::from_env()?;
    let node = NodeConfig::from_env();
    if ctx.verbose {
        ui::key_value("Node", &node.url);
    }

    let pb = ui::spinner("Querying node");
    let units = AptosRestClient::new(node)?.account_balance(&address).await;
    pb.finish_and_clear();
    let units = units?;

    let native = Decimal::from(units) / UNITS_PER_NATIVE;
    ui::key_value("Account", &address);
    ui::key_value("Balance", &format!("{} APT ({} octas)", native.normalize(), units));
    ui::key_value(
        "Value",
        &format!("{}", (native * config.fiat_per_native).round_dp(2)),
    );
    Ok(())
}
