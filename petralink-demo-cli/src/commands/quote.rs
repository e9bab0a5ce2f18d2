//! Quote command - show the transfer for a fiat amount

use anyhow::Result;
use petralink_payments::{quote, FixedRate, PaymentConfig};
use rust_decimal::Decimal;

use crate::ui;

pub async fn run(amount: Decimal) -> Result<()> {
    let config = PaymentConfig::from_env()?;
    let q = quote(
        amount,
        &FixedRate(config.fiat_per_native),
        config.min_native_amount,
    )?;

    ui::header("Payment Quote");
    ui::key_value("Fiat amount", &q.fiat_amount.to_string());
    ui::key_value("Rate", &format!("{} per APT", config.fiat_per_native));
    ui::key_value(
        "Transfer",
        &format!("{} APT ({} octas)", q.native_amount(), q.units),
    );
    if q.clamped() {
        ui::warning(&format!(
            "Raised to the minimum transfer of {} APT",
            config.min_native_amount
        ));
    }
    Ok(())
}
