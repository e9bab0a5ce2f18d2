//! Status command - show the persisted session

use anyhow::Result;

use super::Context;
use crate::ui;

pub async fn run(ctx: &Context) -> Result<()> {
    ui::header("Wallet Session");

    let client = ctx.session()?;
    let snapshot = client.snapshot();

    ui::key_value("Status", &snapshot.status.to_string());
    ui::key_value(
        "Wallet",
        snapshot.peer_address.as_deref().unwrap_or("(none)"),
    );
    if ctx.verbose {
        ui::key_value(
            "Session key",
            snapshot.local_public_key.as_deref().unwrap_or("(none)"),
        );
        ui::key_value("Storage", &ctx.session_path().display().to_string());
    }
    Ok(())
}
