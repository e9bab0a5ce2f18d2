//! Connect command - start the wallet handshake

use anyhow::Result;

use super::Context;
use crate::ui;

#[tracing::instrument(skip(ctx))]
pub async fn run(ctx: &Context) -> Result<()> {
    ui::header("Connect Petra Wallet");

    let client = ctx.session()?;
    if client.is_connected() {
        let address = client.peer_address().unwrap_or_default();
        ui::info(&format!("Already connected to {}", address));
        if !ui::is_interactive() || !ui::confirm("Start a new session?", false)? {
            return Ok(());
        }
    }

    client.connect()?;
    ui::info("Approve the connection in Petra.");

    match super::read_response(&client)? {
        Some(outcome) => super::report_outcome(&outcome),
        None => ui::info("Session is waiting for the wallet."),
    }
    Ok(())
}
