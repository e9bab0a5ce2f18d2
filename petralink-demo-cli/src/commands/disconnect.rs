//! Disconnect command

use anyhow::Result;

use super::Context;
use crate::ui;

pub async fn run(ctx: &Context) -> Result<()> {
    let client = ctx.session()?;
    let was_active = client.snapshot().local_public_key.is_some();

    client.disconnect()?;

    if was_active {
        ui::success("Session cleared");
    } else {
        ui::info("No session to disconnect");
    }
    Ok(())
}
