//! Sign-message command

use anyhow::Result;
use serde_json::json;

use super::Context;
use crate::ui;

#[tracing::instrument(skip(ctx, text))]
pub async fn run(ctx: &Context, text: &str, nonce: Option<String>) -> Result<()> {
    ui::header("Sign Message");

    let client = ctx.session()?;
    let mut payload = json!({ "message": text });
    if let Some(nonce) = nonce {
        payload["nonce"] = json!(nonce);
    }

    client.sign_message(&payload)?;
    match super::read_response(&client)? {
        Some(outcome) => super::report_outcome(&outcome),
        None => ui::info("Waiting for the wallet response."),
    }
    Ok(())
}
