//! Open command - route a URL as if the browser had navigated to it

use anyhow::Result;

use super::Context;

pub async fn run(ctx: &Context, url: &str) -> Result<()> {
    let client = ctx.session()?;
    let outcome = client.handle_navigation_str(url)?;
    super::report_outcome(&outcome);
    Ok(())
}
