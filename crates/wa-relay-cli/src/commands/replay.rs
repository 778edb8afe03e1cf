// replay: run a saved webhook body through the dispatcher in the foreground.

use super::Context;
use clap::Args;
use std::path::PathBuf;
use wa_relay_core::events::WebhookPayload;
use wa_relay_core::{DispatchTables, Dispatcher, RelayResult};

#[derive(Debug, Args)]
pub struct ReplayArgs {
    /// JSON file holding one webhook delivery body.
    pub file: PathBuf,
    /// Apply only the campaign markers, as the bulk-send route does.
    #[arg(long)]
    pub campaign_only: bool,
}

pub async fn replay(ctx: &Context, args: ReplayArgs) -> RelayResult<()> {
    let raw = std::fs::read_to_string(&args.file)?;
    let payload: WebhookPayload = serde_json::from_str(&raw)?;

    let tables = DispatchTables::from_config(&ctx.config.sheets)?;
    let dispatcher = Dispatcher::new(ctx.gateway.clone(), tables, ctx.config.tz()?);
    if ctx.dry_run {
        dispatcher.prepare_tables().await;
    }

    let report = if args.campaign_only {
        dispatcher.dispatch_campaign(&payload).await
    } else {
        dispatcher.dispatch(&payload).await
    };
    println!("{}", report);
    Ok(())
}
