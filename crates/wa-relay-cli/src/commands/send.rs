// send-text / send-template

use super::Context;
use clap::Args;
use wa_relay_core::{OutboundMessage, RelayError, RelayResult};

#[derive(Debug, Args)]
pub struct SendTextArgs {
    /// Recipient phone number in international format, digits only.
    #[arg(long)]
    pub to: String,
    #[arg(long)]
    pub body: String,
}

#[derive(Debug, Args)]
pub struct SendTemplateArgs {
    #[arg(long)]
    pub to: String,
    /// Template name as approved in WhatsApp Manager.
    #[arg(long)]
    pub name: String,
    /// Defaults to DEFAULT_LANGUAGE_CODE.
    #[arg(long)]
    pub language: Option<String>,
    /// Template components as a JSON array.
    #[arg(long)]
    pub components: Option<String>,
}

async fn deliver(ctx: &Context, message: OutboundMessage) -> RelayResult<()> {
    message.validate()?;
    if ctx.dry_run {
        println!("{}", serde_json::to_string_pretty(&message.to_payload())?);
        return Ok(());
    }
    let reply = ctx.whatsapp()?.send(&message).await?;
    println!("{}", serde_json::to_string_pretty(&reply)?);
    Ok(())
}

pub async fn send_text(ctx: &Context, args: SendTextArgs) -> RelayResult<()> {
    deliver(ctx, OutboundMessage::text(args.to, args.body)).await
}

pub async fn send_template(ctx: &Context, args: SendTemplateArgs) -> RelayResult<()> {
    let components = match args.components.as_deref() {
        Some(raw) => Some(
            serde_json::from_str(raw)
                .map_err(|e| RelayError::Validation(format!("--components is not JSON: {}", e)))?,
        ),
        None => None,
    };
    let language = args
        .language
        .unwrap_or_else(|| ctx.config.whatsapp.default_language_code.clone());
    deliver(ctx, OutboundMessage::template(args.to, args.name, language, components)).await
}
