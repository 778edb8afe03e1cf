// wa-relay CLI: inspect sheets, reconcile rows, send messages and replay
// saved webhook deliveries without running the server.

mod commands;

use clap::{CommandFactory, Parser, Subcommand};
use commands::Context;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(name = "wa-relay", version, about = "WhatsApp Business → Google Sheets relay tools")]
struct Cli {
    /// TOML config file (env variables still override it).
    #[arg(long, global = true, env = "RELAY_CONFIG")]
    config: Option<PathBuf>,

    /// Use an in-memory spreadsheet and print outbound payloads instead of sending.
    #[arg(long, global = true)]
    dry_run: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print every row of a sheet.
    ReadTable(commands::sheets::ReadTableArgs),
    /// Write a header row into an empty sheet.
    EnsureHeaders(commands::sheets::EnsureHeadersArgs),
    /// Update fields of the row whose key column matches.
    UpdateRow(commands::sheets::UpdateRowArgs),
    /// Send a free-form text message.
    SendText(commands::send::SendTextArgs),
    /// Send an approved template message.
    SendTemplate(commands::send::SendTemplateArgs),
    /// Feed a saved webhook delivery through the dispatcher.
    Replay(commands::replay::ReplayArgs),
    /// Print shell completions.
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    if let Commands::Completions { shell } = cli.command {
        clap_complete::generate(shell, &mut Cli::command(), "wa-relay", &mut std::io::stdout());
        return ExitCode::SUCCESS;
    }

    let ctx = match Context::load(cli.config.as_deref(), cli.dry_run) {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let result = match cli.command {
        Commands::ReadTable(args) => commands::sheets::read_table(&ctx, args).await,
        Commands::EnsureHeaders(args) => commands::sheets::ensure_headers(&ctx, args).await,
        Commands::UpdateRow(args) => commands::sheets::update_row(&ctx, args).await,
        Commands::SendText(args) => commands::send::send_text(&ctx, args).await,
        Commands::SendTemplate(args) => commands::send::send_template(&ctx, args).await,
        Commands::Replay(args) => commands::replay::replay(&ctx, args).await,
        Commands::Completions { .. } => Ok(()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}
