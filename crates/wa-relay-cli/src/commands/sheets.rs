// read-table / ensure-headers / update-row

use super::Context;
use clap::{Args, ValueEnum};
use wa_relay_core::events::{self, MESSAGE_LOG_HEADERS, STATUS_LOG_HEADERS};
use wa_relay_core::{ReconcileOutcome, Reconciler, RelayResult, TableRef, UpdateRequest};

#[derive(Debug, Args)]
pub struct ReadTableArgs {
    /// Sheet (tab) name.
    #[arg(long)]
    pub sheet: String,
    /// Spreadsheet id; defaults to SPREADSHEET_ID.
    #[arg(long)]
    pub spreadsheet: Option<String>,
    /// Print the rows as a JSON array of arrays.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum HeaderPreset {
    Messages,
    Statuses,
}

impl HeaderPreset {
    fn headers(self) -> Vec<String> {
        match self {
            HeaderPreset::Messages => events::headers(&MESSAGE_LOG_HEADERS),
            HeaderPreset::Statuses => events::headers(&STATUS_LOG_HEADERS),
        }
    }
}

#[derive(Debug, Args)]
pub struct EnsureHeadersArgs {
    #[arg(long)]
    pub sheet: String,
    #[arg(long)]
    pub spreadsheet: Option<String>,
    /// Header set of one of the relay's log sheets.
    #[arg(long, value_enum, conflicts_with = "header", required_unless_present = "header")]
    pub preset: Option<HeaderPreset>,
    /// Explicit header cells, in order.
    #[arg(long, num_args = 1..)]
    pub header: Vec<String>,
}

#[derive(Debug, Args)]
pub struct UpdateRowArgs {
    #[arg(long)]
    pub sheet: String,
    #[arg(long)]
    pub spreadsheet: Option<String>,
    /// Column identifying the row; defaults to the campaign key column.
    #[arg(long)]
    pub key_column: Option<String>,
    /// Value to look for in the key column.
    #[arg(long)]
    pub key: String,
    /// COLUMN=VALUE, repeatable.
    #[arg(long, value_parser = parse_assignment)]
    pub set: Vec<(String, String)>,
}

fn parse_assignment(raw: &str) -> Result<(String, String), String> {
    let (column, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected COLUMN=VALUE, got '{}'", raw))?;
    if column.trim().is_empty() {
        return Err("column name must not be empty".into());
    }
    Ok((column.trim().to_string(), value.to_string()))
}

fn table_ref(ctx: &Context, spreadsheet: Option<&str>, sheet: &str) -> RelayResult<TableRef> {
    ctx.config.sheets.table(spreadsheet, sheet)
}

pub async fn read_table(ctx: &Context, args: ReadTableArgs) -> RelayResult<()> {
    let table = table_ref(ctx, args.spreadsheet.as_deref(), &args.sheet)?;
    let rows = ctx.gateway.read_table(&table).await?.into_rows();
    if args.json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else {
        for row in &rows {
            println!("{}", row.join("\t"));
        }
        eprintln!("{} rows from {}", rows.len(), table);
    }
    Ok(())
}

pub async fn ensure_headers(ctx: &Context, args: EnsureHeadersArgs) -> RelayResult<()> {
    let table = table_ref(ctx, args.spreadsheet.as_deref(), &args.sheet)?;
    let headers = match args.preset {
        Some(preset) => preset.headers(),
        None => args.header,
    };
    if ctx.gateway.ensure_headers(&table, &headers).await? {
        println!("Wrote {} headers to {}", headers.len(), table);
    } else {
        println!("{} already has a header row", table);
    }
    Ok(())
}

pub async fn update_row(ctx: &Context, args: UpdateRowArgs) -> RelayResult<()> {
    let table = table_ref(ctx, args.spreadsheet.as_deref(), &args.sheet)?;
    let key_column = args.key_column.unwrap_or_else(|| ctx.config.sheets.campaign.key.clone());
    let request = UpdateRequest {
        table,
        key_column,
        key_value: args.key,
        updates: args.set,
    };

    match Reconciler::new(ctx.gateway.clone()).reconcile(&request).await? {
        ReconcileOutcome::Updated { row_index, values, ignored } => {
            println!("Updated row {}: {}", row_index + 1, values.join(" | "));
            if !ignored.is_empty() {
                println!("Ignored columns not in header: {}", ignored.join(", "));
            }
        }
        ReconcileOutcome::NotFound => {
            println!("No row with {} = {}", request.key_column, request.key_value)
        }
        ReconcileOutcome::EmptyTable => println!("{} has no header row", request.table),
    }
    Ok(())
}
