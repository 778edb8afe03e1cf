// wa-relay-server: entry point
//
//   wa-relay-server [CONFIG.toml]
//
// Config path: first argument, else $RELAY_CONFIG, else ./wa-relay.toml when
// present. Environment variables override the file (see wa_relay_core::config).

use log::{error, info, warn};
use std::path::PathBuf;
use std::process::ExitCode;
use wa_relay::{router, AppState};
use wa_relay_core::{build_gateway, http_client, RelayConfig, RelayResult};

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("[server] {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> RelayResult<()> {
    let config_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("RELAY_CONFIG").ok())
        .filter(|p| !p.trim().is_empty())
        .map(PathBuf::from);
    let config = RelayConfig::load(config_path.as_deref())?;

    let http = http_client()?;
    let gateway = build_gateway(&config, http.clone());
    let state = AppState::from_config(&config, gateway, http)?;

    if config.app_secret.is_none() {
        warn!("[server] APP_SECRET not set, webhook signatures are not verified");
    }

    let dispatcher = state.dispatcher.clone();
    tokio::spawn(async move { dispatcher.prepare_tables().await });

    let addr = config.listen_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(
        "[server] Listening on {} (backend={}, static={})",
        addr,
        state.dispatcher.gateway().backend(),
        config.static_dir.display()
    );

    axum::serve(listener, router(state, &config.static_dir))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("[server] Stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("[server] Could not install Ctrl-C handler: {}", e);
        std::future::pending::<()>().await;
    }
    info!("[server] Shutdown requested");
}
