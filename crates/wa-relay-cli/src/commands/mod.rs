pub mod replay;
pub mod send;
pub mod sheets;

use log::info;
use std::path::Path;
use std::sync::Arc;
use wa_relay_core::{build_gateway, http_client, Backend, RelayConfig, RelayResult, SheetGateway, WhatsAppClient};

pub struct Context {
    pub config: RelayConfig,
    pub gateway: Arc<dyn SheetGateway>,
    pub dry_run: bool,
}

impl Context {
    pub fn load(path: Option<&Path>, dry_run: bool) -> RelayResult<Self> {
        let mut config = RelayConfig::load(path)?;
        if dry_run {
            config.backend = Backend::Memory;
            config.sheets = config.effective_sheets();
            info!("[cli] Dry run: nothing leaves this process");
        }
        let gateway = build_gateway(&config, http_client()?);
        Ok(Context { config, gateway, dry_run })
    }

    pub fn whatsapp(&self) -> RelayResult<WhatsAppClient> {
        Ok(WhatsAppClient::new(http_client()?, self.config.whatsapp.clone()))
    }
}
