//! lodge-ops daemon — receives signed chat commands and orchestrates the
//! Lodge automation workflows.

use anyhow::{Context, Result};
use tracing::info;

use lo_bridge::state::AppState;
use lo_core::config::OpsConfig;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> Result<()> {
    let config = OpsConfig::from_env();

    if config.log_json {
        lo_telemetry::logging::init_logging_json("lodge-ops", &config.log_level);
    } else {
        lo_telemetry::logging::init_logging("lodge-ops", &config.log_level);
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = std::process::id(),
        repo = %format!("{}/{}", config.github_owner, config.github_repo),
        alerts = config.enable_alerts,
        "lodge-ops starting"
    );
    if config.chat_public_key.is_none() {
        tracing::warn!("LODGE_CHAT_PUBLIC_KEY is not set; all inbound events will be rejected");
    }

    let bind_addr = config.bind_addr.clone();
    let state = AppState::from_config(config).context("failed to build application state")?;

    lo_bridge::server::serve(state, &bind_addr)
        .await
        .context("server exited with an error")?;

    info!("lodge-ops stopped");
    Ok(())
}
