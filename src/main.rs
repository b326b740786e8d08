use anyhow::Result;
use tracing::info;

use launch_sentinel::{config::Config, logger, scanner};

#[tokio::main]
async fn main() -> Result<()> {
    // Load local .env if present (no-op in prod/systemd envs)
    let _ = dotenvy::dotenv();

    let cfg = Config::from_env()?;
    logger::init_tracing(cfg.log_json);
    info!(?cfg, "boot");

    scanner::run(cfg).await
}
