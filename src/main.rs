use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};

use storachafs::config::{looks_like_cid, AppConfig, CliArgs};
use storachafs::fuse_fs::GatewayFs;
use storachafs::gateway::http::HttpGateway;
use storachafs::node::DirectoryNode;

fn main() -> Result<()> {
    let args = CliArgs::parse();
    let config = AppConfig::from_args(&args)?;

    // Init logging
    let default_filter = if config.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .init();

    config.ensure_dirs()?;

    if !looks_like_cid(&config.root_cid) {
        warn!(cid = %config.root_cid, "Root does not look like a CID; mounting anyway");
    }

    let gateway = Arc::new(HttpGateway::new(&config.gateway_url, config.http_timeout)?);
    info!(gateway = %gateway.base_url(), timeout = ?config.http_timeout, "Using gateway");

    let root = Arc::new(DirectoryNode::new(
        config.root_cid.clone(),
        config.debug,
        gateway,
    ));
    let fs = GatewayFs::new(root, config.entry_ttl, config.attr_ttl);

    info!(cid = %config.root_cid, "Mounting at {:?} (read-only)", config.mount_point);

    // Blocks until unmounted
    fuser::mount2(fs, &config.mount_point, &config.mount_options())?;

    info!("Unmounted. Goodbye.");
    Ok(())
}
