use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use fuser::MountOption;
use serde::Deserialize;

pub const DEFAULT_GATEWAY: &str = "https://storacha.link";
const DEFAULT_TTL_SECS: u64 = 1;
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Config file (TOML). All fields optional; CLI args take precedence.
/// Default location: `{config_dir}/storachafs/config.toml`
/// (Linux: `~/.config/storachafs/config.toml`)
#[derive(Debug, Default, Deserialize)]
pub struct ConfigFile {
    pub gateway: Option<String>,
    pub entry_ttl: Option<u64>,
    pub attr_ttl: Option<u64>,
    pub timeout: Option<u64>,
    pub debug: Option<bool>,
    pub allow_other: Option<bool>,
}

impl ConfigFile {
    fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                eprintln!("Warning: failed to parse config file {path:?}: {e}");
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }
}

/// storachafs: mount a content-addressed directory read-only via an HTTP gateway.
#[derive(Parser, Debug)]
#[command(name = "storachafs", about = "Mount a gateway-served CID as a read-only filesystem")]
pub struct CliArgs {
    /// Content identifier of the root directory.
    pub cid: String,

    /// Where to mount the filesystem (created if missing).
    pub mountpoint: PathBuf,

    /// Path to config file (default: {config_dir}/storachafs/config.toml).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Gateway base URL (default: https://storacha.link).
    #[arg(short, long)]
    pub gateway: Option<String>,

    /// Kernel dentry TTL in seconds (default 1).
    #[arg(long)]
    pub entry_ttl: Option<u64>,

    /// Kernel attribute TTL in seconds (default 1).
    #[arg(long)]
    pub attr_ttl: Option<u64>,

    /// HTTP request timeout in seconds (default 30).
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Log every fetch and attribute query.
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    pub debug: Option<bool>,

    /// Allow other users to access the mount.
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    pub allow_other: Option<bool>,
}

/// Resolved application configuration.
#[derive(Debug)]
pub struct AppConfig {
    pub root_cid: String,
    pub mount_point: PathBuf,
    pub gateway_url: String,
    pub entry_ttl: Duration,
    pub attr_ttl: Duration,
    pub http_timeout: Duration,
    pub debug: bool,
    pub allow_other: bool,
}

impl AppConfig {
    pub fn from_args(args: &CliArgs) -> anyhow::Result<Self> {
        let config_path = args.config.clone().or_else(|| {
            directories::ProjectDirs::from("", "", "storachafs")
                .map(|p| p.config_dir().join("config.toml"))
        });
        let cfg = config_path
            .as_deref()
            .map(ConfigFile::load)
            .unwrap_or_default();

        Self::resolve(args, cfg)
    }

    /// Merge CLI values over config-file values over defaults.
    pub fn resolve(args: &CliArgs, cfg: ConfigFile) -> anyhow::Result<Self> {
        let root_cid = args.cid.trim().to_string();
        if root_cid.is_empty() {
            anyhow::bail!("Root CID must not be empty");
        }

        let gateway_url = args
            .gateway
            .clone()
            .or(cfg.gateway)
            .unwrap_or_else(|| DEFAULT_GATEWAY.to_string());
        if !(gateway_url.starts_with("http://") || gateway_url.starts_with("https://")) {
            anyhow::bail!("Gateway URL must start with http:// or https://, got {gateway_url:?}");
        }
        let gateway_url = gateway_url.trim_end_matches('/').to_string();

        let secs = |cli: Option<u64>, file: Option<u64>, default: u64| {
            Duration::from_secs(cli.or(file).unwrap_or(default))
        };

        Ok(Self {
            root_cid,
            mount_point: args.mountpoint.clone(),
            gateway_url,
            entry_ttl: secs(args.entry_ttl, cfg.entry_ttl, DEFAULT_TTL_SECS),
            attr_ttl: secs(args.attr_ttl, cfg.attr_ttl, DEFAULT_TTL_SECS),
            http_timeout: secs(args.timeout, cfg.timeout, DEFAULT_TIMEOUT_SECS),
            debug: args.debug.or(cfg.debug).unwrap_or(false),
            allow_other: args.allow_other.or(cfg.allow_other).unwrap_or(false),
        })
    }

    /// Ensure the mount point exists.
    pub fn ensure_dirs(&self) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.mount_point)?;
        Ok(())
    }

    pub fn mount_options(&self) -> Vec<MountOption> {
        let mut options = vec![
            MountOption::FSName(format!("storachafs-{}", self.root_cid)),
            MountOption::Subtype("storachafs".to_string()),
            MountOption::RO,
            MountOption::AutoUnmount,
            MountOption::DefaultPermissions,
        ];
        if self.allow_other {
            options.push(MountOption::AllowOther);
        }
        options
    }
}

/// Heuristic for CIDv0 (`Qm…`, 46 chars) and base32 CIDv1 (`bafy…`/`bafk…`).
/// Gateways accept other encodings too, so a miss is only worth a warning.
pub fn looks_like_cid(s: &str) -> bool {
    (s.starts_with("Qm") && s.len() == 46)
        || ((s.starts_with("bafy") || s.starts_with("bafk")) && s.len() > 50)
}
