use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::progress::DEFAULT_PROGRESS_THRESHOLD;

/// Curl transport parameters (optional `[transport]` section in config.toml).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Seconds allowed for the TCP/TLS connect phase.
    pub connect_timeout_secs: u64,
    /// A transfer slower than this many bytes/s for `low_speed_time_secs` is interrupted.
    pub low_speed_limit_bytes: u32,
    pub low_speed_time_secs: u64,
    /// Maximum redirects followed per request.
    pub max_redirections: u32,
    /// Optional per-transfer receive cap in bytes per second (None = no cap).
    #[serde(default)]
    pub max_bytes_per_sec: Option<u64>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 30,
            low_speed_limit_bytes: 1024,
            low_speed_time_secs: 60,
            max_redirections: 10,
            max_bytes_per_sec: None,
        }
    }
}

/// Global configuration loaded from `~/.config/sdm/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SdmConfig {
    /// Maximum transfers running at once, across all hosts.
    pub max_concurrent_downloads: usize,
    /// Minimum progress delta between two progress-only notifications.
    pub progress_threshold: f64,
    /// Where completed downloads are placed (None = current directory).
    #[serde(default)]
    pub download_dir: Option<PathBuf>,
    /// Where partial downloads are staged (None = `~/.local/state/sdm/partial`).
    #[serde(default)]
    pub staging_dir: Option<PathBuf>,
    #[serde(default)]
    pub transport: TransportConfig,
}

impl Default for SdmConfig {
    fn default() -> Self {
        Self {
            max_concurrent_downloads: 3,
            progress_threshold: DEFAULT_PROGRESS_THRESHOLD,
            download_dir: None,
            staging_dir: None,
            transport: TransportConfig::default(),
        }
    }
}

impl SdmConfig {
    /// Concurrency limit, never below one.
    pub fn concurrency_limit(&self) -> usize {
        self.max_concurrent_downloads.max(1)
    }

    /// Configured staging dir, or the XDG state default.
    pub fn staging_dir_or_default(&self) -> Result<PathBuf> {
        match &self.staging_dir {
            Some(dir) => Ok(dir.clone()),
            None => {
                let xdg_dirs = xdg::BaseDirectories::with_prefix("sdm")?;
                Ok(xdg_dirs.get_state_home().join("partial"))
            }
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("sdm")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Unix socket a running `sdm run` listens on: `~/.local/state/sdm/control.sock`.
pub fn control_socket_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("sdm")?;
    Ok(xdg_dirs.place_state_file("control.sock")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<SdmConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = SdmConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: SdmConfig = toml::from_str(&data)?;
    Ok(cfg)
}
