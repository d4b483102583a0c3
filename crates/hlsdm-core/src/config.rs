use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Browser-like User-Agent; some CDNs refuse playlist requests without one.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// HTTP transport parameters (optional `[http]` section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Connect timeout in seconds for playlist and segment requests.
    pub connect_timeout_secs: u64,
    /// Hard timeout in seconds for a single segment GET.
    pub segment_timeout_secs: u64,
    /// User-Agent header sent with every request.
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 30,
            segment_timeout_secs: 300,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl HttpConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs.max(1))
    }

    pub fn segment_timeout(&self) -> Duration {
        Duration::from_secs(self.segment_timeout_secs.max(1))
    }
}

/// Global configuration loaded from `~/.config/hlsdm/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HlsdmConfig {
    /// Segments fetched at once for a single download (1–8).
    pub segment_concurrency: usize,
    /// Streams downloaded at once inside a queue (1–5).
    pub queue_max_concurrent: usize,
    /// Segments fetched at once per queue item (1–8), independent of `queue_max_concurrent`.
    pub queue_segment_concurrency: usize,
    /// Automatic retries for a failed queue item.
    pub max_retries: u32,
    /// Fixed delay before a failed queue item is re-dispatched, in milliseconds.
    pub retry_delay_ms: u64,
    /// Extension of merged output files.
    pub output_extension: String,
    /// Where merged files are written (None = current directory).
    #[serde(default)]
    pub download_dir: Option<PathBuf>,
    /// Maximum number of entries kept in the download history.
    pub history_limit: usize,
    #[serde(default)]
    pub http: HttpConfig,
}

impl Default for HlsdmConfig {
    fn default() -> Self {
        Self {
            segment_concurrency: 4,
            queue_max_concurrent: 2,
            queue_segment_concurrency: 4,
            max_retries: 3,
            retry_delay_ms: 2000,
            output_extension: "mp4".to_string(),
            download_dir: None,
            history_limit: 100,
            http: HttpConfig::default(),
        }
    }
}

pub const SEGMENT_CONCURRENCY_RANGE: (usize, usize) = (1, 8);
pub const QUEUE_CONCURRENCY_RANGE: (usize, usize) = (1, 5);

/// Clamp a per-download segment concurrency into 1–8.
pub fn clamp_segment_concurrency(n: usize) -> usize {
    n.clamp(SEGMENT_CONCURRENCY_RANGE.0, SEGMENT_CONCURRENCY_RANGE.1)
}

/// Clamp a queue's stream concurrency into 1–5.
pub fn clamp_queue_concurrency(n: usize) -> usize {
    n.clamp(QUEUE_CONCURRENCY_RANGE.0, QUEUE_CONCURRENCY_RANGE.1)
}

impl HlsdmConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("hlsdm")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<HlsdmConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = HlsdmConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: HlsdmConfig = toml::from_str(&data)?;
    Ok(cfg)
}
