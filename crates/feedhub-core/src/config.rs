use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub qiita: QiitaConfig,
    #[serde(default)]
    pub hatena: HatenaConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            sync: SyncConfig::default(),
            qiita: QiitaConfig::default(),
            hatena: HatenaConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Data directory path
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// HTTP request timeout in seconds
    #[serde(default = "default_timeout")]
    pub request_timeout_secs: u64,
    /// Per-provider fetch deadline during aggregation, in seconds.
    /// Bounds each provider independently so one slow source cannot
    /// stall the whole run.
    #[serde(default = "default_provider_timeout")]
    pub provider_timeout_secs: u64,
    /// Background aggregation interval in seconds (0 disables)
    #[serde(default = "default_aggregate_interval")]
    pub aggregate_interval_secs: u64,
    /// Refresh mutable article fields (title, summary, content) when a
    /// previously seen article comes back from a provider. When false,
    /// first write wins.
    #[serde(default = "default_true")]
    pub refresh_existing: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_timeout(),
            provider_timeout_secs: default_provider_timeout(),
            aggregate_interval_secs: default_aggregate_interval(),
            refresh_existing: default_true(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QiitaConfig {
    /// Qiita API v2 base URL
    #[serde(default = "default_qiita_base_url")]
    pub base_url: String,
    /// Optional personal access token (raises the rate limit)
    #[serde(default)]
    pub access_token: Option<String>,
    /// Items requested per page
    #[serde(default = "default_qiita_per_page")]
    pub per_page: u32,
    /// Maximum pages to follow in a single aggregation run
    #[serde(default = "default_qiita_max_pages")]
    pub max_pages: u32,
}

impl Default for QiitaConfig {
    fn default() -> Self {
        Self {
            base_url: default_qiita_base_url(),
            access_token: None,
            per_page: default_qiita_per_page(),
            max_pages: default_qiita_max_pages(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HatenaConfig {
    /// Atom feed URL (single page, no pagination)
    #[serde(default = "default_hatena_feed_url")]
    pub feed_url: String,
}

impl Default for HatenaConfig {
    fn default() -> Self {
        Self {
            feed_url: default_hatena_feed_url(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("feedhub")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_timeout() -> u64 {
    30
}

fn default_provider_timeout() -> u64 {
    20
}

fn default_aggregate_interval() -> u64 {
    3600 // 1 hour
}

fn default_qiita_base_url() -> String {
    "https://qiita.com/api/v2".to_string()
}

fn default_qiita_per_page() -> u32 {
    20
}

fn default_qiita_max_pages() -> u32 {
    3
}

fn default_hatena_feed_url() -> String {
    "https://b.hatena.ne.jp/hotentry/it.rss".to_string()
}

/// Expand tilde (~) in path to user's home directory
fn expand_tilde(path: &std::path::Path) -> PathBuf {
    if let Some(path_str) = path.to_str() {
        if let Some(stripped) = path_str.strip_prefix("~/") {
            if let Some(home) = dirs::home_dir() {
                return home.join(stripped);
            }
        } else if path_str == "~" {
            if let Some(home) = dirs::home_dir() {
                return home;
            }
        }
    }
    path.to_path_buf()
}

impl AppConfig {
    /// Load configuration from file or return defaults
    pub fn load() -> crate::Result<Self> {
        let config_path = Self::config_path();

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content).map_err(|e| crate::Error::Config(e.to_string()))
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> crate::Result<()> {
        let config_path = Self::config_path();

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content =
            toml::to_string_pretty(self).map_err(|e| crate::Error::Config(e.to_string()))?;
        std::fs::write(&config_path, content)?;

        Ok(())
    }

    /// Get the configuration file path
    pub fn config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
            .join("feedhub")
            .join("config.toml")
    }

    /// Get the database file path
    pub fn database_path(&self) -> PathBuf {
        self.data_dir().join("feedhub.db")
    }

    /// Get the Unix socket path for IPC
    pub fn socket_path(&self) -> PathBuf {
        self.data_dir().join("feedhub.sock")
    }

    /// Get the data directory (with tilde expansion)
    pub fn data_dir(&self) -> PathBuf {
        expand_tilde(&self.general.data_dir)
    }
}
