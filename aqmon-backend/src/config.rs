use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::module::feed::build_initial_url;

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    #[serde(default)]
    pub feed: FeedConfig,

    #[serde(default)]
    pub sync: SyncConfig,

    #[serde(default)]
    pub view: ViewConfig,

    #[serde(default)]
    pub tour: TourConfig,

    #[serde(default)]
    pub geolocation: GeolocationConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub media: MediaConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// SensorThings service root, without a trailing slash.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Datastream name to ingest.
    #[serde(default = "default_parameter")]
    pub parameter: String,

    #[serde(default = "default_page_size")]
    pub page_size: u32,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Full query URL; replaces the one built from the fields above.
    #[serde(default)]
    pub initial_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,

    #[serde(default = "default_true")]
    pub run_on_startup: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewConfig {
    /// Maximum number of list entries; display-only.
    #[serde(default = "default_list_cap")]
    pub list_cap: usize,

    #[serde(default = "default_true")]
    pub fly_to_on_complete: bool,

    #[serde(default = "default_true")]
    pub chart_click_filters: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TourConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_tour_interval_secs")]
    pub interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeolocationConfig {
    #[serde(default)]
    pub latitude: Option<f64>,

    #[serde(default)]
    pub longitude: Option<f64>,

    #[serde(default = "default_geolocation_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    #[serde(default = "default_image_dir")]
    pub image_dir: String,

    #[serde(default = "default_fonts_dir")]
    pub fonts_dir: String,

    #[serde(default = "default_retention_days")]
    pub retention_days: i64,

    #[serde(default = "default_cleanup_interval_hours")]
    pub cleanup_interval_hours: u64,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

fn default_base_url() -> String {
    "https://sta.colife.org.tw/STA_AirQuality_EPAIoT/v1.0".to_string()
}

fn default_parameter() -> String {
    "PM2.5".to_string()
}

fn default_page_size() -> u32 {
    2000
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_refresh_interval_secs() -> u64 {
    60
}

fn default_true() -> bool {
    true
}

fn default_list_cap() -> usize {
    100
}

fn default_tour_interval_secs() -> u64 {
    5
}

fn default_geolocation_timeout_secs() -> u64 {
    10
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_image_dir() -> String {
    "data/image_cache".to_string()
}

fn default_fonts_dir() -> String {
    "fonts".to_string()
}

fn default_retention_days() -> i64 {
    1
}

fn default_cleanup_interval_hours() -> u64 {
    24
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_dir: default_log_dir(),
            feed: FeedConfig::default(),
            sync: SyncConfig::default(),
            view: ViewConfig::default(),
            tour: TourConfig::default(),
            geolocation: GeolocationConfig::default(),
            server: ServerConfig::default(),
            media: MediaConfig::default(),
        }
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            parameter: default_parameter(),
            page_size: default_page_size(),
            request_timeout_secs: default_request_timeout_secs(),
            initial_url: None,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: default_refresh_interval_secs(),
            run_on_startup: true,
        }
    }
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            list_cap: default_list_cap(),
            fly_to_on_complete: true,
            chart_click_filters: true,
        }
    }
}

impl Default for TourConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_secs: default_tour_interval_secs(),
        }
    }
}

impl Default for GeolocationConfig {
    fn default() -> Self {
        Self {
            latitude: None,
            longitude: None,
            timeout_secs: default_geolocation_timeout_secs(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            image_dir: default_image_dir(),
            fonts_dir: default_fonts_dir(),
            retention_days: default_retention_days(),
            cleanup_interval_hours: default_cleanup_interval_hours(),
        }
    }
}

impl AppConfig {
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config file: {}", e))?;
        Ok(config)
    }

    /// Load `path`, falling back to defaults when the file does not exist.
    pub fn load_or_default(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::from_file(path)
        } else {
            tracing::warn!("Config file {} not found, using defaults", path.display());
            Ok(Self::default())
        }
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// URL of the first page of every full sync run.
    pub fn initial_url(&self) -> String {
        match &self.feed.initial_url {
            Some(url) => url.clone(),
            None => build_initial_url(&self.feed.base_url, &self.feed.parameter, self.feed.page_size),
        }
    }
}
