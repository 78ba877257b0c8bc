use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::domain::JoinStrategy;
use crate::error::CaptureError;
use crate::resolver::DEFAULT_PAGE_MINUTES;

pub const DEFAULT_CONFIG_FILE: &str = "spinget.json";
pub const DEFAULT_STATION: &str = "WXOX";
pub const DEFAULT_INDEX_URL_TEMPLATE: &str =
    "https://ark2.spinitron.com/ark2/{station}-{timestamp}/index.m3u8";
pub const DEFAULT_OUTPUT_EXTENSION: &str = "mpeg";
pub const DEFAULT_MAX_HOURS: u32 = 4;
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub station: Option<String>,
    #[serde(default)]
    pub index_url_template: Option<String>,
    #[serde(default)]
    pub output_extension: Option<String>,
    #[serde(default)]
    pub max_hours: Option<u32>,
    #[serde(default)]
    pub page_minutes: Option<u32>,
    #[serde(default)]
    pub strategy: Option<JoinStrategy>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub workdir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    pub station: String,
    pub index_url_template: String,
    pub output_extension: String,
    pub max_hours: u32,
    pub page_minutes: u32,
    pub strategy: JoinStrategy,
    pub timeout_secs: u64,
    pub workdir: PathBuf,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            station: DEFAULT_STATION.to_string(),
            index_url_template: DEFAULT_INDEX_URL_TEMPLATE.to_string(),
            output_extension: DEFAULT_OUTPUT_EXTENSION.to_string(),
            max_hours: DEFAULT_MAX_HOURS,
            page_minutes: DEFAULT_PAGE_MINUTES,
            strategy: JoinStrategy::Concat,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            workdir: PathBuf::from("."),
        }
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads `path`, or `spinget.json` from the current directory when present.
    ///
    /// An explicit path must exist; without one, a missing file means defaults.
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, CaptureError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Self::resolve_config(Config::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| CaptureError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| CaptureError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, CaptureError> {
        let defaults = ResolvedConfig::default();

        let station = config.station.unwrap_or(defaults.station);
        let valid_station = !station.is_empty()
            && station
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_');
        if !valid_station {
            return Err(CaptureError::ConfigInvalid(format!("station {station:?}")));
        }

        let index_url_template = config
            .index_url_template
            .unwrap_or(defaults.index_url_template);
        if !index_url_template.contains("{timestamp}") {
            return Err(CaptureError::ConfigInvalid(
                "index_url_template must contain {timestamp}".to_string(),
            ));
        }

        let output_extension = config
            .output_extension
            .map(|ext| ext.trim_start_matches('.').to_string())
            .unwrap_or(defaults.output_extension);
        if output_extension.is_empty() || output_extension.contains(['/', '\\']) {
            return Err(CaptureError::ConfigInvalid(format!(
                "output_extension {output_extension:?}"
            )));
        }

        let max_hours = config.max_hours.unwrap_or(defaults.max_hours);
        if max_hours == 0 {
            return Err(CaptureError::ConfigInvalid(
                "max_hours must be at least 1".to_string(),
            ));
        }

        let page_minutes = config.page_minutes.unwrap_or(defaults.page_minutes);
        if page_minutes == 0 || page_minutes % 5 != 0 {
            return Err(CaptureError::ConfigInvalid(format!(
                "page_minutes must be a positive multiple of 5, got {page_minutes}"
            )));
        }

        let timeout_secs = config.timeout_secs.unwrap_or(defaults.timeout_secs);
        if timeout_secs == 0 {
            return Err(CaptureError::ConfigInvalid(
                "timeout_secs must be at least 1".to_string(),
            ));
        }

        Ok(ResolvedConfig {
            station,
            index_url_template,
            output_extension,
            max_hours,
            page_minutes,
            strategy: config.strategy.unwrap_or(defaults.strategy),
            timeout_secs,
            workdir: config.workdir.unwrap_or(defaults.workdir),
        })
    }
}
