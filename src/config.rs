// config.rs

use std::path::PathBuf;
use std::time::Duration;

use tracing::Level;

/// Runtime settings. Values can be overridden through environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_url: String,
    pub data_dir: PathBuf,
    pub output_dir: PathBuf,
    pub tick_rate: Duration,
    /// `None` leaves requests without a client-side timeout.
    pub request_timeout: Option<Duration>,
    pub log_file: PathBuf,
    pub log_level: Level,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            api_url: String::from("http://127.0.0.1:8000"),
            data_dir: PathBuf::from("data/"),
            output_dir: PathBuf::from("output/"),
            tick_rate: Duration::from_millis(50),
            request_timeout: None,
            log_file: PathBuf::from("geonet.log"),
            log_level: Level::INFO,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from any key lookup; unparsable values keep the default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Config::default();
        let api_url = lookup("GEONET_API_URL")
            .map(|v| v.trim().trim_end_matches('/').to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or(defaults.api_url);
        let data_dir = lookup("GEONET_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.data_dir);
        let output_dir = lookup("GEONET_OUTPUT_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.output_dir);
        let tick_rate = lookup("GEONET_TICK_MS")
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
            .unwrap_or(defaults.tick_rate);
        let request_timeout = lookup("GEONET_REQUEST_TIMEOUT_SECS")
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);
        let log_file = lookup("GEONET_LOG_FILE")
            .map(PathBuf::from)
            .unwrap_or(defaults.log_file);
        let log_level = lookup("GEONET_LOG")
            .and_then(|v| v.trim().parse::<Level>().ok())
            .unwrap_or(defaults.log_level);

        Config {
            api_url,
            data_dir,
            output_dir,
            tick_rate,
            request_timeout,
            log_file,
            log_level,
        }
    }
}
