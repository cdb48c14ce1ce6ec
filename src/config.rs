use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Daemon settings, read from `DOWNTIME_*` environment variables. Unset or
/// unparsable values fall back to the defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub data_dir: PathBuf,
    pub sweep_interval: Duration,
    pub compact_threshold: u64,
    pub compact_check_interval: Duration,
    pub lock_timeout: Duration,
    pub metrics_port: Option<u16>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            sweep_interval: Duration::from_secs(300),
            compact_threshold: 1000,
            compact_check_interval: Duration::from_secs(30),
            lock_timeout: Duration::from_secs(5),
            metrics_port: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let parse = |key: &str| lookup(key).and_then(|v| parse_value::<u64>(key, &v));

        Self {
            data_dir: lookup("DOWNTIME_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            sweep_interval: parse("DOWNTIME_SWEEP_INTERVAL_SECS")
                .filter(|&s| s > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.sweep_interval),
            compact_threshold: parse("DOWNTIME_COMPACT_THRESHOLD").unwrap_or(defaults.compact_threshold),
            compact_check_interval: parse("DOWNTIME_COMPACT_CHECK_SECS")
                .filter(|&s| s > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.compact_check_interval),
            lock_timeout: parse("DOWNTIME_LOCK_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.lock_timeout),
            metrics_port: lookup("DOWNTIME_METRICS_PORT")
                .and_then(|v| parse_value::<u16>("DOWNTIME_METRICS_PORT", &v)),
        }
    }
}

fn parse_value<T: FromStr>(key: &str, raw: &str) -> Option<T> {
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!("ignoring invalid {key}={raw:?}, using default");
            None
        }
    }
}
