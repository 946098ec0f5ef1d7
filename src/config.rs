use crate::analyzers::types::{AnalysisParams, BypassPolicy};
use crate::collector::CollectorSettings;
use crate::infra::gbis::client::GBIS_LOCATION_ENDPOINT;
use crate::route::DEFAULT_BYPASS_MARKER;
use chrono::{FixedOffset, NaiveTime};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";
pub const DEFAULT_DATA_DIR: &str = "bus_data";
pub const DEFAULT_INTERVAL_SECS: u64 = 90;
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_UTC_OFFSET_HOURS: i32 = 9;
pub const SERVICE_KEY_ENV: &str = "GBIS_SERVICE_KEY";

const TIME_FORMAT: &str = "%H:%M";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub app: AppSection,
    pub logging: LoggingSection,
    pub route: RouteSection,
    #[serde(default)]
    pub engine: EngineSection,
    #[serde(default)]
    pub collector: CollectorSection,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppSection {
    pub name: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingSection {
    pub level: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RouteSection {
    /// API route identifier
    pub id: String,
    /// CSV of `index,name` rows
    pub stops_path: PathBuf,
    pub bypass_marker: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct EngineSection {
    pub capacity: Option<i32>,
    pub reset_stations: Option<Vec<usize>>,
    pub direction_split: Option<usize>,
    pub segment_drop_threshold: Option<i64>,
    pub weekday_trip_cap: Option<usize>,
    pub weekend_trip_cap: Option<usize>,
    pub zero_station_limit: Option<usize>,
    pub bypass_policy: Option<BypassPolicy>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct CollectorSection {
    pub endpoint: Option<String>,
    pub interval_secs: Option<u64>,
    pub timeout_secs: Option<u64>,
    pub utc_offset_hours: Option<i32>,
    /// `HH:MM`, local time
    pub quiet_start: Option<String>,
    pub quiet_end: Option<String>,
    pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Read(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

fn invalid(key: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        key,
        reason: reason.into(),
    }
}

pub fn load_default() -> Result<Config, ConfigError> {
    load_from_path(DEFAULT_CONFIG_PATH)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&contents)?;
    Ok(config)
}

fn parse_time(key: &'static str, value: Option<&str>, default: NaiveTime) -> Result<NaiveTime, ConfigError> {
    match value {
        Some(text) => NaiveTime::parse_from_str(text.trim(), TIME_FORMAT)
            .map_err(|e| invalid(key, format!("{text:?} is not HH:MM ({e})"))),
        None => Ok(default),
    }
}

impl Config {
    pub fn bypass_marker(&self) -> &str {
        self.route
            .bypass_marker
            .as_deref()
            .unwrap_or(DEFAULT_BYPASS_MARKER)
    }

    /// Engine tunables, unset keys falling back to the route 8201 defaults.
    pub fn analysis_params(&self) -> Result<AnalysisParams, ConfigError> {
        let defaults = AnalysisParams::default();
        let engine = &self.engine;
        let params = AnalysisParams {
            capacity: engine.capacity.unwrap_or(defaults.capacity),
            reset_stations: engine
                .reset_stations
                .clone()
                .unwrap_or(defaults.reset_stations),
            direction_split: engine.direction_split.unwrap_or(defaults.direction_split),
            segment_drop_threshold: engine
                .segment_drop_threshold
                .unwrap_or(defaults.segment_drop_threshold),
            weekday_trip_cap: engine.weekday_trip_cap.unwrap_or(defaults.weekday_trip_cap),
            weekend_trip_cap: engine.weekend_trip_cap.unwrap_or(defaults.weekend_trip_cap),
            zero_station_limit: engine
                .zero_station_limit
                .unwrap_or(defaults.zero_station_limit),
            bypass_policy: engine.bypass_policy.unwrap_or(defaults.bypass_policy),
        };

        if params.capacity <= 0 {
            return Err(invalid("engine.capacity", "must be positive"));
        }
        if params.reset_stations.is_empty() {
            return Err(invalid("engine.reset_stations", "needs at least one station"));
        }
        if params.segment_drop_threshold < 0 {
            return Err(invalid("engine.segment_drop_threshold", "must not be negative"));
        }
        if params.weekday_trip_cap == 0 || params.weekend_trip_cap == 0 {
            return Err(invalid("engine.*_trip_cap", "must be at least 1"));
        }

        Ok(params)
    }

    pub fn collector_settings(&self) -> Result<CollectorSettings, ConfigError> {
        let defaults = CollectorSettings::default();
        let section = &self.collector;

        let offset_hours = section.utc_offset_hours.unwrap_or(DEFAULT_UTC_OFFSET_HOURS);
        let utc_offset = FixedOffset::east_opt(offset_hours * 3600)
            .ok_or_else(|| invalid("collector.utc_offset_hours", format!("{offset_hours} is out of range")))?;
        let interval_secs = section.interval_secs.unwrap_or(DEFAULT_INTERVAL_SECS);
        if interval_secs == 0 {
            return Err(invalid("collector.interval_secs", "must be at least 1"));
        }

        Ok(CollectorSettings {
            route_id: self.route.id.clone(),
            interval: Duration::from_secs(interval_secs),
            utc_offset,
            quiet_start: parse_time(
                "collector.quiet_start",
                section.quiet_start.as_deref(),
                defaults.quiet_start,
            )?,
            quiet_end: parse_time(
                "collector.quiet_end",
                section.quiet_end.as_deref(),
                defaults.quiet_end,
            )?,
        })
    }

    pub fn endpoint(&self) -> &str {
        self.collector
            .endpoint
            .as_deref()
            .unwrap_or(GBIS_LOCATION_ENDPOINT)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.collector.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS))
    }

    pub fn data_dir(&self) -> &Path {
        self.collector
            .data_dir
            .as_deref()
            .unwrap_or(Path::new(DEFAULT_DATA_DIR))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::{SystemTime, UNIX_EPOCH};

    const MINIMAL: &str = r#"
[app]
name = "route_occupancy"

[logging]
level = "info"

[route]
id = "234001730"
stops_path = "config/stops.csv"
"#;

    fn write_temp(tag: &str, contents: &str) -> Result<PathBuf, Box<dyn std::error::Error>> {
        let unique = SystemTime::now().duration_since(UNIX_EPOCH)?.as_nanos();
        let path = std::env::temp_dir().join(format!("route-occupancy-config-{tag}-{unique}.toml"));
        fs::write(&path, contents)?;
        Ok(path)
    }

    #[test]
    fn test_default_config_loads() -> Result<(), Box<dyn std::error::Error>> {
        let config = load_default()?;
        assert_eq!(config.route.id, "234001730");
        assert_eq!(config.analysis_params()?, AnalysisParams::default());
        Ok(())
    }

    #[test]
    fn test_missing_sections_fall_back_to_defaults() -> Result<(), Box<dyn std::error::Error>> {
        let path = write_temp("minimal", MINIMAL)?;

        let config = load_from_path(&path)?;
        let _ = fs::remove_file(&path);

        assert_eq!(config.analysis_params()?, AnalysisParams::default());
        assert_eq!(config.bypass_marker(), DEFAULT_BYPASS_MARKER);
        assert_eq!(config.endpoint(), GBIS_LOCATION_ENDPOINT);
        assert_eq!(config.data_dir(), Path::new("bus_data"));
        let settings = config.collector_settings()?;
        assert_eq!(settings.interval, Duration::from_secs(90));
        assert_eq!(settings.quiet_end, NaiveTime::from_hms_opt(5, 30, 0).unwrap());
        assert_eq!(settings.utc_offset.local_minus_utc(), 9 * 3600);
        Ok(())
    }

    #[test]
    fn test_engine_overrides_are_applied() -> Result<(), Box<dyn std::error::Error>> {
        let contents = format!(
            "{MINIMAL}\n[engine]\nweekend_trip_cap = 12\nbypass_policy = \"fill_only\"\n"
        );
        let path = write_temp("engine", &contents)?;

        let config = load_from_path(&path)?;
        let _ = fs::remove_file(&path);
        let params = config.analysis_params()?;

        assert_eq!(params.weekend_trip_cap, 12);
        assert_eq!(params.bypass_policy, BypassPolicy::FillOnly);
        assert_eq!(params.capacity, 45);
        Ok(())
    }

    #[test]
    fn test_bad_quiet_time_is_invalid() -> Result<(), Box<dyn std::error::Error>> {
        let contents = format!("{MINIMAL}\n[collector]\nquiet_end = \"half past five\"\n");
        let path = write_temp("quiet", &contents)?;

        let config = load_from_path(&path)?;
        let _ = fs::remove_file(&path);

        assert!(matches!(
            config.collector_settings(),
            Err(ConfigError::Invalid { key: "collector.quiet_end", .. })
        ));
        Ok(())
    }

    #[test]
    fn test_empty_reset_stations_is_invalid() -> Result<(), Box<dyn std::error::Error>> {
        let contents = format!("{MINIMAL}\n[engine]\nreset_stations = []\n");
        let path = write_temp("reset", &contents)?;

        let config = load_from_path(&path)?;
        let _ = fs::remove_file(&path);

        assert!(matches!(config.analysis_params(), Err(ConfigError::Invalid { .. })));
        Ok(())
    }

    #[test]
    fn test_missing_config_file_returns_read_error() {
        let path = std::env::temp_dir().join("route-occupancy-config-does-not-exist.toml");

        let result = load_from_path(&path);

        assert!(matches!(result, Err(ConfigError::Read(_))));
    }

    #[test]
    fn test_invalid_toml_returns_parse_error() -> Result<(), Box<dyn std::error::Error>> {
        let path = write_temp("invalid", "not = [valid")?;

        let result = load_from_path(&path);
        let _ = fs::remove_file(&path);

        assert!(matches!(result, Err(ConfigError::Parse(_))));
        Ok(())
    }
}
