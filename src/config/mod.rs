//! Configuration module for the attendance backend.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::aggregation::WeekStart;

/// Invalid value for a configuration variable.
#[derive(Debug)]
pub struct ConfigError {
    pub variable: &'static str,
    pub value: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid value for {}: {:?}", self.variable, self.value)
    }
}

impl std::error::Error for ConfigError {}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Pre-shared key for API authentication (required in production)
    pub api_psk: Option<String>,
    /// Path to SQLite database file
    pub db_path: PathBuf,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Upper bound for any single store call. Requests may ask for less with
    /// the `x-store-timeout-ms` header.
    pub store_timeout: Duration,
    /// Default length of the daily trend, in calendar days
    pub trend_days: u32,
    /// First day of the "this week" rollup window
    pub week_start: WeekStart,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let api_psk = env::var("ATTENDANCE_API_PSK")
            .ok()
            .filter(|psk| !psk.is_empty());

        let db_path = env::var("ATTENDANCE_DB_PATH")
            .unwrap_or_else(|_| "./data/attendance.sqlite".to_string())
            .into();

        let bind_addr = parse_var("ATTENDANCE_BIND_ADDR", "127.0.0.1:8080", |v| v.parse().ok())?;

        let log_level = env::var("ATTENDANCE_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let store_timeout = parse_var("ATTENDANCE_STORE_TIMEOUT_MS", "5000", |v| {
            v.parse::<u64>()
                .ok()
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis)
        })?;

        let trend_days = parse_var("ATTENDANCE_TREND_DAYS", "30", |v| {
            v.parse::<u32>().ok().filter(|d| (1..=366).contains(d))
        })?;

        let week_start = parse_var("ATTENDANCE_WEEK_START", "monday", WeekStart::parse)?;

        Ok(Self {
            api_psk,
            db_path,
            bind_addr,
            log_level,
            store_timeout,
            trend_days,
            week_start,
        })
    }
}

fn parse_var<T>(
    variable: &'static str,
    default: &str,
    parse: impl Fn(&str) -> Option<T>,
) -> Result<T, ConfigError> {
    let value = env::var(variable).unwrap_or_else(|_| default.to_string());
    parse(value.trim()).ok_or(ConfigError { variable, value })
}

#[cfg(test)]
mod tests {
    use super::*;

    // Both cases touch the same process-wide variables, so they run in one test.
    #[test]
    fn test_config_defaults_and_invalid_values() {
        for var in [
            "ATTENDANCE_API_PSK",
            "ATTENDANCE_DB_PATH",
            "ATTENDANCE_BIND_ADDR",
            "ATTENDANCE_LOG_LEVEL",
            "ATTENDANCE_STORE_TIMEOUT_MS",
            "ATTENDANCE_TREND_DAYS",
            "ATTENDANCE_WEEK_START",
        ] {
            env::remove_var(var);
        }

        let config = Config::from_env().unwrap();

        assert!(config.api_psk.is_none());
        assert_eq!(config.db_path, PathBuf::from("./data/attendance.sqlite"));
        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:8080");
        assert_eq!(config.log_level, "info");
        assert_eq!(config.store_timeout, Duration::from_millis(5000));
        assert_eq!(config.trend_days, 30);
        assert_eq!(config.week_start, WeekStart::Monday);

        env::set_var("ATTENDANCE_WEEK_START", "Sunday");
        assert_eq!(Config::from_env().unwrap().week_start, WeekStart::Sunday);

        env::set_var("ATTENDANCE_TREND_DAYS", "0");
        let err = Config::from_env().unwrap_err();
        assert_eq!(err.variable, "ATTENDANCE_TREND_DAYS");

        env::remove_var("ATTENDANCE_TREND_DAYS");
        env::set_var("ATTENDANCE_WEEK_START", "friday");
        assert!(Config::from_env().is_err());
        env::remove_var("ATTENDANCE_WEEK_START");
    }
}
