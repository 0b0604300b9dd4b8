use std::env;
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;

use crate::logging::LogConfig;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub log_level: String,
    pub enable_file_logs: bool,
    pub log_dir: String,
    pub sled_path: String,
    pub cors_origin: String,
    pub rating: RatingEnvConfig,
}

#[derive(Debug, Clone)]
pub struct RatingEnvConfig {
    pub tau: f64,
    pub max_iterations: u32,
    pub calibration_attempts: u64,
}

impl Default for RatingEnvConfig {
    fn default() -> Self {
        Self {
            tau: 0.5,
            max_iterations: 100,
            calibration_attempts: 10,
        }
    }
}

impl Config {
    /// Parse failures are logged and fall back to defaults, so install the
    /// subscriber (from [`LogConfig::from_env`]) first.
    pub fn from_env() -> Self {
        let defaults = RatingEnvConfig::default();
        let log = LogConfig::from_env();
        Self {
            host: env_or_parse("HOST", IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))),
            port: env_or_parse("PORT", 3000_u16),
            log_level: log.log_level,
            enable_file_logs: log.enable_file_logs,
            log_dir: log.log_dir,
            sled_path: env_or("SLED_PATH", "./data/puzzles.sled"),
            cors_origin: env_or("CORS_ORIGIN", "http://localhost:5173"),
            rating: RatingEnvConfig {
                tau: env_or_parse("RATING_TAU", defaults.tau),
                max_iterations: env_or_parse("RATING_MAX_ITERATIONS", defaults.max_iterations),
                calibration_attempts: env_or_parse(
                    "CALIBRATION_ATTEMPTS",
                    defaults.calibration_attempts,
                ),
            },
        }
    }
}

pub fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

pub fn env_or_parse<T>(key: &str, default: T) -> T
where
    T: FromStr + Copy,
{
    match env::var(key) {
        Ok(raw) => match raw.parse::<T>() {
            Ok(v) => v,
            Err(_) => {
                tracing::warn!(
                    key,
                    value = %raw,
                    "Failed to parse env var, using default"
                );
                default
            }
        },
        Err(_) => default,
    }
}

pub fn env_or_bool(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => default,
        },
        Err(_) => default,
    }
}
