use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use dotenvy::dotenv;

use crate::model::attendance::GeoPoint;

/// Tunables of the consistency engine.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub reset_token_ttl: Duration,
    pub reset_max_per_window: u32,
    pub reset_window: Duration,
    /// How many previous hashes a new password is compared against.
    pub password_history_depth: u32,
    /// How many history rows are kept per employee after a reset.
    pub password_history_retention: u32,
    pub tx_max_attempts: u32,
    pub tx_retry_backoff: Duration,
    pub office_location: GeoPoint,
    pub geofence_radius_m: f64,
    pub token_purge_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            reset_token_ttl: Duration::from_secs(3600),
            reset_max_per_window: 3,
            reset_window: Duration::from_secs(3600),
            password_history_depth: 5,
            password_history_retention: 10,
            tx_max_attempts: 3,
            tx_retry_backoff: Duration::from_millis(50),
            office_location: GeoPoint {
                latitude: -6.2088,
                longitude: 106.8456,
            },
            geofence_radius_m: 100.0,
            token_purge_interval: Duration::from_secs(3600),
        }
    }
}

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub db_max_connections: u32,
    pub jwt_secret: String,
    pub server_addr: String,

    // Rate limiting
    pub rate_reset_per_min: u32,
    pub rate_protected_per_min: u32,

    pub api_prefix: String,
    pub engine: EngineConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| lookup(key).with_context(|| format!("{key} must be set"));
        let defaults = EngineConfig::default();

        let engine = EngineConfig {
            reset_token_ttl: secs_or(&lookup, "RESET_TOKEN_TTL_SECS", defaults.reset_token_ttl)?,
            reset_max_per_window: parse_or(
                &lookup,
                "RESET_MAX_PER_WINDOW",
                defaults.reset_max_per_window,
            )?,
            reset_window: secs_or(&lookup, "RESET_WINDOW_SECS", defaults.reset_window)?,
            password_history_depth: parse_or(
                &lookup,
                "PASSWORD_HISTORY_DEPTH",
                defaults.password_history_depth,
            )?,
            password_history_retention: parse_or(
                &lookup,
                "PASSWORD_HISTORY_RETENTION",
                defaults.password_history_retention,
            )?,
            tx_max_attempts: parse_or(&lookup, "TX_MAX_ATTEMPTS", defaults.tx_max_attempts)?,
            tx_retry_backoff: bounded(
                "TX_RETRY_BACKOFF_MS",
                Duration::from_millis(parse_or(
                    &lookup,
                    "TX_RETRY_BACKOFF_MS",
                    defaults.tx_retry_backoff.as_millis() as u64,
                )?),
                MAX_RETRY_BACKOFF,
            )?,
            office_location: GeoPoint {
                latitude: parse_or(
                    &lookup,
                    "OFFICE_LATITUDE",
                    defaults.office_location.latitude,
                )?,
                longitude: parse_or(
                    &lookup,
                    "OFFICE_LONGITUDE",
                    defaults.office_location.longitude,
                )?,
            },
            geofence_radius_m: parse_or(&lookup, "GEOFENCE_RADIUS_M", defaults.geofence_radius_m)?,
            token_purge_interval: secs_or(
                &lookup,
                "TOKEN_PURGE_INTERVAL_SECS",
                defaults.token_purge_interval,
            )?,
        };

        if engine.tx_max_attempts == 0 {
            anyhow::bail!("TX_MAX_ATTEMPTS must be at least 1");
        }
        if engine.password_history_retention < engine.password_history_depth {
            anyhow::bail!("PASSWORD_HISTORY_RETENTION must not be below PASSWORD_HISTORY_DEPTH");
        }

        Ok(Self {
            server_addr: required("SERVER_ADDR")?,
            database_url: required("DATABASE_URL")?,
            db_max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", 10)?,
            jwt_secret: required("JWT_SECRET")?,
            rate_reset_per_min: parse_or(&lookup, "RATE_RESET_PER_MIN", 10)?,
            rate_protected_per_min: parse_or(&lookup, "RATE_PROTECTED_PER_MIN", 1000)?,
            api_prefix: lookup("API_PREFIX").unwrap_or_else(|| "/api/v1".to_string()),
            engine,
        })
    }
}

/// Upper bound for every second-based setting.
const MAX_PERIOD: Duration = Duration::from_secs(366 * 24 * 60 * 60);
const MAX_RETRY_BACKOFF: Duration = Duration::from_secs(60);

fn secs_or<F>(lookup: &F, key: &str, default: Duration) -> Result<Duration>
where
    F: Fn(&str) -> Option<String>,
{
    let secs = parse_or(lookup, key, default.as_secs())?;
    bounded(key, Duration::from_secs(secs), MAX_PERIOD)
}

fn bounded(key: &str, value: Duration, max: Duration) -> Result<Duration> {
    if value.is_zero() || value > max {
        anyhow::bail!("{key} must be positive and at most {max:?}, got {value:?}");
    }
    Ok(value)
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} has an invalid value: {raw:?}")),
        None => Ok(default),
    }
}
