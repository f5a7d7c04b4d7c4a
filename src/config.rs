// ===============================
// src/config.rs
// ===============================
/*
=============================================================================
Project : luno_mm_bot — polling market maker for the Luno REST API
Module  : config.rs
Version : 0.1.0
License : MIT (see LICENSE)

Summary : Cancels stale quotes, reads tickers, quotes a symmetric spread
          around mid, sizes from available balance and resubmits post-only
          limit orders on a fixed refresh interval.
=============================================================================
*/
use rust_decimal::Decimal;
use std::env;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_API_URL: &str = "https://api.luno.com";
pub const DEFAULT_PAIRS: &[&str] = &["XBTZAR", "ETHZAR", "XRPZAR", "ETHXBT", "USDCZAR"];

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("{key}: cannot parse {value:?}")]
    Parse { key: &'static str, value: String },
    #[error("{key}: {reason}")]
    Invalid { key: &'static str, reason: &'static str },
}

#[derive(Clone)]
pub struct Credentials {
    pub key_id: String,
    pub secret: String,
}

// Jangan pernah print secret ke log
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials").field("key_id", &mask(&self.key_id)).field("secret", &"****").finish()
    }
}

fn mask(s: &str) -> String {
    let n = s.chars().count();
    if n <= 4 {
        return "*".repeat(n);
    }
    let head: String = s.chars().take(4).collect();
    format!("{head}{}", "*".repeat(n - 4))
}

/// Immutable process configuration, built once at startup and passed down.
#[derive(Clone, Debug)]
pub struct Config {
    pub credentials: Credentials,
    pub api_url: String,
    pub pairs: Vec<String>,
    pub spread_percentage: Decimal,
    pub order_size_percentage: Decimal,
    pub refresh_interval: Duration,
    pub price_precision: u32,
    pub volume_precision: u32,
    pub post_only: bool,
    pub request_timeout: Duration,
    pub max_read_retries: u32,
    pub metrics_port: Option<u16>,
}

impl Config {
    /// Baca dari environment (.env ikut di-load)
    pub fn from_env() -> Result<Config, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|k| env::var(k).ok())
    }

    /// Build from any key lookup; empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Config, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |k: &str| lookup(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let key_id = get("LUNO_API_KEY_ID")
            .or_else(|| get("LUNO_API_KEY"))
            .ok_or(ConfigError::Missing("LUNO_API_KEY_ID"))?;
        let secret = get("LUNO_API_SECRET").ok_or(ConfigError::Missing("LUNO_API_SECRET"))?;

        let api_url = get("LUNO_API_URL")
            .unwrap_or_else(|| DEFAULT_API_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        // PAIRS=XBTZAR,ETHZAR
        let mut pairs: Vec<String> = get("PAIRS")
            .map(|s| {
                s.split(',')
                    .map(|x| x.trim())
                    .filter(|x| !x.is_empty())
                    .map(normalize_pair)
                    .collect()
            })
            .filter(|v: &Vec<String>| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_PAIRS.iter().map(|s| s.to_string()).collect());
        let mut seen = std::collections::HashSet::new();
        pairs.retain(|p| seen.insert(p.clone()));

        let spread_percentage = parse_or(&get, "SPREAD_PERCENTAGE", Decimal::new(5, 1))?;
        if spread_percentage < Decimal::ZERO {
            return Err(ConfigError::Invalid { key: "SPREAD_PERCENTAGE", reason: "must be >= 0" });
        }

        let order_size_percentage = parse_or(&get, "ORDER_SIZE_PERCENTAGE", Decimal::new(20, 1))?;
        if order_size_percentage <= Decimal::ZERO || order_size_percentage > Decimal::ONE_HUNDRED {
            return Err(ConfigError::Invalid { key: "ORDER_SIZE_PERCENTAGE", reason: "must be in (0, 100]" });
        }

        let refresh_secs: u64 = parse_or(&get, "REFRESH_INTERVAL_SECS", 300)?;
        if refresh_secs == 0 {
            return Err(ConfigError::Invalid { key: "REFRESH_INTERVAL_SECS", reason: "must be > 0" });
        }

        let price_precision: u32 = parse_or(&get, "PRICE_PRECISION", 0)?;
        let volume_precision: u32 = parse_or(&get, "VOLUME_PRECISION", 6)?;
        if price_precision > 18 || volume_precision > 18 {
            return Err(ConfigError::Invalid { key: "PRICE_PRECISION/VOLUME_PRECISION", reason: "must be <= 18" });
        }

        let post_only = match get("POST_ONLY") {
            None => true,
            Some(v) => parse_bool(&v).ok_or(ConfigError::Parse { key: "POST_ONLY", value: v })?,
        };

        let timeout_secs: u64 = parse_or(&get, "REQUEST_TIMEOUT_SECS", 10)?;
        if timeout_secs == 0 {
            return Err(ConfigError::Invalid { key: "REQUEST_TIMEOUT_SECS", reason: "must be > 0" });
        }
        let max_read_retries: u32 = parse_or(&get, "MAX_READ_RETRIES", 2)?;

        let metrics_port = match get("METRICS_PORT") {
            None => None,
            Some(v) => Some(v.parse::<u16>().map_err(|_| ConfigError::Parse { key: "METRICS_PORT", value: v })?),
        };

        Ok(Config {
            credentials: Credentials { key_id, secret },
            api_url,
            pairs,
            spread_percentage,
            order_size_percentage,
            refresh_interval: Duration::from_secs(refresh_secs),
            price_precision,
            volume_precision,
            post_only,
            request_timeout: Duration::from_secs(timeout_secs),
            max_read_retries,
            metrics_port,
        })
    }
}

/// `xbt-zar`, `XBT/ZAR`, `xbt_zar` -> `XBTZAR`
pub fn normalize_pair(raw: &str) -> String {
    raw.trim().replace(['-', '/', '_'], "").to_ascii_uppercase()
}

fn parse_or<T, G>(get: &G, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(default),
        Some(v) => v.parse::<T>().map_err(|_| ConfigError::Parse { key, value: v }),
    }
}

fn parse_bool(v: &str) -> Option<bool> {
    match v.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
