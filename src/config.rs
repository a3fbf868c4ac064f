use std::env;
use std::time::Duration;

use crate::engine::pricing::{
    DEFAULT_LARGE_RATE, DEFAULT_MEDIUM_RATE, DEFAULT_SMALL_RATE, RateTable,
};
use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub log_json: bool,
    pub event_buffer_size: usize,
    pub rates: RateTable,
    pub retry: RetryPolicy,
    pub cors_allow_origin: String,
}

/// How the HTTP boundary retries calls that fail with `StorageUnavailable`.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_backoff: Duration::from_millis(50),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let rates = RateTable {
            small: parse_rate(&lookup, "RATE_SMALL_PER_KM", DEFAULT_SMALL_RATE)?,
            medium: parse_rate(&lookup, "RATE_MEDIUM_PER_KM", DEFAULT_MEDIUM_RATE)?,
            large: parse_rate(&lookup, "RATE_LARGE_PER_KM", DEFAULT_LARGE_RATE)?,
        };

        let event_buffer_size: usize = parse_or_default(&lookup, "EVENT_BUFFER_SIZE", 1024)?;
        if event_buffer_size == 0 {
            return Err(AppError::Internal(
                "invalid EVENT_BUFFER_SIZE: must be > 0".to_string(),
            ));
        }

        Ok(Self {
            http_port: parse_or_default(&lookup, "HTTP_PORT", 3000)?,
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            log_json: lookup("LOG_FORMAT")
                .is_some_and(|format| format.eq_ignore_ascii_case("json")),
            event_buffer_size,
            rates,
            retry: RetryPolicy {
                attempts: parse_or_default(&lookup, "STORAGE_RETRY_ATTEMPTS", 3)?,
                base_backoff: Duration::from_millis(parse_or_default(
                    &lookup,
                    "STORAGE_RETRY_BACKOFF_MS",
                    50,
                )?),
            },
            cors_allow_origin: lookup("CORS_ALLOW_ORIGIN")
                .unwrap_or_else(|| "http://localhost:5173".to_string()),
        })
    }
}

fn parse_or_default<F, T>(lookup: &F, key: &str, default: T) -> Result<T, AppError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        None => Ok(default),
    }
}

fn parse_rate<F>(lookup: &F, key: &str, default: f64) -> Result<f64, AppError>
where
    F: Fn(&str) -> Option<String>,
{
    let rate: f64 = parse_or_default(lookup, key, default)?;
    if !rate.is_finite() || rate < 0.0 {
        return Err(AppError::Internal(format!(
            "invalid {key}: rate must be a non-negative number"
        )));
    }
    Ok(rate)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use super::Config;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, crate::error::AppError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = config_from(&[]).unwrap();

        assert_eq!(config.http_port, 3000);
        assert_eq!(config.log_level, "info");
        assert!(!config.log_json);
        assert_eq!(config.rates.small, 5.0);
        assert_eq!(config.rates.medium, 8.0);
        assert_eq!(config.rates.large, 12.0);
        assert_eq!(config.retry.attempts, 3);
        assert_eq!(config.retry.base_backoff, Duration::from_millis(50));
        assert_eq!(config.cors_allow_origin, "http://localhost:5173");
    }

    #[test]
    fn rates_are_tunable() {
        let config = config_from(&[
            ("RATE_LARGE_PER_KM", "15.5"),
            ("HTTP_PORT", "8080"),
            ("LOG_FORMAT", "JSON"),
        ])
        .unwrap();

        assert_eq!(config.rates.large, 15.5);
        assert_eq!(config.rates.small, 5.0);
        assert_eq!(config.http_port, 8080);
        assert!(config.log_json);
    }

    #[test]
    fn negative_rate_is_rejected() {
        let err = config_from(&[("RATE_SMALL_PER_KM", "-1")]).unwrap_err();
        assert!(err.to_string().contains("RATE_SMALL_PER_KM"));
    }

    #[test]
    fn unparsable_port_is_rejected() {
        let err = config_from(&[("HTTP_PORT", "eighty")]).unwrap_err();
        assert!(err.to_string().contains("HTTP_PORT"));
    }
}
