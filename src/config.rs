use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

/// Telegram accepts `open_period` values within this range.
pub const OPEN_PERIOD_RANGE: std::ops::RangeInclusive<u16> = 5..=600;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} should be set.")]
    Missing(&'static str),
    #[error("{name} can't be parsed: {value}")]
    Invalid { name: &'static str, value: String },
    #[error("{name} must be within 5..=600 seconds, got {value}")]
    PeriodOutOfRange { name: &'static str, value: u16 },
}

#[derive(Debug, Clone)]
pub struct Webhook {
    pub url: Url,
    pub addr: SocketAddr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Speeds {
    pub fast: u16,
    pub normal: u16,
    pub slow: u16,
}

impl Default for Speeds {
    fn default() -> Self {
        Self {
            fast: 10,
            normal: 30,
            slow: 60,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub token: String,
    pub database_url: String,
    pub log_level: String,
    pub webhook: Option<Webhook>,
    pub speeds: Speeds,
}

impl Config {
    /// Loads `.env` if present, then reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let token = lookup("TELOXIDE_TOKEN").ok_or(ConfigError::Missing("TELOXIDE_TOKEN"))?;
        let database_url =
            lookup("DATABASE_URL").unwrap_or_else(|| "sqlite://quizbot.db?mode=rwc".into());
        let log_level = lookup("LOG_LEVEL").unwrap_or_else(|| "info".into());

        let webhook = match (lookup("NGROK_URL"), lookup("NGROK_ADDR")) {
            (Some(url), Some(addr)) => Some(Webhook {
                url: url.parse().map_err(|_| ConfigError::Invalid {
                    name: "NGROK_URL",
                    value: url.clone(),
                })?,
                addr: addr.parse().map_err(|_| ConfigError::Invalid {
                    name: "NGROK_ADDR",
                    value: addr.clone(),
                })?,
            }),
            _ => None,
        };

        let defaults = Speeds::default();
        let speeds = Speeds {
            fast: period(&lookup, "OPEN_PERIOD_FAST", defaults.fast)?,
            normal: period(&lookup, "OPEN_PERIOD_NORMAL", defaults.normal)?,
            slow: period(&lookup, "OPEN_PERIOD_SLOW", defaults.slow)?,
        };

        Ok(Self {
            token,
            database_url,
            log_level,
            webhook,
            speeds,
        })
    }
}

fn period(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: u16,
) -> Result<u16, ConfigError> {
    let Some(raw) = lookup(name) else {
        return Ok(default);
    };
    let value: u16 = raw.trim().parse().map_err(|_| ConfigError::Invalid {
        name,
        value: raw.clone(),
    })?;
    if !OPEN_PERIOD_RANGE.contains(&value) {
        return Err(ConfigError::PeriodOutOfRange { name, value });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn token_is_required() {
        let err = Config::from_lookup(lookup_from(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("TELOXIDE_TOKEN")));
    }

    #[test]
    fn defaults_apply() {
        let config = Config::from_lookup(lookup_from(&[("TELOXIDE_TOKEN", "t")])).unwrap();
        assert_eq!(config.speeds, Speeds::default());
        assert_eq!(config.log_level, "info");
        assert!(config.webhook.is_none());
        assert!(config.database_url.starts_with("sqlite:"));
    }

    #[test]
    fn webhook_needs_both_variables() {
        let config = Config::from_lookup(lookup_from(&[
            ("TELOXIDE_TOKEN", "t"),
            ("NGROK_URL", "https://example.org/hook"),
        ]))
        .unwrap();
        assert!(config.webhook.is_none());

        let config = Config::from_lookup(lookup_from(&[
            ("TELOXIDE_TOKEN", "t"),
            ("NGROK_URL", "https://example.org/hook"),
            ("NGROK_ADDR", "127.0.0.1:8443"),
        ]))
        .unwrap();
        let webhook = config.webhook.unwrap();
        assert_eq!(webhook.addr.port(), 8443);
    }

    #[test]
    fn periods_are_validated() {
        let err = Config::from_lookup(lookup_from(&[
            ("TELOXIDE_TOKEN", "t"),
            ("OPEN_PERIOD_FAST", "2"),
        ]))
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::PeriodOutOfRange {
                name: "OPEN_PERIOD_FAST",
                value: 2
            }
        ));

        let err = Config::from_lookup(lookup_from(&[
            ("TELOXIDE_TOKEN", "t"),
            ("OPEN_PERIOD_SLOW", "slow"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));

        let config = Config::from_lookup(lookup_from(&[
            ("TELOXIDE_TOKEN", "t"),
            ("OPEN_PERIOD_SLOW", "120"),
        ]))
        .unwrap();
        assert_eq!(config.speeds.slow, 120);
    }
}
