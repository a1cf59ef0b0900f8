//! Environment-driven server configuration.

use anyhow::{Context, anyhow};
use chrono_tz::Tz;
use tracing::warn;

use dunning_reminders::{CurrencyCode, SendWindow};

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

#[derive(Debug, Clone, PartialEq)]
pub struct ApiConfig {
    pub bind_addr: String,
    pub send_window: SendWindow,
    /// Currency applied to uploads that do not name one.
    pub default_currency: CurrencyCode,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            send_window: SendWindow::default(),
            default_currency: CurrencyCode::default(),
        }
    }
}

impl ApiConfig {
    /// Read `DUNNING_BIND_ADDR`, `DUNNING_SEND_HOUR`, `DUNNING_TIMEZONE` and
    /// `DUNNING_DEFAULT_CURRENCY` from the process environment.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ApiConfig::from_env`] with an injectable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let defaults = ApiConfig::default();

        let bind_addr = lookup("DUNNING_BIND_ADDR").unwrap_or_else(|| {
            warn!("DUNNING_BIND_ADDR not set; using {DEFAULT_BIND_ADDR}");
            defaults.bind_addr.clone()
        });

        let send_hour = match lookup("DUNNING_SEND_HOUR") {
            Some(raw) => raw
                .trim()
                .parse::<u32>()
                .with_context(|| format!("DUNNING_SEND_HOUR must be an hour 0-23 (got {raw})"))?,
            None => {
                warn!("DUNNING_SEND_HOUR not set; sending at 09:00");
                defaults.send_window.send_hour()
            }
        };

        let timezone = match lookup("DUNNING_TIMEZONE") {
            Some(raw) => raw
                .trim()
                .parse::<Tz>()
                .map_err(|e| anyhow!("DUNNING_TIMEZONE is not an IANA zone: {e}"))?,
            None => {
                warn!("DUNNING_TIMEZONE not set; using UTC");
                defaults.send_window.timezone()
            }
        };

        let send_window =
            SendWindow::new(send_hour, timezone).context("invalid DUNNING_SEND_HOUR")?;

        let default_currency = match lookup("DUNNING_DEFAULT_CURRENCY") {
            Some(raw) => raw
                .parse::<CurrencyCode>()
                .context("invalid DUNNING_DEFAULT_CURRENCY")?,
            None => defaults.default_currency,
        };

        Ok(Self {
            bind_addr,
            send_window,
            default_currency,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn missing_values_fall_back_to_defaults() {
        let config = ApiConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ApiConfig::default());
    }

    #[test]
    fn values_are_read_and_normalised() {
        let config = ApiConfig::from_lookup(lookup(&[
            ("DUNNING_BIND_ADDR", "127.0.0.1:9000"),
            ("DUNNING_SEND_HOUR", "8"),
            ("DUNNING_TIMEZONE", "Europe/London"),
            ("DUNNING_DEFAULT_CURRENCY", "gbp"),
        ]))
        .unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:9000");
        assert_eq!(config.send_window.send_hour(), 8);
        assert_eq!(config.send_window.timezone(), chrono_tz::Europe::London);
        assert_eq!(config.default_currency.as_str(), "GBP");
    }

    #[test]
    fn invalid_values_are_errors() {
        assert!(ApiConfig::from_lookup(lookup(&[("DUNNING_SEND_HOUR", "24")])).is_err());
        assert!(ApiConfig::from_lookup(lookup(&[("DUNNING_SEND_HOUR", "nine")])).is_err());
        assert!(ApiConfig::from_lookup(lookup(&[("DUNNING_TIMEZONE", "Mars/Base")])).is_err());
        assert!(ApiConfig::from_lookup(lookup(&[("DUNNING_DEFAULT_CURRENCY", "dollars")])).is_err());
    }
}
