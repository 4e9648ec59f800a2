//! Application configuration loaded from environment variables.

use std::str::FromStr;
use std::time::Duration;

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `SAGA_SNAPSHOT_PAYLOADS`: attach payload snapshots to events (default: `true`)
/// - `PAYMENT_DECLINE_RATE`: fraction of charges the demo payment service
///   declines, clamped to `0.0..=1.0` (default: `0.0`)
/// - `EVENT_HISTORY_CAPACITY`: events kept for `/sagas/{id}/events` (default: `1024`)
/// - `ALERT_THROTTLE_MS`: minimum gap between `saga.failed` alerts (default: `1000`)
///
/// Unparseable values fall back to the default.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub snapshot_payloads: bool,
    pub payment_decline_rate: f64,
    pub event_history_capacity: usize,
    pub alert_throttle: Duration,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: parse_var(&lookup, "PORT").unwrap_or(defaults.port),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            snapshot_payloads: parse_var(&lookup, "SAGA_SNAPSHOT_PAYLOADS")
                .unwrap_or(defaults.snapshot_payloads),
            payment_decline_rate: parse_var(&lookup, "PAYMENT_DECLINE_RATE")
                .filter(|rate: &f64| !rate.is_nan())
                .map_or(defaults.payment_decline_rate, |rate| rate.clamp(0.0, 1.0)),
            event_history_capacity: parse_var(&lookup, "EVENT_HISTORY_CAPACITY")
                .filter(|capacity: &usize| *capacity > 0)
                .unwrap_or(defaults.event_history_capacity),
            alert_throttle: parse_var(&lookup, "ALERT_THROTTLE_MS")
                .map_or(defaults.alert_throttle, Duration::from_millis),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|value| value.trim().parse().ok())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            snapshot_payloads: true,
            payment_decline_rate: 0.0,
            event_history_capacity: 1024,
            alert_throttle: Duration::from_millis(1000),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn from_pairs(pairs: &[(&str, &str)]) -> Config {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.log_level, "info");
        assert!(config.snapshot_payloads);
        assert_eq!(config.payment_decline_rate, 0.0);
        assert_eq!(config.event_history_capacity, 1024);
        assert_eq!(config.alert_throttle, Duration::from_secs(1));
    }

    #[test]
    fn test_empty_lookup_matches_defaults() {
        let config = from_pairs(&[]);
        assert_eq!(config.addr(), Config::default().addr());
        assert_eq!(config.event_history_capacity, 1024);
    }

    #[test]
    fn test_overrides() {
        let config = from_pairs(&[
            ("HOST", "127.0.0.1"),
            ("PORT", "8080"),
            ("SAGA_SNAPSHOT_PAYLOADS", "false"),
            ("PAYMENT_DECLINE_RATE", "0.25"),
            ("EVENT_HISTORY_CAPACITY", "10"),
            ("ALERT_THROTTLE_MS", "50"),
        ]);
        assert_eq!(config.addr(), "127.0.0.1:8080");
        assert!(!config.snapshot_payloads);
        assert_eq!(config.payment_decline_rate, 0.25);
        assert_eq!(config.event_history_capacity, 10);
        assert_eq!(config.alert_throttle, Duration::from_millis(50));
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = from_pairs(&[
            ("PORT", "not-a-port"),
            ("SAGA_SNAPSHOT_PAYLOADS", "maybe"),
            ("EVENT_HISTORY_CAPACITY", "0"),
            ("PAYMENT_DECLINE_RATE", "NaN"),
        ]);
        assert_eq!(config.port, 3000);
        assert!(config.snapshot_payloads);
        assert_eq!(config.event_history_capacity, 1024);
        assert_eq!(config.payment_decline_rate, 0.0);
    }

    #[test]
    fn test_decline_rate_clamped() {
        assert_eq!(from_pairs(&[("PAYMENT_DECLINE_RATE", "3")]).payment_decline_rate, 1.0);
        assert_eq!(from_pairs(&[("PAYMENT_DECLINE_RATE", "-1")]).payment_decline_rate, 0.0);
    }
}
