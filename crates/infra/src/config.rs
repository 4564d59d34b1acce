//! Environment-driven settings for the fulfillment services.

use std::str::FromStr;

use salesflow_documents::factory::DEFAULT_INVOICE_TERMS_DAYS;

pub const DEFAULT_MAX_COMMIT_ATTEMPTS: u32 = 5;

/// How one kind of document id is rendered: `PREFIX-` plus a zero-padded number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdFormat {
    pub prefix: String,
    pub width: usize,
}

impl IdFormat {
    pub fn new(prefix: impl Into<String>, width: usize) -> Self {
        Self {
            prefix: prefix.into(),
            width,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleConfig {
    /// Upper bound on optimistic commit attempts per operation (at least 1).
    pub max_commit_attempts: u32,
    pub invoice_terms_days: u32,
    pub order_ids: IdFormat,
    pub shipment_ids: IdFormat,
    pub invoice_ids: IdFormat,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            max_commit_attempts: DEFAULT_MAX_COMMIT_ATTEMPTS,
            invoice_terms_days: DEFAULT_INVOICE_TERMS_DAYS,
            order_ids: IdFormat::new("SO", 4),
            shipment_ids: IdFormat::new("SH", 4),
            invoice_ids: IdFormat::new("INV", 4),
        }
    }
}

impl LifecycleConfig {
    /// Read `MAX_COMMIT_ATTEMPTS` and `INVOICE_TERMS_DAYS` from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let max_commit_attempts = parse_or(&lookup, "MAX_COMMIT_ATTEMPTS", defaults.max_commit_attempts);
        Self {
            max_commit_attempts: if max_commit_attempts == 0 {
                tracing::warn!("MAX_COMMIT_ATTEMPTS=0 is not usable, using 1");
                1
            } else {
                max_commit_attempts
            },
            invoice_terms_days: parse_or(&lookup, "INVOICE_TERMS_DAYS", defaults.invoice_terms_days),
            ..defaults
        }
    }
}

/// Parse `key` if set; fall back to `default` (with a warning) when the value is malformed.
pub fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr + core::fmt::Display,
{
    match lookup(key) {
        None => default,
        Some(raw) => match raw.trim().parse::<T>() {
            Ok(v) => v,
            Err(_) => {
                tracing::warn!(%key, value = %raw, %default, "invalid setting, using default");
                default
            }
        },
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
    fn defaults_apply_when_unset() {
        let config = LifecycleConfig::from_lookup(lookup(&[]));
        assert_eq!(config, LifecycleConfig::default());
        assert_eq!(config.max_commit_attempts, 5);
        assert_eq!(config.invoice_terms_days, 30);
        assert_eq!(config.order_ids, IdFormat::new("SO", 4));
    }

    #[test]
    fn values_are_read_from_the_environment() {
        let config = LifecycleConfig::from_lookup(lookup(&[
            ("MAX_COMMIT_ATTEMPTS", "9"),
            ("INVOICE_TERMS_DAYS", " 45 "),
        ]));
        assert_eq!(config.max_commit_attempts, 9);
        assert_eq!(config.invoice_terms_days, 45);
    }

    #[test]
    fn malformed_values_fall_back() {
        let config = LifecycleConfig::from_lookup(lookup(&[
            ("MAX_COMMIT_ATTEMPTS", "lots"),
            ("INVOICE_TERMS_DAYS", "-3"),
        ]));
        assert_eq!(config.max_commit_attempts, 5);
        assert_eq!(config.invoice_terms_days, 30);

        let config = LifecycleConfig::from_lookup(lookup(&[("MAX_COMMIT_ATTEMPTS", "0")]));
        assert_eq!(config.max_commit_attempts, 1);
    }
}
