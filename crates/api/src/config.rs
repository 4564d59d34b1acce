//! Process settings for the HTTP service.

use salesflow_infra::config::parse_or;
use salesflow_infra::LifecycleConfig;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub bind_addr: String,
    /// Postgres event store and id sequences instead of the in-memory ones.
    pub use_persistent_stores: bool,
    pub database_url: Option<String>,
    pub lifecycle: LifecycleConfig,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            use_persistent_stores: false,
            database_url: None,
            lifecycle: LifecycleConfig::default(),
        }
    }
}

impl ApiConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let bind_addr = lookup("BIND_ADDR")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());

        Self {
            bind_addr,
            use_persistent_stores: parse_or(&lookup, "USE_PERSISTENT_STORES", false),
            database_url: lookup("DATABASE_URL").filter(|s| !s.trim().is_empty()),
            lifecycle: LifecycleConfig::from_lookup(&lookup),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_in_memory_on_8080() {
        let config = ApiConfig::from_lookup(|_| None);
        assert_eq!(config, ApiConfig::default());
    }

    #[test]
    fn persistent_mode_reads_database_url() {
        let config = ApiConfig::from_lookup(|key| match key {
            "USE_PERSISTENT_STORES" => Some("true".to_string()),
            "DATABASE_URL" => Some("postgres://localhost/salesflow".to_string()),
            "BIND_ADDR" => Some("127.0.0.1:9000".to_string()),
            "MAX_COMMIT_ATTEMPTS" => Some("2".to_string()),
            _ => None,
        });
        assert!(config.use_persistent_stores);
        assert_eq!(config.database_url.as_deref(), Some("postgres://localhost/salesflow"));
        assert_eq!(config.bind_addr, "127.0.0.1:9000");
        assert_eq!(config.lifecycle.max_commit_attempts, 2);
    }

    #[test]
    fn bad_flag_falls_back_to_in_memory() {
        let config = ApiConfig::from_lookup(|key| (key == "USE_PERSISTENT_STORES").then(|| "yes".to_string()));
        assert!(!config.use_persistent_stores);
    }
}
