//! Configuration sources
//!
//! A [`ConfigSource`] is the key-to-string lookup the resolver queries for a
//! binding's connection reference. The engine ships two implementations:
//! process environment and an in-memory map (handy for tests and embedding).

use std::collections::HashMap;

/// Key to string lookup for binding configuration
pub trait ConfigSource: Send + Sync {
    /// Look up a setting by name
    fn get(&self, key: &str) -> Option<String>;
}

/// Configuration backed by the process environment
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvConfig;

impl ConfigSource for EnvConfig {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// In-memory configuration map
#[derive(Debug, Clone, Default)]
pub struct MapConfig {
    entries: HashMap<String, String>,
}

impl MapConfig {
    /// Create an empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a setting
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.entries.insert(key.into(), value.into());
        self
    }
}

impl ConfigSource for MapConfig {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_config() {
        let config = MapConfig::new().with("SqlConnection", "postgres://localhost/test");

        assert_eq!(
            config.get("SqlConnection").as_deref(),
            Some("postgres://localhost/test")
        );
        assert!(config.get("Missing").is_none());
    }

    #[test]
    fn test_env_config() {
        std::env::set_var("SQLBIND_TEST_SETTING", "value");
        assert_eq!(
            EnvConfig.get("SQLBIND_TEST_SETTING").as_deref(),
            Some("value")
        );
        assert!(EnvConfig.get("SQLBIND_TEST_MISSING_SETTING").is_none());
    }
}
