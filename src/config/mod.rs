use dashmap::DashMap;
use std::env;
use std::sync::Arc;

/// Key/value configuration, seeded from the process environment.
#[derive(Clone, Default)]
pub struct ConfigService {
    config: Arc<DashMap<String, String>>,
}

impl ConfigService {
    /// Configuration holding every environment variable.
    pub fn new() -> Self {
        let service = Self::default();
        for (key, value) in env::vars() {
            service.set(&key, &value);
        }
        service
    }

    /// Configuration holding only the environment variables starting with `prefix`.
    pub fn from_env_prefix(prefix: &str) -> Self {
        let service = Self::default();
        for (key, value) in env::vars().filter(|(key, _)| key.starts_with(prefix)) {
            service.set(&key, &value);
        }
        service
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.config.get(key).map(|v| v.clone())
    }

    /// `true`/`false`, `1`/`0`, `yes`/`no`, `on`/`off`; anything else is ignored.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        let value = self.get(key)?;
        match value.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Some(true),
            "false" | "0" | "no" | "off" => Some(false),
            other => {
                tracing::warn!("Ignoring non-boolean value '{}' for {}", other, key);
                None
            }
        }
    }

    pub fn set(&self, key: &str, value: &str) {
        self.config.insert(key.to_string(), value.to_string());
    }
}
