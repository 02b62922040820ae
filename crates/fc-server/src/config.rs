//! Server listen configuration.

use serde::Deserialize;

/// Where the HTTP server listens and which assistant config it loads.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Listen address (e.g., "0.0.0.0").
    #[serde(default = "default_host")]
    pub host: String,
    /// Listen port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Path to the assistant TOML file; built-in defaults when absent.
    #[serde(default)]
    pub assistant_config: Option<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

impl ServerConfig {
    /// Read `FC_HOST` and `FC_PORT`; unset or unparsable values keep the defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let port = match lookup("FC_PORT") {
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                tracing::warn!(value = %raw, "FC_PORT is not a valid port, using default");
                defaults.port
            }),
            None => defaults.port,
        };
        Self {
            host: lookup("FC_HOST").unwrap_or(defaults.host),
            port,
            assistant_config: None,
        }
    }

    /// Take the assistant config path from the first CLI argument, if any.
    pub fn with_args(mut self, mut args: impl Iterator<Item = String>) -> Self {
        self.assistant_config = args.next();
        self
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            assistant_config: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert!(config.assistant_config.is_none());
        assert_eq!(config.addr(), "0.0.0.0:3000");
    }

    #[test]
    fn env_overrides() {
        let config = ServerConfig::from_lookup(lookup(&[("FC_HOST", "127.0.0.1"), ("FC_PORT", "8080")]));
        assert_eq!(config.addr(), "127.0.0.1:8080");
    }

    #[test]
    fn bad_port_keeps_default() {
        let config = ServerConfig::from_lookup(lookup(&[("FC_PORT", "eighty")]));
        assert_eq!(config.port, 3000);
    }

    #[test]
    fn first_argument_is_config_path() {
        let config = ServerConfig::default()
            .with_args(vec!["frank.toml".to_string(), "extra".to_string()].into_iter());
        assert_eq!(config.assistant_config.as_deref(), Some("frank.toml"));
    }
}
