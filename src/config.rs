//! Process configuration, read once from the environment at startup.
//!
//! - `GEMINI_API_KEY` (required) - provider credential
//! - `HOST` - bind address (default `0.0.0.0`)
//! - `PORT` - listen port (default `8080`)
//! - `GEMINI_MODEL` - model id (default `gemini-1.5-flash-latest`)
//! - `GEMINI_BASE_URL` - provider base URL
//! - `STATIC_DIR` - directory of static web assets (default `./web`)

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::llm::{GeminiConfig, DEFAULT_BASE_URL, DEFAULT_MODEL};

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_STATIC_DIR: &str = "./web";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("GEMINI_API_KEY environment variable is not set")]
    MissingApiKey,

    #[error("PORT must be a number between 1 and 65535, got {0:?}")]
    InvalidPort(String),
}

#[derive(Clone)]
pub struct Config {
    pub api_key: String,
    pub host: String,
    pub port: u16,
    pub model: String,
    pub gemini_base_url: String,
    pub static_dir: PathBuf,
}

impl Config {
    /// Configuration with defaults for everything but the credential.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            model: DEFAULT_MODEL.to_string(),
            gemini_base_url: DEFAULT_BASE_URL.to_string(),
            static_dir: PathBuf::from(DEFAULT_STATIC_DIR),
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let api_key = var("GEMINI_API_KEY").ok_or(ConfigError::MissingApiKey)?;
        let mut config = Self::new(api_key);

        if let Some(host) = var("HOST") {
            config.host = host;
        }
        if let Some(port) = var("PORT") {
            config.port = match port.parse::<u16>() {
                Ok(p) if p > 0 => p,
                _ => return Err(ConfigError::InvalidPort(port)),
            };
        }
        if let Some(model) = var("GEMINI_MODEL") {
            config.model = model;
        }
        if let Some(url) = var("GEMINI_BASE_URL") {
            config.gemini_base_url = url;
        }
        if let Some(dir) = var("STATIC_DIR") {
            config.static_dir = PathBuf::from(dir);
        }

        Ok(config)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn gemini(&self) -> GeminiConfig {
        let mut gemini = GeminiConfig::new(self.api_key.clone());
        gemini.model = self.model.clone();
        gemini.base_url = self.gemini_base_url.clone();
        gemini
    }
}

// Keeps the credential out of logs.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("api_key", &"<redacted>")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("model", &self.model)
            .field("gemini_base_url", &self.gemini_base_url)
            .field("static_dir", &self.static_dir)
            .finish()
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
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_missing_key_refuses() {
        assert!(matches!(
            Config::from_lookup(lookup(&[])),
            Err(ConfigError::MissingApiKey)
        ));
        assert!(matches!(
            Config::from_lookup(lookup(&[("GEMINI_API_KEY", "   ")])),
            Err(ConfigError::MissingApiKey)
        ));
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[("GEMINI_API_KEY", "k")])).unwrap();
        assert_eq!(config.api_key, "k");
        assert_eq!(config.bind_addr(), "0.0.0.0:8080");
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.static_dir, PathBuf::from("./web"));
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("GEMINI_API_KEY", "k"),
            ("HOST", "127.0.0.1"),
            ("PORT", "9000"),
            ("GEMINI_MODEL", "gemini-2.0-flash"),
            ("GEMINI_BASE_URL", "http://localhost:1234"),
            ("STATIC_DIR", "/srv/web"),
        ]))
        .unwrap();
        assert_eq!(config.bind_addr(), "127.0.0.1:9000");

        let gemini = config.gemini();
        assert_eq!(gemini.model, "gemini-2.0-flash");
        assert_eq!(gemini.base_url, "http://localhost:1234");
        assert_eq!(gemini.api_key, "k");
    }

    #[test]
    fn test_invalid_port() {
        for port in ["0", "http", "70000"] {
            assert!(matches!(
                Config::from_lookup(lookup(&[("GEMINI_API_KEY", "k"), ("PORT", port)])),
                Err(ConfigError::InvalidPort(_))
            ));
        }
    }

    #[test]
    fn test_debug_redacts_key() {
        let config = Config::new("super-secret");
        let printed = format!("{:?}", config);
        assert!(!printed.contains("super-secret"));
        assert!(printed.contains("<redacted>"));
    }
}
