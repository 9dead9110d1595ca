use std::{env, fmt::Display, fs::read_to_string, str::FromStr};

use tracing::{info, warn};

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("Environment variable {0} is required")]
    Missing(&'static str),

    #[error("Invalid {key} value: {reason}")]
    Invalid { key: &'static str, reason: String },

    #[error("Failed to read {key} from {path}: {source}")]
    Secret {
        key: &'static str,
        path: String,
        source: std::io::Error,
    },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub private_key: String,
    pub public_key: String,
    pub max_connections: u32,
    pub rate_limit_per_second: u64,
    pub page_size: i64,
}

impl Config {
    /// Reads the process environment. Call `dotenvy::dotenv()` first to pick up a `.env` file.
    pub fn load() -> Result<Self, ConfigError> {
        Ok(Self {
            database_url: required("DATABASE_URL")?,
            host: try_load("HOST", "0.0.0.0")?,
            port: try_load("PORT", "8000")?,
            private_key: read_secret("JWT_PRIVATE_KEY")?,
            public_key: read_secret("JWT_PUBLIC_KEY")?,
            max_connections: try_load("DATABASE_MAX_CONNECTIONS", "5")?,
            rate_limit_per_second: positive(try_load("RATE_LIMIT_PER_SECOND", "50")?, "RATE_LIMIT_PER_SECOND")?,
            page_size: positive(try_load("PAGE_SIZE", "6")?, "PAGE_SIZE")?,
        })
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn required(key: &'static str) -> Result<String, ConfigError> {
    var(key).ok_or(ConfigError::Missing(key))
}

fn try_load<T: FromStr>(key: &'static str, default: &str) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    var(key)
        .unwrap_or_else(|| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e: T::Err| {
            warn!("Invalid {key} value: {e}");
            ConfigError::Invalid {
                key,
                reason: e.to_string(),
            }
        })
}

fn positive<T: PartialOrd + Default>(value: T, key: &'static str) -> Result<T, ConfigError> {
    if value > T::default() {
        Ok(value)
    } else {
        Err(ConfigError::Invalid {
            key,
            reason: "must be greater than zero".to_string(),
        })
    }
}

/// PEM keys come either inline (`KEY`, with `\n` escapes allowed) or from a file named by `KEY_FILE`.
fn read_secret(key: &'static str) -> Result<String, ConfigError> {
    if let Some(value) = var(key) {
        return Ok(value.replace("\\n", "\n"));
    }

    let Some(path) = var(&format!("{key}_FILE")) else {
        return Err(ConfigError::Missing(key));
    };

    read_to_string(&path)
        .map(|s| s.trim().to_string())
        .map_err(|source| {
            warn!("Failed to read {key} from file: {source}");
            ConfigError::Secret { key, path, source }
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positive_rejects_zero() {
        assert!(positive(0_i64, "PAGE_SIZE").is_err());
        assert_eq!(positive(6_i64, "PAGE_SIZE").unwrap(), 6);
    }

    #[test]
    fn address_joins_host_and_port() {
        let config = Config {
            database_url: "postgres://localhost/foodgram".into(),
            host: "127.0.0.1".into(),
            port: 8080,
            private_key: String::new(),
            public_key: String::new(),
            max_connections: 5,
            rate_limit_per_second: 50,
            page_size: 6,
        };

        assert_eq!(config.address(), "127.0.0.1:8080");
    }
}
