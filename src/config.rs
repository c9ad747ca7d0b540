use std::env;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} must be a positive integer (got {value:?})")]
    InvalidNumber { name: &'static str, value: String },

    #[error("{name} must be true or false (got {value:?})")]
    InvalidBool { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub port: u16,
    pub database_max_connections: u32,
    pub max_body_bytes: usize,
    pub run_migrations: bool,
}

impl Config {
    /// Read configuration from the process environment. Call `dotenvy::dotenv()`
    /// first to pick up a local `.env`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::Missing(name))
        };

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET")?,
            port: parse_number(&lookup, "PORT", 3000)?,
            database_max_connections: parse_number(&lookup, "DATABASE_MAX_CONNECTIONS", 10)?,
            max_body_bytes: parse_number(&lookup, "MAX_BODY_BYTES", 1024 * 1024)?,
            run_migrations: parse_bool(&lookup, "RUN_MIGRATIONS", true)?,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }
}

fn parse_number<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr + PartialOrd + Default,
{
    match lookup(name) {
        None => Ok(default),
        Some(value) => match value.trim().parse::<T>() {
            Ok(n) if n > T::default() => Ok(n),
            _ => Err(ConfigError::InvalidNumber { name, value }),
        },
    }
}

fn parse_bool<F>(lookup: &F, name: &'static str, default: bool) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name).as_deref().map(str::trim) {
        None => Ok(default),
        Some("1") | Some("true") | Some("yes") => Ok(true),
        Some("0") | Some("false") | Some("no") => Ok(false),
        Some(other) => Err(ConfigError::InvalidBool {
            name,
            value: other.to_string(),
        }),
    }
}

#[cfg(test)]
impl Config {
    pub fn for_tests() -> Self {
        Self {
            database_url: "postgres://localhost/unused".to_string(),
            jwt_secret: "test-secret".to_string(),
            port: 0,
            database_max_connections: 1,
            max_body_bytes: 1024 * 1024,
            run_migrations: false,
        }
    }
}
