//! Application configuration, resolved once at startup from environment
//! variables (a `.env` file is loaded first when present).

use std::fmt::Display;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{key} must be set when {reason}")]
    Missing { key: &'static str, reason: String },

    #[error("invalid value for {key}: {message}")]
    Invalid { key: &'static str, message: String },
}

/// Connection settings for the PostgREST-style HTTP backend.
#[derive(Debug, Clone, PartialEq)]
pub struct RestConfig {
    pub url: String,
    pub api_key: String,
    pub timeout_secs: u64,
}

/// Connection pool settings for the direct PostgreSQL backend.
#[derive(Debug, Clone, PartialEq)]
pub struct DbConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    pub run_migrations: bool,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: "postgresql://localhost/portfolio".to_string(),
            max_connections: 10,
            min_connections: 2,
            connect_timeout_secs: 10,
            idle_timeout_secs: 300,
            run_migrations: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BackendConfig {
    Rest(RestConfig),
    Postgres(DbConfig),
    Memory,
}

/// Metadata used by the RSS feed.
#[derive(Debug, Clone, PartialEq)]
pub struct SiteConfig {
    pub url: String,
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub environment: String,
    pub host: String,
    pub port: u16,
    pub allowed_origins: Vec<String>,
    pub backend: BackendConfig,
    pub site: SiteConfig,
}

impl AppConfig {
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Resolve configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve configuration from an arbitrary key lookup.
    /// Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let allowed_origins = get("ALLOWED_ORIGINS")
            .map(|s| {
                s.split(',')
                    .map(|origin| origin.trim().to_string())
                    .filter(|origin| !origin.is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|origins| !origins.is_empty())
            .or_else(|| get("FRONTEND_ORIGIN").map(|origin| vec![origin]))
            .unwrap_or_else(|| {
                vec![
                    "http://localhost:3000".to_string(),
                    "http://127.0.0.1:3000".to_string(),
                ]
            });

        Ok(Self {
            environment: get("ENVIRONMENT").unwrap_or_else(|| "development".to_string()),
            host: get("HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: parse_or(&get, "PORT", 3001)?,
            allowed_origins,
            backend: resolve_backend(&get)?,
            site: SiteConfig {
                url: get("SITE_URL")
                    .map(|url| url.trim_end_matches('/').to_string())
                    .unwrap_or_else(|| "http://localhost:3000".to_string()),
                title: get("SITE_TITLE").unwrap_or_else(|| "Portfolio Blog".to_string()),
                description: get("SITE_DESCRIPTION")
                    .unwrap_or_else(|| "Latest articles and projects".to_string()),
            },
        })
    }
}

fn parse_or<T, G>(get: &G, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            message: format!("'{}': {}", raw, e),
        }),
        None => Ok(default),
    }
}

fn resolve_backend<G>(get: &G) -> Result<BackendConfig, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    let kind = match get("CONTENT_BACKEND") {
        Some(kind) => kind.trim().to_lowercase(),
        None if get("BACKEND_URL").is_some() => "rest".to_string(),
        None if get("DATABASE_URL").is_some() => "postgres".to_string(),
        None => "memory".to_string(),
    };

    match kind.as_str() {
        "rest" => {
            let reason = || "CONTENT_BACKEND is 'rest'".to_string();
            let url = get("BACKEND_URL").ok_or_else(|| ConfigError::Missing {
                key: "BACKEND_URL",
                reason: reason(),
            })?;
            let api_key = get("BACKEND_API_KEY").ok_or_else(|| ConfigError::Missing {
                key: "BACKEND_API_KEY",
                reason: reason(),
            })?;
            Ok(BackendConfig::Rest(RestConfig {
                url: url.trim_end_matches('/').to_string(),
                api_key,
                timeout_secs: parse_or(get, "BACKEND_TIMEOUT_SECS", 10)?,
            }))
        }
        "postgres" => {
            let defaults = DbConfig::default();
            let url = get("DATABASE_URL").ok_or_else(|| ConfigError::Missing {
                key: "DATABASE_URL",
                reason: "CONTENT_BACKEND is 'postgres'".to_string(),
            })?;
            Ok(BackendConfig::Postgres(DbConfig {
                url,
                max_connections: parse_or(get, "DB_POOL_MAX", defaults.max_connections)?,
                min_connections: parse_or(get, "DB_POOL_MIN", defaults.min_connections)?,
                connect_timeout_secs: parse_or(
                    get,
                    "DB_CONNECT_TIMEOUT",
                    defaults.connect_timeout_secs,
                )?,
                idle_timeout_secs: parse_or(get, "DB_IDLE_TIMEOUT", defaults.idle_timeout_secs)?,
                run_migrations: parse_or(get, "DB_RUN_MIGRATIONS", defaults.run_migrations)?,
            }))
        }
        "memory" => Ok(BackendConfig::Memory),
        other => Err(ConfigError::Invalid {
            key: "CONTENT_BACKEND",
            message: format!("unknown backend '{}' (expected rest, postgres or memory)", other),
        }),
    }
}
