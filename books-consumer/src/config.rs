//! Configuration module for environment variable parsing.
//!
//! Credentials are read from the process environment after an env file has
//! been loaded into it. The parsed [`Config`] is passed explicitly to the
//! broker connector and the forwarder.

use std::env;
use std::fmt;
use std::path::{Path, PathBuf};

use lapin::uri::{AMQPAuthority, AMQPUri, AMQPUserInfo};
use tracing::info;
use url::Url;

use crate::error::ConfigError;

/// Default endpoint of the loans API.
pub const DEFAULT_BOOKS_API_URL: &str = "http://localhost:8081/books";

/// Load an env file into the process environment.
///
/// With no path, `.env` is searched for starting at the working directory.
/// Variables already set in the environment are not overridden.
pub fn load_env_file(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    let loaded = match path {
        Some(path) => dotenvy::from_path(path).map(|_| path.to_path_buf()),
        None => dotenvy::dotenv(),
    };

    let loaded = loaded.map_err(|source| ConfigError::EnvFile {
        path: path.map(Path::to_path_buf),
        source,
    })?;

    info!(path = %loaded.display(), "env_file_loaded");
    Ok(loaded)
}

/// RabbitMQ connection credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct RabbitConfig {
    pub user: String,
    pub password: String,
    pub host: String,
    pub port: u16,
}

impl RabbitConfig {
    /// Build the AMQP URI for the default vhost.
    ///
    /// Credentials are carried as structured fields, so they need no escaping.
    pub fn amqp_uri(&self) -> AMQPUri {
        AMQPUri {
            authority: AMQPAuthority {
                userinfo: AMQPUserInfo {
                    username: self.user.clone(),
                    password: self.password.clone(),
                },
                host: self.host.clone(),
                port: self.port,
            },
            ..AMQPUri::default()
        }
    }
}

impl fmt::Debug for RabbitConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RabbitConfig")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("host", &self.host)
            .field("port", &self.port)
            .finish()
    }
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Broker credentials
    pub rabbitmq: RabbitConfig,

    /// Endpoint every decoded book is posted to
    pub books_api_url: Url,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| lookup(name).ok_or(ConfigError::MissingVar { name });

        let user = required("RABBITMQ_USER")?;
        let password = required("RABBITMQ_PASSWORD")?;
        let host = required("RABBITMQ_IP")?;

        let port = required("RABBITMQ_PORT")?;
        let port = port.trim().parse::<u16>().map_err(|e| ConfigError::InvalidVar {
            name: "RABBITMQ_PORT",
            reason: format!("{port:?}: {e}"),
        })?;

        let rabbitmq = RabbitConfig {
            user,
            password,
            host,
            port,
        };

        let raw_url = lookup("BOOKS_API_URL").unwrap_or_else(|| DEFAULT_BOOKS_API_URL.to_string());
        let books_api_url = Url::parse(&raw_url).map_err(|e| ConfigError::InvalidVar {
            name: "BOOKS_API_URL",
            reason: format!("{raw_url:?}: {e}"),
        })?;

        Ok(Config {
            rabbitmq,
            books_api_url,
        })
    }
}
