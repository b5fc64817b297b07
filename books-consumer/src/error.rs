//! Error types for configuration, broker setup and forwarding.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load environment file {path:?}: {source}")]
    EnvFile {
        path: Option<PathBuf>,
        #[source]
        source: dotenvy::Error,
    },

    #[error("missing required environment variable {name}")]
    MissingVar { name: &'static str },

    #[error("invalid value for environment variable {name}: {reason}")]
    InvalidVar { name: &'static str, reason: String },
}

/// Errors raised while talking to RabbitMQ.
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("failed to connect to RabbitMQ: {0}")]
    Connect(#[source] lapin::Error),

    #[error("failed to open channel: {0}")]
    Channel(#[source] lapin::Error),

    #[error("failed to declare exchange {exchange}: {source}")]
    DeclareExchange {
        exchange: &'static str,
        #[source]
        source: lapin::Error,
    },

    #[error("failed to declare queue {queue}: {source}")]
    DeclareQueue {
        queue: &'static str,
        #[source]
        source: lapin::Error,
    },

    #[error("failed to bind queue {queue} to exchange {exchange}: {source}")]
    Bind {
        queue: &'static str,
        exchange: &'static str,
        #[source]
        source: lapin::Error,
    },

    #[error("failed to start consumer on {queue}: {source}")]
    Consume {
        queue: &'static str,
        #[source]
        source: lapin::Error,
    },
}

/// Errors raised while forwarding a book to the loans API.
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("failed to serialize book: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("request to loans API failed: {0}")]
    Request(#[from] reqwest::Error),
}
