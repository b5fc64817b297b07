//! Books consumer - RabbitMQ listener for book records.
//!
//! Binds `books_queue` to the `logs` fanout exchange and posts every decoded
//! book to the loans API until SIGINT or SIGTERM.

use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use books_consumer::{consumer, load_env_file, shutdown_signal, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured JSON logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    tracing::info!("consumer_starting");

    // Load the env file, then configuration from the environment
    let env_file = env::var_os("ENV_FILE").map(PathBuf::from);
    load_env_file(env_file.as_deref()).context("Failed to load environment file")?;

    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!(
        rabbitmq_host = %config.rabbitmq.host,
        rabbitmq_port = config.rabbitmq.port,
        rabbitmq_user = %config.rabbitmq.user,
        books_api_url = %config.books_api_url,
        "config_loaded"
    );

    let stats = consumer::run(config, shutdown_signal()).await?;
    tracing::info!(forwarded = stats.forwarded, "consumer_exited");

    Ok(())
}
