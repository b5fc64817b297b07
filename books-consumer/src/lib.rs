//! Books consumer - forwards book records from RabbitMQ to the loans API.
//!
//! ## Architecture
//!
//! ```text
//! logs (fanout) → books_queue → Consumer → decode → POST /books
//! ```

pub mod config;
pub mod consumer;
pub mod error;
pub mod forwarder;
pub mod queue;
pub mod shutdown;

// Re-export commonly used types
pub use config::{load_env_file, Config, RabbitConfig};
pub use consumer::{decode, listen, run, ListenStats, StopReason};
pub use error::{BrokerError, ConfigError, ForwardError};
pub use forwarder::Forwarder;
pub use queue::{Book, Broker, BOOKS_QUEUE, EXCHANGE};
pub use shutdown::shutdown_signal;
