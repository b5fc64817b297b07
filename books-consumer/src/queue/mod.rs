//! Queue module for RabbitMQ operations.
//!
//! This module provides:
//! - The book record carried on the queue and the topology names
//! - The broker handle that connects, declares and subscribes
//!
//! ## Topology
//!
//! ```text
//! publisher → logs (fanout, durable) → books_queue (durable) → consumer
//! ```

pub mod broker;
pub mod types;

pub use broker::Broker;
pub use types::{Book, BINDING_KEY, BOOKS_QUEUE, CONSUMER_TAG, EXCHANGE};
