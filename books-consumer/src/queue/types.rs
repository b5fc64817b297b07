//! Queue message types and broker topology names.
//!
//! The publisher side fans book records out through the `logs` exchange;
//! this consumer owns the `books_queue` binding.

use serde::{Deserialize, Serialize};

/// Fanout exchange that book records are published to.
pub const EXCHANGE: &str = "logs";

/// Durable queue bound to [`EXCHANGE`].
pub const BOOKS_QUEUE: &str = "books_queue";

/// Routing key used for the binding. Ignored by fanout exchanges.
pub const BINDING_KEY: &str = "";

/// Consumer tag announced to the broker.
pub const CONSUMER_TAG: &str = "books-consumer";

/// A book record as carried on the queue and posted to the loans API.
///
/// All three fields are required; unknown fields are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    /// Book author
    pub author: String,
    /// Book title
    pub title: String,
    /// Whether the book can currently be loaned
    pub available: bool,
}

impl Book {
    /// Create a new book record.
    pub fn new(author: impl Into<String>, title: impl Into<String>, available: bool) -> Self {
        Self {
            author: author.into(),
            title: title.into(),
            available,
        }
    }
}
