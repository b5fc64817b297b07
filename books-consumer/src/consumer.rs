//! RabbitMQ consumer loop.
//!
//! This module handles connecting to RabbitMQ, declaring the books topology
//! and consuming deliveries from `books_queue` on a dedicated task. Each
//! delivery is decoded and forwarded before the next one is taken, so books
//! reach the loans API in queue order.

use std::fmt::Display;
use std::future::Future;

use anyhow::{bail, Context, Result};
use futures::{Stream, StreamExt};
use tokio::sync::oneshot;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::forwarder::Forwarder;
use crate::queue::{Book, Broker, BOOKS_QUEUE};

/// Maximum number of body bytes echoed into a decode failure log line.
const BODY_PREVIEW_LEN: usize = 500;

/// Why the listener loop returned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StopReason {
    /// The shutdown future resolved.
    #[default]
    Shutdown,
    /// The delivery stream ended without a shutdown request.
    StreamEnded,
}

/// Counters for one run of the listener loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListenStats {
    pub stop_reason: StopReason,
    pub received: u64,
    pub delivery_errors: u64,
    pub decode_failures: u64,
    pub forwarded: u64,
    pub forward_failures: u64,
}

/// Decode a raw message body into a book.
pub fn decode(body: &[u8]) -> Result<Book, serde_json::Error> {
    serde_json::from_slice(body)
}

/// Process deliveries one at a time until the stream ends or `shutdown`
/// resolves.
///
/// Decode and forward failures are logged and the message is dropped; the
/// loop always moves on to the next delivery. A forward that is in flight
/// when `shutdown` resolves is completed first.
pub async fn listen<S, B, E, F>(deliveries: S, forwarder: &Forwarder, shutdown: F) -> ListenStats
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Display,
    F: Future<Output = ()>,
{
    let mut stats = ListenStats::default();

    tokio::pin!(deliveries);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            biased;

            _ = &mut shutdown => {
                info!("listener_stopping");
                break;
            }
            delivery = deliveries.next() => {
                match delivery {
                    Some(Ok(body)) => {
                        let body = body.as_ref();
                        stats.received += 1;

                        info!(
                            queue = BOOKS_QUEUE,
                            body_length = body.len(),
                            "rabbitmq_message_received"
                        );

                        let book = match decode(body) {
                            Ok(book) => book,
                            Err(e) => {
                                stats.decode_failures += 1;
                                error!(
                                    error = %e,
                                    body_preview = %String::from_utf8_lossy(
                                        &body[..body.len().min(BODY_PREVIEW_LEN)]
                                    ),
                                    "book_decode_failed"
                                );
                                continue;
                            }
                        };

                        match forwarder.forward(&book).await {
                            Ok(_) => stats.forwarded += 1,
                            Err(e) => {
                                stats.forward_failures += 1;
                                error!(
                                    url = %forwarder.url(),
                                    title = %book.title,
                                    error = %e,
                                    "book_forward_failed"
                                );
                            }
                        }
                    }
                    Some(Err(e)) => {
                        stats.delivery_errors += 1;
                        error!(error = %e, "rabbitmq_delivery_error");
                    }
                    None => {
                        warn!("rabbitmq_consumer_closed");
                        stats.stop_reason = StopReason::StreamEnded;
                        break;
                    }
                }
            }
        }
    }

    info!(
        stop_reason = ?stats.stop_reason,
        received = stats.received,
        delivery_errors = stats.delivery_errors,
        decode_failures = stats.decode_failures,
        forwarded = stats.forwarded,
        forward_failures = stats.forward_failures,
        "listener_stopped"
    );

    stats
}

/// Run the consumer until `shutdown` resolves.
///
/// The broker ending the subscription on its own is an error.
///
/// This function:
/// 1. Connects to RabbitMQ with the configured credentials
/// 2. Declares the fanout exchange and the books queue and binds them
/// 3. Subscribes with auto-acknowledgement
/// 4. Runs the listener loop on its own task
/// 5. Closes the channel and connection on every path once connected
pub async fn run<F>(config: Config, shutdown: F) -> Result<ListenStats>
where
    F: Future<Output = ()>,
{
    let forwarder =
        Forwarder::new(config.books_api_url.clone()).context("Failed to create HTTP client")?;

    let broker = Broker::connect(&config.rabbitmq)
        .await
        .context("Failed to connect to RabbitMQ")?;

    let result = consume(&broker, forwarder, shutdown).await;

    broker.close().await;

    info!("consumer_shutdown_complete");
    ensure_shutdown_requested(result?)
}

fn ensure_shutdown_requested(stats: ListenStats) -> Result<ListenStats> {
    match stats.stop_reason {
        StopReason::Shutdown => Ok(stats),
        StopReason::StreamEnded => bail!("RabbitMQ consumer closed unexpectedly"),
    }
}

async fn consume<F>(broker: &Broker, forwarder: Forwarder, shutdown: F) -> Result<ListenStats>
where
    F: Future<Output = ()>,
{
    broker
        .declare_topology()
        .await
        .context("Failed to declare topology")?;

    let consumer = broker.consume().await.context("Failed to start consumer")?;

    info!(url = %forwarder.url(), "consumer_ready");

    let (stop_tx, stop_rx) = oneshot::channel::<()>();

    let deliveries = consumer.map(|delivery| delivery.map(|delivery| delivery.data));
    let listener = tokio::spawn(async move {
        let stop = async {
            // A dropped sender stops the loop as well.
            let _ = stop_rx.await;
        };
        listen(deliveries, &forwarder, stop).await
    });

    tokio::pin!(listener);
    tokio::pin!(shutdown);

    let joined = tokio::select! {
        _ = &mut shutdown => {
            info!("consumer_stopping");
            let _ = stop_tx.send(());
            (&mut listener).await
        }
        joined = &mut listener => joined,
    };

    joined.context("Listener task failed")
}

#[cfg(test)]
mod tests {
    use futures::stream;
    use httpmock::prelude::*;
    use proptest::prelude::*;
    use url::Url;

    use super::*;
    use crate::config::RabbitConfig;

    type Body = Result<Vec<u8>, String>;

    fn body(json: &str) -> Body {
        Ok(json.as_bytes().to_vec())
    }

    #[test]
    fn test_decode_valid_body() {
        let book = decode(br#"{"author": "A", "title": "T", "available": true}"#).unwrap();
        assert_eq!(book, Book::new("A", "T", true));
    }

    proptest! {
        #[test]
        fn property_test_decode_inverts_encode(
            author in any::<String>(),
            title in any::<String>(),
            available in any::<bool>(),
        ) {
            let book = Book::new(author, title, available);
            let body = serde_json::to_vec(&book).unwrap();

            prop_assert_eq!(decode(&body).unwrap(), book);
        }
    }

    #[test]
    fn test_decode_inverts_encode_for_escaped_strings() {
        let cases = [
            ("\"quoted\"", "line\nbreak\ttab"),
            ("📚 𝔘𝔫𝔦𝔠𝔬𝔡𝔢", "back\\slash"),
            ("", ""),
            ("\u{0}nul", "</script>"),
        ];

        for (author, title) in cases {
            for available in [true, false] {
                let book = Book::new(author, title, available);
                let body = serde_json::to_vec(&book).unwrap();
                assert_eq!(decode(&body).unwrap(), book);
            }
        }
    }

    #[test]
    fn test_decode_malformed_body() {
        assert!(decode(b"not json").is_err());
        assert!(decode(br#"{"author": "A", "title": "T", "available": "yes"}"#).is_err());
        assert!(decode(b"").is_err());
    }

    #[tokio::test]
    async fn test_listen_skips_malformed_and_continues() {
        let server = MockServer::start_async().await;
        let first = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/books")
                    .json_body(serde_json::json!({"author": "A", "title": "First", "available": true}));
                then.status(200);
            })
            .await;
        let second = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/books")
                    .json_body(serde_json::json!({"author": "B", "title": "Second", "available": false}));
                then.status(200);
            })
            .await;

        let forwarder = Forwarder::new(Url::parse(&server.url("/books")).unwrap()).unwrap();
        let deliveries = stream::iter(vec![
            body(r#"{"author": "A", "title": "First", "available": true}"#),
            body("{broken"),
            Err("channel hiccup".to_string()),
            body(r#"{"author": "B", "title": "Second", "available": false}"#),
        ]);

        let stats = listen(deliveries, &forwarder, std::future::pending()).await;

        assert_eq!(
            stats,
            ListenStats {
                stop_reason: StopReason::StreamEnded,
                received: 3,
                delivery_errors: 1,
                decode_failures: 1,
                forwarded: 2,
                forward_failures: 0,
            }
        );
        first.assert_hits_async(1).await;
        second.assert_hits_async(1).await;
    }

    #[tokio::test]
    async fn test_listen_survives_unreachable_endpoint() {
        let forwarder = Forwarder::new(Url::parse("http://127.0.0.1:9/books").unwrap()).unwrap();
        let deliveries = stream::iter(vec![
            body(r#"{"author": "A", "title": "T", "available": true}"#),
            body(r#"{"author": "A", "title": "T2", "available": true}"#),
        ]);

        let stats = listen(deliveries, &forwarder, std::future::pending()).await;

        assert_eq!(stats.stop_reason, StopReason::StreamEnded);
        assert_eq!(stats.received, 2);
        assert_eq!(stats.forward_failures, 2);
        assert_eq!(stats.forwarded, 0);
    }

    #[tokio::test]
    async fn test_listen_stops_on_shutdown() {
        let forwarder = Forwarder::new(Url::parse("http://127.0.0.1:9/books").unwrap()).unwrap();
        let deliveries = stream::pending::<Body>();

        let stats = listen(deliveries, &forwarder, async {}).await;

        assert_eq!(stats, ListenStats::default());
        assert_eq!(stats.stop_reason, StopReason::Shutdown);
    }

    #[tokio::test]
    async fn test_stream_end_without_shutdown_is_an_error() {
        let forwarder = Forwarder::new(Url::parse("http://127.0.0.1:9/books").unwrap()).unwrap();
        let deliveries = stream::iter(Vec::<Body>::new());

        let stats = listen(deliveries, &forwarder, std::future::pending()).await;

        assert_eq!(stats.stop_reason, StopReason::StreamEnded);
        let err = ensure_shutdown_requested(stats).unwrap_err();
        assert!(err.to_string().contains("closed unexpectedly"));

        let requested = ListenStats::default();
        assert_eq!(ensure_shutdown_requested(requested).unwrap(), requested);
    }

    #[tokio::test]
    async fn test_run_fails_when_broker_unreachable() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/books");
                then.status(200);
            })
            .await;

        let config = Config {
            rabbitmq: RabbitConfig {
                user: "guest".to_string(),
                password: "guest".to_string(),
                host: "127.0.0.1".to_string(),
                port: 9,
            },
            books_api_url: Url::parse(&server.url("/books")).unwrap(),
        };

        let result = run(config, std::future::pending()).await;

        assert!(result.is_err());
        mock.assert_hits_async(0).await;
    }
}
