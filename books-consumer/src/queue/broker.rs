//! RabbitMQ connection, topology declaration and subscription.

use lapin::{
    options::{
        BasicConsumeOptions, ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions,
    },
    types::FieldTable,
    Channel, Connection, ConnectionProperties, Consumer, ExchangeKind,
};
use tracing::{info, warn};

use super::types::{BINDING_KEY, BOOKS_QUEUE, CONSUMER_TAG, EXCHANGE};
use crate::config::RabbitConfig;
use crate::error::BrokerError;

/// An open connection together with the one channel used on it.
pub struct Broker {
    connection: Connection,
    channel: Channel,
}

impl Broker {
    /// Connect to RabbitMQ and open a channel. Fails on the first error.
    pub async fn connect(config: &RabbitConfig) -> Result<Self, BrokerError> {
        info!(host = %config.host, port = config.port, "rabbitmq_connecting");

        let connection = Connection::connect_uri(config.amqp_uri(), ConnectionProperties::default())
            .await
            .map_err(BrokerError::Connect)?;

        info!("rabbitmq_connected");

        let channel = match connection.create_channel().await {
            Ok(channel) => channel,
            Err(e) => {
                if let Err(close_err) = connection.close(200, "Channel open failed").await {
                    warn!(error = %close_err, "rabbitmq_connection_close_error");
                }
                return Err(BrokerError::Channel(e));
            }
        };

        info!("rabbitmq_channel_created");

        Ok(Self {
            connection,
            channel,
        })
    }

    /// The channel all operations run on.
    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    /// Declare the fanout exchange and the queue, then bind them.
    ///
    /// All three operations are idempotent against an existing, matching
    /// topology.
    pub async fn declare_topology(&self) -> Result<(), BrokerError> {
        self.channel
            .exchange_declare(
                EXCHANGE,
                ExchangeKind::Fanout,
                ExchangeDeclareOptions {
                    durable: true,
                    auto_delete: false,
                    internal: false,
                    nowait: false,
                    passive: false,
                },
                FieldTable::default(),
            )
            .await
            .map_err(|source| BrokerError::DeclareExchange {
                exchange: EXCHANGE,
                source,
            })?;

        info!(exchange = EXCHANGE, kind = "fanout", "rabbitmq_exchange_declared");

        self.channel
            .queue_declare(
                BOOKS_QUEUE,
                QueueDeclareOptions {
                    durable: true,
                    exclusive: false,
                    auto_delete: false,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|source| BrokerError::DeclareQueue {
                queue: BOOKS_QUEUE,
                source,
            })?;

        info!(queue = BOOKS_QUEUE, "rabbitmq_queue_declared");

        self.channel
            .queue_bind(
                BOOKS_QUEUE,
                EXCHANGE,
                BINDING_KEY,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|source| BrokerError::Bind {
                queue: BOOKS_QUEUE,
                exchange: EXCHANGE,
                source,
            })?;

        info!(queue = BOOKS_QUEUE, exchange = EXCHANGE, "rabbitmq_queue_bound");

        Ok(())
    }

    /// Start consuming from the books queue.
    ///
    /// Deliveries are auto-acknowledged: the broker forgets a message as soon
    /// as it is handed over, whatever happens to it afterwards.
    pub async fn consume(&self) -> Result<Consumer, BrokerError> {
        let consumer = self
            .channel
            .basic_consume(
                BOOKS_QUEUE,
                CONSUMER_TAG,
                BasicConsumeOptions {
                    no_ack: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|source| BrokerError::Consume {
                queue: BOOKS_QUEUE,
                source,
            })?;

        info!(queue = BOOKS_QUEUE, consumer_tag = CONSUMER_TAG, "rabbitmq_consumer_started");

        Ok(consumer)
    }

    /// Close the channel, then the connection.
    pub async fn close(self) {
        if let Err(e) = self.channel.close(200, "Normal shutdown").await {
            warn!(error = %e, "rabbitmq_channel_close_error");
        }

        if let Err(e) = self.connection.close(200, "Normal shutdown").await {
            warn!(error = %e, "rabbitmq_connection_close_error");
        }

        info!("rabbitmq_closed");
    }
}
