//! The Broker Adapter: connection, channel, topology setup, typed
//! publish/consume, reconnect/heartbeat, backed by `lapin`.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use futures::StreamExt;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicPublishOptions,
    ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions,
};
use lapin::types::{AMQPValue, FieldTable};
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind};
use pdfpipe_types::prelude::*;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::reconnect::{backoff_for_attempt, MAX_RECONNECT_ATTEMPTS};
use crate::topology::{QueueSpec, DEAD_LETTER_EXCHANGE, DEAD_LETTER_QUEUE, MAIN_EXCHANGE, PROGRESS_MESSAGE_TTL_MS, QUEUES};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum AdapterHealth {
    Healthy,
    Unhealthy,
}

type Resubscribe = Arc<dyn Fn(Channel) -> Pin<Box<dyn Future<Output = Result<()>> + Send>> + Send + Sync>;

/// Registered consumer, kept so a reconnect can re-issue `basic_consume`
/// under the original tag on a fresh channel.
struct ConsumerRegistration {
    queue: &'static str,
    consumer_tag: String,
    resubscribe: Resubscribe,
}

pub struct BrokerAdapter {
    url: String,
    connection: Mutex<Option<Connection>>,
    channel: Mutex<Option<Channel>>,
    consumers: DashMap<String, ConsumerRegistration>,
}

impl BrokerAdapter {
    pub async fn connect(url: impl Into<String>) -> Result<Self> {
        let url = url.into();
        let adapter = Self {
            url,
            connection: Mutex::new(None),
            channel: Mutex::new(None),
            consumers: DashMap::new(),
        };
        adapter.establish().await?;
        adapter.declare_topology().await?;
        Ok(adapter)
    }

    async fn establish(&self) -> Result<()> {
        let connection = Connection::connect(&self.url, ConnectionProperties::default())
            .await
            .map_err(|e| PipelineError::Broker(format!("connect failed: {e}")))?;
        let channel = connection
            .create_channel()
            .await
            .map_err(|e| PipelineError::Broker(format!("channel creation failed: {e}")))?;
        *self.connection.lock().await = Some(connection);
        *self.channel.lock().await = Some(channel);
        Ok(())
    }

    /// Idempotent on start and reconnect: declares the main exchange, the
    /// DLX, and every queue in the fixed topology, bound to the main
    /// exchange with its fixed routing key.
    pub async fn declare_topology(&self) -> Result<()> {
        let guard = self.channel.lock().await;
        let channel = guard
            .as_ref()
            .ok_or_else(|| PipelineError::Broker("no channel".into()))?;

        channel
            .exchange_declare(
                MAIN_EXCHANGE,
                ExchangeKind::Topic,
                ExchangeDeclareOptions { durable: true, ..Default::default() },
                FieldTable::default(),
            )
            .await
            .map_err(|e| PipelineError::Broker(format!("exchange_declare {MAIN_EXCHANGE}: {e}")))?;

        channel
            .exchange_declare(
                DEAD_LETTER_EXCHANGE,
                ExchangeKind::Topic,
                ExchangeDeclareOptions { durable: true, ..Default::default() },
                FieldTable::default(),
            )
            .await
            .map_err(|e| PipelineError::Broker(format!("exchange_declare {DEAD_LETTER_EXCHANGE}: {e}")))?;

        for spec in QUEUES {
            self.declare_and_bind(channel, spec, MAIN_EXCHANGE).await?;
        }
        self.declare_and_bind(channel, &DEAD_LETTER_QUEUE, DEAD_LETTER_EXCHANGE)
            .await?;

        Ok(())
    }

    async fn declare_and_bind(&self, channel: &Channel, spec: &QueueSpec, exchange: &str) -> Result<()> {
        let mut args = FieldTable::default();
        args.insert("x-dead-letter-exchange".into(), AMQPValue::LongString(DEAD_LETTER_EXCHANGE.into()));
        if !spec.persistent_messages {
            args.insert("x-message-ttl".into(), AMQPValue::LongInt(PROGRESS_MESSAGE_TTL_MS as i32));
        }

        let declared = channel
            .queue_declare(
                spec.queue,
                QueueDeclareOptions { durable: true, exclusive: false, auto_delete: false, ..Default::default() },
                args,
            )
            .await;

        match declared {
            Ok(_) => {}
            Err(e) => {
                // PRECONDITION_FAILED: queue exists with different arguments.
                // Never silently adopt the mismatched arguments.
                error!(queue = spec.queue, error = %e, "queue declaration failed, refusing to start");
                return Err(PipelineError::Fatal(format!(
                    "queue {} declaration failed (possible argument mismatch): {e}",
                    spec.queue
                )));
            }
        }

        channel
            .queue_bind(spec.queue, exchange, spec.routing_key, QueueBindOptions::default(), FieldTable::default())
            .await
            .map_err(|e| PipelineError::Broker(format!("queue_bind {}: {e}", spec.queue)))?;

        Ok(())
    }

    /// Publishes an envelope as UTF-8 JSON. Requests are persistent;
    /// progress messages (TTL-bearing queues) are transient.
    pub async fn publish<T: serde::Serialize + Send + Sync>(
        &self,
        routing_key: &str,
        envelope: &Envelope<T>,
        persistent: bool,
    ) -> Result<()> {
        let body = serde_json::to_vec(envelope)?;
        let mut properties = BasicProperties::default()
            .with_delivery_mode(if persistent { 2 } else { 1 })
            .with_priority(envelope.priority.broker_priority())
            .with_content_type("application/json".into());
        properties = properties.with_headers({
            let mut headers = FieldTable::default();
            headers.insert(
                "x-message-type".into(),
                AMQPValue::LongString(format!("{:?}", envelope.event_type).into()),
            );
            headers
        });

        let guard = self.channel.lock().await;
        let channel = guard
            .as_ref()
            .ok_or_else(|| PipelineError::Broker("no channel".into()))?;

        channel
            .basic_publish(MAIN_EXCHANGE, routing_key, BasicPublishOptions::default(), &body, properties)
            .await
            .map_err(|e| PipelineError::Broker(format!("publish to {routing_key}: {e}")))?
            .await
            .map_err(|e| PipelineError::Broker(format!("publisher confirm for {routing_key}: {e}")))?;

        Ok(())
    }

    /// Registers a manual-ack consumer. `handler` returns `Ok(())` on
    /// success (the adapter acks) or an error (the adapter nacks without
    /// requeue, sending the message to the DLX). `handler` must never panic
    /// across the consume loop; callers should catch their own errors.
    pub async fn consume<T, F, Fut>(&self, queue: &'static str, handler: F) -> Result<()>
    where
        T: serde::de::DeserializeOwned + Send + 'static,
        F: Fn(Envelope<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send,
    {
        let consumer_tag = format!("{queue}-consumer");
        let handler = Arc::new(handler);

        let guard = self.channel.lock().await;
        let channel = guard
            .as_ref()
            .ok_or_else(|| PipelineError::Broker("no channel".into()))?
            .clone();
        drop(guard);

        Self::spawn_consumer_loop(channel, queue, consumer_tag.clone(), handler.clone()).await?;

        let resubscribe_tag = consumer_tag.clone();
        let resubscribe: Resubscribe = Arc::new(move |channel: Channel| {
            let handler = handler.clone();
            let consumer_tag = resubscribe_tag.clone();
            Box::pin(async move { Self::spawn_consumer_loop(channel, queue, consumer_tag, handler).await })
        });

        self.consumers.insert(
            consumer_tag.clone(),
            ConsumerRegistration { queue, consumer_tag, resubscribe },
        );

        Ok(())
    }

    /// Issues `basic_consume` on `channel` and spawns the delivery loop that
    /// dispatches to `handler`. Shared by the initial [`Self::consume`] call
    /// and by [`Self::resubscribe_all`] after a reconnect.
    async fn spawn_consumer_loop<T, F, Fut>(
        channel: Channel,
        queue: &'static str,
        consumer_tag: String,
        handler: Arc<F>,
    ) -> Result<()>
    where
        T: serde::de::DeserializeOwned + Send + 'static,
        F: Fn(Envelope<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send,
    {
        let mut consumer = channel
            .basic_consume(
                queue,
                &consumer_tag,
                BasicConsumeOptions { no_ack: false, ..Default::default() },
                FieldTable::default(),
            )
            .await
            .map_err(|e| PipelineError::Broker(format!("basic_consume {queue}: {e}")))?;

        tokio::spawn(async move {
            while let Some(delivery) = consumer.next().await {
                let delivery = match delivery {
                    Ok(delivery) => delivery,
                    Err(e) => {
                        warn!(queue, error = %e, "consumer stream error");
                        continue;
                    }
                };

                let envelope: std::result::Result<Envelope<T>, _> = serde_json::from_slice(&delivery.data);
                match envelope {
                    Ok(envelope) => match handler(envelope).await {
                        Ok(()) => {
                            if let Err(e) = delivery.ack(BasicAckOptions::default()).await {
                                error!(queue, error = %e, "ack failed");
                            }
                        }
                        Err(e) => {
                            warn!(queue, error = %e, "handler failed, nacking without requeue");
                            if let Err(e) = delivery.nack(BasicNackOptions { requeue: false, ..Default::default() }).await {
                                error!(queue, error = %e, "nack failed");
                            }
                        }
                    },
                    Err(e) => {
                        // Poison message: malformed envelope. Never retry.
                        warn!(queue, error = %e, "poison message, routing to DLQ");
                        if let Err(e) = delivery.nack(BasicNackOptions { requeue: false, ..Default::default() }).await {
                            error!(queue, error = %e, "nack failed for poison message");
                        }
                    }
                }
            }
        });

        Ok(())
    }

    /// Re-issues `basic_consume` for every registered consumer on the
    /// current channel, under its original consumer tag.
    async fn resubscribe_all(&self) -> Result<()> {
        let guard = self.channel.lock().await;
        let channel = guard
            .as_ref()
            .ok_or_else(|| PipelineError::Broker("no channel".into()))?
            .clone();
        drop(guard);

        for entry in self.consumers.iter() {
            let registration = entry.value();
            info!(queue = registration.queue, consumer_tag = %registration.consumer_tag, "re-registering consumer after reconnect");
            (registration.resubscribe)(channel.clone()).await?;
        }
        Ok(())
    }

    /// Issues a passive heartbeat check every 30s. Failure is logged but
    /// does not itself trigger reconnect — the connection's own error does.
    pub fn spawn_heartbeat(self: &Arc<Self>) {
        let adapter = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(30));
            loop {
                interval.tick().await;
                let guard = adapter.channel.lock().await;
                match guard.as_ref() {
                    Some(channel) => {
                        debug!(channel_id = channel.id(), "heartbeat ok");
                    }
                    None => {
                        warn!("heartbeat check found no active channel");
                    }
                }
            }
        });
    }

    /// Reconnects with exponential backoff (5s, 10s, 20s, 40s, 80s), capped
    /// at 5 attempts: re-establishes the connection, re-asserts topology,
    /// re-registers the disconnect listener on the new connection, and
    /// re-issues `basic_consume` for every consumer under its original tag.
    /// Returns `Unhealthy` if all attempts are exhausted.
    pub async fn reconnect(self: &Arc<Self>) -> AdapterHealth {
        for attempt in 1..=MAX_RECONNECT_ATTEMPTS {
            let Some(delay) = backoff_for_attempt(attempt) else {
                break;
            };
            tokio::time::sleep(delay).await;
            info!(attempt, "attempting broker reconnect");
            if self.establish().await.is_ok() && self.declare_topology().await.is_ok() {
                if let Err(e) = self.resubscribe_all().await {
                    error!(error = %e, "failed to re-register consumers after reconnect, retrying");
                    continue;
                }
                self.listen_for_disconnect();
                info!("reconnect succeeded, topology and consumers re-asserted");
                return AdapterHealth::Healthy;
            }
        }
        error!("reconnect exhausted {} attempts", MAX_RECONNECT_ATTEMPTS);
        AdapterHealth::Unhealthy
    }

    /// Registers a one-shot handler on the current connection's error/close
    /// notification that triggers [`Self::reconnect`]. Must be re-invoked
    /// after every successful (re)connect, since the handler is tied to the
    /// `Connection` instance it was registered on.
    pub fn listen_for_disconnect(self: &Arc<Self>) {
        let adapter = Arc::clone(self);
        tokio::spawn(async move {
            let guard = adapter.connection.lock().await;
            let Some(connection) = guard.as_ref() else {
                warn!("listen_for_disconnect called with no active connection");
                return;
            };
            let adapter_for_callback = Arc::clone(&adapter);
            connection.on_error(move |err| {
                warn!(error = %err, "amqp connection error, triggering reconnect");
                let adapter = Arc::clone(&adapter_for_callback);
                tokio::spawn(async move {
                    adapter.reconnect().await;
                });
            });
        });
    }

    /// Reports `Healthy` only while both the connection and its channel are
    /// live; used by the pipeline service's health endpoint.
    pub async fn health(&self) -> AdapterHealth {
        let connected = matches!(self.connection.lock().await.as_ref(), Some(c) if c.status().connected());
        let channel_open = self.channel.lock().await.as_ref().is_some();
        if connected && channel_open {
            AdapterHealth::Healthy
        } else {
            AdapterHealth::Unhealthy
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consumer_tag_format_is_stable() {
        let tag = format!("{}-consumer", "pdf-analysis-request");
        assert_eq!(tag, "pdf-analysis-request-consumer");
    }
}
