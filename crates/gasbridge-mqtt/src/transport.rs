//! Outbound publish boundary.
//!
//! The engine never blocks on publish acknowledgment; rumqttc queues and
//! retries delivery on its own event loop. Per-topic ordering is
//! last-write-wins through retained-message semantics.

use async_trait::async_trait;
use rumqttc::{AsyncClient, QoS};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("MQTT client error: {0}")]
    Client(#[from] rumqttc::ClientError),
}

/// Fire-and-forget retained publishes.
#[async_trait]
pub trait MessageSink: Send + Sync {
    async fn publish_retained(&self, topic: &str, payload: String) -> Result<(), TransportError>;
}

/// rumqttc-backed sink.
#[derive(Clone)]
pub struct MqttSink {
    client: AsyncClient,
}

impl MqttSink {
    pub fn new(client: AsyncClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl MessageSink for MqttSink {
    async fn publish_retained(&self, topic: &str, payload: String) -> Result<(), TransportError> {
        self.client
            .publish(topic, QoS::AtLeastOnce, true, payload)
            .await?;
        Ok(())
    }
}
