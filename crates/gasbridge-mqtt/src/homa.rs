//! HomA device and control advertisement publishing.
//!
//! `init` publishes the retained setup message set once per system id,
//! guarded by the discovery marker; `remove` is its exact inverse and
//! clears every retained value `init` ever set, plus the live control
//! values and the Home Assistant config documents.

use std::sync::Arc;

use thiserror::Error;

use gasbridge_core::control::ControlDescriptor;
use gasbridge_core::discovery::{self, SensorConfig};
use gasbridge_core::marker::MarkerStore;
use gasbridge_core::topic::{TopicBuilder, TopicError};

use crate::transport::{MessageSink, TransportError};

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error(transparent)]
    Topic(#[from] TopicError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("failed to encode discovery document: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Publishes the HomA setup message set and the Home Assistant discovery
/// documents for the configured control list.
pub struct HomaPublisher {
    topics: TopicBuilder,
    device_name: String,
    room: String,
    area: String,
    controls: Vec<ControlDescriptor>,
    sink: Arc<dyn MessageSink>,
    markers: Arc<dyn MarkerStore>,
}

impl HomaPublisher {
    pub fn new(
        topics: TopicBuilder,
        device_name: impl Into<String>,
        room: impl Into<String>,
        area: impl Into<String>,
        controls: Vec<ControlDescriptor>,
        sink: Arc<dyn MessageSink>,
        markers: Arc<dyn MarkerStore>,
    ) -> Self {
        Self {
            topics,
            device_name: device_name.into(),
            room: room.into(),
            area: area.into(),
            controls,
            sink,
            markers,
        }
    }

    /// Publish the retained setup messages unless the marker says they are
    /// already on the broker.
    pub async fn init(&self) -> Result<(), DiscoveryError> {
        let system_id = self.topics.system_id();
        if self.markers.exists(system_id) {
            tracing::info!(
                "HomA setup data not reloaded; delete the '{system_id}' marker and restart to resend"
            );
            return Ok(());
        }
        tracing::info!("publishing HomA setup data for '{system_id}'");

        self.sink
            .publish_retained(&self.topics.meta("room")?, self.room.clone())
            .await?;
        self.sink
            .publish_retained(&self.topics.meta("name")?, self.device_name.clone())
            .await?;

        for (index, control) in self.controls.iter().enumerate() {
            let order = index + 1;
            self.sink
                .publish_retained(
                    &self.topics.control_meta(&control.name, "type")?,
                    "text".to_string(),
                )
                .await?;
            self.sink
                .publish_retained(
                    &self.topics.control_meta(&control.name, "order")?,
                    order.to_string(),
                )
                .await?;
            self.sink
                .publish_retained(
                    &self.topics.control_meta(&control.name, "unit")?,
                    control.unit.clone(),
                )
                .await?;
            self.sink
                .publish_retained(
                    &self.topics.control_meta(&control.name, "room")?,
                    control.room.clone(),
                )
                .await?;
            self.publish_sensor_config(control).await?;
        }

        // A failed marker write only costs a re-publish on next start.
        if let Err(err) = self.markers.create(system_id) {
            tracing::warn!("could not create discovery marker for '{system_id}': {err}");
        }
        Ok(())
    }

    async fn publish_sensor_config(&self, control: &ControlDescriptor) -> Result<(), DiscoveryError> {
        let Some(config) =
            SensorConfig::for_control(control, &self.topics, &self.device_name, &self.area)?
        else {
            return Ok(());
        };
        let topic = config.config_topic();
        let payload = serde_json::to_string(&config)?;
        tracing::debug!("publishing HA config {topic}: {payload}");
        self.sink.publish_retained(&topic, payload).await?;
        Ok(())
    }

    /// Clear every retained value `init` sets, the live control values and
    /// the config documents. Does not touch the marker; safe to repeat.
    pub async fn remove(&self) -> Result<(), DiscoveryError> {
        let system_id = self.topics.system_id();
        tracing::info!("removing HomA / Home Assistant data (system id '{system_id}')");

        self.sink
            .publish_retained(&self.topics.meta("room")?, String::new())
            .await?;
        self.sink
            .publish_retained(&self.topics.meta("name")?, String::new())
            .await?;

        for control in &self.controls {
            for leaf in ["type", "order", "unit", "room"] {
                self.sink
                    .publish_retained(
                        &self.topics.control_meta(&control.name, leaf)?,
                        String::new(),
                    )
                    .await?;
            }
            self.sink
                .publish_retained(&self.topics.control(&control.name)?, String::new())
                .await?;
            self.sink
                .publish_retained(
                    &discovery::config_topic(&control.object_id(system_id)),
                    String::new(),
                )
                .await?;
        }
        Ok(())
    }
}
