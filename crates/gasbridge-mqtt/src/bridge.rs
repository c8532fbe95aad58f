//! Bridge controller.
//!
//! Wires the edge-event source through the debounce filter into the pulse
//! meter, publishes readings, and handles the inbound counter-correction
//! message. Lifecycle:
//!
//! `Connecting → Subscribing → {Initializing | Removing} → Serving →
//! Draining → Terminated`
//!
//! Connection establishment is all-or-nothing at startup; reconnects after
//! that are rumqttc's business, and the correction-topic subscription is
//! renewed on every `ConnAck` the event loop sees.

use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS, TlsConfiguration, Transport};
use thiserror::Error;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

use gasbridge_core::config::BridgeConfig;
use gasbridge_core::control::{self, standard_controls, ControlDescriptor};
use gasbridge_core::debounce::DebounceFilter;
use gasbridge_core::marker::MarkerStore;
use gasbridge_core::meter::{MeterReading, PulseMeter};
use gasbridge_core::topic::{TopicBuilder, TopicError};

use crate::edge::{EdgeEvent, EdgeEventSource, EdgeKind};
use crate::homa::{DiscoveryError, HomaPublisher};
use crate::transport::{MessageSink, MqttSink, TransportError};

/// Bound on the edge wait so the serving loop re-checks the shutdown flag
/// even when the meter is idle.
pub const EDGE_WAIT_TIMEOUT: Duration = Duration::from_secs(5);

const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum BridgeError {
    /// Startup connect failure is fatal; there is no retry at this layer.
    #[error("MQTT connect to {addr} failed: {source}")]
    Connect {
        addr: String,
        #[source]
        source: rumqttc::ConnectionError,
    },
    #[error("failed to read CA certificate {path}: {source}")]
    CaCerts {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Topic(#[from] TopicError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
}

/// What the bridge does after subscribing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeMode {
    /// Publish discovery (marker-guarded) and serve pulses.
    Serve,
    /// Clear all retained state and exit without serving.
    Remove,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    Connecting,
    Subscribing,
    Initializing,
    Removing,
    Serving,
    Draining,
    Terminated,
}

/// Pre-built control value topics, resolved once before serving.
#[derive(Debug, Clone)]
pub struct ControlTopics {
    volume: String,
    energy: String,
    flow_rate: String,
    timestamp: String,
}

impl ControlTopics {
    pub fn new(topics: &TopicBuilder) -> Result<Self, TopicError> {
        Ok(Self {
            volume: topics.control(control::VOLUME)?,
            energy: topics.control(control::ENERGY)?,
            flow_rate: topics.control(control::FLOW_RATE)?,
            timestamp: topics.control(control::TIMESTAMP)?,
        })
    }
}

/// The serving loop: filters edge events, counts pulses, publishes
/// readings. Separated from [`Bridge`] so it runs against any sink and
/// edge source.
pub struct PulseWorker {
    line: u32,
    debounce: DebounceFilter,
    meter: Arc<Mutex<PulseMeter>>,
    topics: ControlTopics,
    shutdown: watch::Receiver<bool>,
}

impl PulseWorker {
    pub fn new(
        line: u32,
        debounce: DebounceFilter,
        meter: Arc<Mutex<PulseMeter>>,
        topics: ControlTopics,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            line,
            debounce,
            meter,
            topics,
            shutdown,
        }
    }

    /// Run until the shutdown flag flips or the edge source is exhausted.
    pub async fn run<E, S>(mut self, source: &mut E, sink: &S)
    where
        E: EdgeEventSource + ?Sized,
        S: MessageSink + ?Sized,
    {
        tracing::info!("started - waiting for pulses on line {} ...", self.line);
        loop {
            if *self.shutdown.borrow() {
                break;
            }
            let event = tokio::select! {
                _ = self.shutdown.changed() => break,
                event = tokio::time::timeout(EDGE_WAIT_TIMEOUT, source.next_event()) => event,
            };
            match event {
                // Timed out with no edge; loop around and re-check shutdown.
                Err(_) => continue,
                Ok(None) => {
                    tracing::info!("edge event source closed");
                    break;
                }
                Ok(Some(event)) => self.handle_event(event, sink).await,
            }
        }
        tracing::info!("pulse loop stopped");
    }

    async fn handle_event<S>(&mut self, event: EdgeEvent, sink: &S)
    where
        S: MessageSink + ?Sized,
    {
        if event.line != self.line || event.kind != EdgeKind::Rising {
            tracing::error!(
                "unexpected {:?} event on line {}, expected {:?} on {}",
                event.kind,
                event.line,
                EdgeKind::Rising,
                self.line
            );
            return;
        }
        let ts_ms = event.timestamp_ms();
        let last_ms = self.debounce.last_event_ms();
        if !self.debounce.accept(ts_ms) {
            tracing::debug!(
                "debounce: ignored pulse on line {} at {ts_ms} ms, last at {last_ms} ms",
                event.line
            );
            return;
        }
        let (reading, counter) = {
            let mut meter = self.meter.lock().await;
            let reading = meter.on_pulse(ts_ms, Local::now());
            (reading, meter.counter())
        };
        self.publish_reading(sink, &reading).await;
        tracing::debug!(
            "rising edge detected. counter = {counter}, volume = {} m³",
            reading.volume
        );
    }

    async fn publish_reading<S>(&self, sink: &S, reading: &MeterReading)
    where
        S: MessageSink + ?Sized,
    {
        let values = [
            (&self.topics.volume, reading.volume.to_string()),
            (&self.topics.energy, reading.energy.to_string()),
            (&self.topics.flow_rate, reading.flow_rate.to_string()),
            (&self.topics.timestamp, reading.timestamp.clone()),
        ];
        for (topic, value) in values {
            // Fire-and-forget; the transport owns queuing and retry.
            if let Err(err) = sink.publish_retained(topic, value).await {
                tracing::error!("failed to queue publish to {topic}: {err}");
            }
        }
    }
}

/// Apply an inbound counter-correction payload (a decimal volume string).
pub async fn apply_correction(meter: &Mutex<PulseMeter>, payload: &str) {
    match payload.trim().parse::<f64>() {
        Ok(volume) => {
            let correction = meter.lock().await.correct_counter(volume);
            if correction.changed() {
                tracing::warn!(
                    "setting new gas counter: {} which differs from current ({})",
                    correction.new,
                    correction.old
                );
            }
        }
        Err(err) => tracing::error!("invalid Volume correction payload '{payload}': {err}"),
    }
}

/// Owns the MQTT session and drives the bridge lifecycle.
pub struct Bridge {
    config: BridgeConfig,
    controls: Vec<ControlDescriptor>,
    topics: TopicBuilder,
    meter: Arc<Mutex<PulseMeter>>,
    state: BridgeState,
    shutdown: watch::Receiver<bool>,
}

impl Bridge {
    pub fn new(config: BridgeConfig, shutdown: watch::Receiver<bool>) -> Self {
        let topics = TopicBuilder::new(config.system_id.clone());
        let meter = Arc::new(Mutex::new(PulseMeter::new(config.calorific_value)));
        Self {
            config,
            controls: standard_controls(),
            topics,
            meter,
            state: BridgeState::Connecting,
            shutdown,
        }
    }

    pub fn state(&self) -> BridgeState {
        self.state
    }

    fn set_state(&mut self, next: BridgeState) {
        tracing::debug!("bridge state {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    fn mqtt_options(&self) -> Result<MqttOptions, BridgeError> {
        let mqtt = &self.config.mqtt;
        let mut options = MqttOptions::new(
            format!("gasbridge_{}", self.config.system_id),
            mqtt.host.clone(),
            mqtt.port,
        );
        options.set_keep_alive(Duration::from_secs(mqtt.keep_alive));
        if let (Some(user), Some(pass)) = (&mqtt.username, &mqtt.password) {
            options.set_credentials(user.clone(), pass.clone());
        }
        if mqtt.tls_enabled() {
            let path = mqtt.ca_certs.as_deref().unwrap_or_default();
            let ca = std::fs::read(path).map_err(|source| BridgeError::CaCerts {
                path: path.to_string(),
                source,
            })?;
            options.set_transport(Transport::Tls(TlsConfiguration::Simple {
                ca,
                alpn: None,
                client_auth: None,
            }));
        }
        Ok(options)
    }

    /// Run the bridge to completion.
    pub async fn run<E>(
        mut self,
        mode: BridgeMode,
        mut edge_source: E,
        markers: Arc<dyn MarkerStore>,
    ) -> Result<(), BridgeError>
    where
        E: EdgeEventSource,
    {
        self.set_state(BridgeState::Connecting);
        let addr = self.config.mqtt.full_broker_addr();
        tracing::info!("connecting to MQTT broker {addr}");
        let (client, mut eventloop) = AsyncClient::new(self.mqtt_options()?, 10);
        wait_for_connack(&mut eventloop, &addr).await?;

        self.set_state(BridgeState::Subscribing);
        let correction_topic = self.topics.control(control::VOLUME)?;
        client
            .subscribe(&correction_topic, QoS::AtLeastOnce)
            .await
            .map_err(TransportError::from)?;

        let (draining_tx, draining_rx) = watch::channel(false);
        let event_task = spawn_event_loop(
            eventloop,
            client.clone(),
            correction_topic,
            self.meter.clone(),
            draining_rx,
        );

        let sink: Arc<dyn MessageSink> = Arc::new(MqttSink::new(client.clone()));
        let homa = HomaPublisher::new(
            self.topics.clone(),
            self.config.device_name.clone(),
            self.config.room.clone(),
            self.config.area.clone(),
            self.controls.clone(),
            sink.clone(),
            markers,
        );

        match mode {
            BridgeMode::Remove => {
                self.set_state(BridgeState::Removing);
                homa.remove().await?;
            }
            BridgeMode::Serve => {
                self.set_state(BridgeState::Initializing);
                homa.init().await?;

                self.set_state(BridgeState::Serving);
                let worker = PulseWorker::new(
                    self.config.gpio_pin,
                    DebounceFilter::new(self.config.debounce_ms, self.config.debounce_mode),
                    self.meter.clone(),
                    ControlTopics::new(&self.topics)?,
                    self.shutdown.clone(),
                );
                worker.run(&mut edge_source, sink.as_ref()).await;
            }
        }

        // Flush queued publishes, then tear the session down.
        self.set_state(BridgeState::Draining);
        let _ = draining_tx.send(true);
        if let Err(err) = client.disconnect().await {
            tracing::debug!("disconnect while draining: {err}");
        }
        if tokio::time::timeout(DRAIN_TIMEOUT, event_task).await.is_err() {
            tracing::warn!("MQTT event loop did not drain within {DRAIN_TIMEOUT:?}");
        }

        self.set_state(BridgeState::Terminated);
        Ok(())
    }
}

async fn wait_for_connack(eventloop: &mut EventLoop, addr: &str) -> Result<(), BridgeError> {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                tracing::debug!("connected with result code {:?}", ack.code);
                return Ok(());
            }
            Ok(_) => {}
            Err(source) => {
                return Err(BridgeError::Connect {
                    addr: addr.to_string(),
                    source,
                });
            }
        }
    }
}

fn spawn_event_loop(
    mut eventloop: EventLoop,
    client: AsyncClient,
    correction_topic: String,
    meter: Arc<Mutex<PulseMeter>>,
    draining: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    // Renewing the subscription here covers reconnects; the
                    // broker answers with the retained Volume, which restores
                    // the counter through the correction path.
                    if let Err(err) = client.subscribe(&correction_topic, QoS::AtLeastOnce).await {
                        tracing::error!("failed to renew subscription to {correction_topic}: {err}");
                    }
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    let payload = String::from_utf8_lossy(&publish.payload).into_owned();
                    tracing::debug!("inbound {}: {payload}", publish.topic);
                    if publish.topic == correction_topic {
                        apply_correction(&meter, &payload).await;
                    }
                }
                Ok(_) => {}
                Err(err) => {
                    if *draining.borrow() {
                        break;
                    }
                    tracing::error!("MQTT connection error: {err}");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn correction_parses_decimal_volume() {
        let meter = Mutex::new(PulseMeter::new(11.4));
        apply_correction(&meter, "1.27").await;
        assert_eq!(meter.lock().await.counter(), 127);

        // Idempotent for the same payload.
        apply_correction(&meter, "1.27").await;
        assert_eq!(meter.lock().await.counter(), 127);
    }

    #[tokio::test]
    async fn correction_ignores_garbage() {
        let meter = Mutex::new(PulseMeter::new(11.4));
        apply_correction(&meter, "not-a-number").await;
        assert_eq!(meter.lock().await.counter(), 0);
    }

    #[tokio::test]
    async fn correction_trims_whitespace() {
        let meter = Mutex::new(PulseMeter::new(11.4));
        apply_correction(&meter, " 0.5\n").await;
        assert_eq!(meter.lock().await.counter(), 50);
    }
}
