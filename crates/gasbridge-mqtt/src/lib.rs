//! MQTT transport, discovery publishing and the bridge controller.
//!
//! `gasbridge-core` supplies the pure metering and encoding logic; this
//! crate wires it to a broker via rumqttc and to the edge-event source
//! feeding meter pulses.

pub mod bridge;
pub mod edge;
pub mod homa;
pub mod transport;

pub use bridge::{Bridge, BridgeError, BridgeMode, BridgeState, PulseWorker};
pub use edge::{ChannelEdgeSource, EdgeEvent, EdgeEventSource, EdgeKind};
pub use homa::{DiscoveryError, HomaPublisher};
pub use transport::{MessageSink, MqttSink, TransportError};
