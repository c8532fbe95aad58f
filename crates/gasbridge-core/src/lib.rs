//! Core metering and discovery logic for the gas meter MQTT bridge.
//!
//! This crate is free of I/O: it owns the pulse counter, the debounce
//! filter, topic construction for the HomA `/devices` namespace, the Home
//! Assistant discovery documents, and the configuration model. Transport
//! and hardware concerns live in `gasbridge-mqtt`.

pub mod config;
pub mod control;
pub mod debounce;
pub mod discovery;
pub mod marker;
pub mod meter;
pub mod topic;

pub use config::{BridgeConfig, ConfigError, MqttSettings};
pub use control::{ControlDescriptor, ControlKind};
pub use debounce::{DebounceFilter, DebounceMode, DEFAULT_DEBOUNCE_MS};
pub use discovery::{DeviceInfo, SensorConfig};
pub use marker::{FileMarkerStore, MarkerStore};
pub use meter::{CounterCorrection, MeterReading, PulseMeter, RESOLUTION};
pub use topic::{TopicBuilder, TopicError};
