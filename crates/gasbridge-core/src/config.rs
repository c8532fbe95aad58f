//! Bridge configuration.
//!
//! Loaded from a Home Assistant add-on style JSON options file; every field
//! has a default so a missing file yields a runnable configuration. CLI
//! flags override the broker host/port and the debug flag after loading.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::debounce::{DebounceMode, DEFAULT_DEBOUNCE_MS};
use crate::marker::DEFAULT_MARKER_DIR;
use crate::meter::DEFAULT_CALORIFIC_VALUE;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// MQTT broker settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MqttSettings {
    #[serde(default = "default_mqtt_host")]
    pub host: String,
    #[serde(default = "default_mqtt_port")]
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Path to a CA certificate bundle. TLS is enabled when set and
    /// non-empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_certs: Option<String>,
    /// Keep-alive interval in seconds.
    #[serde(default = "default_keep_alive")]
    pub keep_alive: u64,
}

impl MqttSettings {
    pub fn full_broker_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// TLS is keyed on a configured, non-empty CA certificate path.
    pub fn tls_enabled(&self) -> bool {
        self.ca_certs.as_deref().is_some_and(|p| !p.is_empty())
    }
}

impl Default for MqttSettings {
    fn default() -> Self {
        Self {
            host: default_mqtt_host(),
            port: default_mqtt_port(),
            username: None,
            password: None,
            ca_certs: None,
            keep_alive: default_keep_alive(),
        }
    }
}

/// Top-level bridge configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Device display name.
    #[serde(default = "default_device_name")]
    pub device_name: String,

    /// GPIO line carrying the meter pulses (BCM numbering).
    #[serde(default = "default_gpio_pin")]
    pub gpio_pin: u32,

    /// Volume-to-energy conversion factor [kWh/m³].
    #[serde(default = "default_calorific_value")]
    pub calorific_value: f64,

    /// HomA system identifier; keys the topic namespace and the marker.
    #[serde(default = "default_system_id", rename = "homa_system_id")]
    pub system_id: String,

    /// Room label for the device.
    #[serde(default = "default_room", rename = "homa_room")]
    pub room: String,

    /// Suggested area in Home Assistant.
    #[serde(default = "default_area", rename = "hass_area")]
    pub area: String,

    /// Enable debug logging.
    #[serde(default)]
    pub debug: bool,

    /// Minimum spacing between counted edges [ms].
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Sliding (compatible) or fixed dead-time debounce.
    #[serde(default)]
    pub debounce_mode: DebounceMode,

    /// Directory for the discovery marker file.
    #[serde(default = "default_marker_dir")]
    pub marker_dir: String,

    #[serde(default)]
    pub mqtt: MqttSettings,
}

fn default_device_name() -> String {
    "Gas Meter".to_string()
}
// Line 17 = GPIO/BCM pin 17 = physical pin 11, see https://pinout.xyz
fn default_gpio_pin() -> u32 {
    17
}
fn default_calorific_value() -> f64 {
    DEFAULT_CALORIFIC_VALUE
}
fn default_system_id() -> String {
    "123456-gas-meter".to_string()
}
fn default_room() -> String {
    "Sensors".to_string()
}
fn default_area() -> String {
    "Energie".to_string()
}
fn default_debounce_ms() -> u64 {
    DEFAULT_DEBOUNCE_MS
}
fn default_marker_dir() -> String {
    DEFAULT_MARKER_DIR.to_string()
}
fn default_mqtt_host() -> String {
    "localhost".to_string()
}
fn default_mqtt_port() -> u16 {
    1883
}
fn default_keep_alive() -> u64 {
    60
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            device_name: default_device_name(),
            gpio_pin: default_gpio_pin(),
            calorific_value: default_calorific_value(),
            system_id: default_system_id(),
            room: default_room(),
            area: default_area(),
            debug: false,
            debounce_ms: default_debounce_ms(),
            debounce_mode: DebounceMode::default(),
            marker_dir: default_marker_dir(),
            mqtt: MqttSettings::default(),
        }
    }
}

impl BridgeConfig {
    /// Load from a JSON options file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Load from `path` when it exists, fall back to defaults otherwise.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.is_file() {
            Self::load(path)
        } else {
            tracing::info!("no config file at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_surface() {
        let config = BridgeConfig::default();
        assert_eq!(config.device_name, "Gas Meter");
        assert_eq!(config.gpio_pin, 17);
        assert_eq!(config.calorific_value, 11.4);
        assert_eq!(config.system_id, "123456-gas-meter");
        assert_eq!(config.room, "Sensors");
        assert_eq!(config.area, "Energie");
        assert!(!config.debug);
        assert_eq!(config.debounce_ms, 1000);
        assert_eq!(config.debounce_mode, DebounceMode::Sliding);
        assert_eq!(config.marker_dir, "/dev/shm");
        assert_eq!(config.mqtt.full_broker_addr(), "localhost:1883");
        assert!(!config.mqtt.tls_enabled());
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let config: BridgeConfig = serde_json::from_str(
            r#"{
                "homa_system_id": "76a0bf-gas",
                "calorific_value": 10.3,
                "mqtt": {"host": "my-mqtt", "port": 8883, "ca_certs": "/ssl/ca.pem"}
            }"#,
        )
        .unwrap();
        assert_eq!(config.system_id, "76a0bf-gas");
        assert_eq!(config.calorific_value, 10.3);
        assert_eq!(config.device_name, "Gas Meter");
        assert_eq!(config.mqtt.host, "my-mqtt");
        assert_eq!(config.mqtt.keep_alive, 60);
        assert!(config.mqtt.tls_enabled());
    }

    #[test]
    fn debounce_mode_parses_from_snake_case() {
        let config: BridgeConfig =
            serde_json::from_str(r#"{"debounce_mode": "fixed"}"#).unwrap();
        assert_eq!(config.debounce_mode, DebounceMode::Fixed);
    }

    #[test]
    fn load_or_default_without_file() {
        let config = BridgeConfig::load_or_default(Path::new("/nonexistent/options.json")).unwrap();
        assert_eq!(config.gpio_pin, 17);
    }

    #[test]
    fn load_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("options.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            BridgeConfig::load(&path),
            Err(ConfigError::Parse { .. })
        ));
    }
}
