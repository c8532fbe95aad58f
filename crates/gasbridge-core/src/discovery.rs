//! Home Assistant MQTT discovery document encoding.
//!
//! One retained JSON document per control on
//! `homeassistant/sensor/<object_id>/config` lets Home Assistant
//! auto-configure an entity without manual setup. Absent optional fields
//! are omitted from the serialized document entirely.

use serde::{Deserialize, Serialize};

use crate::control::{ControlDescriptor, ControlKind};
use crate::topic::{TopicBuilder, TopicError};

/// Discovery topic prefix Home Assistant subscribes to.
pub const DISCOVERY_PREFIX: &str = "homeassistant";

const MANUFACTURER: &str = "Holger Müller";
const MODEL: &str = "Raspberry Pi 5 Gas Meter Module";
const DATETIME_TEMPLATE: &str = "{{ as_datetime(value) }}";
const DATETIME_ICON: &str = "mdi:calendar-arrow-right";

/// Config topic for an object id.
pub fn config_topic(object_id: &str) -> String {
    format!("{DISCOVERY_PREFIX}/sensor/{object_id}/config")
}

/// The nested `device` descriptor shared by all entities of the meter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub identifiers: Vec<String>,
    pub name: String,
    pub manufacturer: String,
    pub model: String,
    pub suggested_area: String,
}

/// A `homeassistant/sensor/.../config` document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_class: Option<String>,
    pub state_topic: String,
    pub name: String,
    pub unique_id: String,
    pub object_id: String,
    pub device: DeviceInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_class: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub native_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_template: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_display_precision: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_of_measurement: Option<String>,
}

impl SensorConfig {
    /// Build the discovery document for a control.
    ///
    /// Returns `None` for [`ControlKind::Text`] controls, which are not
    /// advertised to Home Assistant.
    pub fn for_control(
        control: &ControlDescriptor,
        topics: &TopicBuilder,
        device_name: &str,
        area: &str,
    ) -> Result<Option<Self>, TopicError> {
        if control.kind == ControlKind::Text {
            return Ok(None);
        }

        let object_id = control.object_id(topics.system_id());
        let mut config = Self {
            device_class: None,
            state_topic: topics.control(&control.name)?,
            name: control.name.clone(),
            unique_id: object_id.clone(),
            object_id,
            device: DeviceInfo {
                identifiers: vec![topics.system_id().to_string()],
                name: device_name.to_string(),
                manufacturer: MANUFACTURER.to_string(),
                model: MODEL.to_string(),
                suggested_area: area.to_string(),
            },
            state_class: None,
            native_value: None,
            value_template: None,
            icon: None,
            suggested_display_precision: None,
            unit_of_measurement: None,
        };

        match &control.kind {
            ControlKind::Sensor(device_class) => {
                config.state_class = state_class_for(device_class).map(String::from);
                config.device_class = Some(device_class.clone());
            }
            ControlKind::Integer => {
                config.native_value = Some("int".to_string());
            }
            ControlKind::Timestamp => {
                config.value_template = Some(DATETIME_TEMPLATE.to_string());
                config.icon = Some(DATETIME_ICON.to_string());
            }
            ControlKind::Text => unreachable!("filtered above"),
        }

        if let Some(precision) = control.precision {
            config.suggested_display_precision = Some(precision);
        }
        let unit = control.unit.trim();
        if !unit.is_empty() {
            config.unit_of_measurement = Some(unit.to_string());
        }
        if let Some(template) = &control.value_template {
            config.value_template = Some(template.clone());
        }

        Ok(Some(config))
    }

    /// The retained topic this document is published to.
    pub fn config_topic(&self) -> String {
        config_topic(&self.object_id)
    }
}

fn state_class_for(device_class: &str) -> Option<&'static str> {
    match device_class {
        "temperature" | "power_factor" => Some("measurement"),
        "energy" | "gas" => Some("total_increasing"),
        _ => None,
    }
}
