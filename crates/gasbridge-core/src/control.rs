//! Control descriptors for the published HomA control set.

use serde::{Deserialize, Serialize};

pub const VOLUME: &str = "Volume";
pub const ENERGY: &str = "Energy";
pub const FLOW_RATE: &str = "Flow rate";
pub const TIMESTAMP: &str = "Timestamp";

/// What kind of value a control carries, which decides how its Home
/// Assistant discovery document is encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "device_class")]
pub enum ControlKind {
    /// A sensor with a Home Assistant device class ("gas", "energy", ...).
    Sensor(String),
    /// A plain integer value, no device class.
    Integer,
    /// A date/time value rendered through a template.
    Timestamp,
    /// Free text; gets no discovery document at all.
    Text,
}

/// One entry of the fixed, ordered control list.
///
/// The list position determines the published `meta/order` field (1-based).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlDescriptor {
    /// Control topic leaf, e.g. "Flow rate".
    pub name: String,
    /// Room label published to `meta/room`; may be empty.
    #[serde(default)]
    pub room: String,
    /// Unit published to `meta/unit`; may be empty.
    #[serde(default)]
    pub unit: String,
    /// Display precision suggested to Home Assistant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precision: Option<u8>,
    pub kind: ControlKind,
    /// Explicit value template; overrides the kind's default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_template: Option<String>,
}

impl ControlDescriptor {
    fn new(name: impl Into<String>, kind: ControlKind) -> Self {
        Self {
            name: name.into(),
            room: String::new(),
            unit: String::new(),
            precision: None,
            kind,
            value_template: None,
        }
    }

    pub fn sensor(name: impl Into<String>, device_class: impl Into<String>) -> Self {
        Self::new(name, ControlKind::Sensor(device_class.into()))
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, ControlKind::Integer)
    }

    pub fn timestamp(name: impl Into<String>) -> Self {
        Self::new(name, ControlKind::Timestamp)
    }

    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, ControlKind::Text)
    }

    pub fn with_room(mut self, room: impl Into<String>) -> Self {
        self.room = room.into();
        self
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }

    pub fn with_precision(mut self, precision: u8) -> Self {
        self.precision = Some(precision);
        self
    }

    pub fn with_value_template(mut self, template: impl Into<String>) -> Self {
        self.value_template = Some(template.into());
        self
    }

    /// Unique/object identifier used in discovery topics:
    /// `{system_id}-{name with spaces replaced by dashes}`.
    pub fn object_id(&self, system_id: &str) -> String {
        format!("{}-{}", system_id, self.name.replace(' ', "-"))
    }
}

/// The control set of the gas meter, in publish order.
pub fn standard_controls() -> Vec<ControlDescriptor> {
    vec![
        ControlDescriptor::sensor(VOLUME, "gas")
            .with_room("Home")
            .with_unit(" m³")
            .with_precision(2),
        ControlDescriptor::sensor(ENERGY, "energy")
            .with_unit(" kWh")
            .with_precision(2),
        ControlDescriptor::sensor(FLOW_RATE, "volume_flow_rate")
            .with_unit(" m³/h")
            .with_precision(3),
        ControlDescriptor::timestamp(TIMESTAMP),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_id_replaces_spaces() {
        let control = ControlDescriptor::sensor(FLOW_RATE, "volume_flow_rate");
        assert_eq!(
            control.object_id("123456-gas-meter"),
            "123456-gas-meter-Flow-rate"
        );
    }

    #[test]
    fn standard_controls_are_ordered() {
        let controls = standard_controls();
        let names: Vec<&str> = controls.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, [VOLUME, ENERGY, FLOW_RATE, TIMESTAMP]);
        assert_eq!(controls[0].kind, ControlKind::Sensor("gas".into()));
        assert_eq!(controls[3].kind, ControlKind::Timestamp);
    }
}
