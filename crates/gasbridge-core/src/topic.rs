//! Topic construction for the HomA `/devices/{system_id}` namespace.

use thiserror::Error;

/// Errors raised while building topic strings.
#[derive(Debug, Error)]
pub enum TopicError {
    /// A topic must name at least one non-empty segment below the system id.
    #[error("topic for system '{system_id}' has no leading segment")]
    MissingLeadingSegment { system_id: String },
}

/// Builds `/devices/{system_id}/...` topic strings.
///
/// Empty trailing segments are skipped; an empty *leading* segment is an
/// error, since a topic with no semantic leaf must never be published.
#[derive(Debug, Clone)]
pub struct TopicBuilder {
    system_id: String,
}

impl TopicBuilder {
    pub fn new(system_id: impl Into<String>) -> Self {
        Self {
            system_id: system_id.into(),
        }
    }

    pub fn system_id(&self) -> &str {
        &self.system_id
    }

    /// Join up to three segments under the device prefix.
    pub fn build(&self, segments: &[&str]) -> Result<String, TopicError> {
        match segments.first() {
            None | Some(&"") => {
                return Err(TopicError::MissingLeadingSegment {
                    system_id: self.system_id.clone(),
                });
            }
            Some(_) => {}
        }
        let mut topic = format!("/devices/{}", self.system_id);
        for segment in segments.iter().filter(|s| !s.is_empty()) {
            topic.push('/');
            topic.push_str(segment);
        }
        tracing::debug!("topic: '{topic}'");
        Ok(topic)
    }

    /// Device-level metadata topic, e.g. `/devices/{id}/meta/room`.
    pub fn meta(&self, leaf: &str) -> Result<String, TopicError> {
        self.build(&["meta", leaf])
    }

    /// Bare control value topic, e.g. `/devices/{id}/controls/Volume`.
    pub fn control(&self, name: &str) -> Result<String, TopicError> {
        self.build(&["controls", name])
    }

    /// Per-control metadata topic, e.g. `/devices/{id}/controls/Volume/meta/order`.
    pub fn control_meta(&self, name: &str, leaf: &str) -> Result<String, TopicError> {
        let meta = format!("meta/{leaf}");
        self.build(&["controls", name, &meta])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_device_topics() {
        let topics = TopicBuilder::new("123456-gas-meter");
        assert_eq!(
            topics.meta("room").unwrap(),
            "/devices/123456-gas-meter/meta/room"
        );
        assert_eq!(
            topics.control("Volume").unwrap(),
            "/devices/123456-gas-meter/controls/Volume"
        );
        assert_eq!(
            topics.control_meta("Flow rate", "unit").unwrap(),
            "/devices/123456-gas-meter/controls/Flow rate/meta/unit"
        );
    }

    #[test]
    fn skips_empty_trailing_segments() {
        let topics = TopicBuilder::new("sys");
        assert_eq!(topics.build(&["controls", "Volume", ""]).unwrap(), "/devices/sys/controls/Volume");
    }

    #[test]
    fn rejects_missing_leading_segment() {
        let topics = TopicBuilder::new("sys");
        assert!(matches!(
            topics.build(&[]),
            Err(TopicError::MissingLeadingSegment { .. })
        ));
        assert!(matches!(
            topics.build(&["", "Volume"]),
            Err(TopicError::MissingLeadingSegment { .. })
        ));
    }
}
