//! Shared test doubles: a sink that records publishes and an in-memory
//! marker store.

use std::collections::HashSet;
use std::io;
use std::sync::Mutex;

use async_trait::async_trait;

use gasbridge_core::marker::MarkerStore;
use gasbridge_mqtt::transport::{MessageSink, TransportError};

/// Records every retained publish instead of talking to a broker.
#[derive(Default)]
pub struct RecordingSink {
    published: Mutex<Vec<(String, String)>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn published(&self) -> Vec<(String, String)> {
        self.published.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.published.lock().unwrap().len()
    }

    /// All payloads published to `topic`, in order.
    pub fn payloads_for(&self, topic: &str) -> Vec<String> {
        self.published
            .lock()
            .unwrap()
            .iter()
            .filter(|(t, _)| t == topic)
            .map(|(_, p)| p.clone())
            .collect()
    }
}

#[async_trait]
impl MessageSink for RecordingSink {
    async fn publish_retained(&self, topic: &str, payload: String) -> Result<(), TransportError> {
        self.published
            .lock()
            .unwrap()
            .push((topic.to_string(), payload));
        Ok(())
    }
}

/// Marker store backed by a set; can simulate an unwritable directory.
#[derive(Default)]
pub struct MemoryMarkerStore {
    keys: Mutex<HashSet<String>>,
    fail_create: bool,
}

impl MemoryMarkerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            keys: Mutex::new(HashSet::new()),
            fail_create: true,
        }
    }
}

impl MarkerStore for MemoryMarkerStore {
    fn exists(&self, key: &str) -> bool {
        self.keys.lock().unwrap().contains(key)
    }

    fn create(&self, key: &str) -> io::Result<()> {
        if self.fail_create {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "marker directory is read-only",
            ));
        }
        self.keys.lock().unwrap().insert(key.to_string());
        Ok(())
    }
}
