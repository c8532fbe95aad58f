//! Edge-event source seam.
//!
//! The physical edge-detection driver lives outside this crate; it hands
//! rising-edge events with monotonic timestamps to an [`EdgeEventSource`].
//! The channel-backed implementation is what hardware glue feeds in
//! production and what tests inject synthetic pulses into.

use async_trait::async_trait;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    Rising,
    Falling,
}

/// One edge event as reported by the line driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeEvent {
    /// GPIO line offset the event occurred on.
    pub line: u32,
    pub kind: EdgeKind,
    /// Monotonic event timestamp in nanoseconds.
    pub timestamp_ns: u64,
}

impl EdgeEvent {
    pub fn rising(line: u32, timestamp_ns: u64) -> Self {
        Self {
            line,
            kind: EdgeKind::Rising,
            timestamp_ns,
        }
    }

    pub fn falling(line: u32, timestamp_ns: u64) -> Self {
        Self {
            line,
            kind: EdgeKind::Falling,
            timestamp_ns,
        }
    }

    /// Event timestamp in milliseconds, the unit the debounce filter and
    /// meter work in.
    pub fn timestamp_ms(&self) -> u64 {
        self.timestamp_ns / 1_000_000
    }
}

/// Asynchronous stream of edge events.
#[async_trait]
pub trait EdgeEventSource: Send {
    /// Next event, or `None` once the source is exhausted.
    async fn next_event(&mut self) -> Option<EdgeEvent>;
}

/// Sender half handed to the hardware glue.
pub type EdgeFeed = mpsc::Sender<EdgeEvent>;

/// Channel-fed edge source.
pub struct ChannelEdgeSource {
    rx: mpsc::Receiver<EdgeEvent>,
}

impl ChannelEdgeSource {
    /// Create a feed/source pair. Pulse rates are sub-Hz, so a small
    /// buffer is plenty.
    pub fn new(capacity: usize) -> (EdgeFeed, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (tx, Self { rx })
    }
}

#[async_trait]
impl EdgeEventSource for ChannelEdgeSource {
    async fn next_event(&mut self) -> Option<EdgeEvent> {
        self.rx.recv().await
    }
}
