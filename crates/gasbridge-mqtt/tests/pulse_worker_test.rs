//! Serving-loop behavior with synthetic edge events.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::RecordingSink;
use tokio::sync::{watch, Mutex};

use gasbridge_core::debounce::{DebounceFilter, DebounceMode};
use gasbridge_core::meter::PulseMeter;
use gasbridge_core::topic::TopicBuilder;
use gasbridge_mqtt::bridge::{apply_correction, ControlTopics, PulseWorker};
use gasbridge_mqtt::edge::{ChannelEdgeSource, EdgeEvent};

const LINE: u32 = 17;
const MS: u64 = 1_000_000; // ns per ms

fn topics() -> ControlTopics {
    ControlTopics::new(&TopicBuilder::new("123456-gas-meter")).unwrap()
}

fn worker(
    meter: Arc<Mutex<PulseMeter>>,
    shutdown: watch::Receiver<bool>,
) -> PulseWorker {
    PulseWorker::new(
        LINE,
        DebounceFilter::new(1000, DebounceMode::Sliding),
        meter,
        topics(),
        shutdown,
    )
}

#[tokio::test]
async fn pulses_produce_retained_readings() {
    let meter = Arc::new(Mutex::new(PulseMeter::new(11.4)));
    let sink = Arc::new(RecordingSink::new());
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);

    let (feed, mut source) = ChannelEdgeSource::new(16);
    let t0 = 1_000_000 * MS;
    feed.send(EdgeEvent::rising(LINE, t0)).await.unwrap();
    // Contact bounce 500 ms later is suppressed.
    feed.send(EdgeEvent::rising(LINE, t0 + 500 * MS)).await.unwrap();
    // Six minutes later the next revolution completes.
    feed.send(EdgeEvent::rising(LINE, t0 + 360_000 * MS)).await.unwrap();
    drop(feed);

    worker(meter.clone(), shutdown_rx)
        .run(&mut source, sink.as_ref())
        .await;

    assert_eq!(
        sink.payloads_for("/devices/123456-gas-meter/controls/Volume"),
        ["0.01", "0.02"]
    );
    assert_eq!(
        sink.payloads_for("/devices/123456-gas-meter/controls/Energy"),
        ["0.114", "0.228"]
    );
    assert_eq!(
        sink.payloads_for("/devices/123456-gas-meter/controls/Flow rate"),
        ["0", "0.1"]
    );
    let timestamps = sink.payloads_for("/devices/123456-gas-meter/controls/Timestamp");
    assert_eq!(timestamps.len(), 2);
    assert_eq!(timestamps[0].len(), "2026-01-15 12:30:00".len());

    assert_eq!(meter.lock().await.counter(), 2);
}

#[tokio::test]
async fn foreign_lines_and_falling_edges_are_dropped() {
    let meter = Arc::new(Mutex::new(PulseMeter::new(11.4)));
    let sink = Arc::new(RecordingSink::new());
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);

    let (feed, mut source) = ChannelEdgeSource::new(16);
    feed.send(EdgeEvent::rising(23, 5_000 * MS)).await.unwrap();
    feed.send(EdgeEvent::falling(LINE, 10_000 * MS)).await.unwrap();
    drop(feed);

    worker(meter.clone(), shutdown_rx)
        .run(&mut source, sink.as_ref())
        .await;

    assert_eq!(sink.count(), 0);
    assert_eq!(meter.lock().await.counter(), 0);
}

#[tokio::test]
async fn shutdown_flag_stops_an_idle_worker() {
    let meter = Arc::new(Mutex::new(PulseMeter::new(11.4)));
    let sink = Arc::new(RecordingSink::new());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Feed stays open: the worker is blocked waiting for edges.
    let (_feed, mut source) = ChannelEdgeSource::new(16);
    let handle = tokio::spawn({
        let meter = meter.clone();
        let sink = sink.clone();
        async move {
            worker(meter, shutdown_rx).run(&mut source, sink.as_ref()).await;
        }
    });

    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("worker should observe shutdown promptly")
        .unwrap();
}

#[tokio::test]
async fn corrections_interleave_with_pulse_processing() {
    let meter = Arc::new(Mutex::new(PulseMeter::new(11.4)));
    let sink = Arc::new(RecordingSink::new());
    let volume_topic = "/devices/123456-gas-meter/controls/Volume";

    let (feed, mut source) = ChannelEdgeSource::new(16);
    feed.send(EdgeEvent::rising(LINE, 1_000_000 * MS)).await.unwrap();
    drop(feed);
    let (_tx, shutdown_rx) = watch::channel(false);
    worker(meter.clone(), shutdown_rx)
        .run(&mut source, sink.as_ref())
        .await;
    assert_eq!(sink.payloads_for(volume_topic), ["0.01"]);

    // External correction between pulses, e.g. after reading the physical
    // meter dial.
    apply_correction(&meter, "5.00").await;
    assert_eq!(meter.lock().await.counter(), 500);

    // The next revolution continues from the corrected total, and the flow
    // rate still derives from the real inter-pulse interval.
    let (feed, mut source) = ChannelEdgeSource::new(16);
    feed.send(EdgeEvent::rising(LINE, 1_360_000 * MS)).await.unwrap();
    drop(feed);
    let (_tx, shutdown_rx) = watch::channel(false);
    worker(meter.clone(), shutdown_rx)
        .run(&mut source, sink.as_ref())
        .await;

    assert_eq!(sink.payloads_for(volume_topic), ["0.01", "5.01"]);
    assert_eq!(
        sink.payloads_for("/devices/123456-gas-meter/controls/Flow rate"),
        ["0", "0.1"]
    );
}
