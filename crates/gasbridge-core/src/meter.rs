//! Pulse counting and derived measurements.
//!
//! One pulse represents [`RESOLUTION`] cubic meters of gas. The meter owns
//! the running counter and the timestamp of the last counted pulse, and
//! derives volume, energy and instantaneous flow rate on every pulse.

use chrono::{DateTime, Local};

/// Metered volume per pulse [m³].
pub const RESOLUTION: f64 = 0.01;

/// Default volume-to-energy conversion factor [kWh/m³].
pub const DEFAULT_CALORIFIC_VALUE: f64 = 11.4;

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Derived measurements for one counted pulse.
#[derive(Debug, Clone, PartialEq)]
pub struct MeterReading {
    /// Total volume [m³], counter × resolution.
    pub volume: f64,
    /// Total energy [kWh], volume × calorific value.
    pub energy: f64,
    /// Extrapolated flow [m³/h] from the most recent inter-pulse interval,
    /// 0.0 on the first pulse.
    pub flow_rate: f64,
    /// Wall-clock time of the computation, `YYYY-MM-DD HH:MM:SS`.
    pub timestamp: String,
}

/// Result of an external counter correction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterCorrection {
    pub old: u64,
    pub new: u64,
}

impl CounterCorrection {
    pub fn changed(&self) -> bool {
        self.old != self.new
    }
}

/// The pulse counter and its derived quantities.
///
/// The counter only grows through [`PulseMeter::on_pulse`]; the single path
/// that may decrease it is [`PulseMeter::correct_counter`], driven by the
/// retained Volume value on the broker.
#[derive(Debug)]
pub struct PulseMeter {
    counter: u64,
    last_pulse_ms: Option<u64>,
    resolution: f64,
    calorific_value: f64,
}

impl PulseMeter {
    pub fn new(calorific_value: f64) -> Self {
        Self::with_resolution(RESOLUTION, calorific_value)
    }

    pub fn with_resolution(resolution: f64, calorific_value: f64) -> Self {
        Self {
            counter: 0,
            last_pulse_ms: None,
            resolution,
            calorific_value,
        }
    }

    /// Accepted pulses since start or since the last correction.
    pub fn counter(&self) -> u64 {
        self.counter
    }

    /// Current total volume [m³].
    pub fn volume(&self) -> f64 {
        round3(self.counter as f64 * self.resolution)
    }

    /// Count one accepted pulse and derive the new reading.
    ///
    /// `event_ts_ms` is the monotonic timestamp of the edge event; `wall`
    /// supplies the human-readable timestamp of the reading.
    pub fn on_pulse(&mut self, event_ts_ms: u64, wall: DateTime<Local>) -> MeterReading {
        self.counter += 1;
        let volume = round3(self.counter as f64 * self.resolution);
        let energy = round3(volume * self.calorific_value);
        let flow_rate = match self.last_pulse_ms {
            None => 0.0,
            Some(prev) => {
                let dt_ms = event_ts_ms.saturating_sub(prev);
                if dt_ms == 0 {
                    0.0
                } else {
                    round3(self.resolution / dt_ms as f64 * 1000.0 * 3600.0)
                }
            }
        };
        self.last_pulse_ms = Some(event_ts_ms);
        MeterReading {
            volume,
            energy,
            flow_rate,
            timestamp: wall.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }

    /// Set the counter from an externally supplied total volume [m³].
    ///
    /// Does not touch the last-pulse timestamp; the next pulse still
    /// computes its flow rate from the real inter-pulse interval.
    pub fn correct_counter(&mut self, new_volume: f64) -> CounterCorrection {
        let old = self.counter;
        let new = (new_volume / self.resolution).round().max(0.0) as u64;
        self.counter = new;
        CounterCorrection { old, new }
    }
}
