//! Per-session signal pipeline: velocity integration, high-pass filtering,
//! and the parallel ring histories.
//!
//! A `Session` is owned exclusively by the task serving its connection. It
//! holds parallel time-ordered sequences — raw acceleration, integrated
//! velocity, filtered velocity (three axes each), zero-crossing flags, grid
//! flags — plus the append-only beat-event list. All per-sample sequences
//! have equal length at every observation point.
//!
//! Each sequence is seeded with `order` zero entries so the filter always
//! sees a full trailing window, including for the first real sample (whose
//! delta time is measured against the seeded zero timestamp).

use crate::analysis::filter::FilterCoefficients;
use crate::analysis::history::History;
use crate::protocol::RawSample;

/// Outputs of one pipeline step, republished to the visualizer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProcessedSample {
    /// Session-relative seconds.
    pub timestamp: f64,
    pub accel: [f64; 3],
    pub velocity: [f64; 3],
    pub filtered: [f64; 3],
}

#[derive(Debug)]
pub struct Session {
    order: usize,
    /// Device-epoch milliseconds of the first sample in this acquisition.
    base_ms: Option<i64>,
    timestamps: History<f64>,
    accel: [History<f64>; 3],
    velocity: [History<f64>; 3],
    filtered: [History<f64>; 3],
    zero_cross: History<u8>,
    grid_flags: History<u8>,
    beat_events: Vec<f64>,
}

impl Session {
    /// Create a seeded session. `capacity` is the ring size,
    /// `max(order + 1, detection window, plot window)` at the call site.
    pub fn new(order: usize, capacity: usize) -> Self {
        let capacity = capacity.max(order + 1);
        let mut session = Self {
            order,
            base_ms: None,
            timestamps: History::new(capacity),
            accel: [
                History::new(capacity),
                History::new(capacity),
                History::new(capacity),
            ],
            velocity: [
                History::new(capacity),
                History::new(capacity),
                History::new(capacity),
            ],
            filtered: [
                History::new(capacity),
                History::new(capacity),
                History::new(capacity),
            ],
            zero_cross: History::new(capacity),
            grid_flags: History::new(capacity),
            beat_events: Vec::new(),
        };
        session.seed();
        session
    }

    /// Clear everything and re-seed for the next acquisition window.
    pub fn reset(&mut self) {
        self.base_ms = None;
        self.timestamps.clear();
        for axis in 0..3 {
            self.accel[axis].clear();
            self.velocity[axis].clear();
            self.filtered[axis].clear();
        }
        self.zero_cross.clear();
        self.grid_flags.clear();
        self.beat_events.clear();
        self.seed();
    }

    fn seed(&mut self) {
        for _ in 0..self.order {
            self.timestamps.push(0.0);
            for axis in 0..3 {
                self.accel[axis].push(0.0);
                self.velocity[axis].push(0.0);
                self.filtered[axis].push(0.0);
            }
            self.zero_cross.push(0);
            self.grid_flags.push(0);
        }
    }

    /// Run one raw sample through integration and filtering, appending to
    /// every sequence.
    pub fn process_sample(
        &mut self,
        raw: RawSample,
        coeffs: &FilterCoefficients,
    ) -> ProcessedSample {
        let base = *self.base_ms.get_or_insert(raw.timestamp_ms);
        let timestamp = (raw.timestamp_ms - base) as f64 / 1000.0;
        let prev_ts = self.timestamps.back(0).unwrap_or(0.0);
        let dt = timestamp - prev_ts;

        let accel = [raw.ax as f64, raw.ay as f64, raw.az as f64];
        let mut velocity = [0.0; 3];
        let mut filtered = [0.0; 3];

        for axis in 0..3 {
            // Rectangular integration; the filter below removes the drift
            // this accumulates.
            let prev_v = self.velocity[axis].back(0).unwrap_or(0.0);
            let v = prev_v + accel[axis] * dt;
            self.accel[axis].push(accel[axis]);
            self.velocity[axis].push(v);

            let y = coeffs.evaluate(
                self.velocity[axis].iter_trailing(self.order + 1),
                self.filtered[axis].iter_trailing(self.order),
            );
            self.filtered[axis].push(y);
            velocity[axis] = v;
            filtered[axis] = y;
        }

        self.timestamps.push(timestamp);
        self.zero_cross.push(0);
        self.grid_flags.push(0);
        debug_assert!(self.sequences_aligned());

        ProcessedSample {
            timestamp,
            accel,
            velocity,
            filtered,
        }
    }

    /// Record a detected beat: append the event and flag the later
    /// straddling sample (the newest entry). The grid flag carries the
    /// aligner's verdict.
    pub fn record_beat(&mut self, timestamp: f64, on_grid: bool) {
        self.beat_events.push(timestamp);
        self.zero_cross.set_back(0, 1);
        self.grid_flags.set_back(0, u8::from(on_grid));
    }

    pub fn beat_events(&self) -> &[f64] {
        &self.beat_events
    }

    /// Drain the beat-event list for persistence at end of acquisition.
    pub fn take_events(&mut self) -> Vec<f64> {
        std::mem::take(&mut self.beat_events)
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn timestamps(&self) -> &History<f64> {
        &self.timestamps
    }

    pub fn filtered_axis(&self, axis: usize) -> &History<f64> {
        &self.filtered[axis]
    }

    pub fn velocity_axis(&self, axis: usize) -> &History<f64> {
        &self.velocity[axis]
    }

    pub fn zero_cross_flags(&self) -> &History<u8> {
        &self.zero_cross
    }

    pub fn grid_flags(&self) -> &History<u8> {
        &self.grid_flags
    }

    /// True when only the seeded zeros are present.
    pub fn is_pristine(&self) -> bool {
        self.timestamps.total() == self.order as u64
            && self.beat_events.is_empty()
            && self.base_ms.is_none()
            && self.timestamps.iter_trailing(self.order).all(|t| t == 0.0)
    }

    fn sequences_aligned(&self) -> bool {
        let total = self.timestamps.total();
        (0..3).all(|axis| {
            self.accel[axis].total() == total
                && self.velocity[axis].total() == total
                && self.filtered[axis].total() == total
        }) && self.zero_cross.total() == total
            && self.grid_flags.total() == total
    }
}
