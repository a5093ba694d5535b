//! Zero-crossing beat detection on the filtered Y-axis velocity.
//!
//! A beat is an upward sign change across zero, gated by the summed
//! filtered-velocity magnitude over a trailing window so sensor noise near
//! zero does not trigger. The Y axis is the detection axis; X and Z are
//! computed for the visualizer but not consulted here.

use crate::analysis::pipeline::Session;

/// Axis used for detection.
const DETECTION_AXIS: usize = 1;

/// One detected beat.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BeatEvent {
    /// Midpoint of the two straddling sample timestamps, session-relative
    /// seconds.
    pub timestamp: f64,
}

#[derive(Debug, Clone)]
pub struct BeatDetector {
    window: usize,
    noise_threshold: f64,
}

impl BeatDetector {
    pub fn new(window: usize, noise_threshold: f64) -> Self {
        Self {
            window: window.max(1),
            noise_threshold,
        }
    }

    /// Examine the newest sample in the session. Call once per processed
    /// sample, after the pipeline has appended it.
    pub fn detect(&self, session: &Session) -> Option<BeatEvent> {
        let filtered = session.filtered_axis(DETECTION_AXIS);
        let current = filtered.back(0)?;
        let previous = filtered.back(1)?;

        // Upward crossing only; seeded zero history never triggers.
        if !(previous < 0.0 && current > 0.0) {
            return None;
        }

        let energy: f64 = filtered.iter_trailing(self.window).map(f64::abs).sum();
        if energy <= self.noise_threshold {
            return None;
        }

        let ts_current = session.timestamps().back(0)?;
        let ts_previous = session.timestamps().back(1)?;
        Some(BeatEvent {
            timestamp: (ts_previous + ts_current) / 2.0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::filter::FilterCoefficients;
    use crate::protocol::RawSample;

    /// Identity filter: y[t] = x[t]. Lets tests drive the filtered signal
    /// directly through the pipeline.
    fn identity_coeffs() -> FilterCoefficients {
        FilterCoefficients {
            b: vec![1.0, 0.0],
            a: vec![1.0, 0.0],
        }
    }

    fn feed(session: &mut Session, coeffs: &FilterCoefficients, ts_ms: i64, ay: f32) {
        // With dt scaled so velocity equals ay * dt accumulation; here we
        // drive velocity sign through large accelerations.
        session.process_sample(
            RawSample {
                ax: 0.0,
                ay,
                az: 0.0,
                timestamp_ms: ts_ms,
            },
            coeffs,
        );
    }

    /// Build a session whose filtered Y velocity walks the given values,
    /// 10 ms apart.
    fn session_with_velocity(values: &[f64]) -> Session {
        let coeffs = identity_coeffs();
        let mut session = Session::new(1, 100);
        let mut prev_v = 0.0;
        for (i, &v) in values.iter().enumerate() {
            // v[t] = v[t-1] + a*dt  =>  a = (v - prev) / dt, dt = 10 ms.
            // The first sample has dt = 0 against its own base, so lead
            // with a throwaway zero sample to establish the time base.
            if i == 0 {
                feed(&mut session, &coeffs, 0, 0.0);
            }
            let accel = ((v - prev_v) / 0.01) as f32;
            feed(&mut session, &coeffs, ((i + 1) * 10) as i64, accel);
            prev_v = v;
        }
        session
    }

    #[test]
    fn test_single_upward_crossing_yields_one_event_at_midpoint() {
        let detector = BeatDetector::new(4, 0.5);
        let session = session_with_velocity(&[-1.0, -0.5, 2.0]);

        let event = detector.detect(&session).expect("beat expected");
        // Straddling samples are at 20 ms and 30 ms.
        assert!((event.timestamp - 0.025).abs() < 1e-9);
    }

    #[test]
    fn test_below_noise_threshold_yields_no_event() {
        let detector = BeatDetector::new(4, 10.0);
        let session = session_with_velocity(&[-1.0, -0.5, 2.0]);
        assert!(detector.detect(&session).is_none());
    }

    #[test]
    fn test_no_crossing_no_event() {
        let detector = BeatDetector::new(4, 0.0);
        let rising_positive = session_with_velocity(&[0.5, 1.0, 2.0]);
        assert!(detector.detect(&rising_positive).is_none());

        let falling = session_with_velocity(&[1.0, 0.5, -2.0]);
        assert!(detector.detect(&falling).is_none());
    }

    #[test]
    fn test_seeded_session_never_triggers() {
        let detector = BeatDetector::new(4, 0.0);
        let session = Session::new(2, 100);
        assert!(detector.detect(&session).is_none());

        // Zero history followed by a positive sample is not a sign change.
        let session = session_with_velocity(&[2.0]);
        assert!(detector.detect(&session).is_none());
    }
}
