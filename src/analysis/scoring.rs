//! Accuracy scoring of beat events against the reference timeline.
//!
//! Two strategies are supported, chosen once per deployment and never mixed
//! mid-session:
//!
//! - **Cumulative**: mean distance from each (delay-shifted) event to its
//!   nearest reference beat over the whole session. Lower is better.
//! - **Windowed**: over the most recent `window_beats` reference beats, each
//!   beat interval weights event distances from its endpoints with a
//!   power law and contributes `max(0, 10 × (half − min distance) / half)`;
//!   the interval scores are averaged. Higher is better, 10 is a perfect
//!   interval.

use std::sync::Arc;

use crate::config::{ScoringConfig, ScoringStrategy};
use crate::timeline::ReferenceBeatTimeline;

/// Maximum per-interval score for the windowed strategy.
const INTERVAL_SCORE_MAX: f64 = 10.0;

#[derive(Debug, Clone)]
pub struct ScoringEngine {
    strategy: ScoringStrategy,
    timeline: Arc<ReferenceBeatTimeline>,
    window_beats: usize,
    weight_exponent: f64,
}

impl ScoringEngine {
    pub fn new(config: &ScoringConfig, timeline: Arc<ReferenceBeatTimeline>) -> Self {
        Self {
            strategy: config.strategy,
            timeline,
            window_beats: config.window_beats.max(2),
            weight_exponent: config.weight_exponent,
        }
    }

    pub fn strategy(&self) -> ScoringStrategy {
        self.strategy
    }

    /// Score the session's events. `song_time` is the current track time
    /// (latest sample timestamp minus the playback delay). Returns `None`
    /// while there is nothing meaningful to score: no events for the
    /// cumulative strategy, song time still inside the first window for the
    /// windowed strategy.
    pub fn score(&self, events: &[f64], play_delay: f64, song_time: f64) -> Option<f64> {
        match self.strategy {
            ScoringStrategy::Cumulative => self.cumulative(events, play_delay),
            ScoringStrategy::Windowed => self.windowed(events, play_delay, song_time),
        }
    }

    fn cumulative(&self, events: &[f64], play_delay: f64) -> Option<f64> {
        if events.is_empty() {
            return None;
        }
        let total: f64 = events
            .iter()
            .map(|&e| self.timeline.nearest_distance(e - play_delay))
            .sum();
        Some(total / events.len() as f64)
    }

    fn windowed(&self, events: &[f64], play_delay: f64, song_time: f64) -> Option<f64> {
        let window = self.timeline.trailing_window(song_time, self.window_beats)?;
        let shifted: Vec<f64> = events.iter().map(|&e| e - play_delay).collect();

        let interval_count = window.len() - 1;
        let total: f64 = window
            .windows(2)
            .map(|pair| self.interval_score(pair[0], pair[1], &shifted))
            .sum();
        Some(total / interval_count as f64)
    }

    /// Score one beat interval `[start, end)`. An interval nobody hit
    /// scores 0.
    fn interval_score(&self, start: f64, end: f64, shifted_events: &[f64]) -> f64 {
        let half = (end - start) / 2.0;
        let best = shifted_events
            .iter()
            .filter(|&&e| e >= start && e < end)
            .map(|&e| self.weight(e - start, half).min(self.weight(end - e, half)))
            .fold(f64::INFINITY, f64::min);

        if best.is_infinite() {
            return 0.0;
        }
        (INTERVAL_SCORE_MAX * (half - best) / half).max(0.0)
    }

    /// Power-law weight normalized so `weight(half) == half`.
    fn weight(&self, x: f64, half: f64) -> f64 {
        x.powf(self.weight_exponent) / half.powf(self.weight_exponent - 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine(strategy: ScoringStrategy) -> ScoringEngine {
        let timeline = ReferenceBeatTimeline::from_beats(vec![
            0.5, 1.0, 1.5, 2.0, 2.5, 3.0, 3.5, 4.0,
        ])
        .unwrap();
        let config = ScoringConfig {
            strategy,
            window_beats: 4,
            weight_exponent: 2.0,
        };
        ScoringEngine::new(&config, Arc::new(timeline))
    }

    #[test]
    fn test_cumulative_skipped_while_empty() {
        let engine = engine(ScoringStrategy::Cumulative);
        assert!(engine.score(&[], 0.0, 5.0).is_none());
    }

    #[test]
    fn test_cumulative_mean_distance() {
        let engine = engine(ScoringStrategy::Cumulative);
        // With 2.0 s delay: events land at track times 1.0 (exact) and
        // 1.7 (0.2 from the 1.5 beat).
        let score = engine.score(&[3.0, 3.7], 2.0, 5.0).unwrap();
        assert!((score - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_cumulative_perfect_hits_score_zero() {
        let engine = engine(ScoringStrategy::Cumulative);
        let score = engine.score(&[0.5, 1.0, 1.5], 0.0, 5.0).unwrap();
        assert_eq!(score, 0.0);
    }

    #[test]
    fn test_windowed_skipped_until_first_full_window() {
        let engine = engine(ScoringStrategy::Windowed);
        // Only three beats have passed by 1.6 s; window needs four.
        assert!(engine.score(&[1.0], 0.0, 1.6).is_none());
        assert!(engine.score(&[1.0], 0.0, 2.0).is_some());
    }

    #[test]
    fn test_windowed_boundary_event_scores_maximum() {
        let engine = engine(ScoringStrategy::Windowed);
        // Window at song time 2.0 covers beats [0.5, 1.0, 1.5, 2.0]:
        // three intervals. Events exactly on the start of each interval
        // weight to 0, scoring 10 per hit interval.
        let score = engine.score(&[0.5, 1.0, 1.5], 0.0, 2.0).unwrap();
        assert!((score - 10.0).abs() < 1e-9);
    }

    /// Score a single event against the window ending at 2.0 s.
    fn probe(engine: &ScoringEngine, at: f64) -> f64 {
        engine.score(&[at], 0.0, 2.0).expect("window should be full")
    }

    #[test]
    fn test_windowed_midpoint_scores_strictly_lower_than_boundary() {
        let engine = engine(ScoringStrategy::Windowed);
        // One event at the first interval's midpoint, none elsewhere.
        let midpoint = probe(&engine, 0.75);
        let boundary = probe(&engine, 0.5);
        assert!(midpoint < boundary);
        assert!((boundary - 10.0 / 3.0).abs() < 1e-9);
        // Midpoint weight equals half, so its interval contributes 0.
        assert!(midpoint.abs() < 1e-9);
    }

    #[test]
    fn test_windowed_empty_intervals_drag_average_down() {
        let engine = engine(ScoringStrategy::Windowed);
        let all_hit = engine.score(&[0.5, 1.0, 1.5], 0.0, 2.0).unwrap();
        let one_hit = engine.score(&[0.5], 0.0, 2.0).unwrap();
        assert!(one_hit < all_hit);
    }

    #[test]
    fn test_windowed_respects_play_delay() {
        let engine = engine(ScoringStrategy::Windowed);
        // Session events 2.0 s late relative to track time.
        let shifted = engine.score(&[2.5, 3.0, 3.5], 2.0, 2.0).unwrap();
        let unshifted = engine.score(&[0.5, 1.0, 1.5], 0.0, 2.0).unwrap();
        assert!((shifted - unshifted).abs() < 1e-9);
    }

}
