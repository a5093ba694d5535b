//! Reference beat timeline.
//!
//! An ordered, ascending sequence of beat timestamps in seconds, relative to
//! track start. Loaded once from a song-annotation JSON file (a bare array
//! of seconds) and read-only thereafter.

use std::fs;
use std::path::Path;

use log::info;

use crate::error::PipelineError;

#[derive(Debug, Clone)]
pub struct ReferenceBeatTimeline {
    beats: Vec<f64>,
}

impl ReferenceBeatTimeline {
    /// Build a timeline from an already-ordered beat list.
    pub fn from_beats(beats: Vec<f64>) -> Result<Self, PipelineError> {
        if beats.is_empty() {
            return Err(PipelineError::InvalidTimeline {
                reason: "no beats".to_string(),
            });
        }
        if beats.windows(2).any(|w| w[1] <= w[0]) {
            return Err(PipelineError::InvalidTimeline {
                reason: "timestamps not strictly ascending".to_string(),
            });
        }
        Ok(Self { beats })
    }

    /// Load a timeline from a JSON array of seconds.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(&path)?;
        let beats: Vec<f64> = serde_json::from_str(&contents)?;
        let timeline = Self::from_beats(beats)?;
        info!(
            "loaded {} reference beats from {:?}",
            timeline.len(),
            path.as_ref()
        );
        Ok(timeline)
    }

    pub fn len(&self) -> usize {
        self.beats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.beats.is_empty()
    }

    pub fn beats(&self) -> &[f64] {
        &self.beats
    }

    /// Distance from `t` to the nearest reference beat.
    pub fn nearest_distance(&self, t: f64) -> f64 {
        let idx = self.beats.partition_point(|&b| b < t);
        let after = self.beats.get(idx).map(|&b| (b - t).abs());
        let before = idx
            .checked_sub(1)
            .and_then(|i| self.beats.get(i))
            .map(|&b| (t - b).abs());
        match (before, after) {
            (Some(a), Some(b)) => a.min(b),
            (Some(d), None) | (None, Some(d)) => d,
            (None, None) => f64::INFINITY,
        }
    }

    /// The most recent `count` beats at or before `song_time`, or `None`
    /// until that many have passed.
    pub fn trailing_window(&self, song_time: f64, count: usize) -> Option<&[f64]> {
        let idx = self.beats.partition_point(|&b| b <= song_time);
        if count == 0 || idx < count {
            return None;
        }
        Some(&self.beats[idx - count..idx])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timeline() -> ReferenceBeatTimeline {
        ReferenceBeatTimeline::from_beats(vec![0.5, 1.0, 1.5, 2.0, 2.5]).unwrap()
    }

    #[test]
    fn test_rejects_empty_and_unsorted() {
        assert!(ReferenceBeatTimeline::from_beats(vec![]).is_err());
        assert!(ReferenceBeatTimeline::from_beats(vec![1.0, 1.0]).is_err());
        assert!(ReferenceBeatTimeline::from_beats(vec![2.0, 1.0]).is_err());
    }

    #[test]
    fn test_nearest_distance() {
        let t = timeline();
        assert_eq!(t.nearest_distance(1.0), 0.0);
        assert!((t.nearest_distance(1.2) - 0.2).abs() < 1e-12);
        assert!((t.nearest_distance(1.3) - 0.2).abs() < 1e-12);
        // Outside the grid on either side.
        assert!((t.nearest_distance(0.0) - 0.5).abs() < 1e-12);
        assert!((t.nearest_distance(3.0) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_trailing_window() {
        let t = timeline();
        // Only two beats have passed by 1.2s; a window of three is not full.
        assert!(t.trailing_window(1.2, 3).is_none());
        assert_eq!(t.trailing_window(1.5, 3).unwrap(), &[0.5, 1.0, 1.5]);
        assert_eq!(t.trailing_window(10.0, 2).unwrap(), &[2.0, 2.5]);
        assert!(t.trailing_window(10.0, 0).is_none());
    }
}
