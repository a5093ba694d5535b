//! Beat-grid alignment.
//!
//! Each detected beat event is shifted by the published playback delay onto
//! the track time base and compared against the reference beat timeline;
//! within tolerance of the nearest beat it is on-grid.

use std::sync::Arc;

use crate::timeline::ReferenceBeatTimeline;

/// Alignment verdict for one beat event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlignedBeat {
    /// Event timestamp mapped onto track time.
    pub track_time: f64,
    /// Distance to the nearest reference beat.
    pub distance: f64,
    pub on_grid: bool,
}

#[derive(Debug, Clone)]
pub struct BeatGridAligner {
    timeline: Arc<ReferenceBeatTimeline>,
    tolerance: f64,
}

impl BeatGridAligner {
    pub fn new(timeline: Arc<ReferenceBeatTimeline>, tolerance: f64) -> Self {
        Self {
            timeline,
            tolerance,
        }
    }

    /// Map a session-relative event onto track time and judge it against
    /// the grid. The track starts `play_delay` seconds after the trigger
    /// epoch, so track time is the event shifted back by that delay.
    pub fn align(&self, event_timestamp: f64, play_delay: f64) -> AlignedBeat {
        let track_time = event_timestamp - play_delay;
        let distance = self.timeline.nearest_distance(track_time);
        AlignedBeat {
            track_time,
            distance,
            on_grid: distance < self.tolerance,
        }
    }
}
