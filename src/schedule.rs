//! Playback schedule snapshot shared between the scheduler and ingestion.
//!
//! The schedule is the one piece of cross-task shared state: written by the
//! playback service when a trigger arrives, read by the motion service for
//! every frame. Both fields publish together as a wholesale-replaced
//! immutable snapshot, never field-by-field.

use std::sync::RwLock;

/// The published playback timing reference.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackSchedule {
    /// Host wall-clock seconds at which the trigger was processed.
    pub epoch: f64,
    /// Absolute target start time in seconds.
    pub play_time: f64,
    /// `play_time - epoch`; the offset used to map session timestamps onto
    /// the reference beat timeline.
    pub play_delay: f64,
}

impl PlaybackSchedule {
    pub fn new(epoch: f64, play_time: f64) -> Self {
        Self {
            epoch,
            play_time,
            play_delay: play_time - epoch,
        }
    }
}

/// Single-writer multi-reader holder for the current schedule.
#[derive(Debug, Default)]
pub struct SchedulePublisher {
    current: RwLock<Option<PlaybackSchedule>>,
}

impl SchedulePublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the published schedule wholesale.
    pub fn publish(&self, schedule: PlaybackSchedule) {
        *self.current.write().expect("schedule lock poisoned") = Some(schedule);
    }

    /// Copy of the current schedule, `None` until the first trigger.
    pub fn snapshot(&self) -> Option<PlaybackSchedule> {
        *self.current.read().expect("schedule lock poisoned")
    }

    /// Drop the published schedule (playback stopped).
    pub fn clear(&self) {
        *self.current.write().expect("schedule lock poisoned") = None;
    }
}
