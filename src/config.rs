//! Configuration for the baton trainer services.
//!
//! This module provides runtime configuration loading from JSON files,
//! enabling parameter tuning without recompilation. Ports, packet sizing,
//! filter design, detection thresholds, and scoring parameters are all
//! adjustable via the config file; every component receives its section as
//! an immutable value at construction.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Complete application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub network: NetworkConfig,
    pub filter: FilterConfig,
    pub detection: DetectionConfig,
    pub scoring: ScoringConfig,
    pub audio: AudioConfig,
    /// File receiving one JSON line of beat events per finished acquisition.
    pub events_path: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            network: NetworkConfig::default(),
            filter: FilterConfig::default(),
            detection: DetectionConfig::default(),
            scoring: ScoringConfig::default(),
            audio: AudioConfig::default(),
            events_path: "beat_events.jsonl".to_string(),
        }
    }
}

/// TCP listener and framing parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Interface all three listeners bind to.
    pub host: String,
    pub calibration_port: u16,
    pub motion_port: u16,
    pub playback_port: u16,
    /// Elements per motion packet; packet size is 20 bytes per element.
    pub motion_elements: usize,
    /// Bounded socket read timeout; expiry is treated as a disconnect.
    pub read_timeout_ms: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            calibration_port: 10000,
            motion_port: 10001,
            playback_port: 10002,
            motion_elements: 10,
            read_timeout_ms: 30_000,
        }
    }
}

/// Butterworth high-pass design parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub order: usize,
    /// Cutoff in Hz; normalized against `sample_rate_hz / 2` at design time.
    pub cutoff_hz: f64,
    pub sample_rate_hz: f64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            order: 2,
            cutoff_hz: 0.5,
            sample_rate_hz: 100.0,
        }
    }
}

/// Beat detection and grid alignment parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Trailing window (samples) whose summed filtered magnitude gates a
    /// zero-crossing.
    pub window: usize,
    /// Minimum summed magnitude for a crossing to count as a beat.
    pub noise_threshold: f64,
    /// Maximum distance (seconds) from a reference beat to mark on-grid.
    pub grid_tolerance: f64,
    /// Visualizer history bound; one term of the ring-buffer capacity.
    pub plot_window: usize,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            window: 50,
            noise_threshold: 0.1,
            grid_tolerance: 0.1,
            plot_window: 5000,
        }
    }
}

/// Accuracy scoring strategy, chosen once per deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ScoringStrategy {
    /// Mean distance to the nearest reference beat over the whole session.
    Cumulative,
    /// Power-law-weighted accuracy over the most recent beat intervals.
    Windowed,
}

/// Scoring engine parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub strategy: ScoringStrategy,
    /// Reference beats per window for the windowed strategy.
    pub window_beats: usize,
    /// Power-law exponent `p` of the interval weight function.
    pub weight_exponent: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            strategy: ScoringStrategy::Windowed,
            window_beats: 8,
            weight_exponent: 2.0,
        }
    }
}

/// External audio player invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Command spawned on playback start and killed on stop.
    pub player_command: String,
    pub player_args: Vec<String>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            player_command: "aplay".to_string(),
            player_args: vec!["sound_fx.wav".to_string()],
        }
    }
}

impl NetworkConfig {
    /// Fixed motion packet size in bytes.
    pub fn motion_packet_size(&self) -> usize {
        self.motion_elements * crate::protocol::MOTION_ELEMENT_SIZE
    }
}

impl AppConfig {
    /// Load configuration from a JSON file, falling back to defaults when
    /// the file is missing or malformed.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "failed to parse config {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "failed to read config {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }
}
