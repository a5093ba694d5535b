//! Signal-processing pipeline: history buffers, filtering, beat detection,
//! grid alignment, and scoring.

pub mod aligner;
pub mod detector;
pub mod filter;
pub mod history;
pub mod pipeline;
pub mod scoring;

pub use aligner::{AlignedBeat, BeatGridAligner};
pub use detector::{BeatDetector, BeatEvent};
pub use filter::{butterworth_highpass, FilterCoefficients};
pub use history::History;
pub use pipeline::{ProcessedSample, Session};
pub use scoring::ScoringEngine;
