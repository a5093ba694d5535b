// Error types for the baton trainer services
//
// This module defines custom error types for the wire protocol and the
// signal-processing pipeline, providing structured error handling for the
// service loops.

use log::warn;
use std::fmt;

/// Protocol-level errors raised while reading or decoding frames.
///
/// A malformed frame is dropped and the session continues; a disconnect
/// (zero-length read or read timeout) tears the session down but leaves the
/// service accepting new connections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Frame length did not match the channel's fixed packet size
    MalformedFrame { expected: usize, actual: usize },

    /// Peer disconnected (zero-length read) or the read timed out
    Disconnected,
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::MalformedFrame { expected, actual } => {
                write!(
                    f,
                    "malformed frame: expected {} bytes, got {}",
                    expected, actual
                )
            }
            ProtocolError::Disconnected => write!(f, "peer disconnected"),
        }
    }
}

impl std::error::Error for ProtocolError {}

/// Pipeline-level errors raised while configuring or feeding the
/// signal-processing stages.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineError {
    /// Motion samples arrived before a playback schedule was published
    PrematureData { dropped: usize },

    /// Filter denominator must be monic (`a[0] == 1`); violation is fatal
    /// at startup, never per-sample
    FilterPrecondition { a0: f64 },

    /// Filter design parameters out of range
    InvalidFilterDesign { reason: String },

    /// Reference beat timeline is empty or not strictly ascending
    InvalidTimeline { reason: String },
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::PrematureData { dropped } => {
                write!(
                    f,
                    "dropped {} samples received before playback schedule",
                    dropped
                )
            }
            PipelineError::FilterPrecondition { a0 } => {
                write!(f, "filter denominator must be monic, a[0] = {}", a0)
            }
            PipelineError::InvalidFilterDesign { reason } => {
                write!(f, "invalid filter design: {}", reason)
            }
            PipelineError::InvalidTimeline { reason } => {
                write!(f, "invalid beat timeline: {}", reason)
            }
        }
    }
}

impl std::error::Error for PipelineError {}

/// Log a dropped frame with service context. Non-fatal by contract.
pub fn log_dropped_frame(service: &str, err: &ProtocolError) {
    warn!("{}: dropping frame: {}", service, err);
}
