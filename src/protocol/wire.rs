//! Fixed-size big-endian frame codecs.
//!
//! All three channels speak fixed-width frames with big-endian integers:
//!
//! | Channel     | Request                                  | Size       |
//! |-------------|------------------------------------------|------------|
//! | Calibration | `i64 device_send_ms, i64 device_recv_ms` | 16 B       |
//! | Motion      | `N × (f32 ax, f32 ay, f32 az, i64 ts_ms)`| 20 × N B   |
//! | Playback    | `i64 play_time_ms`                       | 8 B        |
//!
//! A frame whose bytes are all `0xFF` is a sentinel ("acquisition finished"
//! on the motion channel, "stop now" on the playback channel). The sentinel
//! check runs before structured decoding; an exact-length non-sentinel frame
//! always decodes (numeric ranges are trusted as-is).

use crate::error::ProtocolError;

/// Size of one motion element on the wire: three f32 axes plus an i64
/// timestamp in milliseconds.
pub const MOTION_ELEMENT_SIZE: usize = 4 + 4 + 4 + 8;

/// Calibration probe and reply are each a pair of i64 milliseconds.
pub const CALIBRATION_PACKET_SIZE: usize = 16;

/// Playback trigger carries a single i64 milliseconds value.
pub const PLAYBACK_PACKET_SIZE: usize = 8;

/// One accelerometer reading as it appears on the wire.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawSample {
    pub ax: f32,
    pub ay: f32,
    pub az: f32,
    /// Device-epoch milliseconds; converted to session-relative seconds on
    /// ingestion, not here.
    pub timestamp_ms: i64,
}

/// Decoded motion frame.
#[derive(Debug, Clone, PartialEq)]
pub enum MotionFrame {
    Samples(Vec<RawSample>),
    /// All-`0xFF` sentinel: the acquisition window is finished.
    EndOfStream,
}

/// Decoded playback frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackCommand {
    StartAt { play_time_ms: i64 },
    /// All-`0xFF` sentinel: stop playback now.
    Stop,
}

/// Calibration probe sent by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalibrationProbe {
    pub device_send_ms: i64,
    pub device_receive_ms: i64,
}

/// Calibration reply stamped by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalibrationReply {
    pub host_receive_ms: i64,
    pub host_send_ms: i64,
}

/// True iff every byte of the frame equals `0xFF`.
#[inline]
pub fn is_sentinel(buf: &[u8]) -> bool {
    !buf.is_empty() && buf.iter().all(|&b| b == 0xFF)
}

/// Decode a motion frame of exactly `expected_len` bytes
/// (`MOTION_ELEMENT_SIZE × n_elements`).
pub fn decode_motion_frame(buf: &[u8], expected_len: usize) -> Result<MotionFrame, ProtocolError> {
    if buf.len() != expected_len {
        return Err(ProtocolError::MalformedFrame {
            expected: expected_len,
            actual: buf.len(),
        });
    }
    if is_sentinel(buf) {
        return Ok(MotionFrame::EndOfStream);
    }

    let mut samples = Vec::with_capacity(expected_len / MOTION_ELEMENT_SIZE);
    for element in buf.chunks_exact(MOTION_ELEMENT_SIZE) {
        samples.push(RawSample {
            ax: f32::from_be_bytes([element[0], element[1], element[2], element[3]]),
            ay: f32::from_be_bytes([element[4], element[5], element[6], element[7]]),
            az: f32::from_be_bytes([element[8], element[9], element[10], element[11]]),
            timestamp_ms: i64::from_be_bytes([
                element[12], element[13], element[14], element[15], element[16], element[17],
                element[18], element[19],
            ]),
        });
    }
    Ok(MotionFrame::Samples(samples))
}

/// Encode samples into one motion frame. Used by tests and device-side
/// tooling; the server itself only decodes.
pub fn encode_motion_frame(samples: &[RawSample]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(samples.len() * MOTION_ELEMENT_SIZE);
    for sample in samples {
        buf.extend_from_slice(&sample.ax.to_be_bytes());
        buf.extend_from_slice(&sample.ay.to_be_bytes());
        buf.extend_from_slice(&sample.az.to_be_bytes());
        buf.extend_from_slice(&sample.timestamp_ms.to_be_bytes());
    }
    buf
}

/// Decode an 8-byte playback frame.
pub fn decode_playback_frame(buf: &[u8]) -> Result<PlaybackCommand, ProtocolError> {
    if buf.len() != PLAYBACK_PACKET_SIZE {
        return Err(ProtocolError::MalformedFrame {
            expected: PLAYBACK_PACKET_SIZE,
            actual: buf.len(),
        });
    }
    if is_sentinel(buf) {
        return Ok(PlaybackCommand::Stop);
    }
    Ok(PlaybackCommand::StartAt {
        play_time_ms: i64::from_be_bytes([
            buf[0], buf[1], buf[2], buf[3], buf[4], buf[5], buf[6], buf[7],
        ]),
    })
}

/// Decode a 16-byte calibration probe.
pub fn decode_calibration_probe(buf: &[u8]) -> Result<CalibrationProbe, ProtocolError> {
    if buf.len() != CALIBRATION_PACKET_SIZE {
        return Err(ProtocolError::MalformedFrame {
            expected: CALIBRATION_PACKET_SIZE,
            actual: buf.len(),
        });
    }
    Ok(CalibrationProbe {
        device_send_ms: i64::from_be_bytes([
            buf[0], buf[1], buf[2], buf[3], buf[4], buf[5], buf[6], buf[7],
        ]),
        device_receive_ms: i64::from_be_bytes([
            buf[8], buf[9], buf[10], buf[11], buf[12], buf[13], buf[14], buf[15],
        ]),
    })
}

/// Encode a 16-byte calibration reply.
pub fn encode_calibration_reply(reply: &CalibrationReply) -> [u8; CALIBRATION_PACKET_SIZE] {
    let mut buf = [0u8; CALIBRATION_PACKET_SIZE];
    buf[0..8].copy_from_slice(&reply.host_receive_ms.to_be_bytes());
    buf[8..16].copy_from_slice(&reply.host_send_ms.to_be_bytes());
    buf
}
