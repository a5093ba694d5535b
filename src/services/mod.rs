//! The three TCP service loops and their shared frame reader.

pub mod calibration;
pub mod motion;
pub mod playback;

pub use calibration::ClockCalibrationService;
pub use motion::MotionIngestionService;
pub use playback::{PlaybackController, PlaybackScheduler};

use std::io;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::time::timeout;

/// Outcome of one full-frame read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FrameRead {
    /// The buffer holds a complete frame.
    Complete,
    /// Peer closed, or the bounded timeout expired mid-wait. The two are
    /// indistinguishable by contract and both tear the session down.
    Disconnected,
}

/// Read until `buf` is full. Each underlying read is bounded by
/// `read_timeout`; a timeout or a zero-length read yields `Disconnected`
/// (a partial frame followed by close counts as a disconnect too).
pub(crate) async fn read_frame(
    stream: &mut TcpStream,
    buf: &mut [u8],
    read_timeout: Duration,
) -> io::Result<FrameRead> {
    let mut filled = 0;
    while filled < buf.len() {
        match timeout(read_timeout, stream.read(&mut buf[filled..])).await {
            Err(_elapsed) => return Ok(FrameRead::Disconnected),
            Ok(Ok(0)) => return Ok(FrameRead::Disconnected),
            Ok(Ok(n)) => filled += n,
            Ok(Err(err)) if err.kind() == io::ErrorKind::ConnectionReset => {
                return Ok(FrameRead::Disconnected)
            }
            Ok(Err(err)) => return Err(err),
        }
    }
    Ok(FrameRead::Complete)
}
