//! Clock-calibration exchange.
//!
//! The device estimates its clock offset and link latency from the classic
//! four-timestamp round trip: it sends `{device_send, device_receive}`, the
//! host replies `{host_receive, host_send}`, and the device computes
//! `offset = ((host_receive - device_send) + (host_send - device_receive)) / 2`
//! and `rtt = (host_send - device_send) - (host_receive - device_receive)`.
//! This service is the passive timestamping responder: it stamps
//! `host_receive` at read completion and `host_send` at write time, and
//! performs no estimation of its own. One connection may carry any number
//! of probes; a disconnect ends the exchange cleanly.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use log::{debug, info, warn};
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};

use crate::clock::Clock;
use crate::error::log_dropped_frame;
use crate::protocol::{
    decode_calibration_probe, encode_calibration_reply, CalibrationReply,
    CALIBRATION_PACKET_SIZE,
};
use crate::services::{read_frame, FrameRead};

pub struct ClockCalibrationService {
    host: String,
    port: u16,
    read_timeout: Duration,
    clock: Arc<dyn Clock>,
}

impl ClockCalibrationService {
    pub fn new(host: String, port: u16, read_timeout: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            host,
            port,
            read_timeout,
            clock,
        }
    }

    /// Bind and serve forever.
    pub async fn run(self) -> anyhow::Result<()> {
        let listener = TcpListener::bind((self.host.as_str(), self.port))
            .await
            .with_context(|| format!("binding calibration listener on port {}", self.port))?;
        info!("calibration: listening on {}:{}", self.host, self.port);
        self.serve_on(listener).await
    }

    /// Accept loop: one connection at a time, any number of probes each.
    pub async fn serve_on(self, listener: TcpListener) -> anyhow::Result<()> {
        loop {
            let (mut stream, addr) = listener
                .accept()
                .await
                .context("accepting calibration connection")?;
            info!("calibration: connected by {}", addr);
            if let Err(err) = self.serve_connection(&mut stream).await {
                warn!("calibration: connection error: {}", err);
            }
        }
    }

    async fn serve_connection(&self, stream: &mut TcpStream) -> io::Result<()> {
        let mut buf = [0u8; CALIBRATION_PACKET_SIZE];
        loop {
            match read_frame(stream, &mut buf, self.read_timeout).await? {
                FrameRead::Disconnected => {
                    info!("calibration: client is done");
                    return Ok(());
                }
                FrameRead::Complete => {
                    let host_receive_ms = self.clock.now_ms();
                    let probe = match decode_calibration_probe(&buf) {
                        Ok(probe) => probe,
                        Err(err) => {
                            log_dropped_frame("calibration", &err);
                            continue;
                        }
                    };
                    debug!(
                        "calibration: probe sent={} received={}",
                        probe.device_send_ms, probe.device_receive_ms
                    );

                    let host_send_ms = self.clock.now_ms();
                    let reply = encode_calibration_reply(&CalibrationReply {
                        host_receive_ms,
                        host_send_ms,
                    });
                    stream.write_all(&reply).await?;
                }
            }
        }
    }
}
