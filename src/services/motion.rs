//! Motion ingestion: framed accelerometer packets and the per-connection
//! session state machine.
//!
//! Each connection owns one `Session`. Frames drive the machine one at a
//! time: decoded samples flow through the pipeline, detector, aligner, and
//! scorer (or are dropped while no playback schedule exists); a sentinel
//! flushes the beat list and re-seeds the session for the next acquisition
//! window; a disconnect or read timeout stops playback and closes the
//! session, after which the accept loop waits for the next connection.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use log::{debug, error, info, warn};
use tokio::net::TcpListener;

use crate::analysis::{
    BeatDetector, BeatGridAligner, FilterCoefficients, ScoringEngine, Session,
};
use crate::error::{log_dropped_frame, PipelineError};
use crate::protocol::{decode_motion_frame, MotionFrame, RawSample};
use crate::schedule::{PlaybackSchedule, SchedulePublisher};
use crate::services::playback::PlaybackController;
use crate::services::{read_frame, FrameRead};
use crate::sinks::{EventStore, SampleUpdate, ScoreUpdate, VisualizerSink};

/// Result of feeding one frame to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Samples decoded and processed.
    Processed(usize),
    /// Samples decoded but dropped: no playback schedule published yet.
    PrematureDrop(usize),
    /// Length mismatch; frame discarded, session untouched.
    Invalid,
    /// Sentinel: beat list flushed, session re-seeded.
    Finished,
}

pub struct MotionIngestionService {
    host: String,
    port: u16,
    packet_size: usize,
    read_timeout: Duration,
    order: usize,
    history_capacity: usize,
    coeffs: Arc<FilterCoefficients>,
    detector: BeatDetector,
    aligner: BeatGridAligner,
    scorer: ScoringEngine,
    publisher: Arc<SchedulePublisher>,
    controller: Arc<PlaybackController>,
    visualizer: Arc<dyn VisualizerSink>,
    store: Arc<dyn EventStore>,
}

impl MotionIngestionService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        host: String,
        port: u16,
        packet_size: usize,
        read_timeout: Duration,
        order: usize,
        history_capacity: usize,
        coeffs: Arc<FilterCoefficients>,
        detector: BeatDetector,
        aligner: BeatGridAligner,
        scorer: ScoringEngine,
        publisher: Arc<SchedulePublisher>,
        controller: Arc<PlaybackController>,
        visualizer: Arc<dyn VisualizerSink>,
        store: Arc<dyn EventStore>,
    ) -> Self {
        Self {
            host,
            port,
            packet_size,
            read_timeout,
            order,
            history_capacity,
            coeffs,
            detector,
            aligner,
            scorer,
            publisher,
            controller,
            visualizer,
            store,
        }
    }

    /// Bind and serve forever.
    pub async fn run(self) -> anyhow::Result<()> {
        let listener = TcpListener::bind((self.host.as_str(), self.port))
            .await
            .with_context(|| format!("binding motion listener on port {}", self.port))?;
        info!("motion: listening on {}:{}", self.host, self.port);
        self.serve_on(listener).await
    }

    /// Accept loop: one connection, one session at a time.
    pub async fn serve_on(self, listener: TcpListener) -> anyhow::Result<()> {
        loop {
            let (mut stream, addr) = listener
                .accept()
                .await
                .context("accepting motion connection")?;
            info!("motion: connected by {}", addr);

            let mut session = Session::new(self.order, self.history_capacity);
            let mut buf = vec![0u8; self.packet_size];
            loop {
                match read_frame(&mut stream, &mut buf, self.read_timeout).await {
                    Ok(FrameRead::Disconnected) => {
                        info!("motion: session exited");
                        self.controller.stop();
                        break;
                    }
                    Ok(FrameRead::Complete) => {
                        self.handle_frame(&mut session, &buf);
                    }
                    Err(err) => {
                        warn!("motion: connection error: {}", err);
                        self.controller.stop();
                        break;
                    }
                }
            }
        }
    }

    /// Drive the state machine with one raw frame.
    pub fn handle_frame(&self, session: &mut Session, buf: &[u8]) -> FrameOutcome {
        match decode_motion_frame(buf, self.packet_size) {
            Err(err) => {
                log_dropped_frame("motion", &err);
                FrameOutcome::Invalid
            }
            Ok(MotionFrame::EndOfStream) => {
                let events = session.take_events();
                info!("motion: acquisition finished with {} beats", events.len());
                if let Err(err) = self.store.persist(&events) {
                    error!("motion: failed to persist beat events: {}", err);
                }
                session.reset();
                FrameOutcome::Finished
            }
            Ok(MotionFrame::Samples(samples)) => {
                let Some(schedule) = self.publisher.snapshot() else {
                    warn!(
                        "motion: {}",
                        PipelineError::PrematureData {
                            dropped: samples.len()
                        }
                    );
                    return FrameOutcome::PrematureDrop(samples.len());
                };
                let count = samples.len();
                for raw in samples {
                    self.process_sample(session, raw, schedule);
                }
                FrameOutcome::Processed(count)
            }
        }
    }

    fn process_sample(&self, session: &mut Session, raw: RawSample, schedule: PlaybackSchedule) {
        let processed = session.process_sample(raw, &self.coeffs);

        let mut on_grid = false;
        if let Some(event) = self.detector.detect(session) {
            let aligned = self.aligner.align(event.timestamp, schedule.play_delay);
            session.record_beat(event.timestamp, aligned.on_grid);
            on_grid = aligned.on_grid;
            debug!(
                "motion: beat at {:.3}s, track {:.3}s, distance {:.3}s, on_grid={}",
                event.timestamp, aligned.track_time, aligned.distance, aligned.on_grid
            );

            let song_time = processed.timestamp - schedule.play_delay;
            if let Some(score) =
                self.scorer
                    .score(session.beat_events(), schedule.play_delay, song_time)
            {
                self.visualizer.publish_score(ScoreUpdate {
                    timestamp: processed.timestamp,
                    score,
                });
            }
        }

        self.visualizer.publish_sample(SampleUpdate {
            timestamp: processed.timestamp,
            accel: processed.accel,
            filtered: processed.filtered,
            on_grid,
        });
    }
}
