//! Service orchestration.
//!
//! `ServerHandle` wires configuration, the designed filter, the reference
//! timeline, and the shared collaborators together, then runs the three
//! service loops as tokio tasks until interrupted. The filter's monic
//! denominator is validated here, at startup, so a bad design never reaches
//! the per-sample path.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use log::info;
use tokio::sync::broadcast;

use crate::analysis::{
    butterworth_highpass, BeatDetector, BeatGridAligner, FilterCoefficients, ScoringEngine,
};
use crate::clock::{Clock, SystemClock};
use crate::config::AppConfig;
use crate::schedule::SchedulePublisher;
use crate::services::{
    ClockCalibrationService, MotionIngestionService, PlaybackController, PlaybackScheduler,
};
use crate::sinks::{
    AudioSink, BroadcastVisualizer, EventStore, JsonLinesStore, PlayerProcessSink, SampleUpdate,
    ScoreUpdate,
};
use crate::timeline::ReferenceBeatTimeline;

pub struct ServerHandle {
    config: AppConfig,
    coeffs: Arc<FilterCoefficients>,
    timeline: Arc<ReferenceBeatTimeline>,
    publisher: Arc<SchedulePublisher>,
    controller: Arc<PlaybackController>,
    visualizer: Arc<BroadcastVisualizer>,
    store: Arc<dyn EventStore>,
    clock: Arc<dyn Clock>,
}

impl ServerHandle {
    /// Build with the shipped collaborators: system clock, player
    /// subprocess, JSON-lines event store.
    pub fn new(config: AppConfig, timeline: ReferenceBeatTimeline) -> anyhow::Result<Self> {
        let audio: Arc<dyn AudioSink> = Arc::new(PlayerProcessSink::new(&config.audio));
        let store: Arc<dyn EventStore> = Arc::new(JsonLinesStore::new(&config.events_path));
        Self::with_collaborators(config, timeline, Arc::new(SystemClock), audio, store)
    }

    /// Build with explicit collaborators (tests inject scripted clocks and
    /// counting sinks here).
    pub fn with_collaborators(
        config: AppConfig,
        timeline: ReferenceBeatTimeline,
        clock: Arc<dyn Clock>,
        audio: Arc<dyn AudioSink>,
        store: Arc<dyn EventStore>,
    ) -> anyhow::Result<Self> {
        let coeffs = butterworth_highpass(
            config.filter.order,
            config.filter.cutoff_hz,
            config.filter.sample_rate_hz,
        )
        .context("designing high-pass filter")?;
        coeffs.validate().context("validating filter design")?;
        info!(
            "designed order-{} Butterworth high-pass at {} Hz / {} Hz sampling",
            config.filter.order, config.filter.cutoff_hz, config.filter.sample_rate_hz
        );

        let publisher = Arc::new(SchedulePublisher::new());
        let controller = Arc::new(PlaybackController::new(
            Arc::clone(&clock),
            Arc::clone(&publisher),
            audio,
        ));

        Ok(Self {
            config,
            coeffs: Arc::new(coeffs),
            timeline: Arc::new(timeline),
            publisher,
            controller,
            visualizer: Arc::new(BroadcastVisualizer::default()),
            store,
            clock,
        })
    }

    /// Ring capacity covering the filter window, the detection window, and
    /// the visualizer history.
    pub fn history_capacity(&self) -> usize {
        (self.config.filter.order + 1)
            .max(self.config.detection.window)
            .max(self.config.detection.plot_window)
    }

    pub fn subscribe_samples(&self) -> broadcast::Receiver<SampleUpdate> {
        self.visualizer.subscribe_samples()
    }

    pub fn subscribe_scores(&self) -> broadcast::Receiver<ScoreUpdate> {
        self.visualizer.subscribe_scores()
    }

    pub fn schedule_publisher(&self) -> Arc<SchedulePublisher> {
        Arc::clone(&self.publisher)
    }

    /// Construct the three service loops sharing this handle's state.
    pub fn services(
        &self,
    ) -> (
        ClockCalibrationService,
        PlaybackScheduler,
        MotionIngestionService,
    ) {
        let network = &self.config.network;
        let read_timeout = Duration::from_millis(network.read_timeout_ms);

        let calibration = ClockCalibrationService::new(
            network.host.clone(),
            network.calibration_port,
            read_timeout,
            Arc::clone(&self.clock),
        );

        let playback = PlaybackScheduler::new(
            network.host.clone(),
            network.playback_port,
            read_timeout,
            Arc::clone(&self.controller),
        );

        let motion = MotionIngestionService::new(
            network.host.clone(),
            network.motion_port,
            network.motion_packet_size(),
            read_timeout,
            self.config.filter.order,
            self.history_capacity(),
            Arc::clone(&self.coeffs),
            BeatDetector::new(
                self.config.detection.window,
                self.config.detection.noise_threshold,
            ),
            BeatGridAligner::new(
                Arc::clone(&self.timeline),
                self.config.detection.grid_tolerance,
            ),
            ScoringEngine::new(&self.config.scoring, Arc::clone(&self.timeline)),
            Arc::clone(&self.publisher),
            Arc::clone(&self.controller),
            Arc::clone(&self.visualizer) as _,
            Arc::clone(&self.store),
        );

        (calibration, playback, motion)
    }

    /// Run all three services until one fails or ctrl-c arrives.
    pub async fn serve(self) -> anyhow::Result<()> {
        info!(
            "serving with {} strategy over {} reference beats",
            match self.config.scoring.strategy {
                crate::config::ScoringStrategy::Cumulative => "cumulative",
                crate::config::ScoringStrategy::Windowed => "windowed",
            },
            self.timeline.len()
        );
        let (calibration, playback, motion) = self.services();

        let mut calibration = tokio::spawn(calibration.run());
        let mut playback = tokio::spawn(playback.run());
        let mut motion = tokio::spawn(motion.run());

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("interrupt received, shutting down");
                calibration.abort();
                playback.abort();
                motion.abort();
                Ok(())
            }
            joined = &mut calibration => joined.context("calibration task panicked")?,
            joined = &mut playback => joined.context("playback task panicked")?,
            joined = &mut motion => joined.context("motion task panicked")?,
        }
    }
}
