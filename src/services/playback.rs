//! Playback trigger channel and the shared playback controller.
//!
//! The device sends one absolute start time; the host publishes the
//! `(epoch, play_delay)` schedule snapshot and arms a one-shot timer that
//! starts the external audio sink at that time. A sentinel frame or a
//! disconnect stops playback and cancels the timer. The controller is
//! shared with the motion service so a session exit can stop playback too.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use log::{info, warn};
use tokio::net::TcpListener;

use crate::clock::Clock;
use crate::error::log_dropped_frame;
use crate::protocol::{decode_playback_frame, PlaybackCommand, PLAYBACK_PACKET_SIZE};
use crate::schedule::{PlaybackSchedule, SchedulePublisher};
use crate::services::{read_frame, FrameRead};
use crate::sinks::AudioSink;
use crate::timer::OneShotTimer;

/// Owns the schedule publication, the cancellable start timer, and the
/// audio sink. Start/stop are safe in any order; stopping with nothing
/// armed is a no-op.
pub struct PlaybackController {
    clock: Arc<dyn Clock>,
    publisher: Arc<SchedulePublisher>,
    audio: Arc<dyn AudioSink>,
    timer: OneShotTimer,
}

impl PlaybackController {
    pub fn new(
        clock: Arc<dyn Clock>,
        publisher: Arc<SchedulePublisher>,
        audio: Arc<dyn AudioSink>,
    ) -> Self {
        Self {
            clock,
            publisher,
            audio,
            timer: OneShotTimer::new(),
        }
    }

    /// Process a start trigger: publish the schedule and arm the one-shot
    /// start action. A target already in the past fires immediately.
    pub fn trigger(&self, play_time_ms: i64) -> PlaybackSchedule {
        let epoch = self.clock.now_seconds();
        let play_time = play_time_ms as f64 / 1000.0;
        let schedule = PlaybackSchedule::new(epoch, play_time);
        self.publisher.publish(schedule);

        // The original logged the trigger's transit error; keep that signal.
        info!(
            "playback: scheduled start at {:.3}s (delay {:.3}s, trigger error {} ms)",
            play_time,
            schedule.play_delay,
            self.clock.now_ms() - play_time_ms
        );

        let delay = Duration::from_secs_f64(schedule.play_delay.max(0.0));
        let audio = Arc::clone(&self.audio);
        self.timer.arm(delay, move || audio.start());
        schedule
    }

    /// Stop playback and cancel a pending start. Idempotent.
    pub fn stop(&self) {
        self.timer.cancel();
        self.audio.stop();
    }
}

pub struct PlaybackScheduler {
    host: String,
    port: u16,
    read_timeout: Duration,
    controller: Arc<PlaybackController>,
}

impl PlaybackScheduler {
    pub fn new(
        host: String,
        port: u16,
        read_timeout: Duration,
        controller: Arc<PlaybackController>,
    ) -> Self {
        Self {
            host,
            port,
            read_timeout,
            controller,
        }
    }

    /// Bind and serve forever.
    pub async fn run(self) -> anyhow::Result<()> {
        let listener = TcpListener::bind((self.host.as_str(), self.port))
            .await
            .with_context(|| format!("binding playback listener on port {}", self.port))?;
        info!("playback: listening on {}:{}", self.host, self.port);
        self.serve_on(listener).await
    }

    /// Accept loop: one connection at a time.
    pub async fn serve_on(self, listener: TcpListener) -> anyhow::Result<()> {
        loop {
            let (mut stream, addr) = listener
                .accept()
                .await
                .context("accepting playback connection")?;
            info!("playback: connected by {}", addr);

            let mut buf = [0u8; PLAYBACK_PACKET_SIZE];
            loop {
                match read_frame(&mut stream, &mut buf, self.read_timeout).await {
                    Ok(FrameRead::Disconnected) => {
                        // Disconnect is an implicit stop.
                        info!("playback: client is done");
                        self.controller.stop();
                        break;
                    }
                    Ok(FrameRead::Complete) => match decode_playback_frame(&buf) {
                        Ok(PlaybackCommand::StartAt { play_time_ms }) => {
                            self.controller.trigger(play_time_ms);
                        }
                        Ok(PlaybackCommand::Stop) => {
                            info!("playback: stop requested");
                            self.controller.stop();
                        }
                        Err(err) => log_dropped_frame("playback", &err),
                    },
                    Err(err) => {
                        warn!("playback: connection error: {}", err);
                        self.controller.stop();
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sinks::CountingAudioSink;
    use std::sync::atomic::{AtomicI64, Ordering};

    struct FixedClock(AtomicI64);

    impl Clock for FixedClock {
        fn now_ms(&self) -> i64 {
            self.0.load(Ordering::Relaxed)
        }
    }

    fn controller(now_ms: i64) -> (Arc<PlaybackController>, Arc<SchedulePublisher>, Arc<CountingAudioSink>) {
        let clock = Arc::new(FixedClock(AtomicI64::new(now_ms)));
        let publisher = Arc::new(SchedulePublisher::new());
        let audio = Arc::new(CountingAudioSink::default());
        let controller = Arc::new(PlaybackController::new(
            clock,
            Arc::clone(&publisher),
            Arc::clone(&audio) as Arc<dyn AudioSink>,
        ));
        (controller, publisher, audio)
    }

    #[tokio::test]
    async fn test_trigger_publishes_delay_and_arms_start() {
        let (controller, publisher, audio) = controller(1_000_000);

        let schedule = controller.trigger(1_002_000);
        assert!((schedule.play_delay - 2.0).abs() < 1e-9);

        let snapshot = publisher.snapshot().expect("schedule should be published");
        assert_eq!(snapshot, schedule);

        // Armed but not yet fired.
        assert_eq!(audio.starts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_past_target_fires_immediately() {
        let (controller, _publisher, audio) = controller(1_000_000);
        controller.trigger(999_000);
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(audio.starts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stop_cancels_pending_start() {
        let (controller, _publisher, audio) = controller(1_000_000);
        controller.trigger(1_000_050);
        controller.stop();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(audio.starts.load(Ordering::SeqCst), 0);
        assert_eq!(audio.stops.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stop_idempotent_without_arm() {
        let (controller, _publisher, audio) = controller(1_000_000);
        controller.stop();
        controller.stop();
        assert_eq!(audio.stops.load(Ordering::SeqCst), 2);
        assert_eq!(audio.starts.load(Ordering::SeqCst), 0);
    }
}
