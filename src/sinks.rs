//! Collaborator seams at the pipeline boundary.
//!
//! The core publishes to three external collaborators: the visualizer
//! (per-sample and per-score updates), the audio player (start/stop), and
//! the event store (beat lists at end of acquisition). Each is a trait so
//! services stay decoupled from the shipped implementations; tests use the
//! no-op stubs.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::Context;
use log::{debug, error, info};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::config::AudioConfig;

/// Per-sample update for the visualizer overlay.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SampleUpdate {
    pub timestamp: f64,
    pub accel: [f64; 3],
    pub filtered: [f64; 3],
    pub on_grid: bool,
}

/// Per-score update for the visualizer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreUpdate {
    pub timestamp: f64,
    pub score: f64,
}

/// Receives the pipeline's outputs for display.
pub trait VisualizerSink: Send + Sync {
    fn publish_sample(&self, update: SampleUpdate);
    fn publish_score(&self, update: ScoreUpdate);
}

/// Controls the external audio player.
pub trait AudioSink: Send + Sync {
    fn start(&self);
    fn stop(&self);
}

/// Receives the session's beat-event list at acquisition end.
pub trait EventStore: Send + Sync {
    fn persist(&self, events: &[f64]) -> anyhow::Result<()>;
}

/// Visualizer backed by tokio broadcast channels. Consumers subscribe and
/// receive independent copies; lagged subscribers drop old messages.
pub struct BroadcastVisualizer {
    samples: broadcast::Sender<SampleUpdate>,
    scores: broadcast::Sender<ScoreUpdate>,
}

impl BroadcastVisualizer {
    pub fn new(capacity: usize) -> Self {
        let (samples, _) = broadcast::channel(capacity);
        let (scores, _) = broadcast::channel(capacity);
        Self { samples, scores }
    }

    pub fn subscribe_samples(&self) -> broadcast::Receiver<SampleUpdate> {
        self.samples.subscribe()
    }

    pub fn subscribe_scores(&self) -> broadcast::Receiver<ScoreUpdate> {
        self.scores.subscribe()
    }
}

impl Default for BroadcastVisualizer {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl VisualizerSink for BroadcastVisualizer {
    fn publish_sample(&self, update: SampleUpdate) {
        // No subscribers is fine; the pipeline never blocks on the display.
        let _ = self.samples.send(update);
    }

    fn publish_score(&self, update: ScoreUpdate) {
        let _ = self.scores.send(update);
    }
}

/// Audio sink that spawns the configured player command on `start` and
/// kills it on `stop`. Stopping with no player running is a no-op.
pub struct PlayerProcessSink {
    command: String,
    args: Vec<String>,
    child: Mutex<Option<tokio::process::Child>>,
}

impl PlayerProcessSink {
    pub fn new(config: &AudioConfig) -> Self {
        Self {
            command: config.player_command.clone(),
            args: config.player_args.clone(),
            child: Mutex::new(None),
        }
    }
}

impl AudioSink for PlayerProcessSink {
    fn start(&self) {
        let mut guard = self.child.lock().expect("player lock poisoned");
        if let Some(mut previous) = guard.take() {
            let _ = previous.start_kill();
        }
        match tokio::process::Command::new(&self.command)
            .args(&self.args)
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => {
                info!("audio: started player {:?}", self.command);
                *guard = Some(child);
            }
            Err(err) => error!("audio: failed to start player {:?}: {}", self.command, err),
        }
    }

    fn stop(&self) {
        let mut guard = self.child.lock().expect("player lock poisoned");
        if let Some(mut child) = guard.take() {
            if let Err(err) = child.start_kill() {
                debug!("audio: player already exited: {}", err);
            } else {
                info!("audio: stopped player");
            }
        }
    }
}

/// Beat-event persistence as one JSON array per line.
pub struct JsonLinesStore {
    path: PathBuf,
}

impl JsonLinesStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }
}

impl EventStore for JsonLinesStore {
    fn persist(&self, events: &[f64]) -> anyhow::Result<()> {
        let line = serde_json::to_string(events)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("opening {}", self.path.display()))?;
        writeln!(file, "{}", line)?;
        info!(
            "persisted {} beat events to {}",
            events.len(),
            self.path.display()
        );
        Ok(())
    }
}

/// No-op visualizer for tests and headless runs.
#[derive(Debug, Default)]
pub struct NullVisualizer;

impl VisualizerSink for NullVisualizer {
    fn publish_sample(&self, _update: SampleUpdate) {}
    fn publish_score(&self, _update: ScoreUpdate) {}
}

/// Audio sink that only counts invocations; used by tests.
#[derive(Debug, Default)]
pub struct CountingAudioSink {
    pub starts: std::sync::atomic::AtomicUsize,
    pub stops: std::sync::atomic::AtomicUsize,
}

impl AudioSink for CountingAudioSink {
    fn start(&self) {
        self.starts
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    }

    fn stop(&self) {
        self.stops.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    }
}

/// In-memory event store; used by tests.
#[derive(Debug, Default)]
pub struct MemoryEventStore {
    pub flushed: Mutex<Vec<Vec<f64>>>,
}

impl EventStore for MemoryEventStore {
    fn persist(&self, events: &[f64]) -> anyhow::Result<()> {
        self.flushed
            .lock()
            .expect("store lock poisoned")
            .push(events.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broadcast_visualizer_fanout() {
        let visualizer = BroadcastVisualizer::new(16);
        let mut rx1 = visualizer.subscribe_samples();
        let mut rx2 = visualizer.subscribe_samples();

        let update = SampleUpdate {
            timestamp: 0.25,
            accel: [1.0, 2.0, 3.0],
            filtered: [0.1, 0.2, 0.3],
            on_grid: true,
        };
        visualizer.publish_sample(update);

        assert_eq!(rx1.try_recv().unwrap(), update);
        assert_eq!(rx2.try_recv().unwrap(), update);
    }

    #[test]
    fn test_publish_without_subscribers_does_not_panic() {
        let visualizer = BroadcastVisualizer::new(16);
        visualizer.publish_score(ScoreUpdate {
            timestamp: 1.0,
            score: 5.0,
        });
    }

    #[test]
    fn test_memory_store_accumulates_flushes() {
        let store = MemoryEventStore::default();
        store.persist(&[0.1, 0.2]).unwrap();
        store.persist(&[]).unwrap();
        let flushed = store.flushed.lock().unwrap();
        assert_eq!(flushed.len(), 2);
        assert_eq!(flushed[0], vec![0.1, 0.2]);
        assert!(flushed[1].is_empty());
    }

    #[test]
    fn test_json_lines_store_appends() {
        let dir = std::env::temp_dir().join("baton_trainer_store_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("events.jsonl");
        let _ = std::fs::remove_file(&path);

        let store = JsonLinesStore::new(&path);
        store.persist(&[0.5, 1.0]).unwrap();
        store.persist(&[2.5]).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: Vec<f64> = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first, vec![0.5, 1.0]);
    }
}
