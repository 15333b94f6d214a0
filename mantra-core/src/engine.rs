//! # Analysis Engine
//!
//! Runs pitch, spectral-shape and onset detection over a capture graph's
//! high-resolution tap, once per display refresh.
//!
//! ## Features
//! - One [`FeatureSnapshot`] per tick, computed from a single window
//! - Frame buffers reused across ticks
//! - [`AnalysisLoop`]: a headless driver that ticks on its own thread and
//!   stops after the current tick when dropped

use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::Result;
use crossbeam_channel::Sender;

use crate::{FeatureSnapshot, MagnitudeFrame, TimeFrame};
use crate::config::AnalysisConfig;
use crate::graph::CaptureGraphHandle;
use crate::latest::{LatestReceiver, latest};
use crate::onset::OnsetDetector;
use crate::pitch::PitchDetector;
use crate::spectral::SpectralFeatureExtractor;

#[derive(Debug)]
pub struct AnalysisEngine {
    graph: CaptureGraphHandle,
    pitch: PitchDetector,
    spectral: SpectralFeatureExtractor,
    onset: OnsetDetector,
    time_frame: TimeFrame,
    magnitude_frame: MagnitudeFrame,
    latest: Option<FeatureSnapshot>,
}

impl AnalysisEngine {
    pub fn new(graph: CaptureGraphHandle, config: &AnalysisConfig) -> Self {
        let window = graph.analysis_tap().fft_size();
        Self {
            pitch: PitchDetector::new(&config.pitch),
            spectral: SpectralFeatureExtractor::new(&config.spectrum),
            onset: OnsetDetector::new(&config.onset),
            time_frame: Vec::with_capacity(window),
            magnitude_frame: Vec::with_capacity(window / 2),
            latest: None,
            graph,
        }
    }

    /// Runs one analysis tick.
    ///
    /// Both frames come from the same tap read, so all three detectors see
    /// the same audio. The graph may not have delivered anything new since
    /// the last tick; the previous window is analysed again in that case.
    pub fn tick(&mut self) -> FeatureSnapshot {
        self.graph
            .analysis_tap()
            .read_frames(&mut self.time_frame, &mut self.magnitude_frame);
        let sample_rate = self.graph.sample_rate();

        let f0_hz = self.pitch.estimate(&self.time_frame, sample_rate);
        let shape = self.spectral.extract(&self.magnitude_frame, sample_rate);
        let onset = self.onset.detect(&self.magnitude_frame);

        let snapshot = FeatureSnapshot {
            f0_hz,
            onset,
            centroid_hz: shape.centroid_hz,
            rolloff_hz: shape.rolloff_hz,
            flatness: shape.flatness,
        };
        self.latest = Some(snapshot);
        snapshot
    }

    /// Snapshot from the most recent tick.
    pub fn latest(&self) -> Option<FeatureSnapshot> {
        self.latest
    }

    pub fn graph(&self) -> &CaptureGraphHandle {
        &self.graph
    }

    /// Time frame read on the most recent tick.
    pub fn time_frame(&self) -> &[f32] {
        &self.time_frame
    }

    /// Magnitude frame read on the most recent tick (0..=255 per bin).
    pub fn magnitude_frame(&self) -> &[f32] {
        &self.magnitude_frame
    }

    /// Spectral flux behind the most recent onset decision.
    pub fn last_flux(&self) -> f32 {
        self.onset.last_flux()
    }
}

/// Drives an [`AnalysisEngine`] on a dedicated thread.
///
/// Without an engine (the attach failed) no thread runs and
/// [`AnalysisLoop::latest`] stays `None` for good.
pub struct AnalysisLoop {
    snapshots: LatestReceiver<FeatureSnapshot>,
    last: Option<FeatureSnapshot>,
    worker: Option<LoopWorker>,
}

struct LoopWorker {
    shutdown: Sender<()>,
    handle: JoinHandle<()>,
}

impl AnalysisLoop {
    /// Starts ticking `engine` `refresh_hz` times per second.
    ///
    /// # Returns
    /// * `Ok(loop)` - Running loop, or an idle one when `engine` is `None`
    /// * `Err(e)` - The worker thread could not be spawned
    pub fn spawn(engine: Option<AnalysisEngine>, refresh_hz: u32) -> Result<Self> {
        let (snapshot_tx, snapshots) = latest();
        let Some(mut engine) = engine else {
            log::info!("[ENGINE] No capture graph; running without snapshots");
            return Ok(Self { snapshots, last: None, worker: None });
        };

        let period = Duration::from_secs_f64(1.0 / f64::from(refresh_hz.max(1)));
        let (shutdown, shutdown_rx) = crossbeam_channel::bounded::<()>(1);
        let source_id = engine.graph().source_id();

        let handle = thread::Builder::new()
            .name(format!("mantra-analysis-{}", source_id))
            .spawn(move || {
                log::info!("[ENGINE] Analysis loop started for {} at {:?} per tick", source_id, period);
                let ticker = crossbeam_channel::tick(period);
                loop {
                    crossbeam_channel::select! {
                        recv(ticker) -> _ => {
                            snapshot_tx.publish(engine.tick());
                        }
                        recv(shutdown_rx) -> _ => break,
                    }
                }
                log::info!("[ENGINE] Analysis loop for {} stopped", source_id);
            })?;

        Ok(Self {
            snapshots,
            last: None,
            worker: Some(LoopWorker { shutdown, handle }),
        })
    }

    /// Newest snapshot published so far.
    pub fn latest(&mut self) -> Option<FeatureSnapshot> {
        if let Some(snapshot) = self.snapshots.take() {
            self.last = Some(snapshot);
        }
        self.last
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    /// Stops the loop. A tick in progress runs to completion first.
    pub fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        let _ = worker.shutdown.send(());
        if worker.handle.join().is_err() {
            log::warn!("[ENGINE] Analysis thread panicked");
        }
    }
}

impl Drop for AnalysisLoop {
    fn drop(&mut self) {
        self.stop();
    }
}
