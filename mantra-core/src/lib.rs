// mantra-core/src/lib.rs

//! The core of the live hymn visualizer.
//! This crate taps playing audio sources, keeps one capture graph per
//! source, and extracts pitch, spectral shape and onsets once per display
//! refresh. It is completely headless and contains no GUI code.

pub mod analyser;
pub mod audio;
pub mod backend;
pub mod config;
pub mod engine;
pub mod error;
pub mod fft;
pub mod graph;
mod latest;
pub mod onset;
pub mod pitch;
pub mod registry;
pub mod relay;
pub mod source;
pub mod spectral;

pub use audio::CpalBackend;
pub use backend::{CaptureBackend, ManualBackend, ManualFeed};
pub use config::AnalysisConfig;
pub use engine::{AnalysisEngine, AnalysisLoop};
pub use error::{AttachFailure, ResumeFailure};
pub use graph::{CaptureGraph, CaptureGraphHandle, GraphState};
pub use registry::AudioTapRegistry;
pub use relay::RelayMessage;
pub use source::{Access, PlaybackSource, SourceId};

use serde::Serialize;

/// Samples of the newest analysis window, oldest first.
pub type TimeFrame = Vec<f32>;

/// Magnitudes on a 0..=255 scale, one per bin from 0 Hz up to Nyquist.
pub type MagnitudeFrame = Vec<f32>;

/// Features extracted on a single analysis tick.
///
/// `None` means "not estimable this tick" (silence, no clear pitch),
/// never an error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureSnapshot {
    /// Fundamental frequency in Hz, within the configured pitch range.
    pub f0_hz: Option<f32>,
    /// Whether the spectral flux since the previous tick crossed the threshold.
    pub onset: bool,
    pub centroid_hz: Option<f32>,
    pub rolloff_hz: Option<f32>,
    /// Spectral flatness in [0, 1]; near 1 for noise, near 0 for tones.
    pub flatness: Option<f32>,
}
