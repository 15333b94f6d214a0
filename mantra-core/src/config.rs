//! # Analysis Configuration
//!
//! Tunable constants for the pipeline, loadable from a TOML file. Every
//! field has a default, so a partial file (or none at all) is valid.
//!
//! ```toml
//! [pitch]
//! yin_threshold = 0.1
//!
//! [onset]
//! flux_threshold = 2000.0
//!
//! [taps]
//! analysis_fft_size = 4096
//! ```

use anyhow::{Context, Result, ensure};
use serde::Deserialize;
use std::path::Path;

/// Smallest transform the feature-extraction tap may use.
pub const MIN_ANALYSIS_FFT_SIZE: usize = 2048;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default)]
    pub pitch: PitchConfig,
    #[serde(default)]
    pub onset: OnsetConfig,
    #[serde(default)]
    pub spectrum: SpectrumConfig,
    #[serde(default)]
    pub taps: TapConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub relay: RelayConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PitchConfig {
    /// Cumulative-mean-normalized difference below which a lag is accepted.
    #[serde(default = "default_yin_threshold")]
    pub yin_threshold: f32,
    #[serde(default = "default_min_hz")]
    pub min_hz: f32,
    #[serde(default = "default_max_hz")]
    pub max_hz: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OnsetConfig {
    /// Spectral flux (on the 0..255 magnitude scale) that counts as an onset.
    #[serde(default = "default_flux_threshold")]
    pub flux_threshold: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpectrumConfig {
    #[serde(default = "default_rolloff_fraction")]
    pub rolloff_fraction: f32,
}

/// Settings for the two analysis taps of a capture graph.
#[derive(Debug, Clone, Deserialize)]
pub struct TapConfig {
    #[serde(default = "default_display_fft_size")]
    pub display_fft_size: usize,
    #[serde(default = "default_analysis_fft_size")]
    pub analysis_fft_size: usize,
    #[serde(default = "default_smoothing_time_constant")]
    pub smoothing_time_constant: f32,
    #[serde(default = "default_min_decibels")]
    pub min_decibels: f32,
    #[serde(default = "default_max_decibels")]
    pub max_decibels: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleConfig {
    /// Display refresh rate the analysis loop ticks at.
    #[serde(default = "default_refresh_hz")]
    pub refresh_hz: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    /// A heartbeat is emitted every this many blocks.
    #[serde(default = "default_heartbeat_every")]
    pub heartbeat_every: u64,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for PitchConfig {
    fn default() -> Self {
        Self {
            yin_threshold: default_yin_threshold(),
            min_hz: default_min_hz(),
            max_hz: default_max_hz(),
        }
    }
}

impl Default for OnsetConfig {
    fn default() -> Self {
        Self { flux_threshold: default_flux_threshold() }
    }
}

impl Default for SpectrumConfig {
    fn default() -> Self {
        Self { rolloff_fraction: default_rolloff_fraction() }
    }
}

impl Default for TapConfig {
    fn default() -> Self {
        Self {
            display_fft_size: default_display_fft_size(),
            analysis_fft_size: default_analysis_fft_size(),
            smoothing_time_constant: default_smoothing_time_constant(),
            min_decibels: default_min_decibels(),
            max_decibels: default_max_decibels(),
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self { refresh_hz: default_refresh_hz() }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            heartbeat_every: default_heartbeat_every(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl TapConfig {
    /// The feature-extraction transform size, never below 2048.
    pub fn effective_analysis_fft_size(&self) -> usize {
        self.analysis_fft_size.max(MIN_ANALYSIS_FFT_SIZE)
    }
}

fn default_yin_threshold() -> f32 { 0.1 }
fn default_min_hz() -> f32 { 50.0 }
fn default_max_hz() -> f32 { 1000.0 }
fn default_flux_threshold() -> f32 { 2000.0 }
fn default_rolloff_fraction() -> f32 { 0.85 }
fn default_display_fft_size() -> usize { 256 }
fn default_analysis_fft_size() -> usize { MIN_ANALYSIS_FFT_SIZE }
fn default_smoothing_time_constant() -> f32 { 0.8 }
fn default_min_decibels() -> f32 { -100.0 }
fn default_max_decibels() -> f32 { -30.0 }
fn default_refresh_hz() -> u32 { 60 }
fn default_heartbeat_every() -> u64 { 50 }
fn default_queue_capacity() -> usize { 256 }

impl AnalysisConfig {
    /// Loads a configuration file.
    ///
    /// # Arguments
    /// * `path` - Path to a TOML file
    ///
    /// # Returns
    /// * `Ok(config)` - Parsed configuration, defaults filled in
    /// * `Err(e)` - The file could not be read, is not valid TOML, or holds
    ///   out-of-range values (see [`AnalysisConfig::validate`])
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::from_toml_str(&content).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values the extractors cannot run with.
    ///
    /// NaN fails every comparison below, so it is rejected along with the
    /// out-of-range values.
    pub fn validate(&self) -> Result<()> {
        let pitch = &self.pitch;
        ensure!(
            pitch.yin_threshold.is_finite(),
            "pitch.yin_threshold must be finite, got {}",
            pitch.yin_threshold
        );
        ensure!(
            pitch.min_hz > 0.0 && pitch.min_hz < pitch.max_hz && pitch.max_hz.is_finite(),
            "pitch range must satisfy 0 < min_hz < max_hz, got {}..{}",
            pitch.min_hz,
            pitch.max_hz
        );
        ensure!(
            self.onset.flux_threshold.is_finite(),
            "onset.flux_threshold must be finite, got {}",
            self.onset.flux_threshold
        );

        let rolloff = self.spectrum.rolloff_fraction;
        ensure!(
            rolloff > 0.0 && rolloff <= 1.0,
            "spectrum.rolloff_fraction must lie in (0, 1], got {}",
            rolloff
        );

        let taps = &self.taps;
        ensure!(
            taps.display_fft_size >= 2,
            "taps.display_fft_size must be at least 2, got {}",
            taps.display_fft_size
        );
        ensure!(
            taps.smoothing_time_constant >= 0.0 && taps.smoothing_time_constant <= 1.0,
            "taps.smoothing_time_constant must lie in [0, 1], got {}",
            taps.smoothing_time_constant
        );
        ensure!(
            taps.min_decibels.is_finite() && taps.max_decibels.is_finite() && taps.max_decibels > taps.min_decibels,
            "taps decibel range must satisfy min_decibels < max_decibels, got {}..{}",
            taps.min_decibels,
            taps.max_decibels
        );
        Ok(())
    }
}
