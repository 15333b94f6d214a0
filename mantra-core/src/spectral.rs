//! # Spectral Shape
//!
//! Centroid, rolloff and flatness of a magnitude frame. Bins are assumed
//! to span 0 Hz to Nyquist evenly, so bin `i` sits at
//! `i * (sample_rate / 2) / bins`.

use crate::config::SpectrumConfig;

/// Power floor added to every bin before taking logs.
const POWER_EPSILON: f32 = 1e-9;

/// Spectral shape of one magnitude frame. All fields are `None` for an empty frame.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SpectralFeatures {
    pub centroid_hz: Option<f32>,
    pub rolloff_hz: Option<f32>,
    pub flatness: Option<f32>,
}

#[derive(Debug, Clone)]
pub struct SpectralFeatureExtractor {
    rolloff_fraction: f32,
}

impl SpectralFeatureExtractor {
    pub fn new(config: &SpectrumConfig) -> Self {
        Self { rolloff_fraction: config.rolloff_fraction }
    }

    /// Extracts centroid, rolloff and flatness from `frame`.
    ///
    /// A frame whose magnitudes are all zero reports centroid 0, rolloff 0
    /// and flatness 0: silence is treated as neither tonal nor noisy.
    pub fn extract(&self, frame: &[f32], sample_rate: u32) -> SpectralFeatures {
        let n = frame.len();
        if n == 0 {
            return SpectralFeatures::default();
        }
        let bin_hz = (sample_rate as f32 / 2.0) / n as f32;

        let mut total = 0.0f64;
        let mut weighted = 0.0f64;
        let mut log_power_sum = 0.0f64;
        let mut power_sum = 0.0f64;
        for (i, &m) in frame.iter().enumerate() {
            let m = m as f64;
            total += m;
            weighted += m * i as f64;
            let power = m * m + POWER_EPSILON as f64;
            log_power_sum += power.ln();
            power_sum += power;
        }

        let centroid_bin = if total > 0.0 { weighted / total } else { 0.0 };

        // --- Rolloff: first bin where the running sum reaches the target ---
        let target = self.rolloff_fraction as f64 * total;
        let mut accumulated = 0.0f64;
        let mut rolloff_bin = 0;
        for (i, &m) in frame.iter().enumerate() {
            accumulated += m as f64;
            if accumulated >= target {
                rolloff_bin = i;
                break;
            }
        }

        let flatness = if total > 0.0 {
            let geometric = (log_power_sum / n as f64).exp();
            let arithmetic = power_sum / n as f64;
            (geometric / arithmetic).clamp(0.0, 1.0)
        } else {
            0.0
        };

        SpectralFeatures {
            centroid_hz: Some(centroid_bin as f32 * bin_hz),
            rolloff_hz: Some(rolloff_bin as f32 * bin_hz),
            flatness: Some(flatness as f32),
        }
    }
}

impl Default for SpectralFeatureExtractor {
    fn default() -> Self {
        Self::new(&SpectrumConfig::default())
    }
}
