//! # Pitch Detection Module
//!
//! This module estimates the fundamental frequency of a time-domain frame
//! with the YIN algorithm, restricted to the vocal/instrumental range the
//! visualizer cares about (50 Hz to 1 kHz by default).
//!
//! ## Features
//! - Squared-difference and cumulative-mean-normalized difference functions
//! - Absolute threshold with descent to the local minimum
//! - Parabolic interpolation for sub-sample accuracy
//! - Scratch buffers reused between frames

use crate::config::PitchConfig;

/// YIN pitch detector with reusable scratch space.
#[derive(Debug, Clone)]
pub struct PitchDetector {
    threshold: f32,
    min_hz: f32,
    max_hz: f32,
    cmnd: Vec<f32>,
}

impl PitchDetector {
    pub fn new(config: &PitchConfig) -> Self {
        Self {
            threshold: config.yin_threshold,
            min_hz: config.min_hz,
            max_hz: config.max_hz,
            cmnd: Vec::new(),
        }
    }

    /// Estimates the fundamental frequency of `frame`.
    ///
    /// Lags are searched between `sample_rate / max_hz` and
    /// `sample_rate / min_hz`, so candidates outside the configured range
    /// are never considered.
    ///
    /// # Arguments
    /// * `frame` - Time-domain samples, normalized to [-1, 1]
    /// * `sample_rate` - Sample rate in Hz
    ///
    /// # Returns
    /// * `Some(frequency)` - Detected fundamental in Hz
    /// * `None` - Silence, noise, or no dip below the threshold
    pub fn estimate(&mut self, frame: &[f32], sample_rate: u32) -> Option<f32> {
        let sr = sample_rate as f32;
        let min_lag = (sr / self.max_hz).floor() as usize;
        // Lags past the frame carry no difference terms.
        let max_lag = ((sr / self.min_hz).floor() as usize).min(frame.len());
        if max_lag < 2 || frame.is_empty() {
            return None;
        }

        // A constant frame has no period.
        if self.fill_cmnd(frame, max_lag) == 0.0 {
            return None;
        }
        let cmnd = &self.cmnd;

        // --- Absolute threshold, then walk down to the bottom of the dip ---
        let mut tau = min_lag.max(1);
        let mut found = None;
        while tau < max_lag {
            if cmnd[tau] < self.threshold {
                while tau + 1 < max_lag && cmnd[tau + 1] < cmnd[tau] {
                    tau += 1;
                }
                found = Some(tau);
                break;
            }
            tau += 1;
        }
        let tau = found?;

        // --- Parabolic interpolation over the neighbouring lags ---
        let y1 = if tau >= 1 { cmnd[tau - 1] } else { cmnd[tau] };
        let y2 = cmnd[tau];
        let y3 = cmnd.get(tau + 1).copied().unwrap_or(y2);
        let denominator = y1 - 2.0 * y2 + y3;
        let refined_tau = if denominator != 0.0 {
            tau as f32 + 0.5 * (y1 - y3) / denominator
        } else {
            tau as f32
        };

        let frequency = sr / refined_tau;
        if frequency.is_finite() && (self.min_hz..=self.max_hz).contains(&frequency) {
            Some(frequency)
        } else {
            None
        }
    }

    /// Computes the cumulative-mean-normalized difference for lags `0..max_lag`
    /// and returns the sum of the raw differences.
    fn fill_cmnd(&mut self, frame: &[f32], max_lag: usize) -> f32 {
        let n = frame.len();
        self.cmnd.clear();
        self.cmnd.resize(max_lag, 0.0);

        // --- Squared difference function ---
        for tau in 1..max_lag {
            let mut sum = 0.0;
            for i in 0..n.saturating_sub(tau) {
                let delta = frame[i] - frame[i + tau];
                sum += delta * delta;
            }
            self.cmnd[tau] = sum;
        }

        // --- Cumulative mean normalization ---
        self.cmnd[0] = 1.0;
        let mut running_sum = 0.0;
        for tau in 1..max_lag {
            running_sum += self.cmnd[tau];
            let divisor = if running_sum != 0.0 { running_sum } else { 1.0 };
            self.cmnd[tau] = self.cmnd[tau] * tau as f32 / divisor;
        }
        running_sum
    }
}

impl Default for PitchDetector {
    fn default() -> Self {
        Self::new(&PitchConfig::default())
    }
}
