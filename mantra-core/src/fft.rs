//! # Fast Fourier Transform (FFT) Module
//!
//! This module turns the most recent window of a tap into the byte-scaled
//! magnitude spectrum the visualizer and the feature extractors consume.
//!
//! ## Features
//! - Planned RustFFT transform, reused across reads
//! - Blackman windowing for reduced spectral leakage
//! - Per-bin exponential smoothing against the previous read
//! - Decibel mapping of `[min_decibels, max_decibels]` onto 0..=255

use rustfft::{Fft, FftPlanner, num_complex::Complex};
use std::sync::Arc;

use crate::config::TapConfig;

/// Builds a periodic Blackman window of length `n`.
pub fn blackman_window(n: usize) -> Vec<f32> {
    const A0: f32 = 0.42;
    const A1: f32 = 0.5;
    const A2: f32 = 0.08;
    (0..n)
        .map(|i| {
            let x = 2.0 * std::f32::consts::PI * i as f32 / n as f32;
            A0 - A1 * x.cos() + A2 * (2.0 * x).cos()
        })
        .collect()
}

/// Stateful spectrum computation for one tap.
///
/// Holds the smoothed magnitudes from the previous read, so each tap must
/// own its own `ByteSpectrum`.
pub struct ByteSpectrum {
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    buffer: Vec<Complex<f32>>,
    smoothed: Vec<f32>,
    smoothing: f32,
    min_decibels: f32,
    max_decibels: f32,
}

impl ByteSpectrum {
    pub fn new(fft_size: usize, config: &TapConfig) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_size);

        let (mut min_decibels, mut max_decibels) = (config.min_decibels, config.max_decibels);
        if !(min_decibels.is_finite() && max_decibels.is_finite() && max_decibels > min_decibels) {
            let defaults = TapConfig::default();
            log::warn!(
                "[CAPTURE] Empty decibel range {}..{}, using {}..{}",
                min_decibels,
                max_decibels,
                defaults.min_decibels,
                defaults.max_decibels
            );
            min_decibels = defaults.min_decibels;
            max_decibels = defaults.max_decibels;
        }

        Self {
            fft,
            window: blackman_window(fft_size),
            buffer: vec![Complex { re: 0.0, im: 0.0 }; fft_size],
            smoothed: vec![0.0; fft_size / 2],
            smoothing: config.smoothing_time_constant.clamp(0.0, 1.0),
            min_decibels,
            max_decibels,
        }
    }

    pub fn fft_size(&self) -> usize {
        self.window.len()
    }

    /// Computes the byte-scaled magnitude spectrum of `signal`.
    ///
    /// # Arguments
    /// * `signal` - Latest window of samples; shorter input is zero-padded
    /// * `out` - Receives `fft_size / 2` values in `0.0..=255.0`
    pub fn compute(&mut self, signal: &[f32], out: &mut Vec<f32>) {
        let n = self.fft_size();

        for (i, slot) in self.buffer.iter_mut().enumerate() {
            let sample = signal.get(i).copied().unwrap_or(0.0);
            *slot = Complex { re: sample * self.window[i], im: 0.0 };
        }
        self.fft.process(&mut self.buffer);

        let scale = 255.0 / (self.max_decibels - self.min_decibels);
        out.clear();
        out.reserve(n / 2);
        for (bin, smoothed) in self.smoothed.iter_mut().enumerate() {
            let magnitude = self.buffer[bin].norm() / n as f32;
            let mut value = self.smoothing * *smoothed + (1.0 - self.smoothing) * magnitude;
            if !value.is_finite() {
                value = 0.0;
            }
            *smoothed = value;

            let decibels = 20.0 * value.log10();
            let byte = if decibels.is_finite() {
                (scale * (decibels - self.min_decibels)).clamp(0.0, 255.0).floor()
            } else {
                0.0
            };
            out.push(byte);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn unsmoothed_unclipped() -> TapConfig {
        TapConfig {
            smoothing_time_constant: 0.0,
            max_decibels: 0.0,
            ..TapConfig::default()
        }
    }

    #[test]
    fn test_window_shape() {
        let window = blackman_window(256);
        assert!(window[0].abs() < 1e-6);
        assert!((window[128] - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_silence_maps_to_zero() {
        let mut spectrum = ByteSpectrum::new(256, &TapConfig::default());
        let mut out = Vec::new();
        spectrum.compute(&vec![0.0; 256], &mut out);
        assert_eq!(out.len(), 128);
        assert!(out.iter().all(|&b| b == 0.0));
    }

    #[test]
    fn test_tone_peaks_at_its_bin() {
        let sample_rate = 44_100.0;
        let n = 2048;
        let bin = 40.0;
        let frequency = bin * sample_rate / n as f32;
        let signal: Vec<f32> = (0..n)
            .map(|i| 0.5 * (2.0 * PI * frequency * i as f32 / sample_rate).sin())
            .collect();

        let mut spectrum = ByteSpectrum::new(n, &unsmoothed_unclipped());
        let mut out = Vec::new();
        spectrum.compute(&signal, &mut out);

        let peak = out
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(peak, 40);
        assert!(out[40] > 200.0);
        assert_eq!(out[600], 0.0);
    }

    #[test]
    fn test_smoothing_ramps_towards_steady_state() {
        let n = 256;
        let signal: Vec<f32> = (0..n).map(|i| 0.5 * (2.0 * PI * 16.0 * i as f32 / n as f32).sin()).collect();
        let config = TapConfig { max_decibels: 0.0, ..TapConfig::default() };
        let mut spectrum = ByteSpectrum::new(n, &config);
        let mut first = Vec::new();
        let mut second = Vec::new();
        spectrum.compute(&signal, &mut first);
        spectrum.compute(&signal, &mut second);
        assert!(second[16] > first[16]);
    }

    #[test]
    fn test_empty_decibel_range_still_maps_a_tone() {
        let n = 256;
        let signal: Vec<f32> = (0..n).map(|i| 0.5 * (2.0 * PI * 16.0 * i as f32 / n as f32).sin()).collect();
        let config = TapConfig {
            smoothing_time_constant: 0.0,
            min_decibels: -30.0,
            max_decibels: -30.0,
            ..TapConfig::default()
        };
        let mut spectrum = ByteSpectrum::new(n, &config);
        let mut out = Vec::new();
        spectrum.compute(&signal, &mut out);
        assert!(out.iter().all(|b| b.is_finite()));
        assert!(out[16] > 0.0);
    }
}
