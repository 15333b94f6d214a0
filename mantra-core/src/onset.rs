//! # Onset Detection
//!
//! Half-wave rectified spectral flux between consecutive magnitude frames.
//! The detector keeps exactly one frame of history.

use crate::config::OnsetConfig;

#[derive(Debug, Clone)]
pub struct OnsetDetector {
    threshold: f32,
    previous: Vec<f32>,
    last_flux: f32,
}

impl OnsetDetector {
    pub fn new(config: &OnsetConfig) -> Self {
        Self {
            threshold: config.flux_threshold,
            previous: Vec::new(),
            last_flux: 0.0,
        }
    }

    /// Returns `true` when the positive energy change since the previous
    /// frame exceeds the threshold.
    ///
    /// The first call compares against silence. Bins missing from the
    /// stored frame (e.g. after the tap size changed) count as zero.
    /// `current` always replaces the stored frame, onset or not.
    pub fn detect(&mut self, current: &[f32]) -> bool {
        let flux: f32 = current
            .iter()
            .enumerate()
            .map(|(i, &m)| (m - self.previous.get(i).copied().unwrap_or(0.0)).max(0.0))
            .sum();

        self.previous.clear();
        self.previous.extend_from_slice(current);
        self.last_flux = flux;

        flux > self.threshold
    }

    /// Spectral flux computed by the most recent `detect` call.
    pub fn last_flux(&self) -> f32 {
        self.last_flux
    }
}

impl Default for OnsetDetector {
    fn default() -> Self {
        Self::new(&OnsetConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(level: f32) -> Vec<f32> {
        vec![level; 1024]
    }

    #[test]
    fn test_attack_after_silence_fires_once() {
        let mut detector = OnsetDetector::default();
        for _ in 0..5 {
            assert!(!detector.detect(&frame(0.5)));
        }
        // 1024 bins rising by ~40 gives a flux around 40_000.
        assert!(detector.detect(&frame(40.0)));
        // Same frame again: zero flux.
        assert!(!detector.detect(&frame(40.0)));
        assert_eq!(detector.last_flux(), 0.0);
    }

    #[test]
    fn test_first_call_compares_against_silence() {
        let mut detector = OnsetDetector::default();
        assert!(detector.detect(&frame(10.0)));
        assert_eq!(detector.last_flux(), 10_240.0);
    }

    #[test]
    fn test_decay_is_not_an_onset() {
        let mut detector = OnsetDetector::default();
        detector.detect(&frame(200.0));
        assert!(!detector.detect(&frame(20.0)));
        assert_eq!(detector.last_flux(), 0.0);
    }

    #[test]
    fn test_small_fluctuations_stay_below_threshold() {
        let mut detector = OnsetDetector::default();
        detector.detect(&frame(100.0));
        for step in 0..20 {
            let level = if step % 2 == 0 { 101.0 } else { 100.0 };
            assert!(!detector.detect(&frame(level)));
        }
    }

    #[test]
    fn test_history_is_replaced_without_onset() {
        let config = OnsetConfig { flux_threshold: 1_000_000.0 };
        let mut detector = OnsetDetector::new(&config);
        assert!(!detector.detect(&frame(50.0)));
        detector.detect(&frame(60.0));
        assert_eq!(detector.last_flux(), 10.0 * 1024.0);
    }
}
