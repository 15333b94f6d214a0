//! # Analysis Taps
//!
//! An analysis tap keeps the last `fft_size` samples that flowed through a
//! capture graph. It is split in two halves:
//!
//! - [`AnalyserInput`] lives on the audio thread. It appends every block to
//!   a ring and publishes the newest full window through a latest-value
//!   channel. It never blocks and never logs.
//! - [`Analyser`] lives with the graph. Readers pull the newest window (or
//!   keep the previous one when nothing new arrived) and compute the
//!   magnitude spectrum from that same window.
//!
//! Window buffers circulate between the halves: the reader returns the
//! window it replaces and the input keeps any window the reader skipped.
//! Once a few buffers exist the audio thread neither allocates nor frees.

use crossbeam_channel::{Receiver, Sender};
use std::sync::{Mutex, MutexGuard};

use crate::config::TapConfig;
use crate::fft::ByteSpectrum;
use crate::latest::{LatestReceiver, LatestSender, latest};

/// Creates the two halves of a tap with a transform of `fft_size` points.
pub fn analyser(fft_size: usize, config: &TapConfig) -> (AnalyserInput, Analyser) {
    let (tx, rx) = latest();
    let (recycle_tx, recycle_rx) = crossbeam_channel::bounded(RECYCLED_WINDOWS);
    let input = AnalyserInput {
        ring: vec![0.0; fft_size],
        write_pos: 0,
        tx,
        spare: None,
        recycled: recycle_rx,
        allocations: 0,
    };
    let reader = Analyser {
        fft_size,
        rx,
        recycle: recycle_tx,
        state: Mutex::new(ReaderState {
            window: vec![0.0; fft_size],
            spectrum: ByteSpectrum::new(fft_size, config),
        }),
    };
    (input, reader)
}

/// Windows the reader may hand back before it starts dropping them itself.
const RECYCLED_WINDOWS: usize = 2;

/// Audio-thread half of a tap.
pub struct AnalyserInput {
    ring: Vec<f32>,
    write_pos: usize,
    tx: LatestSender<Vec<f32>>,
    // Last window the reader never took.
    spare: Option<Vec<f32>>,
    recycled: Receiver<Vec<f32>>,
    allocations: usize,
}

impl AnalyserInput {
    /// Appends `block` and publishes the resulting window, oldest sample first.
    pub fn push_block(&mut self, block: &[f32]) {
        let n = self.ring.len();
        if n == 0 || block.is_empty() {
            return;
        }
        for &sample in block {
            self.ring[self.write_pos] = sample;
            self.write_pos = (self.write_pos + 1) % n;
        }
        let mut window = self.take_buffer();
        window.clear();
        window.extend_from_slice(&self.ring[self.write_pos..]);
        window.extend_from_slice(&self.ring[..self.write_pos]);
        self.spare = self.tx.publish(window);
    }

    /// Number of window buffers this input has had to allocate.
    pub fn allocations(&self) -> usize {
        self.allocations
    }

    fn take_buffer(&mut self) -> Vec<f32> {
        if let Some(window) = self.spare.take() {
            return window;
        }
        if let Ok(window) = self.recycled.try_recv() {
            return window;
        }
        self.allocations += 1;
        Vec::with_capacity(self.ring.len())
    }
}

struct ReaderState {
    window: Vec<f32>,
    spectrum: ByteSpectrum,
}

impl ReaderState {
    fn refresh(&mut self, rx: &LatestReceiver<Vec<f32>>, recycle: &Sender<Vec<f32>>) {
        if let Some(window) = rx.take() {
            let previous = std::mem::replace(&mut self.window, window);
            // A full return queue drops the buffer here, off the audio thread.
            let _ = recycle.try_send(previous);
        }
    }
}

/// Reader half of a tap.
///
/// Reads take `&self`; the graph is shared between remounts but is read by
/// at most one consumer per tick, so the internal lock is never contended
/// in practice.
pub struct Analyser {
    fft_size: usize,
    rx: LatestReceiver<Vec<f32>>,
    recycle: Sender<Vec<f32>>,
    state: Mutex<ReaderState>,
}

impl Analyser {
    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Number of magnitude bins produced per read.
    pub fn frequency_bin_count(&self) -> usize {
        self.fft_size / 2
    }

    /// Reads a time frame and the magnitude frame computed from that same
    /// window, so both describe the same audio.
    pub fn read_frames(&self, time: &mut Vec<f32>, magnitudes: &mut Vec<f32>) {
        let mut state = self.lock();
        state.refresh(&self.rx, &self.recycle);
        let ReaderState { window, spectrum } = &mut *state;
        time.clear();
        time.extend_from_slice(window);
        spectrum.compute(window, magnitudes);
    }

    /// Reads only the magnitude frame (0..=255 per bin).
    pub fn read_magnitudes(&self, magnitudes: &mut Vec<f32>) {
        let mut state = self.lock();
        state.refresh(&self.rx, &self.recycle);
        let ReaderState { window, spectrum } = &mut *state;
        spectrum.compute(window, magnitudes);
    }

    fn lock(&self) -> MutexGuard<'_, ReaderState> {
        // A panic mid-read leaves nothing half-written that matters.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_is_chronological() {
        let (mut input, reader) = analyser(8, &TapConfig::default());
        input.push_block(&[1.0, 2.0, 3.0]);
        input.push_block(&[4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0]);

        let mut time = Vec::new();
        let mut mags = Vec::new();
        reader.read_frames(&mut time, &mut mags);
        assert_eq!(time, vec![3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0]);
        assert_eq!(mags.len(), 4);
    }

    #[test]
    fn test_reader_repeats_last_window_without_new_audio() {
        let (mut input, reader) = analyser(4, &TapConfig::default());
        input.push_block(&[0.5, -0.5, 0.5, -0.5]);

        let mut first = Vec::new();
        let mut second = Vec::new();
        let mut mags = Vec::new();
        reader.read_frames(&mut first, &mut mags);
        reader.read_frames(&mut second, &mut mags);
        assert_eq!(first, second);
    }

    #[test]
    fn test_unfed_tap_reads_silence() {
        let (_input, reader) = analyser(256, &TapConfig::default());
        let mut mags = Vec::new();
        reader.read_magnitudes(&mut mags);
        assert_eq!(mags.len(), reader.frequency_bin_count());
        assert!(mags.iter().all(|&m| m == 0.0));
    }

    #[test]
    fn test_steady_state_reuses_window_buffers() {
        let (mut input, reader) = analyser(64, &TapConfig::default());
        let block = [0.25f32; 16];
        let mut time = Vec::new();
        let mut mags = Vec::new();

        for round in 0..200 {
            input.push_block(&block);
            // Mix ticks that keep up with ticks that miss several blocks.
            if round % 3 == 0 {
                reader.read_frames(&mut time, &mut mags);
            }
            if round % 7 == 0 {
                input.push_block(&block);
                input.push_block(&block);
            }
        }
        reader.read_frames(&mut time, &mut mags);

        assert_eq!(time.len(), 64);
        assert!(input.allocations() <= 3, "allocated {} windows", input.allocations());
    }

    #[test]
    fn test_recycled_buffer_carries_no_stale_samples() {
        let (mut input, reader) = analyser(4, &TapConfig::default());
        let mut time = Vec::new();
        let mut mags = Vec::new();

        input.push_block(&[1.0, 1.0, 1.0, 1.0]);
        reader.read_frames(&mut time, &mut mags);
        input.push_block(&[2.0, 2.0]);
        reader.read_frames(&mut time, &mut mags);
        input.push_block(&[3.0]);
        reader.read_frames(&mut time, &mut mags);

        assert_eq!(time, vec![1.0, 2.0, 2.0, 3.0]);
    }
}
