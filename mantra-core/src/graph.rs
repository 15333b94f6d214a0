//! # Capture Graph
//!
//! One capture graph taps one playback source. It owns the two analysis
//! taps (a 256-point one for bar display and a 2048-point-or-larger one for
//! feature extraction), the platform stream control, and the
//! suspended/running state.
//!
//! The audio thread side of a graph is the [`TapSink`], handed to the
//! capture backend when the stream is opened. Everything the sink receives
//! from the graph arrives through channels.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use crossbeam_channel::Receiver;

use crate::analyser::{Analyser, AnalyserInput, analyser};
use crate::backend::StreamControl;
use crate::config::{RelayConfig, TapConfig};
use crate::latest::{LatestReceiver, LatestSender, latest};
use crate::relay::{RawBlockRelay, RelayMessage, relay};
use crate::source::SourceId;

/// Lifecycle state of a capture graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphState {
    /// Created but not processing. Every graph starts here.
    Suspended,
    /// The platform is delivering blocks.
    Running,
}

/// Shared, lock-free view of a graph's state.
#[derive(Debug, Clone)]
pub struct GraphStateCell(Arc<AtomicU8>);

impl GraphStateCell {
    fn new() -> Self {
        Self(Arc::new(AtomicU8::new(0)))
    }

    pub fn get(&self) -> GraphState {
        match self.0.load(Ordering::Acquire) {
            0 => GraphState::Suspended,
            _ => GraphState::Running,
        }
    }

    pub fn set(&self, state: GraphState) {
        let raw = match state {
            GraphState::Suspended => 0,
            GraphState::Running => 1,
        };
        self.0.store(raw, Ordering::Release);
    }
}

/// Audio-thread end of a capture graph.
///
/// The backend calls [`TapSink::process_block`] from its real-time callback
/// with mono blocks (first channel only).
pub struct TapSink {
    state: GraphStateCell,
    display: AnalyserInput,
    analysis: AnalyserInput,
    relay: Option<RawBlockRelay>,
    relay_rx: LatestReceiver<RawBlockRelay>,
}

impl TapSink {
    pub fn state(&self) -> &GraphStateCell {
        &self.state
    }

    /// Feeds one block into the graph. Blocks arriving while the graph is
    /// suspended are dropped.
    pub fn process_block(&mut self, block: &[f32]) {
        if self.state.get() != GraphState::Running {
            return;
        }
        if let Some(relay) = self.relay_rx.take() {
            self.relay = Some(relay);
        }
        self.display.push_block(block);
        self.analysis.push_block(block);
        if let Some(relay) = self.relay.as_mut() {
            relay.process(&[block]);
        }
    }
}

/// A capture graph bound to one playback source.
pub struct CaptureGraph {
    source_id: SourceId,
    sample_rate: u32,
    state: GraphStateCell,
    display: Analyser,
    analysis: Analyser,
    control: Box<dyn StreamControl>,
    relay_tx: LatestSender<RawBlockRelay>,
}

/// Shared handle to a capture graph; clones refer to the same graph.
pub type CaptureGraphHandle = Arc<CaptureGraph>;

/// Graph half that waits for the backend to open the platform stream.
pub(crate) struct PendingGraph {
    state: GraphStateCell,
    display: Analyser,
    analysis: Analyser,
    relay_tx: LatestSender<RawBlockRelay>,
}

/// Builds the taps of a new graph, returning the audio-thread sink and the
/// graph half that is completed once the stream is open.
pub(crate) fn pending_graph(config: &TapConfig) -> (TapSink, PendingGraph) {
    let state = GraphStateCell::new();
    let (display_input, display) = analyser(config.display_fft_size, config);
    let (analysis_input, analysis) = analyser(config.effective_analysis_fft_size(), config);
    let (relay_tx, relay_rx) = latest();
    let sink = TapSink {
        state: state.clone(),
        display: display_input,
        analysis: analysis_input,
        relay: None,
        relay_rx,
    };
    (sink, PendingGraph { state, display, analysis, relay_tx })
}

impl PendingGraph {
    pub(crate) fn into_graph(
        self,
        source_id: SourceId,
        sample_rate: u32,
        control: Box<dyn StreamControl>,
    ) -> CaptureGraph {
        CaptureGraph {
            source_id,
            sample_rate,
            state: self.state,
            display: self.display,
            analysis: self.analysis,
            control,
            relay_tx: self.relay_tx,
        }
    }
}

impl CaptureGraph {
    pub fn source_id(&self) -> SourceId {
        self.source_id
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn state(&self) -> GraphState {
        self.state.get()
    }

    /// The feature-extraction tap (transform size ≥ 2048).
    pub fn analysis_tap(&self) -> &Analyser {
        &self.analysis
    }

    /// The bar-display tap (transform size 256 by default).
    pub fn display_tap(&self) -> &Analyser {
        &self.display
    }

    /// Current bar heights from the display tap, one per bin, 0..=255.
    pub fn display_bars(&self) -> Vec<f32> {
        let mut bars = Vec::with_capacity(self.display.frequency_bin_count());
        self.display.read_magnitudes(&mut bars);
        bars
    }

    /// Opens the raw-block relay for this graph.
    ///
    /// The audio thread picks the relay up with its next block. Opening a
    /// new relay replaces the previous one, whose receiver then goes quiet.
    pub fn open_relay(&self, config: &RelayConfig) -> Receiver<RelayMessage> {
        let (relay, rx) = relay(config);
        self.relay_tx.publish(relay);
        log::debug!("[REGISTRY] Raw block relay opened for {}", self.source_id);
        rx
    }

    pub(crate) fn request_resume(&self) {
        if self.state.get() == GraphState::Suspended {
            self.control.request_resume();
        }
    }

    pub(crate) fn request_suspend(&self) {
        if self.state.get() == GraphState::Running {
            self.control.request_suspend();
        }
    }
}

impl std::fmt::Debug for CaptureGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureGraph")
            .field("source_id", &self.source_id)
            .field("sample_rate", &self.sample_rate)
            .field("state", &self.state.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{Access, PlaybackSource};

    struct NoopControl;

    impl StreamControl for NoopControl {
        fn request_resume(&self) {}
        fn request_suspend(&self) {}
    }

    fn graph(config: &TapConfig) -> (TapSink, CaptureGraph) {
        let source = PlaybackSource::new("test://graph", Access::SameOrigin);
        let (sink, pending) = pending_graph(config);
        (sink, pending.into_graph(source.id(), 44_100, Box::new(NoopControl)))
    }

    #[test]
    fn test_taps_have_expected_sizes() {
        let (_sink, graph) = graph(&TapConfig::default());
        assert_eq!(graph.display_tap().fft_size(), 256);
        assert_eq!(graph.analysis_tap().fft_size(), 2048);
        assert_eq!(graph.display_bars().len(), 128);
    }

    #[test]
    fn test_suspended_graph_drops_blocks() {
        let (mut sink, graph) = graph(&TapConfig::default());
        assert_eq!(graph.state(), GraphState::Suspended);
        sink.process_block(&[0.9; 128]);

        let mut time = Vec::new();
        let mut mags = Vec::new();
        graph.analysis_tap().read_frames(&mut time, &mut mags);
        assert!(time.iter().all(|&s| s == 0.0));

        sink.state().set(GraphState::Running);
        sink.process_block(&[0.9; 128]);
        graph.analysis_tap().read_frames(&mut time, &mut mags);
        assert_eq!(time[2047], 0.9);
    }

    #[test]
    fn test_relay_is_picked_up_on_next_block() {
        let (mut sink, graph) = graph(&TapConfig::default());
        sink.state().set(GraphState::Running);
        let rx = graph.open_relay(&RelayConfig::default());
        sink.process_block(&[0.25; 128]);
        assert_eq!(rx.try_recv().unwrap(), RelayMessage::Frames { samples: vec![0.25; 128] });
    }
}
