//! # Capture Backends
//!
//! A capture backend is the platform layer under a capture graph: it opens
//! a stream for a playback source, hands every block to the graph's
//! [`TapSink`] from its real-time thread, and services resume/suspend
//! requests.
//!
//! Two backends ship with the crate:
//! - [`crate::audio::CpalBackend`] captures from an audio device via CPAL.
//! - [`ManualBackend`] has no thread of its own; whoever holds the
//!   [`ManualFeed`] pushes blocks. Tests and embedders with their own
//!   audio callback use it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::{AttachFailure, ResumeFailure};
use crate::graph::{GraphState, GraphStateCell, TapSink};
use crate::source::{PlaybackSource, SourceId};

/// Platform stream control kept by the capture graph.
///
/// Both requests return immediately. Their outcome shows up in the graph
/// state; a failed resume leaves the graph suspended.
pub trait StreamControl: Send + Sync {
    fn request_resume(&self);
    fn request_suspend(&self);
}

/// A stream the backend opened for one source.
pub struct OpenedStream {
    /// Sample rate the platform actually runs at.
    pub sample_rate: u32,
    pub control: Box<dyn StreamControl>,
}

pub trait CaptureBackend: Send + Sync {
    /// Opens a stream for `source` that feeds `sink`. The stream must not
    /// deliver blocks until a resume request succeeds.
    fn open(
        &self,
        source: &PlaybackSource,
        sample_rate_hint: u32,
        sink: TapSink,
    ) -> Result<OpenedStream, AttachFailure>;
}

/// Logs a failed resume and leaves the graph suspended.
pub(crate) fn swallow_resume_failure(source_id: SourceId, failure: ResumeFailure) {
    log::warn!("[CAPTURE] {} stays suspended: {}", source_id, failure);
}

#[derive(Default)]
struct ManualShared {
    feeds: Mutex<HashMap<SourceId, TapSink>>,
    open_count: AtomicUsize,
    reject_resume: AtomicBool,
    refuse_open: Mutex<Option<String>>,
}

/// Backend driven by hand: blocks are pushed through a [`ManualFeed`].
#[derive(Clone, Default)]
pub struct ManualBackend {
    shared: Arc<ManualShared>,
}

impl ManualBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes the feed for an opened source. Returns `None` if the source
    /// was never opened or its feed was already taken.
    pub fn take_feed(&self, source_id: SourceId) -> Option<ManualFeed> {
        let mut feeds = self.shared.feeds.lock().unwrap_or_else(|e| e.into_inner());
        feeds.remove(&source_id).map(|sink| ManualFeed { sink })
    }

    /// Number of streams opened so far.
    pub fn open_count(&self) -> usize {
        self.shared.open_count.load(Ordering::Acquire)
    }

    /// Makes subsequent resume requests fail (or succeed again).
    pub fn set_reject_resume(&self, reject: bool) {
        self.shared.reject_resume.store(reject, Ordering::Release);
    }

    /// Makes subsequent opens fail with `reason`, or succeed again with `None`.
    pub fn set_refuse_open(&self, reason: Option<String>) {
        *self.shared.refuse_open.lock().unwrap_or_else(|e| e.into_inner()) = reason;
    }
}

impl CaptureBackend for ManualBackend {
    fn open(
        &self,
        source: &PlaybackSource,
        sample_rate_hint: u32,
        sink: TapSink,
    ) -> Result<OpenedStream, AttachFailure> {
        if let Some(reason) = self.shared.refuse_open.lock().unwrap_or_else(|e| e.into_inner()).clone() {
            return Err(AttachFailure::Backend(reason));
        }

        let control = ManualControl {
            source_id: source.id(),
            state: sink.state().clone(),
            shared: Arc::clone(&self.shared),
        };
        self.shared
            .feeds
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(source.id(), sink);
        self.shared.open_count.fetch_add(1, Ordering::AcqRel);

        Ok(OpenedStream {
            sample_rate: sample_rate_hint,
            control: Box::new(control),
        })
    }
}

struct ManualControl {
    source_id: SourceId,
    state: GraphStateCell,
    shared: Arc<ManualShared>,
}

impl StreamControl for ManualControl {
    fn request_resume(&self) {
        if self.shared.reject_resume.load(Ordering::Acquire) {
            swallow_resume_failure(
                self.source_id,
                ResumeFailure("resume not allowed without a user gesture".to_string()),
            );
            return;
        }
        self.state.set(GraphState::Running);
    }

    fn request_suspend(&self) {
        self.state.set(GraphState::Suspended);
    }
}

/// The audio-thread end of a [`ManualBackend`] stream.
pub struct ManualFeed {
    sink: TapSink,
}

impl ManualFeed {
    /// Pushes one mono block into the graph.
    pub fn push(&mut self, block: &[f32]) {
        self.sink.process_block(block);
    }

    /// Pushes `samples` in consecutive blocks of `block_size`.
    pub fn push_blocks(&mut self, samples: &[f32], block_size: usize) {
        for block in samples.chunks(block_size.max(1)) {
            self.sink.process_block(block);
        }
    }
}
