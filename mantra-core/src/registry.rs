//! # Audio Tap Registry
//!
//! Attaches exactly one capture graph to each playback source and hands the
//! same graph back on every later request, so UI remounts can call
//! [`AudioTapRegistry::attach`] freely.
//!
//! ## Features
//! - Idempotent attach keyed by [`SourceId`]
//! - Non-owning association: entries hold a `Weak` to their source
//! - Cross-origin sources without a permissive policy are refused per source
//! - Play/pause events drive resume/suspend; failed resumes are retried on
//!   the next play event
//!
//! The registry never tears a graph down. A graph lives as long as someone
//! holds its handle; dropping the entry (on [`AudioTapRegistry::release`]
//! or [`AudioTapRegistry::prune`]) only forgets it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use crate::backend::CaptureBackend;
use crate::config::TapConfig;
use crate::error::AttachFailure;
use crate::graph::{CaptureGraphHandle, pending_graph};
use crate::source::{PlaybackSource, SourceId};

struct Entry {
    source: Weak<PlaybackSource>,
    graph: CaptureGraphHandle,
}

impl Entry {
    fn is_live(&self) -> bool {
        self.source.strong_count() > 0
    }
}

pub struct AudioTapRegistry {
    backend: Arc<dyn CaptureBackend>,
    taps: TapConfig,
    entries: Mutex<HashMap<SourceId, Entry>>,
}

impl AudioTapRegistry {
    pub fn new(backend: Arc<dyn CaptureBackend>, taps: TapConfig) -> Self {
        Self {
            backend,
            taps,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the capture graph for `source`, creating it on first use.
    ///
    /// # Arguments
    /// * `source` - The playback source to tap
    /// * `sample_rate_hint` - Preferred sample rate; the backend may choose another
    ///
    /// # Returns
    /// * `Ok(handle)` - The source's graph; every call for the same source
    ///   returns the same graph
    /// * `Err(AttachFailure::Security)` - The source may not be tapped
    /// * `Err(AttachFailure::Backend)` - The platform refused to open a stream
    ///
    /// A failure concerns `source` only; playback is unaffected and other
    /// sources attach normally.
    pub fn attach(
        &self,
        source: &Arc<PlaybackSource>,
        sample_rate_hint: u32,
    ) -> Result<CaptureGraphHandle, AttachFailure> {
        // Held across the backend open: two concurrent first attaches for the
        // same source must not both reach the platform.
        let mut entries = self.lock();

        if let Some(entry) = entries.get(&source.id()) {
            return Ok(Arc::clone(&entry.graph));
        }

        if !source.access().permits_tap() {
            log::warn!(
                "[REGISTRY] {} ({}) is cross-origin without a permissive policy; analysis disabled",
                source.id(),
                source.url()
            );
            return Err(AttachFailure::Security {
                url: source.url().to_string(),
            });
        }

        entries.retain(|_, entry| entry.is_live());

        let (sink, pending) = pending_graph(&self.taps);
        let opened = self
            .backend
            .open(source, sample_rate_hint, sink)
            .inspect_err(|e| log::warn!("[REGISTRY] {} could not be attached: {}", source.id(), e))?;

        let graph = Arc::new(pending.into_graph(source.id(), opened.sample_rate, opened.control));
        entries.insert(
            source.id(),
            Entry {
                source: Arc::downgrade(source),
                graph: Arc::clone(&graph),
            },
        );
        log::info!(
            "[REGISTRY] Attached {} at {} Hz (analysis window {})",
            source.id(),
            opened.sample_rate,
            graph.analysis_tap().fft_size()
        );
        Ok(graph)
    }

    /// The graph attached to `source`, if any.
    pub fn get(&self, source: &PlaybackSource) -> Option<CaptureGraphHandle> {
        self.lock().get(&source.id()).map(|entry| Arc::clone(&entry.graph))
    }

    /// Play event from `source`: asks its graph to resume.
    ///
    /// The request is asynchronous. If the platform rejects it the graph
    /// stays suspended and the next play event tries again.
    pub fn on_play(&self, source: &PlaybackSource) {
        match self.get(source) {
            Some(graph) => graph.request_resume(),
            None => log::debug!("[REGISTRY] Play event for unattached {}", source.id()),
        }
    }

    /// Pause event from `source`: asks its graph to suspend.
    pub fn on_pause(&self, source: &PlaybackSource) {
        if let Some(graph) = self.get(source) {
            graph.request_suspend();
        }
    }

    /// Forgets the entry for `source`. Outstanding handles keep working.
    pub fn release(&self, source: &PlaybackSource) -> Option<CaptureGraphHandle> {
        let released = self.lock().remove(&source.id()).map(|entry| entry.graph);
        if released.is_some() {
            log::debug!("[REGISTRY] Released {}", source.id());
        }
        released
    }

    /// Drops entries whose source is gone. Returns how many were dropped.
    pub fn prune(&self) -> usize {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live());
        let pruned = before - entries.len();
        if pruned > 0 {
            log::debug!("[REGISTRY] Pruned {} unreachable source(s)", pruned);
        }
        pruned
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SourceId, Entry>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ManualBackend;
    use crate::graph::GraphState;
    use crate::source::Access;

    fn registry() -> (ManualBackend, AudioTapRegistry) {
        let backend = ManualBackend::new();
        let registry = AudioTapRegistry::new(Arc::new(backend.clone()), TapConfig::default());
        (backend, registry)
    }

    #[test]
    fn test_attach_is_idempotent() {
        let (backend, registry) = registry();
        let source = PlaybackSource::new("/audio/H001.mp3", Access::SameOrigin);

        let first = registry.attach(&source, 44_100).unwrap();
        let second = registry.attach(&source, 48_000).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.sample_rate(), 44_100);
        assert_eq!(backend.open_count(), 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_security_failure_is_source_local() {
        let (backend, registry) = registry();
        let restricted = PlaybackSource::new("https://cdn.example.net/H002.mp3", Access::CrossOriginRestricted);
        let allowed = PlaybackSource::new("https://cdn.example.net/H003.mp3", Access::CrossOriginPermissive);

        let failure = registry.attach(&restricted, 44_100).unwrap_err();
        assert_eq!(
            failure,
            AttachFailure::Security {
                url: "https://cdn.example.net/H002.mp3".to_string()
            }
        );
        assert_eq!(backend.open_count(), 0);

        assert!(registry.attach(&allowed, 44_100).is_ok());
        assert!(registry.get(&restricted).is_none());
    }

    #[test]
    fn test_backend_failure_leaves_no_entry() {
        let (backend, registry) = registry();
        let source = PlaybackSource::new("/audio/H004.mp3", Access::SameOrigin);

        backend.set_refuse_open(Some("device busy".to_string()));
        assert!(matches!(registry.attach(&source, 44_100), Err(AttachFailure::Backend(_))));
        assert!(registry.is_empty());

        backend.set_refuse_open(None);
        assert!(registry.attach(&source, 44_100).is_ok());
    }

    #[test]
    fn test_graph_starts_suspended_and_follows_play_events() {
        let (_backend, registry) = registry();
        let source = PlaybackSource::new("/audio/H005.mp3", Access::SameOrigin);
        let graph = registry.attach(&source, 44_100).unwrap();
        assert_eq!(graph.state(), GraphState::Suspended);

        registry.on_play(&source);
        assert_eq!(graph.state(), GraphState::Running);

        registry.on_pause(&source);
        assert_eq!(graph.state(), GraphState::Suspended);
    }

    #[test]
    fn test_rejected_resume_is_retried_on_next_play() {
        let (backend, registry) = registry();
        let source = PlaybackSource::new("/audio/H006.mp3", Access::SameOrigin);
        let graph = registry.attach(&source, 44_100).unwrap();

        backend.set_reject_resume(true);
        registry.on_play(&source);
        assert_eq!(graph.state(), GraphState::Suspended);

        backend.set_reject_resume(false);
        registry.on_play(&source);
        assert_eq!(graph.state(), GraphState::Running);
    }

    #[test]
    fn test_registry_does_not_keep_sources_alive() {
        let (_backend, registry) = registry();
        let source = PlaybackSource::new("/audio/H007.mp3", Access::SameOrigin);
        let graph = registry.attach(&source, 44_100).unwrap();

        let weak = Arc::downgrade(&source);
        drop(source);
        assert!(weak.upgrade().is_none());

        assert_eq!(registry.prune(), 1);
        assert!(registry.is_empty());
        // The handle outlives the entry.
        assert_eq!(graph.sample_rate(), 44_100);
    }

    #[test]
    fn test_release_forgets_entry() {
        let (backend, registry) = registry();
        let source = PlaybackSource::new("/audio/H008.mp3", Access::SameOrigin);
        let first = registry.attach(&source, 44_100).unwrap();

        let released = registry.release(&source).unwrap();
        assert!(Arc::ptr_eq(&first, &released));
        assert!(registry.release(&source).is_none());

        let second = registry.attach(&source, 44_100).unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(backend.open_count(), 2);
    }
}
