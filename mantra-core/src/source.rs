//! # Playback Sources
//!
//! A playback source is whatever is producing the audio being analysed:
//! a media element, a device, a synthetic generator. The core only needs
//! a stable identity for it and to know whether it may be tapped.
//!
//! Sources are shared as `Arc<PlaybackSource>`. The registry keeps only a
//! `Weak` to each one, so a source's lifetime is decided by whoever plays
//! it and never by the analysis side.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_SOURCE_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque identity of a playback source. Never reused within a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(u64);

impl SourceId {
    fn next() -> Self {
        SourceId(NEXT_SOURCE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "source#{}", self.0)
    }
}

/// Whether a source's content may be tapped for analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Same origin as the host (local files and devices included).
    SameOrigin,
    /// Cross-origin, but served with a permissive sharing policy.
    CrossOriginPermissive,
    /// Cross-origin with no permissive policy. Playback works, tapping does not.
    CrossOriginRestricted,
}

impl Access {
    /// Classifies `url` against the host origin.
    ///
    /// Relative URLs and URLs without a scheme are treated as same-origin.
    /// A cross-origin URL is permissive only when the host requested shared
    /// access (`cors_enabled`).
    pub fn classify(url: &str, host_origin: &str, cors_enabled: bool) -> Self {
        match origin_of(url) {
            None => Access::SameOrigin,
            Some(origin) if Some(origin) == origin_of(host_origin) => Access::SameOrigin,
            Some(_) if cors_enabled => Access::CrossOriginPermissive,
            Some(_) => Access::CrossOriginRestricted,
        }
    }

    pub fn permits_tap(self) -> bool {
        !matches!(self, Access::CrossOriginRestricted)
    }
}

/// Returns the `scheme://host[:port]` prefix of an absolute URL.
fn origin_of(url: &str) -> Option<&str> {
    let scheme_end = url.find("://")?;
    let rest = &url[scheme_end + 3..];
    let host_len = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    if host_len == 0 {
        return None;
    }
    Some(&url[..scheme_end + 3 + host_len])
}

/// An audio source that plays independently of the analysis pipeline.
#[derive(Debug)]
pub struct PlaybackSource {
    id: SourceId,
    url: String,
    access: Access,
}

impl PlaybackSource {
    pub fn new(url: impl Into<String>, access: Access) -> Arc<Self> {
        Arc::new(Self {
            id: SourceId::next(),
            url: url.into(),
            access,
        })
    }

    pub fn id(&self) -> SourceId {
        self.id
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn access(&self) -> Access {
        self.access
    }
}
