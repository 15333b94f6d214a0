//! # Error Types
//!
//! Failures the capture side can surface. None of them is fatal to the
//! host: an attach failure disables analysis for one source, and a resume
//! failure is swallowed until the next play event.

use thiserror::Error;

/// Why a capture graph could not be attached to a playback source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttachFailure {
    /// The source is cross-origin and does not carry a permissive policy.
    #[error("source {url} is cross-origin without a permissive policy; tap denied")]
    Security { url: String },
    /// The platform refused to open a stream for the source.
    #[error("capture backend could not open the source: {0}")]
    Backend(String),
}

/// A rejected or failed resume request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("resume rejected: {0}")]
pub struct ResumeFailure(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_security_failure_names_the_source() {
        let failure = AttachFailure::Security {
            url: "https://cdn.example.net/H001.mp3".to_string(),
        };
        assert!(failure.to_string().contains("https://cdn.example.net/H001.mp3"));
    }
}
