//! # Raw Block Relay
//!
//! Forwards raw first-channel samples off the audio thread, one message per
//! block, with a periodic heartbeat so the consumer can tell a stalled feed
//! from a quiet one. Messages serialize as
//! `{"kind":"frames","samples":[...]}` and
//! `{"kind":"heartbeat","totalFrames":n}`.

use crossbeam_channel::{Receiver, Sender};
use serde::Serialize;

use crate::config::RelayConfig;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RelayMessage {
    Frames { samples: Vec<f32> },
    Heartbeat {
        /// Samples seen on the first channel since the relay started.
        #[serde(rename = "totalFrames")]
        total_frames: u64,
    },
}

/// Audio-thread end of the relay.
pub struct RawBlockRelay {
    tx: Sender<RelayMessage>,
    heartbeat_every: u64,
    blocks: u64,
    total_frames: u64,
}

/// Creates a relay and the receiving end of its message queue.
///
/// The queue is bounded; when the consumer falls behind, new messages are
/// dropped instead of blocking the audio thread.
pub fn relay(config: &RelayConfig) -> (RawBlockRelay, Receiver<RelayMessage>) {
    let (tx, rx) = crossbeam_channel::bounded(config.queue_capacity.max(1));
    let relay = RawBlockRelay {
        tx,
        heartbeat_every: config.heartbeat_every.max(1),
        blocks: 0,
        total_frames: 0,
    };
    (relay, rx)
}

impl RawBlockRelay {
    /// Processes one block. `channels` holds one slice per input channel.
    ///
    /// Always returns `true` ("keep processing"): a full queue or a gone
    /// consumer must not stop the audio thread.
    pub fn process(&mut self, channels: &[&[f32]]) -> bool {
        let Some(first) = channels.first() else {
            return true;
        };
        if first.is_empty() {
            return true;
        }

        let _ = self.tx.try_send(RelayMessage::Frames { samples: first.to_vec() });
        self.blocks += 1;
        self.total_frames += first.len() as u64;

        if self.blocks % self.heartbeat_every == 0 {
            let _ = self.tx.try_send(RelayMessage::Heartbeat { total_frames: self.total_frames });
        }
        true
    }
}
