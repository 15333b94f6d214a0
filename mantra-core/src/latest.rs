//! Latest-value channel.
//!
//! A single-slot crossbeam channel where publishing replaces whatever the
//! consumer has not taken yet. The producer never blocks and the consumer
//! only ever sees the newest value, so intermediate values may be skipped.
//! A skipped value is handed back to the producer instead of being dropped,
//! so an audio-thread producer can reuse its allocation.

use crossbeam_channel::{Receiver, Sender};

/// Creates a connected latest-value sender/receiver pair.
pub fn latest<T>() -> (LatestSender<T>, LatestReceiver<T>) {
    let (tx, rx) = crossbeam_channel::bounded(1);
    (
        LatestSender { tx, evict: rx.clone() },
        LatestReceiver { rx },
    )
}

pub struct LatestSender<T> {
    tx: Sender<T>,
    // Producer-side handle on the slot, used to drop a value nobody took.
    evict: Receiver<T>,
}

impl<T> LatestSender<T> {
    /// Publishes `value` and returns the unconsumed older one, if any.
    pub fn publish(&self, value: T) -> Option<T> {
        let evicted = self.evict.try_recv().ok();
        // Single producer: the slot is empty after the eviction.
        let _ = self.tx.try_send(value);
        evicted
    }
}

pub struct LatestReceiver<T> {
    rx: Receiver<T>,
}

impl<T> LatestReceiver<T> {
    /// Takes the newest published value, if one arrived since the last take.
    pub fn take(&self) -> Option<T> {
        self.rx.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_newest_value_wins() {
        let (tx, rx) = latest();
        tx.publish(1);
        tx.publish(2);
        tx.publish(3);
        assert_eq!(rx.take(), Some(3));
        assert_eq!(rx.take(), None);
    }

    #[test]
    fn test_skipped_value_returns_to_producer() {
        let (tx, rx) = latest();
        assert_eq!(tx.publish(vec![1.0f32]), None);
        assert_eq!(tx.publish(vec![2.0]), Some(vec![1.0]));
        assert_eq!(rx.take(), Some(vec![2.0]));
        assert_eq!(tx.publish(vec![3.0]), None);
    }

    #[test]
    fn test_publish_after_receiver_dropped_is_silent() {
        let (tx, rx) = latest::<Vec<f32>>();
        drop(rx);
        tx.publish(vec![0.0; 4]);
    }
}
