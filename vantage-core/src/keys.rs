//! Locally observed key state.
//!
//! The OS hook never touches a shared set. It only pushes
//! [`KeyTransition`]s into a channel; the send loop owns the
//! [`PressedKeys`] set and folds pending transitions into it at the start
//! of every cycle, so the snapshot it serializes can never be torn.

use std::collections::BTreeSet;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};

use tracing::warn;

use crate::protocol::{KEY_CAPACITY, KeyIdentity, KeySnapshot};

/// A single key-down or key-up observed by the hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyTransition {
    pub key: KeyIdentity,
    pub pressed: bool,
}

impl KeyTransition {
    pub fn down(key: KeyIdentity) -> Self {
        Self { key, pressed: true }
    }

    pub fn up(key: KeyIdentity) -> Self {
        Self {
            key,
            pressed: false,
        }
    }
}

/// Producer half handed to the hook.
pub type KeyEventSender = Sender<KeyTransition>;

/// Create the hook → send-loop channel.
pub fn key_channel() -> (KeyEventSender, Receiver<KeyTransition>) {
    mpsc::channel()
}

/// Keys currently held, as seen through the transition stream.
pub struct PressedKeys {
    events: Receiver<KeyTransition>,
    held: BTreeSet<KeyIdentity>,
    disconnected: bool,
}

impl PressedKeys {
    pub fn new(events: Receiver<KeyTransition>) -> Self {
        Self {
            events,
            held: BTreeSet::new(),
            disconnected: false,
        }
    }

    /// Apply every transition queued since the last call.
    ///
    /// Returns how many were applied.
    pub fn drain(&mut self) -> usize {
        let mut applied = 0;
        loop {
            match self.events.try_recv() {
                Ok(t) => {
                    if t.pressed {
                        self.held.insert(t.key);
                    } else {
                        self.held.remove(&t.key);
                    }
                    applied += 1;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if !self.disconnected {
                        warn!("key event source disconnected; pressed keys frozen");
                        self.disconnected = true;
                    }
                    break;
                }
            }
        }
        applied
    }

    /// Bounded snapshot for the outbound packet.
    pub fn snapshot(&self) -> KeySnapshot {
        let (snapshot, dropped) = KeySnapshot::truncating(self.held.iter().copied());
        if dropped > 0 {
            warn!(
                "{} keys held, only {} fit in a packet; dropped {}",
                self.held.len(),
                KEY_CAPACITY,
                dropped
            );
        }
        snapshot
    }

    pub fn len(&self) -> usize {
        self.held.len()
    }

    pub fn is_empty(&self) -> bool {
        self.held.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transitions_fold_into_held_set() {
        let (tx, rx) = key_channel();
        let mut keys = PressedKeys::new(rx);

        let a = KeyIdentity::virtual_key(0x41);
        let shift = KeyIdentity::virtual_key(0x10);
        tx.send(KeyTransition::down(a)).unwrap();
        tx.send(KeyTransition::down(shift)).unwrap();
        tx.send(KeyTransition::down(a)).unwrap(); // auto-repeat
        assert_eq!(keys.drain(), 3);
        assert_eq!(keys.snapshot().keys(), &[shift, a]);

        tx.send(KeyTransition::up(shift)).unwrap();
        keys.drain();
        assert_eq!(keys.snapshot().keys(), &[a]);
    }

    #[test]
    fn release_of_unknown_key_is_harmless() {
        let (tx, rx) = key_channel();
        let mut keys = PressedKeys::new(rx);
        tx.send(KeyTransition::up(KeyIdentity::virtual_key(7))).unwrap();
        keys.drain();
        assert!(keys.is_empty());
    }

    #[test]
    fn snapshot_is_truncated_to_capacity() {
        let (tx, rx) = key_channel();
        let mut keys = PressedKeys::new(rx);
        for code in 1..=20 {
            tx.send(KeyTransition::down(KeyIdentity::virtual_key(code))).unwrap();
        }
        keys.drain();
        assert_eq!(keys.len(), 20);
        assert_eq!(keys.snapshot().len(), KEY_CAPACITY);
    }

    #[test]
    fn hook_on_another_thread() {
        let (tx, rx) = key_channel();
        let mut keys = PressedKeys::new(rx);
        let producer = std::thread::spawn(move || {
            for code in 1..=10u8 {
                tx.send(KeyTransition::down(KeyIdentity::virtual_key(code))).unwrap();
                if code % 2 == 0 {
                    tx.send(KeyTransition::up(KeyIdentity::virtual_key(code))).unwrap();
                }
            }
        });
        producer.join().unwrap();

        keys.drain();
        let codes: Vec<u8> = keys.snapshot().iter().map(|k| k.code).collect();
        assert_eq!(codes, vec![1, 3, 5, 7, 9]);
        // Sender gone: draining again just notes the disconnect.
        assert_eq!(keys.drain(), 0);
    }
}
