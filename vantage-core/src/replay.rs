//! Desired-state key replay.
//!
//! Each inbound ActionPacket carries the complete set of keys the
//! consumer wants held. The replayer diffs it against the keys it has
//! itself pressed and issues only the difference: presses for newly
//! wanted keys, then releases for keys no longer wanted.

use std::collections::BTreeSet;

use tracing::{debug, warn};

use crate::input::InputSink;
use crate::protocol::{ActionPacket, KeyIdentity};

/// Calls issued by one [`InputReplayer::apply`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReplayOutcome {
    pub pressed: usize,
    pub released: usize,
    /// Sink calls that failed; their keys are retried on the next packet.
    pub failed: usize,
}

impl ReplayOutcome {
    pub fn calls(&self) -> usize {
        self.pressed + self.released
    }
}

pub struct InputReplayer<S: InputSink> {
    sink: S,
    pressed: BTreeSet<KeyIdentity>,
}

impl<S: InputSink> InputReplayer<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            pressed: BTreeSet::new(),
        }
    }

    /// Keys this replayer currently holds down.
    pub fn pressed(&self) -> &BTreeSet<KeyIdentity> {
        &self.pressed
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Bring the held set in line with `packet`.
    pub fn apply(&mut self, packet: &ActionPacket) -> ReplayOutcome {
        let desired: BTreeSet<KeyIdentity> = packet.keys.iter().copied().collect();
        let mut outcome = ReplayOutcome::default();

        let to_press: Vec<KeyIdentity> = desired.difference(&self.pressed).copied().collect();
        let to_release: Vec<KeyIdentity> = self.pressed.difference(&desired).copied().collect();

        for key in to_press {
            match self.sink.press(key) {
                Ok(()) => {
                    self.pressed.insert(key);
                    outcome.pressed += 1;
                }
                Err(e) => {
                    warn!("press {key:?} failed: {e}");
                    outcome.failed += 1;
                }
            }
        }

        for key in to_release {
            match self.sink.release(key) {
                Ok(()) => {
                    self.pressed.remove(&key);
                    outcome.released += 1;
                }
                Err(e) => {
                    warn!("release {key:?} failed: {e}");
                    outcome.failed += 1;
                }
            }
        }

        if outcome.calls() > 0 {
            debug!(
                "replay: +{} -{} (holding {})",
                outcome.pressed,
                outcome.released,
                self.pressed.len()
            );
        }
        outcome
    }

    /// Release every held key. Returns how many releases succeeded.
    pub fn release_all(&mut self) -> usize {
        self.apply(&ActionPacket::default()).released
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VantageError;
    use crate::protocol::KeySnapshot;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Call {
        Press(KeyIdentity),
        Release(KeyIdentity),
    }

    #[derive(Default)]
    struct RecordingSink {
        calls: Vec<Call>,
        fail_code: Option<u8>,
    }

    impl RecordingSink {
        fn take(&mut self) -> Vec<Call> {
            std::mem::take(&mut self.calls)
        }
    }

    impl InputSink for RecordingSink {
        fn press(&mut self, key: KeyIdentity) -> Result<(), VantageError> {
            if self.fail_code == Some(key.code) {
                return Err(VantageError::Input("refused".into()));
            }
            self.calls.push(Call::Press(key));
            Ok(())
        }

        fn release(&mut self, key: KeyIdentity) -> Result<(), VantageError> {
            self.calls.push(Call::Release(key));
            Ok(())
        }
    }

    fn packet(codes: &[u8]) -> ActionPacket {
        ActionPacket::new(
            codes
                .iter()
                .map(|&c| KeyIdentity::virtual_key(c))
                .collect::<KeySnapshot>(),
        )
    }

    fn vk(c: u8) -> KeyIdentity {
        KeyIdentity::virtual_key(c)
    }

    #[test]
    fn press_new_release_stale() {
        let mut r = InputReplayer::new(RecordingSink::default());
        r.apply(&packet(&[66]));
        r.sink.take();

        let outcome = r.apply(&packet(&[65]));
        assert_eq!(outcome.pressed, 1);
        assert_eq!(outcome.released, 1);
        assert_eq!(r.sink.take(), vec![Call::Press(vk(65)), Call::Release(vk(66))]);
        assert_eq!(r.pressed().iter().copied().collect::<Vec<_>>(), vec![vk(65)]);
    }

    #[test]
    fn same_packet_twice_is_idempotent() {
        let mut r = InputReplayer::new(RecordingSink::default());
        let p = packet(&[0x25, 0x26, 0x20]);
        assert_eq!(r.apply(&p).pressed, 3);
        let second = r.apply(&p);
        assert_eq!(second.calls(), 0);
    }

    #[test]
    fn diff_counts_match_set_differences() {
        let cases: &[(&[u8], &[u8])] = &[
            (&[], &[]),
            (&[1, 2, 3], &[]),
            (&[], &[4, 5]),
            (&[1, 2, 3], &[2, 3, 4, 5]),
            (&[9, 8, 7, 6], &[6, 9]),
            (&[10, 11, 12, 13, 14, 15, 16, 17], &[17, 18, 19, 20, 21, 22, 23, 24]),
        ];
        for &(before, after) in cases {
            let mut r = InputReplayer::new(RecordingSink::default());
            r.apply(&packet(before));
            r.sink.take();

            let local: BTreeSet<_> = before.iter().map(|&c| vk(c)).collect();
            let desired: BTreeSet<_> = after.iter().map(|&c| vk(c)).collect();

            let outcome = r.apply(&packet(after));
            assert_eq!(outcome.pressed, desired.difference(&local).count());
            assert_eq!(outcome.released, local.difference(&desired).count());
            assert_eq!(r.pressed(), &desired);
        }
    }

    #[test]
    fn virtual_and_scan_identities_are_distinct() {
        let mut r = InputReplayer::new(RecordingSink::default());
        let scan = KeyIdentity::scan_code(65, false);
        r.apply(&ActionPacket::new([scan, vk(65)].into_iter().collect()));
        assert_eq!(r.pressed().len(), 2);

        r.apply(&ActionPacket::new([vk(65)].into_iter().collect()));
        assert_eq!(r.pressed().iter().copied().collect::<Vec<_>>(), vec![vk(65)]);
    }

    #[test]
    fn failed_press_is_retried() {
        let mut r = InputReplayer::new(RecordingSink {
            fail_code: Some(65),
            ..RecordingSink::default()
        });
        let outcome = r.apply(&packet(&[65]));
        assert_eq!(outcome.failed, 1);
        assert!(r.pressed().is_empty());

        r.sink.fail_code = None;
        assert_eq!(r.apply(&packet(&[65])).pressed, 1);
    }

    #[test]
    fn release_all_clears_held_keys() {
        let mut r = InputReplayer::new(RecordingSink::default());
        r.apply(&packet(&[1, 2, 3]));
        r.sink.take();

        assert_eq!(r.release_all(), 3);
        assert!(r.pressed().is_empty());
        assert!(r.sink.take().iter().all(|c| matches!(c, Call::Release(_))));
        assert_eq!(r.release_all(), 0);
    }
}
