//! Synthetic keyboard input.
//!
//! [`InputSink`] is the seam between the replayer and the OS. The
//! Windows sink uses `SendInput`; on other platforms the sink exists but
//! every call fails with [`VantageError::Unsupported`].

use crate::error::VantageError;
use crate::protocol::KeyIdentity;

/// Receiver of press / release calls.
pub trait InputSink: Send {
    fn press(&mut self, key: KeyIdentity) -> Result<(), VantageError>;
    fn release(&mut self, key: KeyIdentity) -> Result<(), VantageError>;
}

// ── SendInputSink ────────────────────────────────────────────────

/// Injects key events into the OS input stream.
///
/// Virtual keys go through `wVk`; scan-code keys set
/// `KEYEVENTF_SCANCODE` and leave `wVk` zero.
pub struct SendInputSink;

impl SendInputSink {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SendInputSink {
    fn default() -> Self {
        Self::new()
    }
}

impl InputSink for SendInputSink {
    fn press(&mut self, key: KeyIdentity) -> Result<(), VantageError> {
        platform::send_key(key, false)
    }

    fn release(&mut self, key: KeyIdentity) -> Result<(), VantageError> {
        platform::send_key(key, true)
    }
}

// ── Windows implementation ───────────────────────────────────────

#[cfg(target_os = "windows")]
mod platform {
    use super::*;
    use windows::Win32::UI::Input::KeyboardAndMouse::*;

    pub(super) fn send_key(key: KeyIdentity, release: bool) -> Result<(), VantageError> {
        let mut flags = KEYBD_EVENT_FLAGS(0);
        let (vk, scan) = if key.is_virtual {
            (key.code as u16, 0)
        } else {
            flags |= KEYEVENTF_SCANCODE;
            (0, key.code as u16)
        };
        if key.is_extended {
            flags |= KEYEVENTF_EXTENDEDKEY;
        }
        if release {
            flags |= KEYEVENTF_KEYUP;
        }

        let input = INPUT {
            r#type: INPUT_KEYBOARD,
            Anonymous: INPUT_0 {
                ki: KEYBDINPUT {
                    wVk: VIRTUAL_KEY(vk),
                    wScan: scan,
                    dwFlags: flags,
                    time: 0,
                    dwExtraInfo: 0,
                },
            },
        };

        // SAFETY: `input` is a fully initialised INPUT and the size matches.
        let sent = unsafe { SendInput(&[input], std::mem::size_of::<INPUT>() as i32) };
        if sent == 0 {
            return Err(VantageError::Input(format!(
                "SendInput returned 0 for {key:?} (release: {release})"
            )));
        }
        Ok(())
    }
}

// ── Non-Windows stub ─────────────────────────────────────────────

#[cfg(not(target_os = "windows"))]
mod platform {
    use super::*;

    pub(super) fn send_key(_key: KeyIdentity, _release: bool) -> Result<(), VantageError> {
        Err(VantageError::Unsupported("input injection is only available on Windows"))
    }
}
