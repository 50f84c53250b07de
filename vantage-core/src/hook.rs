//! System-wide low-level keyboard hook.
//!
//! The hook callback runs on a dedicated message-loop thread owned by
//! the OS hook machinery. It does nothing but forward a
//! [`KeyTransition`] into the channel consumed by the send loop.
//!
//! Identities are recorded as virtual keys (`is_virtual = true`), with
//! the extended flag taken from the hook data.

use crate::error::VantageError;
use crate::keys::KeyEventSender;

#[cfg(target_os = "windows")]
pub use platform::KeyHook;

#[cfg(not(target_os = "windows"))]
pub use stub::KeyHook;

// ── Windows implementation ───────────────────────────────────────

#[cfg(target_os = "windows")]
mod platform {
    use std::sync::OnceLock;
    use std::sync::mpsc;
    use std::thread::{self, JoinHandle};

    use tracing::{debug, warn};
    use windows::Win32::Foundation::{LPARAM, LRESULT, WPARAM};
    use windows::Win32::System::Threading::GetCurrentThreadId;
    use windows::Win32::UI::WindowsAndMessaging::{
        CallNextHookEx, DispatchMessageW, GetMessageW, HC_ACTION, KBDLLHOOKSTRUCT,
        KBDLLHOOKSTRUCT_FLAGS, LLKHF_EXTENDED, MSG, PM_NOREMOVE, PeekMessageW,
        PostThreadMessageW, SetWindowsHookExW, UnhookWindowsHookEx, WH_KEYBOARD_LL, WM_KEYDOWN,
        WM_KEYUP, WM_QUIT, WM_SYSKEYDOWN, WM_SYSKEYUP, WM_USER,
    };

    use super::*;
    use crate::keys::KeyTransition;
    use crate::protocol::KeyIdentity;

    /// Sender used by the hook callback. Set once per process.
    static EVENT_SENDER: OnceLock<KeyEventSender> = OnceLock::new();

    /// Installed hook; removed when dropped.
    pub struct KeyHook {
        thread_id: u32,
        thread: Option<JoinHandle<()>>,
    }

    impl KeyHook {
        /// Install the hook on its own message-loop thread.
        ///
        /// Only one hook may be installed per process.
        pub fn install(sender: KeyEventSender) -> Result<Self, VantageError> {
            EVENT_SENDER
                .set(sender)
                .map_err(|_| VantageError::Hook("key hook already installed".into()))?;

            let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<u32, String>>(1);
            let thread = thread::Builder::new()
                .name("vantage-key-hook".into())
                .spawn(move || run_message_loop(ready_tx))
                .map_err(|e| VantageError::Hook(format!("spawn hook thread: {e}")))?;

            let thread_id = ready_rx
                .recv()
                .map_err(|_| VantageError::Hook("hook thread exited during start-up".into()))?
                .map_err(VantageError::Hook)?;

            debug!("key hook installed on thread {thread_id}");
            Ok(Self {
                thread_id,
                thread: Some(thread),
            })
        }
    }

    impl Drop for KeyHook {
        fn drop(&mut self) {
            // SAFETY: posting to a thread id we created; failure only
            // means the thread is already gone.
            let posted =
                unsafe { PostThreadMessageW(self.thread_id, WM_QUIT, WPARAM(0), LPARAM(0)) };
            if let Err(e) = posted {
                warn!("could not stop key hook thread: {e}");
                return;
            }
            if let Some(handle) = self.thread.take() {
                let _ = handle.join();
            }
        }
    }

    fn run_message_loop(ready: mpsc::SyncSender<Result<u32, String>>) {
        let mut msg = MSG::default();
        // SAFETY: forces creation of this thread's message queue so the
        // WM_QUIT posted on drop is not lost.
        unsafe {
            let _ = PeekMessageW(&mut msg, None, WM_USER, WM_USER, PM_NOREMOVE);
        }

        // SAFETY: installed from the thread that pumps messages below.
        let hook = match unsafe { SetWindowsHookExW(WH_KEYBOARD_LL, Some(hook_proc), None, 0) } {
            Ok(h) => h,
            Err(e) => {
                let _ = ready.send(Err(format!("SetWindowsHookExW failed: {e}")));
                return;
            }
        };
        // SAFETY: no preconditions.
        let _ = ready.send(Ok(unsafe { GetCurrentThreadId() }));

        // SAFETY: standard GetMessage / DispatchMessage pump.
        unsafe {
            while GetMessageW(&mut msg, None, 0, 0).as_bool() {
                DispatchMessageW(&msg);
            }
            let _ = UnhookWindowsHookEx(hook);
        }
    }

    unsafe extern "system" fn hook_proc(n_code: i32, w_param: WPARAM, l_param: LPARAM) -> LRESULT {
        if n_code == HC_ACTION as i32 {
            // SAFETY: l_param points to a KBDLLHOOKSTRUCT for HC_ACTION.
            let kbs = unsafe { &*(l_param.0 as *const KBDLLHOOKSTRUCT) };
            let key = KeyIdentity {
                is_virtual: true,
                is_extended: (kbs.flags & LLKHF_EXTENDED) != KBDLLHOOKSTRUCT_FLAGS(0),
                code: kbs.vkCode as u8,
            };
            let transition = match w_param.0 as u32 {
                WM_KEYDOWN | WM_SYSKEYDOWN => Some(KeyTransition::down(key)),
                WM_KEYUP | WM_SYSKEYUP => Some(KeyTransition::up(key)),
                _ => None,
            };
            if let (Some(t), Some(sender)) = (transition, EVENT_SENDER.get()) {
                // Receiver gone means shutdown.
                let _ = sender.send(t);
            }
        }
        // SAFETY: always forward to the next hook in the chain.
        unsafe { CallNextHookEx(None, n_code, w_param, l_param) }
    }
}

// ── Non-Windows stub ─────────────────────────────────────────────

#[cfg(not(target_os = "windows"))]
mod stub {
    use super::*;

    pub struct KeyHook;

    impl KeyHook {
        pub fn install(_sender: KeyEventSender) -> Result<Self, VantageError> {
            Err(VantageError::Unsupported("the key hook is only available on Windows"))
        }
    }
}

#[cfg(test)]
mod tests {
    #[cfg(not(target_os = "windows"))]
    #[test]
    fn install_is_unsupported_off_windows() {
        let (tx, _rx) = crate::keys::key_channel();
        let err = super::KeyHook::install(tx).err().unwrap();
        assert!(matches!(err, crate::error::VantageError::Unsupported(_)));
    }
}
