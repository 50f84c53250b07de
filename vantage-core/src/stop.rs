//! Process-wide termination flag and its triggers.
//!
//! A single [`StopSignal`] is shared by every loop. It is set at most
//! once: by the hotkey watcher, by Ctrl-C, or by a loop that hit a fatal
//! error. Relaxed ordering is enough; loops only need to observe it
//! eventually.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::info;

use crate::error::VantageError;

/// Interval between stop-condition polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

// ── StopSignal ───────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request shutdown. Returns `true` if this call set the flag.
    pub fn stop(&self) -> bool {
        !self.0.swap(true, Ordering::Relaxed)
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

// ── StopCondition ────────────────────────────────────────────────

/// A polled termination trigger.
pub trait StopCondition: Send {
    fn triggered(&mut self) -> bool;
}

/// Fires while the Escape key is held.
#[derive(Debug, Default)]
pub struct EscapeKey;

impl StopCondition for EscapeKey {
    #[cfg(target_os = "windows")]
    fn triggered(&mut self) -> bool {
        use windows::Win32::UI::Input::KeyboardAndMouse::{GetAsyncKeyState, VK_ESCAPE};
        // SAFETY: no preconditions.
        let state = unsafe { GetAsyncKeyState(VK_ESCAPE.0 as i32) };
        (state as u16 & 0x8000) != 0
    }

    #[cfg(not(target_os = "windows"))]
    fn triggered(&mut self) -> bool {
        false
    }
}

/// Poll `condition` on a dedicated thread until it fires or `signal` is
/// set by someone else.
pub fn spawn_watcher<C>(
    mut condition: C,
    signal: StopSignal,
    poll: Duration,
) -> Result<JoinHandle<()>, VantageError>
where
    C: StopCondition + 'static,
{
    let handle = thread::Builder::new()
        .name("vantage-stop-watcher".into())
        .spawn(move || {
            while !signal.is_stopped() {
                if condition.triggered() {
                    if signal.stop() {
                        info!("stop hotkey pressed");
                    }
                    break;
                }
                thread::sleep(poll);
            }
        })
        .map_err(|e| VantageError::Other(format!("spawn stop watcher: {e}")))?;
    Ok(handle)
}

/// Set `signal` once `trigger` resolves.
pub async fn stop_when<F>(trigger: F, signal: StopSignal)
where
    F: Future,
{
    trigger.await;
    signal.stop();
}

/// Set `signal` on Ctrl-C.
pub async fn stop_on_ctrl_c(signal: StopSignal) {
    stop_when(
        async {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Ctrl-C received");
            }
        },
        signal,
    )
    .await;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AfterPolls(u32);

    impl StopCondition for AfterPolls {
        fn triggered(&mut self) -> bool {
            if self.0 == 0 {
                return true;
            }
            self.0 -= 1;
            false
        }
    }

    struct Never;

    impl StopCondition for Never {
        fn triggered(&mut self) -> bool {
            false
        }
    }

    #[test]
    fn stop_is_sticky_and_reported_once() {
        let s = StopSignal::new();
        assert!(!s.is_stopped());
        assert!(s.stop());
        assert!(!s.stop());
        assert!(s.clone().is_stopped());
    }

    #[test]
    fn watcher_sets_signal_when_condition_fires() {
        let s = StopSignal::new();
        let h = spawn_watcher(AfterPolls(3), s.clone(), Duration::from_millis(1)).unwrap();
        h.join().unwrap();
        assert!(s.is_stopped());
    }

    #[test]
    fn watcher_exits_when_stopped_elsewhere() {
        let s = StopSignal::new();
        let h = spawn_watcher(Never, s.clone(), Duration::from_millis(1)).unwrap();
        s.stop();
        h.join().unwrap();
    }

    #[tokio::test]
    async fn async_trigger_sets_signal() {
        let s = StopSignal::new();
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let task = tokio::spawn(stop_when(
            async move {
                let _ = rx.await;
            },
            s.clone(),
        ));
        assert!(!s.is_stopped());
        tx.send(()).unwrap();
        task.await.unwrap();
        assert!(s.is_stopped());
    }
}
