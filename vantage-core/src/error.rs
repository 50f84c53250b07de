//! Domain-specific error types for the Vantage client.
//!
//! All fallible operations return `Result<T, VantageError>`.
//! Per-frame failures (a dropped frame, a malformed datagram) are typed
//! so the loops can decide whether to skip a cycle or shut down.

use std::io::ErrorKind;

use thiserror::Error;

/// The canonical error type for the Vantage client.
#[derive(Debug, Error)]
pub enum VantageError {
    // ── Startup Errors ───────────────────────────────────────────
    /// No top-level window carries the requested title.
    #[error("window not found: {0:?}")]
    WindowNotFound(String),

    /// The target window resolved to a zero-sized client area.
    #[error("empty capture region: {width}x{height}")]
    EmptyCaptureRegion { width: i32, height: i32 },

    /// The OS capture path failed.
    #[error("capture failed: {0}")]
    Capture(String),

    /// A template image could not be loaded or decoded.
    #[error("template error: {0}")]
    Template(String),

    // ── Encoding Errors ──────────────────────────────────────────
    /// The compressed payload does not fit in the packet.
    #[error("payload too large: {size} bytes (max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// The compressor or decompressor reported a failure.
    #[error("compression error: {0}")]
    Compression(String),

    // ── Wire Errors ──────────────────────────────────────────────
    /// A datagram did not have the size its layout requires.
    #[error("invalid packet length: expected {expected}, got {actual}")]
    InvalidPacketLength { expected: usize, actual: usize },

    /// The socket layer reported an error.
    #[error("socket error: {0}")]
    Socket(#[from] std::io::Error),

    // ── Input Errors ─────────────────────────────────────────────
    /// Synthetic input could not be delivered.
    #[error("input injection failed: {0}")]
    Input(String),

    /// The key-event hook could not be installed.
    #[error("key hook failed: {0}")]
    Hook(String),

    /// The operation is not available on this platform.
    #[error("unsupported on this platform: {0}")]
    Unsupported(&'static str),

    /// Catch-all for errors that do not fit another variant.
    #[error("{0}")]
    Other(String),
}

impl VantageError {
    /// Whether a loop may keep running after this error.
    ///
    /// Only socket errors are ever fatal. Timeouts and ICMP-induced
    /// resets on a connectionless socket are expected and transient.
    pub fn is_transient(&self) -> bool {
        match self {
            VantageError::Socket(e) => matches!(
                e.kind(),
                ErrorKind::WouldBlock
                    | ErrorKind::TimedOut
                    | ErrorKind::Interrupted
                    | ErrorKind::ConnectionReset
                    | ErrorKind::ConnectionRefused
            ),
            _ => true,
        }
    }
}

// ── Convenient From implementations ──────────────────────────────

impl From<String> for VantageError {
    fn from(s: String) -> Self {
        VantageError::Other(s)
    }
}

impl From<&str> for VantageError {
    fn from(s: &str) -> Self {
        VantageError::Other(s.to_string())
    }
}
