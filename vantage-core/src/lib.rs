//! # vantage-core
//!
//! Core library of the Vantage streaming client.
//!
//! This crate contains:
//! - **Extraction**: bar-fill `Metrics` and sticky minimap / player /
//!   portal localization (`StateExtractor`)
//! - **Encoding**: 4-bit quantization, nibble packing and zlib / zstd
//!   compression with a payload ceiling (`FrameEncoder`, `FrameDecoder`)
//! - **Protocol**: fixed-layout `FramePacket` and `ActionPacket`
//! - **Transport**: one-datagram-per-frame UDP (`UdpTransport`)
//! - **Pacing**: sleep-then-spin fixed-rate `Pacer`
//! - **Input**: key hook, pressed-key tracking and diff-based replay
//!   (`InputReplayer`)
//! - **Service**: the send and receive loops (`StreamService`)
//! - **Error**: `VantageError`, a typed `thiserror`-based error

pub mod capture;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod extractor;
pub mod hook;
pub mod imageops;
pub mod input;
pub mod keys;
pub mod metrics;
pub mod minimap;
pub mod pacer;
pub mod protocol;
pub mod replay;
pub mod service;
pub mod stop;
pub mod templates;
pub mod transport;
pub mod types;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use capture::{FrameSource, GdiCapturer, find_window_rect};
pub use decoder::FrameDecoder;
pub use encoder::{Codec, EncoderConfig, FrameEncoder};
pub use error::VantageError;
pub use extractor::{FrameState, StateExtractor};
pub use hook::KeyHook;
pub use imageops::{CpuImageOps, ImageOps};
pub use input::{InputSink, SendInputSink};
pub use keys::{KeyTransition, PressedKeys, key_channel};
pub use metrics::Metrics;
pub use minimap::{DetectionConfig, Localization, MinimapBox, MinimapState};
pub use pacer::{Clock, Pacer, SystemClock};
pub use protocol::{
    ACTION_PACKET_SIZE, ActionPacket, FramePacket, HEADER_SIZE, KEY_CAPACITY, KeyIdentity,
    KeySnapshot, MAX_PAYLOAD_SIZE, PORTAL_CAPACITY,
};
pub use replay::InputReplayer;
pub use service::{RecvLoop, SendLoop, StreamConfig, StreamService};
pub use stop::{EscapeKey, StopCondition, StopSignal};
pub use templates::Templates;
pub use transport::{DatagramTransport, TransportStats, UdpTransport};
pub use types::{PixelFormat, Point, RawFrame, Rect};
