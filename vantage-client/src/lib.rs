//! # vantage-client
//!
//! Streams a game window to a remote consumer over UDP. Each frame
//! carries the extracted HUD state (bar fills, minimap, player and
//! portal positions), the locally held keys and a compressed 4-bit
//! grayscale image. Key-state packets coming back are replayed as
//! synthetic key presses.
//!
//! Escape or Ctrl-C stops both loops and releases every replayed key.

pub mod config;
