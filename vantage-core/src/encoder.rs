//! Lossy low-resolution frame encoder.
//!
//! Turns a full-resolution grayscale frame into a compact payload:
//!
//! 1. Resize to the canonical transmission resolution.
//! 2. Quantize each sample to 4 bits and pack two samples per byte
//!    (`(a >> 4) << 4 | (b >> 4)`); an odd trailing sample occupies the
//!    high nibble of the last byte.
//! 3. Compress the packed buffer with zlib or zstd.
//!
//! A payload that exceeds the ceiling is an error; the caller drops the
//! frame.

use std::fmt;
use std::io::Write;
use std::str::FromStr;

use flate2::Compression;
use flate2::write::ZlibEncoder;
use image::GrayImage;

use crate::error::VantageError;
use crate::imageops::ImageOps;
use crate::protocol::MAX_PAYLOAD_SIZE;

/// Canonical transmission resolution.
pub const DEFAULT_FRAME_WIDTH: u32 = 512;
pub const DEFAULT_FRAME_HEIGHT: u32 = 288;

// ── Codec ────────────────────────────────────────────────────────

/// General-purpose byte compressor applied to the packed frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Codec {
    /// zlib stream (RFC 1950).
    #[default]
    Zlib,
    /// zstd frame.
    Zstd,
}

impl Codec {
    /// Clamp `level` into the range this codec accepts.
    pub fn clamp_level(self, level: i32) -> i32 {
        match self {
            Codec::Zlib => level.clamp(0, 9),
            Codec::Zstd => level.clamp(1, 22),
        }
    }

    pub fn compress(self, data: &[u8], level: i32) -> Result<Vec<u8>, VantageError> {
        let level = self.clamp_level(level);
        match self {
            Codec::Zlib => {
                let mut enc = ZlibEncoder::new(
                    Vec::with_capacity(data.len() / 2),
                    Compression::new(level as u32),
                );
                enc.write_all(data)
                    .map_err(|e| VantageError::Compression(format!("zlib encode failed: {e}")))?;
                enc.finish()
                    .map_err(|e| VantageError::Compression(format!("zlib finish failed: {e}")))
            }
            Codec::Zstd => zstd::encode_all(data, level)
                .map_err(|e| VantageError::Compression(format!("zstd encode failed: {e}"))),
        }
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Codec::Zlib => f.write_str("zlib"),
            Codec::Zstd => f.write_str("zstd"),
        }
    }
}

impl FromStr for Codec {
    type Err = VantageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "zlib" | "deflate" => Ok(Codec::Zlib),
            "zstd" => Ok(Codec::Zstd),
            other => Err(VantageError::Other(format!("unknown codec: {other:?}"))),
        }
    }
}

// ── Packing ──────────────────────────────────────────────────────

/// Quantize 8-bit samples to 4 bits and pack two per byte.
pub fn pack_nibbles(samples: &[u8]) -> Vec<u8> {
    samples
        .chunks(2)
        .map(|pair| {
            let hi = pair[0] >> 4;
            let lo = pair.get(1).map_or(0, |b| b >> 4);
            (hi << 4) | lo
        })
        .collect()
}

/// Reject a payload larger than `max`.
pub fn enforce_ceiling(payload: Vec<u8>, max: usize) -> Result<Vec<u8>, VantageError> {
    if payload.len() > max {
        return Err(VantageError::PayloadTooLarge {
            size: payload.len(),
            max,
        });
    }
    Ok(payload)
}

// ── FrameEncoder ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct EncoderConfig {
    pub width: u32,
    pub height: u32,
    pub codec: Codec,
    pub level: i32,
    /// Payload ceiling; never above [`MAX_PAYLOAD_SIZE`].
    pub max_payload: usize,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_FRAME_WIDTH,
            height: DEFAULT_FRAME_HEIGHT,
            codec: Codec::Zlib,
            level: 6,
            max_payload: MAX_PAYLOAD_SIZE,
        }
    }
}

/// Resize → quantize → compress, with a payload ceiling.
pub struct FrameEncoder {
    config: EncoderConfig,
    /// Number of frames encoded successfully.
    frame_count: u64,
    /// Number of frames rejected by the ceiling or the compressor.
    dropped: u64,
}

impl FrameEncoder {
    pub fn new(mut config: EncoderConfig) -> Self {
        config.max_payload = config.max_payload.min(MAX_PAYLOAD_SIZE);
        config.level = config.codec.clamp_level(config.level);
        Self {
            config,
            frame_count: 0,
            dropped: 0,
        }
    }

    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    /// Encode one grayscale frame into a compressed payload.
    pub fn encode(
        &mut self,
        gray: &GrayImage,
        ops: &dyn ImageOps,
    ) -> Result<Vec<u8>, VantageError> {
        let small = ops.resize(gray, self.config.width, self.config.height);
        let packed = pack_nibbles(small.as_raw());
        let result = self
            .config
            .codec
            .compress(&packed, self.config.level)
            .and_then(|payload| enforce_ceiling(payload, self.config.max_payload));

        match &result {
            Ok(_) => self.frame_count += 1,
            Err(_) => self.dropped += 1,
        }
        result
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::{decompress, unpack_nibbles};
    use crate::imageops::CpuImageOps;
    use image::Luma;

    fn noise(width: u32, height: u32, mut seed: u32) -> GrayImage {
        GrayImage::from_fn(width, height, |_, _| {
            seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            Luma([(seed >> 16) as u8])
        })
    }

    #[test]
    fn pack_even_and_odd() {
        assert_eq!(pack_nibbles(&[0xAB, 0xCD]), vec![0xAC]);
        assert_eq!(pack_nibbles(&[0x10, 0x2F, 0xF0]), vec![0x12, 0xF0]);
        assert!(pack_nibbles(&[]).is_empty());
    }

    #[test]
    fn nibbles_match_shifted_samples() {
        let samples: Vec<u8> = (0..=255).collect();
        let unpacked = unpack_nibbles(&pack_nibbles(&samples), samples.len());
        for (orig, back) in samples.iter().zip(&unpacked) {
            assert_eq!(orig >> 4, back >> 4);
            assert_eq!(back & 0x0F, 0);
        }
    }

    #[test]
    fn compression_is_lossless_for_both_codecs() {
        let packed = pack_nibbles(noise(64, 36, 7).as_raw());
        for codec in [Codec::Zlib, Codec::Zstd] {
            let compressed = codec.compress(&packed, 6).unwrap();
            assert_eq!(decompress(codec, &compressed, packed.len()).unwrap(), packed, "{codec}");
        }
    }

    #[test]
    fn oversized_payload_is_dropped() {
        let err = enforce_ceiling(vec![0; 70_000], 65_000).unwrap_err();
        match err {
            VantageError::PayloadTooLarge { size, max } => {
                assert_eq!(size, 70_000);
                assert_eq!(max, 65_000);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(enforce_ceiling(vec![0; 65_000], 65_000).unwrap().len(), 65_000);
    }

    #[test]
    fn encoder_produces_resized_payload() {
        let ops = CpuImageOps::new();
        let mut enc = FrameEncoder::new(EncoderConfig::default());
        let gray = GrayImage::from_pixel(1024, 576, Luma([0x7F]));

        let payload = enc.encode(&gray, &ops).unwrap();
        let raw = decompress(Codec::Zlib, &payload, (512 * 288) / 2).unwrap();
        assert_eq!(raw.len(), (512 * 288) / 2);
        assert!(raw.iter().all(|&b| b == 0x77));
        assert_eq!(enc.frame_count(), 1);
    }

    #[test]
    fn incompressible_frame_over_ceiling_is_counted() {
        let ops = CpuImageOps::new();
        let mut enc = FrameEncoder::new(EncoderConfig {
            width: 128,
            height: 128,
            max_payload: 1_000,
            ..EncoderConfig::default()
        });
        let err = enc.encode(&noise(128, 128, 99), &ops).unwrap_err();
        assert!(matches!(err, VantageError::PayloadTooLarge { .. }));
        assert_eq!(enc.dropped(), 1);
        assert_eq!(enc.frame_count(), 0);
    }

    #[test]
    fn ceiling_never_exceeds_wire_maximum() {
        let enc = FrameEncoder::new(EncoderConfig {
            max_payload: 1 << 20,
            ..EncoderConfig::default()
        });
        assert_eq!(enc.config().max_payload, MAX_PAYLOAD_SIZE);
    }

    #[test]
    fn codec_parses_names() {
        assert_eq!("zlib".parse::<Codec>().unwrap(), Codec::Zlib);
        assert_eq!("ZSTD".parse::<Codec>().unwrap(), Codec::Zstd);
        assert!("lz4".parse::<Codec>().is_err());
    }
}
