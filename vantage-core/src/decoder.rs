//! Consumer-side frame decoder.
//!
//! Reverses [`FrameEncoder`](crate::encoder::FrameEncoder): decompress,
//! then expand each nibble back to an 8-bit sample (`nibble << 4`).

use std::io::Read;

use flate2::read::ZlibDecoder;
use image::GrayImage;

use crate::encoder::{Codec, DEFAULT_FRAME_HEIGHT, DEFAULT_FRAME_WIDTH};
use crate::error::VantageError;
use crate::protocol::FramePacket;

/// Decompress a payload produced by [`Codec::compress`].
///
/// Fails as soon as the output grows past `limit` bytes.
pub fn decompress(codec: Codec, data: &[u8], limit: usize) -> Result<Vec<u8>, VantageError> {
    let cap = limit as u64 + 1;
    let mut out = Vec::with_capacity(limit.min(data.len().saturating_mul(4)));
    let read = match codec {
        Codec::Zlib => ZlibDecoder::new(data)
            .take(cap)
            .read_to_end(&mut out)
            .map_err(|e| VantageError::Compression(format!("zlib decode failed: {e}"))),
        Codec::Zstd => zstd::stream::read::Decoder::new(data)
            .and_then(|dec| dec.take(cap).read_to_end(&mut out))
            .map_err(|e| VantageError::Compression(format!("zstd decode failed: {e}"))),
    };
    read?;
    if out.len() > limit {
        return Err(VantageError::Compression(format!(
            "decompressed payload exceeds {limit} bytes"
        )));
    }
    Ok(out)
}

/// Expand nibble-packed data into `count` 8-bit samples.
pub fn unpack_nibbles(packed: &[u8], count: usize) -> Vec<u8> {
    packed
        .iter()
        .flat_map(|&b| [b & 0xF0, (b & 0x0F) << 4])
        .take(count)
        .collect()
}

/// Decodes FramePacket payloads back into grayscale images.
pub struct FrameDecoder {
    codec: Codec,
    width: u32,
    height: u32,
}

impl FrameDecoder {
    pub fn new(codec: Codec, width: u32, height: u32) -> Self {
        Self {
            codec,
            width,
            height,
        }
    }

    /// Decode a compressed payload into a `width × height` image.
    pub fn decode_payload(&self, payload: &[u8]) -> Result<GrayImage, VantageError> {
        let pixels = self.width as usize * self.height as usize;
        let expected = pixels.div_ceil(2);
        let packed = decompress(self.codec, payload, expected)?;
        if packed.len() != expected {
            return Err(VantageError::InvalidPacketLength {
                expected,
                actual: packed.len(),
            });
        }
        let samples = unpack_nibbles(&packed, pixels);
        GrayImage::from_raw(self.width, self.height, samples)
            .ok_or_else(|| VantageError::Other("decoded buffer does not fit frame".into()))
    }

    /// Parse a datagram and decode its payload.
    pub fn decode_datagram(&self, data: &[u8]) -> Result<(FramePacket, GrayImage), VantageError> {
        let packet = FramePacket::decode(data)?;
        let image = self.decode_payload(&packet.payload)?;
        Ok((packet, image))
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new(Codec::Zlib, DEFAULT_FRAME_WIDTH, DEFAULT_FRAME_HEIGHT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::{EncoderConfig, FrameEncoder, pack_nibbles};
    use crate::imageops::CpuImageOps;
    use image::Luma;

    #[test]
    fn unpack_odd_count() {
        assert_eq!(unpack_nibbles(&[0x12, 0xF0], 3), vec![0x10, 0x20, 0xF0]);
    }

    #[test]
    fn decoded_image_matches_quantized_source() {
        let ops = CpuImageOps::new();
        let config = EncoderConfig {
            width: 40,
            height: 30,
            codec: Codec::Zstd,
            ..EncoderConfig::default()
        };
        let mut enc = FrameEncoder::new(config);
        let src = GrayImage::from_fn(40, 30, |x, y| Luma([((x * 7 + y * 3) % 256) as u8]));

        let payload = enc.encode(&src, &ops).unwrap();
        let img = FrameDecoder::new(Codec::Zstd, 40, 30)
            .decode_payload(&payload)
            .unwrap();

        for (a, b) in src.pixels().zip(img.pixels()) {
            assert_eq!(a[0] >> 4, b[0] >> 4);
        }
    }

    #[test]
    fn wrong_resolution_is_rejected() {
        let packed = pack_nibbles(&[0u8; 100]);
        let payload = Codec::Zlib.compress(&packed, 6).unwrap();
        let err = FrameDecoder::new(Codec::Zlib, 20, 20)
            .decode_payload(&payload)
            .unwrap_err();
        assert!(matches!(err, VantageError::InvalidPacketLength { .. }));
    }

    #[test]
    fn oversized_stream_is_cut_off_at_frame_size() {
        // 8 MiB of zeros squeezes into a few hundred bytes.
        let bomb = zstd::encode_all(&vec![0u8; 8 << 20][..], 19).unwrap();
        assert!(bomb.len() < 65_000);

        let err = FrameDecoder::new(Codec::Zstd, DEFAULT_FRAME_WIDTH, DEFAULT_FRAME_HEIGHT)
            .decode_payload(&bomb)
            .unwrap_err();
        assert!(matches!(err, VantageError::Compression(_)), "{err}");

        let zlib_bomb = Codec::Zlib.compress(&vec![0u8; 8 << 20], 9).unwrap();
        assert!(decompress(Codec::Zlib, &zlib_bomb, 1024).is_err());
    }

    #[test]
    fn stream_exactly_at_limit_is_accepted() {
        let payload = Codec::Zlib.compress(&[0x55; 1024], 6).unwrap();
        assert_eq!(decompress(Codec::Zlib, &payload, 1024).unwrap().len(), 1024);
    }

    #[test]
    fn garbage_payload_is_a_compression_error() {
        let err = FrameDecoder::default()
            .decode_payload(&[1, 2, 3, 4])
            .unwrap_err();
        assert!(matches!(err, VantageError::Compression(_)));
    }
}
