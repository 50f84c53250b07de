//! Shared types for the capture → extract → encode pipeline.
//!
//! These are **internal** frame representations used between pipeline
//! stages. The serialisable wire types live in [`crate::protocol`].

use std::time::Instant;

// ── PixelFormat ──────────────────────────────────────────────────

/// Pixel layout for raw captured frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// 4 bytes per pixel: Blue, Green, Red, Alpha (GDI / DXGI default).
    Bgra8,
    /// 4 bytes per pixel: Red, Green, Blue, Alpha.
    Rgba8,
}

impl PixelFormat {
    /// Bytes consumed by a single pixel in this format.
    pub const fn bytes_per_pixel(self) -> usize {
        4
    }

    /// Channel offsets of `(red, green, blue)` within a pixel.
    pub const fn rgb_offsets(self) -> (usize, usize, usize) {
        match self {
            PixelFormat::Bgra8 => (2, 1, 0),
            PixelFormat::Rgba8 => (0, 1, 2),
        }
    }
}

// ── RawFrame ─────────────────────────────────────────────────────

/// A raw, uncompressed capture of the target window's client area.
///
/// The `data` buffer holds `height` rows of `stride` bytes each.
#[derive(Debug, Clone)]
pub struct RawFrame {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Row pitch in **bytes** (may exceed `width * bpp`).
    pub stride: u32,
    /// Pixel layout.
    pub format: PixelFormat,
    /// Raw pixel data, `stride * height` bytes.
    pub data: Vec<u8>,
    /// Monotonic capture timestamp.
    pub timestamp: Instant,
}

impl RawFrame {
    /// Build a tightly packed frame (`stride == width * 4`).
    pub fn packed(width: u32, height: u32, format: PixelFormat, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            stride: width * format.bytes_per_pixel() as u32,
            format,
            data,
            timestamp: Instant::now(),
        }
    }

    /// Returns the `(red, green, blue)` channels at `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics if `(x, y)` is out of bounds.
    pub fn rgb(&self, x: u32, y: u32) -> (u8, u8, u8) {
        let bpp = self.format.bytes_per_pixel();
        let offset = y as usize * self.stride as usize + x as usize * bpp;
        let (r, g, b) = self.format.rgb_offsets();
        (
            self.data[offset + r],
            self.data[offset + g],
            self.data[offset + b],
        )
    }
}

// ── Geometry ─────────────────────────────────────────────────────

/// Integer pixel coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Screen rectangle of the target window's client area.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    /// A rectangle with no area cannot be captured.
    pub fn is_empty(&self) -> bool {
        self.width() <= 0 || self.height() <= 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rgb_respects_channel_order() {
        let bgra = RawFrame::packed(1, 1, PixelFormat::Bgra8, vec![10, 20, 30, 255]);
        assert_eq!(bgra.rgb(0, 0), (30, 20, 10));

        let rgba = RawFrame::packed(1, 1, PixelFormat::Rgba8, vec![10, 20, 30, 255]);
        assert_eq!(rgba.rgb(0, 0), (10, 20, 30));
    }

    #[test]
    fn empty_rect() {
        let r = Rect {
            left: 10,
            top: 10,
            right: 10,
            bottom: 50,
        };
        assert!(r.is_empty());
        let r = Rect {
            left: 0,
            top: 0,
            right: 800,
            bottom: 600,
        };
        assert!(!r.is_empty());
        assert_eq!(r.width(), 800);
        assert_eq!(r.height(), 600);
    }
}
