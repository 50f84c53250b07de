//! Generic image-processing primitives consumed by the pipeline.
//!
//! The extractor and encoder never touch pixels through anything but
//! this trait, so a GPU or SIMD backend can be swapped in. The
//! [`CpuImageOps`] backend uses the `image` crate for resampling and a
//! direct correlation loop for template matching.

use image::GrayImage;
use image::imageops::{self, FilterType};

use crate::types::{Point, RawFrame};

// ── ImageOps ─────────────────────────────────────────────────────

/// Capability set of image primitives.
pub trait ImageOps: Send {
    /// Resample `src` to exactly `width × height`.
    fn resize(&self, src: &GrayImage, width: u32, height: u32) -> GrayImage;

    /// Convert a 4-channel capture to 8-bit luma.
    fn to_grayscale(&self, frame: &RawFrame) -> GrayImage;

    /// Location of the single best correlation response (cross-correlation
    /// with a zero-mean template). Always yields a location unless the
    /// template does not fit inside `image`.
    fn match_template_best(&self, image: &GrayImage, templ: &GrayImage) -> Option<Point>;

    /// Top-left locations whose normalized correlation coefficient is
    /// strictly greater than `threshold`, in row-major order.
    fn match_template_above(
        &self,
        image: &GrayImage,
        templ: &GrayImage,
        threshold: f32,
    ) -> Vec<Point>;
}

// ── CpuImageOps ──────────────────────────────────────────────────

/// Portable CPU implementation of [`ImageOps`].
#[derive(Debug, Clone, Copy, Default)]
pub struct CpuImageOps;

impl CpuImageOps {
    pub fn new() -> Self {
        Self
    }
}

/// Template with its mean removed, plus the sum of squares of the result.
struct CenteredTemplate {
    width: usize,
    height: usize,
    values: Vec<f64>,
    energy: f64,
}

impl CenteredTemplate {
    fn new(templ: &GrayImage) -> Self {
        let raw = templ.as_raw();
        let n = raw.len().max(1) as f64;
        let mean = raw.iter().map(|&v| v as f64).sum::<f64>() / n;
        let values: Vec<f64> = raw.iter().map(|&v| v as f64 - mean).collect();
        let energy = values.iter().map(|v| v * v).sum();
        Self {
            width: templ.width() as usize,
            height: templ.height() as usize,
            values,
            energy,
        }
    }

    /// Correlation of the template against the window at `(x, y)`,
    /// together with the window's sum and sum of squares.
    fn correlate(&self, pixels: &[u8], stride: usize, x: usize, y: usize) -> (f64, f64, f64) {
        let mut cross = 0.0;
        let mut sum = 0.0;
        let mut sum_sq = 0.0;
        for ty in 0..self.height {
            let row = &pixels[(y + ty) * stride + x..(y + ty) * stride + x + self.width];
            let trow = &self.values[ty * self.width..(ty + 1) * self.width];
            for (&p, &t) in row.iter().zip(trow) {
                let p = p as f64;
                cross += p * t;
                sum += p;
                sum_sq += p * p;
            }
        }
        (cross, sum, sum_sq)
    }
}

fn fits(image: &GrayImage, templ: &GrayImage) -> bool {
    templ.width() > 0
        && templ.height() > 0
        && templ.width() <= image.width()
        && templ.height() <= image.height()
}

impl ImageOps for CpuImageOps {
    fn resize(&self, src: &GrayImage, width: u32, height: u32) -> GrayImage {
        if src.dimensions() == (width, height) {
            return src.clone();
        }
        imageops::resize(src, width, height, FilterType::Triangle)
    }

    fn to_grayscale(&self, frame: &RawFrame) -> GrayImage {
        // ITU-R BT.601 weights in 14-bit fixed point.
        const WR: u32 = 4899;
        const WG: u32 = 9617;
        const WB: u32 = 1868;

        let mut out = GrayImage::new(frame.width, frame.height);
        for y in 0..frame.height {
            for x in 0..frame.width {
                let (r, g, b) = frame.rgb(x, y);
                let luma = (r as u32 * WR + g as u32 * WG + b as u32 * WB + (1 << 13)) >> 14;
                out.put_pixel(x, y, image::Luma([luma.min(255) as u8]));
            }
        }
        out
    }

    fn match_template_best(&self, image: &GrayImage, templ: &GrayImage) -> Option<Point> {
        if !fits(image, templ) {
            return None;
        }
        let centered = CenteredTemplate::new(templ);
        let stride = image.width() as usize;
        let pixels = image.as_raw();
        let max_x = (image.width() - templ.width()) as usize;
        let max_y = (image.height() - templ.height()) as usize;

        let mut best_score = f64::NEG_INFINITY;
        let mut best = Point::default();
        for y in 0..=max_y {
            for x in 0..=max_x {
                let (score, _, _) = centered.correlate(pixels, stride, x, y);
                if score > best_score {
                    best_score = score;
                    best = Point::new(x as i32, y as i32);
                }
            }
        }
        Some(best)
    }

    fn match_template_above(
        &self,
        image: &GrayImage,
        templ: &GrayImage,
        threshold: f32,
    ) -> Vec<Point> {
        if !fits(image, templ) {
            return Vec::new();
        }
        let centered = CenteredTemplate::new(templ);
        let n = (centered.width * centered.height) as f64;
        let stride = image.width() as usize;
        let pixels = image.as_raw();
        let max_x = (image.width() - templ.width()) as usize;
        let max_y = (image.height() - templ.height()) as usize;

        let mut hits = Vec::new();
        for y in 0..=max_y {
            for x in 0..=max_x {
                let (cross, sum, sum_sq) = centered.correlate(pixels, stride, x, y);
                let window_energy = sum_sq - sum * sum / n;
                let denom = (window_energy * centered.energy).sqrt();
                if denom <= f64::EPSILON {
                    continue;
                }
                if cross / denom > threshold as f64 {
                    hits.push(Point::new(x as i32, y as i32));
                }
            }
        }
        hits
    }
}

// ── Tests ────────────────────────────────────────────────────────
