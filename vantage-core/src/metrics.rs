//! Status-bar fill estimation.
//!
//! Each bar is sampled along a single pixel row at a fixed distance from
//! the bottom of the client area. Pixels are classified by a colour
//! predicate and the fill fraction is the span between the first and the
//! last matching pixel, relative to the scanline length.
//!
//! This assumes a left-anchored bar that fills contiguously. A bar that
//! drains from the left, or one broken by overlaid text, reads as the
//! span of its outermost lit pixels.

use crate::types::RawFrame;

// ── Metrics ──────────────────────────────────────────────────────

/// Normalized fill fractions, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Metrics {
    pub hp: f32,
    pub mp: f32,
    pub exp: f32,
}

// ── Bar geometry ─────────────────────────────────────────────────

/// Colour classes of the three bars.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarColor {
    Red,
    BlueGreen,
    YellowGreen,
}

impl BarColor {
    /// Whether a pixel with these channel values belongs to the bar.
    pub fn matches(self, red: u8, green: u8, blue: u8) -> bool {
        let (r, g, b) = (red as f32, green as f32, blue as f32);
        match self {
            BarColor::Red => r > 0.0 && b / r < 0.7 && g / r < 0.7 && r / 255.0 > 0.5,
            BarColor::BlueGreen => b > 0.0 && r / b < 0.7 && b / 255.0 > 0.5,
            BarColor::YellowGreen => {
                g > 0.0 && b / g < 0.7 && g / 255.0 > 0.7 && r / 255.0 > 0.5
            }
        }
    }
}

/// Where a bar's scanline sits relative to the frame edges.
#[derive(Debug, Clone, Copy)]
pub struct BarSpec {
    pub name: &'static str,
    /// Rows above the bottom edge.
    pub bottom_margin: u32,
    /// First sampled column.
    pub left_margin: u32,
    /// Columns left unsampled at the right edge.
    pub right_margin: u32,
    pub color: BarColor,
}

pub const HP_BAR: BarSpec = BarSpec {
    name: "HP",
    bottom_margin: 45,
    left_margin: 527,
    right_margin: 584,
    color: BarColor::Red,
};

pub const MP_BAR: BarSpec = BarSpec {
    name: "MP",
    bottom_margin: 29,
    left_margin: 527,
    right_margin: 584,
    color: BarColor::BlueGreen,
};

pub const EXP_BAR: BarSpec = BarSpec {
    name: "EXP",
    bottom_margin: 3,
    left_margin: 15,
    right_margin: 0,
    color: BarColor::YellowGreen,
};

// ── Extraction ───────────────────────────────────────────────────

/// Fill fraction of a classified scanline.
///
/// `(last_match - first_match) / (len - 1)`, or `0` when nothing
/// matches or the scanline is shorter than two pixels.
pub fn fill_fraction(classified: &[bool]) -> f32 {
    if classified.len() < 2 {
        return 0.0;
    }
    let first = classified.iter().position(|&m| m);
    let last = classified.iter().rposition(|&m| m);
    match (first, last) {
        (Some(first), Some(last)) => (last - first) as f32 / (classified.len() - 1) as f32,
        _ => 0.0,
    }
}

/// Classify every pixel on `bar`'s scanline.
///
/// Returns an empty scanline when the frame is too small to contain it.
pub fn sample_bar(frame: &RawFrame, bar: &BarSpec) -> Vec<bool> {
    if bar.bottom_margin == 0 || bar.bottom_margin > frame.height {
        return Vec::new();
    }
    let y = frame.height - bar.bottom_margin;
    let end = frame.width.saturating_sub(bar.right_margin);
    if bar.left_margin >= end {
        return Vec::new();
    }
    (bar.left_margin..end)
        .map(|x| {
            let (r, g, b) = frame.rgb(x, y);
            bar.color.matches(r, g, b)
        })
        .collect()
}

/// Measure a single bar.
pub fn measure_bar(frame: &RawFrame, bar: &BarSpec) -> f32 {
    fill_fraction(&sample_bar(frame, bar))
}

/// Measure the HP, MP and EXP bars of a full-resolution capture.
pub fn extract_metrics(frame: &RawFrame) -> Metrics {
    Metrics {
        hp: measure_bar(frame, &HP_BAR),
        mp: measure_bar(frame, &MP_BAR),
        exp: measure_bar(frame, &EXP_BAR),
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PixelFormat;

    const RED: [u8; 4] = [20, 30, 220, 255]; // BGRA
    const TEAL: [u8; 4] = [230, 180, 40, 255];
    const LIME: [u8; 4] = [40, 230, 200, 255];
    const GREY: [u8; 4] = [90, 90, 90, 255];

    fn blank(width: u32, height: u32) -> RawFrame {
        let data = GREY.repeat((width * height) as usize);
        RawFrame::packed(width, height, PixelFormat::Bgra8, data)
    }

    fn paint(frame: &mut RawFrame, y: u32, xs: std::ops::Range<u32>, px: [u8; 4]) {
        for x in xs {
            let off = (y * frame.stride + x * 4) as usize;
            frame.data[off..off + 4].copy_from_slice(&px);
        }
    }

    #[test]
    fn ten_pixel_scanline_scenario() {
        let row: Vec<bool> = (0..10).map(|i| (2..=6).contains(&i)).collect();
        let f = fill_fraction(&row);
        assert!((f - 4.0 / 9.0).abs() < 1e-6, "f = {f}");
        assert!((f - 0.444).abs() < 1e-3);
    }

    #[test]
    fn no_match_is_exactly_zero() {
        assert_eq!(fill_fraction(&[false; 32]), 0.0);
        assert_eq!(fill_fraction(&[]), 0.0);
        assert_eq!(fill_fraction(&[true]), 0.0);
    }

    #[test]
    fn full_row_is_one() {
        assert_eq!(fill_fraction(&[true; 8]), 1.0);
    }

    #[test]
    fn colour_predicates() {
        assert!(BarColor::Red.matches(220, 30, 20));
        assert!(!BarColor::Red.matches(0, 0, 0));
        assert!(!BarColor::Red.matches(100, 10, 10)); // too dark

        assert!(BarColor::BlueGreen.matches(40, 180, 230));
        assert!(!BarColor::BlueGreen.matches(200, 180, 230)); // too much red

        assert!(BarColor::YellowGreen.matches(200, 230, 40));
        assert!(!BarColor::YellowGreen.matches(100, 230, 40)); // red too low
        assert!(!BarColor::YellowGreen.matches(200, 150, 40)); // green too low
    }

    #[test]
    fn extracts_bars_from_frame() {
        let (w, h) = (1366, 768);
        let mut frame = blank(w, h);

        // HP scanline spans x in [527, w - 584) = 255 pixels; fill half.
        let hp_len = w - 584 - 527;
        paint(&mut frame, h - 45, 527..527 + hp_len / 2 + 1, RED);
        // MP fully lit.
        paint(&mut frame, h - 29, 527..w - 584, TEAL);
        // EXP lit only left of its sampled range.
        paint(&mut frame, h - 3, 0..15, LIME);

        let m = extract_metrics(&frame);
        assert!((m.hp - 0.5).abs() < 0.01, "hp = {}", m.hp);
        assert_eq!(m.mp, 1.0);
        assert_eq!(m.exp, 0.0);
    }

    #[test]
    fn tiny_frame_yields_zero() {
        let frame = blank(100, 20);
        let m = extract_metrics(&frame);
        assert_eq!(m, Metrics::default());
    }

    #[test]
    fn bounds_hold_for_noise() {
        let (w, h) = (800, 600);
        let mut frame = blank(w, h);
        let mut seed = 0x1234_5678u32;
        for px in frame.data.chunks_exact_mut(4) {
            seed = seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            px[0] = (seed >> 8) as u8;
            px[1] = (seed >> 16) as u8;
            px[2] = (seed >> 24) as u8;
        }
        let m = extract_metrics(&frame);
        for v in [m.hp, m.mp, m.exp] {
            assert!((0.0..=1.0).contains(&v));
        }
    }
}
