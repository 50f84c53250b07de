//! Embedded grayscale anchor templates.
//!
//! The minimap corner anchors and the player icon are compiled in. The
//! portal icon varies between maps and is loaded at runtime instead (see
//! [`load_template`]).

use std::path::Path;

use image::GrayImage;

use crate::error::VantageError;

/// Horizontal offset from the top-left anchor to the minimap interior.
pub const MINIMAP_LEFT_BORDER: i32 = 9;
/// Vertical offset from the top-left anchor to the minimap interior.
pub const MINIMAP_TOP_BORDER: i32 = 5;
/// Inset from the bottom-right anchor's far corner to the minimap interior.
pub const MINIMAP_BOTTOM_BORDER: i32 = 9;

pub const MINIMAP_TL_WIDTH: u32 = 15;
pub const MINIMAP_TL_HEIGHT: u32 = 11;
/// Top-left minimap frame corner, 15×11, row-major.
#[rustfmt::skip]
const MINIMAP_TL_DATA: [u8; 165] = [
    0x1c, 0xb4, 0x17, 0x0e, 0x06, 0x05, 0x07, 0x06, 0x03, 0x06, 0x06, 0x04,
    0x06, 0x06, 0x03, 0x1e, 0xb4, 0x17, 0x15, 0x04, 0x06, 0x04, 0x04, 0x06,
    0x03, 0x05, 0x04, 0x07, 0x01, 0x06, 0x1e, 0xb2, 0x17, 0x15, 0x06, 0x03,
    0x06, 0x05, 0x05, 0x05, 0x04, 0x03, 0x03, 0x03, 0x02, 0x1e, 0xb4, 0x17,
    0x1d, 0x07, 0x05, 0x07, 0x01, 0x04, 0x16, 0x59, 0x97, 0xbf, 0xbe, 0xbf,
    0x1d, 0xb3, 0x16, 0x20, 0x03, 0x06, 0x03, 0x04, 0x2b, 0x96, 0xab, 0xbf,
    0xbf, 0xbf, 0xd3, 0x1d, 0xb4, 0x17, 0x2a, 0x07, 0x06, 0x05, 0x16, 0x97,
    0x97, 0xab, 0x4f, 0x06, 0x04, 0x05, 0x1d, 0xb4, 0x17, 0x2a, 0x03, 0x06,
    0x00, 0x4b, 0x97, 0xab, 0x07, 0x06, 0x05, 0x06, 0x06, 0x1d, 0xb4, 0x17,
    0x2a, 0x07, 0x06, 0x04, 0x71, 0x97, 0x50, 0x05, 0x06, 0x04, 0x06, 0x04,
    0x1f, 0xb4, 0x16, 0x35, 0x03, 0x06, 0x00, 0x83, 0x97, 0x07, 0x06, 0x06,
    0x07, 0x06, 0x07, 0x1d, 0xb2, 0x17, 0x35, 0x07, 0x06, 0x03, 0x83, 0x97,
    0x06, 0x07, 0x02, 0x07, 0x04, 0x06, 0x1d, 0xb3, 0x17, 0x33, 0x07, 0x03,
    0x03, 0x83, 0x97, 0x05, 0x06, 0x07, 0x06, 0x05, 0x07,
];

pub const MINIMAP_BR_WIDTH: u32 = 37;
pub const MINIMAP_BR_HEIGHT: u32 = 22;
/// Bottom-right minimap frame corner, 37×22, row-major.
#[rustfmt::skip]
const MINIMAP_BR_DATA: [u8; 814] = [
    0x02, 0x02, 0x01, 0x02, 0x02, 0x02, 0x02, 0x01, 0x02, 0x02, 0x01, 0x01,
    0x02, 0x01, 0x01, 0x01, 0x01, 0x02, 0x02, 0x02, 0x02, 0x02, 0x01, 0x02,
    0x02, 0x01, 0x01, 0x01, 0xdd, 0xdd, 0x02, 0x04, 0x05, 0x03, 0x31, 0xbf,
    0x29, 0x02, 0x02, 0x01, 0x02, 0x02, 0x02, 0x01, 0x02, 0x02, 0x02, 0x01,
    0x02, 0x02, 0x01, 0x02, 0x02, 0x02, 0x02, 0x02, 0x02, 0x02, 0x02, 0x02,
    0x02, 0x02, 0x02, 0x02, 0x01, 0xdd, 0xdd, 0x02, 0x04, 0x03, 0x04, 0x31,
    0xbf, 0x28, 0x03, 0x04, 0x04, 0x04, 0x05, 0x03, 0x04, 0x04, 0x04, 0x04,
    0x04, 0x05, 0x04, 0x05, 0x04, 0x05, 0x04, 0x04, 0x04, 0x03, 0x05, 0x05,
    0x04, 0x05, 0x03, 0x04, 0x06, 0x04, 0xdd, 0xdd, 0x02, 0x04, 0x05, 0x04,
    0x31, 0xbf, 0x2a, 0x05, 0x06, 0x05, 0x06, 0x04, 0x05, 0x06, 0x05, 0x04,
    0x03, 0x07, 0x04, 0x04, 0x06, 0x06, 0x04, 0x05, 0x05, 0x06, 0x02, 0x06,
    0x03, 0x04, 0x05, 0x03, 0x0d, 0x09, 0x06, 0xdd, 0xdd, 0x02, 0x05, 0x04,
    0x03, 0x31, 0xbf, 0x2a, 0x05, 0x02, 0x05, 0x06, 0x02, 0x07, 0x04, 0x05,
    0x05, 0x06, 0x05, 0x06, 0x03, 0x06, 0x05, 0x04, 0x05, 0x06, 0x03, 0x05,
    0x05, 0x06, 0x04, 0x07, 0x05, 0x0a, 0x02, 0x05, 0xdd, 0xdd, 0x02, 0x05,
    0x04, 0x05, 0x31, 0xbe, 0x28, 0x06, 0x04, 0x07, 0x05, 0x05, 0x04, 0x05,
    0x04, 0x06, 0x03, 0x06, 0x05, 0x06, 0x05, 0x05, 0x05, 0x07, 0x05, 0x06,
    0x05, 0x06, 0x05, 0x07, 0x04, 0x07, 0x04, 0x06, 0x05, 0xdd, 0xdd, 0x02,
    0x05, 0x04, 0x05, 0x31, 0xbf, 0x2a, 0x05, 0x07, 0x04, 0x05, 0x05, 0x05,
    0x05, 0x05, 0x06, 0x05, 0x05, 0x04, 0x05, 0x07, 0x04, 0x06, 0x05, 0x04,
    0x05, 0x06, 0x03, 0x03, 0x05, 0x05, 0x02, 0x06, 0x04, 0x06, 0xdd, 0xdd,
    0x02, 0x01, 0x04, 0x04, 0x30, 0xbf, 0x2a, 0x06, 0x03, 0x08, 0x03, 0x05,
    0x05, 0x06, 0x03, 0x04, 0x05, 0x06, 0x05, 0x03, 0x06, 0x06, 0x04, 0x05,
    0x05, 0x05, 0x05, 0x06, 0x05, 0x05, 0x06, 0x05, 0x05, 0x05, 0x03, 0xdd,
    0xdd, 0x02, 0x05, 0x05, 0x02, 0x31, 0xbf, 0x2a, 0x08, 0x0a, 0x05, 0x04,
    0x05, 0x04, 0x04, 0x06, 0x05, 0x06, 0x04, 0x06, 0x03, 0x05, 0x06, 0x03,
    0x05, 0x04, 0x05, 0x06, 0x04, 0x06, 0x05, 0x06, 0x05, 0x05, 0x05, 0x06,
    0xdd, 0xdd, 0x02, 0x05, 0x04, 0x04, 0x31, 0xbd, 0x29, 0x09, 0x08, 0x05,
    0x05, 0x06, 0x05, 0x06, 0x04, 0x04, 0x06, 0x06, 0x05, 0x05, 0x06, 0x06,
    0x05, 0x05, 0x06, 0x05, 0x02, 0x06, 0x05, 0x07, 0x04, 0x05, 0x04, 0x05,
    0x05, 0xdd, 0xdd, 0x02, 0x04, 0x05, 0x03, 0x31, 0xbf, 0x2a, 0x09, 0x09,
    0x03, 0x05, 0x05, 0x06, 0x05, 0x06, 0x06, 0x05, 0x05, 0x04, 0x04, 0x06,
    0x05, 0x04, 0x05, 0x06, 0x04, 0x06, 0x05, 0x06, 0x05, 0x0a, 0x05, 0x05,
    0x05, 0x79, 0xdd, 0xdd, 0x02, 0x05, 0x02, 0x04, 0x31, 0xc0, 0x2a, 0x07,
    0x05, 0x05, 0x06, 0x03, 0x05, 0x06, 0x04, 0x05, 0x05, 0x06, 0x05, 0x05,
    0x04, 0x05, 0x05, 0x07, 0x05, 0x05, 0x05, 0x05, 0x06, 0x05, 0x06, 0x05,
    0x06, 0x05, 0xdd, 0xdd, 0xa0, 0x02, 0x05, 0x05, 0x05, 0x31, 0xbf, 0x29,
    0x06, 0x04, 0x06, 0x03, 0x05, 0x05, 0x05, 0x05, 0x04, 0x03, 0x06, 0x04,
    0x05, 0x06, 0x06, 0x05, 0x04, 0x05, 0x06, 0x06, 0x04, 0x06, 0x05, 0x06,
    0x05, 0x79, 0xdd, 0xdd, 0xdd, 0x20, 0x02, 0x05, 0x03, 0x05, 0x41, 0xc0,
    0x29, 0xee, 0xee, 0xee, 0xee, 0xee, 0xee, 0xee, 0xee, 0xee, 0xee, 0xee,
    0xee, 0xee, 0xee, 0xee, 0xdd, 0xdd, 0xdd, 0xdd, 0xdd, 0xdd, 0xdd, 0xdd,
    0xdd, 0xdd, 0xdd, 0xdd, 0xdd, 0x4c, 0x02, 0x04, 0x03, 0x05, 0x10, 0x68,
    0xb2, 0x28, 0xee, 0xee, 0xee, 0xee, 0xee, 0xee, 0xee, 0xee, 0xee, 0xee,
    0xee, 0xee, 0xee, 0xee, 0xdd, 0xdd, 0xdd, 0xdd, 0xdd, 0xdd, 0xdd, 0xdd,
    0xdd, 0xdd, 0xdd, 0xbb, 0x80, 0x20, 0x02, 0x03, 0x04, 0x05, 0x04, 0x20,
    0xa6, 0x81, 0x21, 0x02, 0x02, 0x02, 0x02, 0x02, 0x02, 0x02, 0x02, 0x02,
    0x02, 0x02, 0x02, 0x02, 0x02, 0x02, 0x02, 0x02, 0x02, 0x02, 0x02, 0x02,
    0x02, 0x02, 0x02, 0x02, 0x02, 0x03, 0x03, 0x05, 0x04, 0x05, 0x04, 0x11,
    0x5a, 0xc0, 0x41, 0x17, 0x03, 0x04, 0x04, 0x05, 0x03, 0x05, 0x03, 0x03,
    0x05, 0x04, 0x05, 0x03, 0x03, 0x05, 0x05, 0x05, 0x03, 0x04, 0x04, 0x05,
    0x05, 0x05, 0x04, 0x05, 0x04, 0x05, 0x04, 0x04, 0x04, 0x05, 0x04, 0x10,
    0x41, 0xc1, 0x8e, 0x21, 0x10, 0x05, 0x04, 0x03, 0x04, 0x05, 0x04, 0x05,
    0x04, 0x03, 0x04, 0x05, 0x04, 0x05, 0x04, 0x04, 0x03, 0x05, 0x05, 0x04,
    0x05, 0x04, 0x02, 0x05, 0x05, 0x05, 0x02, 0x05, 0x04, 0x05, 0x02, 0x11,
    0x4c, 0xc1, 0xa4, 0x2a, 0x13, 0x0f, 0x54, 0x55, 0x54, 0x55, 0x54, 0x55,
    0x54, 0x55, 0x54, 0x47, 0x46, 0x47, 0x47, 0x47, 0x39, 0x3a, 0x2b, 0x1d,
    0x1d, 0x11, 0x05, 0x08, 0x05, 0x05, 0x04, 0x05, 0x04, 0x11, 0x11, 0x41,
    0x8b, 0xc0, 0x99, 0x36, 0x19, 0x11, 0x10, 0x21, 0x21, 0x21, 0x21, 0x21,
    0x21, 0x21, 0x21, 0x21, 0x21, 0x21, 0x21, 0x21, 0x21, 0x21, 0x21, 0x21,
    0x21, 0x21, 0x21, 0x21, 0x21, 0x21, 0x21, 0x31, 0x41, 0x50, 0x78, 0x99,
    0xbf, 0xb3, 0x5b, 0x23, 0x16, 0x12, 0x0d, 0x12, 0xc0, 0xbf, 0xc0, 0xc0,
    0xc0, 0xc0, 0xbf, 0xc0, 0xc0, 0xbf, 0xc0, 0xc0, 0xbf, 0xc0, 0xbf, 0xc0,
    0xbf, 0xc3, 0xc1, 0xc0, 0xbf, 0xc0, 0xc0, 0xc0, 0xc0, 0xc0, 0xa6, 0xa7,
    0x75, 0x4f, 0x27, 0x1c, 0x13, 0x0e, 0x13, 0x0e, 0x13, 0x2a, 0x2a, 0x2a,
    0x2a, 0x2a, 0x2a, 0x29, 0x2a, 0x2a, 0x2a, 0x2a, 0x2a, 0x2a, 0x2a, 0x2a,
    0x2a, 0x2c, 0x34, 0x30, 0x2a, 0x2a, 0x2a, 0x2a, 0x2a, 0x2a, 0x2a, 0x25,
    0x25, 0x1e, 0x18, 0x10, 0x12, 0x0f, 0x13, 0x0e, 0x13, 0x12,
];

pub const PLAYER_WIDTH: u32 = 8;
pub const PLAYER_HEIGHT: u32 = 8;
/// Player marker on the minimap, 8×8, row-major.
#[rustfmt::skip]
const PLAYER_DATA: [u8; 64] = [
    0xaf, 0x88, 0x33, 0x33, 0x33, 0x33, 0x88, 0xb0, 0x88, 0x33, 0x8b, 0xdc,
    0xdc, 0x8b, 0x33, 0x88, 0x33, 0x8b, 0xdc, 0xd6, 0xd6, 0xdc, 0x8b, 0x33,
    0x33, 0xdc, 0xd6, 0xd6, 0xd6, 0xd6, 0xdc, 0x33, 0x33, 0xdc, 0xd6, 0xd6,
    0xd6, 0xd6, 0xdc, 0x33, 0x33, 0x8b, 0xdc, 0xd6, 0xd6, 0xdc, 0x8b, 0x33,
    0x88, 0x33, 0x8b, 0xdc, 0xdc, 0x8b, 0x33, 0x88, 0xaf, 0x88, 0x33, 0x33,
    0x33, 0x33, 0x88, 0xb0,
];

/// Smallest width a localized minimap may have.
pub const MIN_TEMPLATE_WIDTH: i32 = max_i32(MINIMAP_TL_WIDTH as i32, MINIMAP_BR_WIDTH as i32);
/// Smallest height a localized minimap may have.
pub const MIN_TEMPLATE_HEIGHT: i32 = max_i32(MINIMAP_TL_HEIGHT as i32, MINIMAP_BR_HEIGHT as i32);

const fn max_i32(a: i32, b: i32) -> i32 {
    if a > b { a } else { b }
}

fn gray(width: u32, height: u32, data: &[u8]) -> GrayImage {
    GrayImage::from_fn(width, height, |x, y| {
        image::Luma([data[(y * width + x) as usize]])
    })
}

// ── Templates ────────────────────────────────────────────────────

/// Reference images used by the state extractor.
#[derive(Debug, Clone)]
pub struct Templates {
    pub minimap_tl: GrayImage,
    pub minimap_br: GrayImage,
    pub player: GrayImage,
    /// Portal search is disabled while this is `None`.
    pub portal: Option<GrayImage>,
}

impl Templates {
    /// The compiled-in anchors, without a portal template.
    pub fn embedded() -> Self {
        Self {
            minimap_tl: gray(MINIMAP_TL_WIDTH, MINIMAP_TL_HEIGHT, &MINIMAP_TL_DATA),
            minimap_br: gray(MINIMAP_BR_WIDTH, MINIMAP_BR_HEIGHT, &MINIMAP_BR_DATA),
            player: gray(PLAYER_WIDTH, PLAYER_HEIGHT, &PLAYER_DATA),
            portal: None,
        }
    }

    pub fn with_portal(mut self, portal: GrayImage) -> Self {
        self.portal = Some(portal);
        self
    }
}

impl Default for Templates {
    fn default() -> Self {
        Self::embedded()
    }
}

/// Load an image file as an 8-bit grayscale template.
pub fn load_template(path: &Path) -> Result<GrayImage, VantageError> {
    let img = image::open(path)
        .map_err(|e| VantageError::Template(format!("{}: {e}", path.display())))?;
    let gray = img.to_luma8();
    if gray.width() == 0 || gray.height() == 0 {
        return Err(VantageError::Template(format!(
            "{}: template is empty",
            path.display()
        )));
    }
    Ok(gray)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_dimensions() {
        let t = Templates::embedded();
        assert_eq!(t.minimap_tl.dimensions(), (15, 11));
        assert_eq!(t.minimap_br.dimensions(), (37, 22));
        assert_eq!(t.player.dimensions(), (8, 8));
        assert!(t.portal.is_none());
    }

    #[test]
    fn min_extent_is_larger_anchor() {
        assert_eq!(MIN_TEMPLATE_WIDTH, 37);
        assert_eq!(MIN_TEMPLATE_HEIGHT, 22);
    }

    #[test]
    fn missing_template_file_is_an_error() {
        let err = load_template(Path::new("/nonexistent/portal.png")).unwrap_err();
        assert!(matches!(err, VantageError::Template(_)));
    }
}
