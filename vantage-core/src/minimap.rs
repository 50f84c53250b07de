//! Minimap localization and icon search.
//!
//! The minimap box is found once by matching its two frame corners
//! against the whole grayscale capture, then cached for the rest of the
//! session. Only a localized box permits the player / portal search;
//! until one is found every frame reports [`MinimapState::unlocalized`].

use image::GrayImage;
use image::imageops;
use tracing::{debug, info};

use crate::imageops::ImageOps;
use crate::protocol::PORTAL_CAPACITY;
use crate::templates::{
    MIN_TEMPLATE_HEIGHT, MIN_TEMPLATE_WIDTH, MINIMAP_BOTTOM_BORDER, MINIMAP_LEFT_BORDER,
    MINIMAP_TOP_BORDER, Templates,
};
use crate::types::Point;

/// Acceptance score for icon matches.
pub const DEFAULT_MATCH_THRESHOLD: f32 = 0.8;

/// Frames between full-capture anchor searches while unlocalized.
pub const DEFAULT_RELOCATE_INTERVAL: u32 = 24;

// ── MinimapBox ───────────────────────────────────────────────────

/// Interior of the minimap in frame coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MinimapBox {
    pub top_left: Point,
    pub bottom_right: Point,
}

impl MinimapBox {
    pub fn width(&self) -> i32 {
        self.bottom_right.x - self.top_left.x
    }

    pub fn height(&self) -> i32 {
        self.bottom_right.y - self.top_left.y
    }

    /// A box collapsed on either axis carries no region.
    pub fn is_degenerate(&self) -> bool {
        self.top_left.x == self.bottom_right.x || self.top_left.y == self.bottom_right.y
    }

    /// Whether the box lies entirely inside a `width × height` frame.
    pub fn fits(&self, width: u32, height: u32) -> bool {
        self.top_left.x >= 0
            && self.top_left.y >= 0
            && self.width() > 0
            && self.height() > 0
            && self.bottom_right.x as i64 <= width as i64
            && self.bottom_right.y as i64 <= height as i64
    }

    /// Build the box from the two corner-anchor match locations.
    ///
    /// The bottom-right corner never comes closer to the top-left than
    /// the larger anchor's extent, whatever the second match returned.
    pub fn from_anchors(tl_match: Point, br_match: Point, br_size: (u32, u32)) -> Self {
        let top_left = Point::new(
            tl_match.x + MINIMAP_LEFT_BORDER,
            tl_match.y + MINIMAP_TOP_BORDER,
        );
        let br_far = Point::new(br_match.x + br_size.0 as i32, br_match.y + br_size.1 as i32);
        let bottom_right = Point::new(
            (top_left.x + MIN_TEMPLATE_WIDTH).max(br_far.x - MINIMAP_BOTTOM_BORDER),
            (top_left.y + MIN_TEMPLATE_HEIGHT).max(br_far.y - MINIMAP_BOTTOM_BORDER),
        );
        Self {
            top_left,
            bottom_right,
        }
    }
}

/// Sticky localization state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Localization {
    Unlocalized,
    Localized(MinimapBox),
}

// ── MinimapState ─────────────────────────────────────────────────

/// Per-frame minimap observation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MinimapState {
    /// Extent of the localized region; `0 × 0` when unlocalized.
    pub width: u16,
    pub height: u16,
    /// Player icon center, relative to the region.
    pub player: Option<Point>,
    /// Portal icon centers, relative to the region. At most
    /// [`PORTAL_CAPACITY`] entries.
    pub portals: Vec<Point>,
}

impl MinimapState {
    pub fn unlocalized() -> Self {
        Self::default()
    }

    pub fn is_localized(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

// ── MinimapTracker ───────────────────────────────────────────────

/// Tuning for icon detection.
#[derive(Debug, Clone, Copy)]
pub struct DetectionConfig {
    pub player_threshold: f32,
    pub portal_threshold: f32,
    /// Collapse detections within this Chebyshev distance of an earlier
    /// one. `0` keeps every above-threshold pixel as its own detection.
    pub dedup_radius: u32,
    /// While unlocalized, search the whole capture for the anchors only
    /// once every this many frames. `0` or `1` searches every frame.
    pub relocate_interval: u32,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            player_threshold: DEFAULT_MATCH_THRESHOLD,
            portal_threshold: DEFAULT_MATCH_THRESHOLD,
            dedup_radius: 0,
            relocate_interval: DEFAULT_RELOCATE_INTERVAL,
        }
    }
}

/// Owns the cached minimap box and runs the per-frame icon search.
pub struct MinimapTracker {
    localization: Localization,
    config: DetectionConfig,
    /// Frames left before the next anchor search.
    cooldown: u32,
}

impl MinimapTracker {
    pub fn new(config: DetectionConfig) -> Self {
        Self {
            localization: Localization::Unlocalized,
            config,
            cooldown: 0,
        }
    }

    pub fn localization(&self) -> Localization {
        self.localization
    }

    /// Forget the cached box; the next frame searches the whole capture.
    pub fn reset(&mut self) {
        self.localization = Localization::Unlocalized;
        self.cooldown = 0;
    }

    /// Observe one grayscale frame.
    pub fn observe(
        &mut self,
        gray: &GrayImage,
        templates: &Templates,
        ops: &dyn ImageOps,
    ) -> MinimapState {
        if let Localization::Unlocalized = self.localization {
            self.try_locate(gray, templates, ops);
        }

        let bounds = match self.localization {
            Localization::Unlocalized => return MinimapState::unlocalized(),
            Localization::Localized(b) => b,
        };

        if !bounds.fits(gray.width(), gray.height()) {
            debug!(
                "cached minimap box no longer fits a {}x{} frame",
                gray.width(),
                gray.height()
            );
            return MinimapState::unlocalized();
        }

        let region = imageops::crop_imm(
            gray,
            bounds.top_left.x as u32,
            bounds.top_left.y as u32,
            bounds.width() as u32,
            bounds.height() as u32,
        )
        .to_image();

        let player = detect(
            &region,
            &templates.player,
            self.config.player_threshold,
            self.config.dedup_radius,
            ops,
        )
        .into_iter()
        .next();

        let portals = match &templates.portal {
            Some(portal) => {
                let mut found = detect(
                    &region,
                    portal,
                    self.config.portal_threshold,
                    self.config.dedup_radius,
                    ops,
                );
                found.truncate(PORTAL_CAPACITY);
                found
            }
            None => Vec::new(),
        };

        MinimapState {
            width: bounds.width().min(u16::MAX as i32) as u16,
            height: bounds.height().min(u16::MAX as i32) as u16,
            player,
            portals,
        }
    }
}

impl MinimapTracker {
    fn try_locate(&mut self, gray: &GrayImage, templates: &Templates, ops: &dyn ImageOps) {
        if self.cooldown > 0 {
            self.cooldown -= 1;
            return;
        }
        match locate(gray, templates, ops) {
            Some(found) => {
                info!(
                    "minimap localized at ({}, {}) size {}x{}",
                    found.top_left.x,
                    found.top_left.y,
                    found.width(),
                    found.height()
                );
                self.localization = Localization::Localized(found);
            }
            None => {
                self.cooldown = self.config.relocate_interval.saturating_sub(1);
                debug!("minimap not found; next search in {} frames", self.cooldown + 1);
            }
        }
    }
}

impl Default for MinimapTracker {
    fn default() -> Self {
        Self::new(DetectionConfig::default())
    }
}

// ── Internal ─────────────────────────────────────────────────────

/// Match both corner anchors and accept the box only if it is usable
/// on this frame.
fn locate(gray: &GrayImage, templates: &Templates, ops: &dyn ImageOps) -> Option<MinimapBox> {
    let tl = ops.match_template_best(gray, &templates.minimap_tl)?;
    let br = ops.match_template_best(gray, &templates.minimap_br)?;
    let found = MinimapBox::from_anchors(tl, br, templates.minimap_br.dimensions());
    if found.is_degenerate() || !found.fits(gray.width(), gray.height()) {
        debug!("rejected minimap candidate {found:?}");
        return None;
    }
    Some(found)
}

/// Centers of every above-threshold template match, in encounter order.
fn detect(
    region: &GrayImage,
    templ: &GrayImage,
    threshold: f32,
    dedup_radius: u32,
    ops: &dyn ImageOps,
) -> Vec<Point> {
    let half_w = templ.width() as i32 / 2;
    let half_h = templ.height() as i32 / 2;
    let centers = ops
        .match_template_above(region, templ, threshold)
        .into_iter()
        .map(|tl| Point::new(tl.x + half_w, tl.y + half_h));

    if dedup_radius == 0 {
        return centers.collect();
    }

    let radius = dedup_radius as i32;
    let mut kept: Vec<Point> = Vec::new();
    for c in centers {
        let near = kept
            .iter()
            .any(|k| (k.x - c.x).abs() <= radius && (k.y - c.y).abs() <= radius);
        if !near {
            kept.push(c);
        }
    }
    kept
}

// ── Tests ────────────────────────────────────────────────────────
