//! Per-frame state extraction.
//!
//! Combines bar metrics (read from the full-colour capture) with the
//! minimap observation (read from its grayscale conversion).

use image::GrayImage;

use crate::imageops::ImageOps;
use crate::metrics::{Metrics, extract_metrics};
use crate::minimap::{DetectionConfig, Localization, MinimapState, MinimapTracker};
use crate::templates::Templates;
use crate::types::RawFrame;

/// Everything the remote consumer learns about one frame besides pixels.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FrameState {
    pub metrics: Metrics,
    pub minimap: MinimapState,
}

/// Stateful extractor; owns the sticky minimap localization.
pub struct StateExtractor {
    templates: Templates,
    tracker: MinimapTracker,
}

impl StateExtractor {
    pub fn new(templates: Templates, detection: DetectionConfig) -> Self {
        Self {
            templates,
            tracker: MinimapTracker::new(detection),
        }
    }

    /// Extract metrics from `frame` and the minimap state from `gray`,
    /// which must be `frame` converted to luma at full resolution.
    pub fn extract(
        &mut self,
        frame: &RawFrame,
        gray: &GrayImage,
        ops: &dyn ImageOps,
    ) -> FrameState {
        FrameState {
            metrics: extract_metrics(frame),
            minimap: self.tracker.observe(gray, &self.templates, ops),
        }
    }

    pub fn localization(&self) -> Localization {
        self.tracker.localization()
    }

    /// Drop the cached minimap box.
    pub fn reset_minimap(&mut self) {
        self.tracker.reset();
    }

    pub fn templates(&self) -> &Templates {
        &self.templates
    }
}
