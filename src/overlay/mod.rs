//! Localised overlay generation: translated text is fitted into each
//! rendered region, drawn over a tiled sample of the region's own
//! background and pasted onto a transparent card-sized canvas.

mod fit;
mod font;
mod render;

use image::{Rgba, RgbaImage};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::extract::{CardInstance, RegionRecord};
use crate::surface::{paste_with_mask, rotate_rgba};

pub use fit::{
    BASE_FONT_SIZE, FIT_RATIO, FONT_SIZE_STEP, LINE_PROBE, LayoutError, MIN_FONT_SIZE, TextFit,
    fit_text,
};
pub use font::{FontMetrics, load_font_metrics, resolve_overlay_font};
pub use render::{LINE_SPACING, TEXT_ORIGIN, TextRenderer};

/// Families tried when no overlay font is configured.
pub const FALLBACK_FAMILIES: &[&str] = &["Ubuntu", "DejaVu Sans", "Liberation Sans", "sans-serif"];

/// Overlay for one card plus the regions that could not be laid out.
#[derive(Debug)]
pub struct OverlayOutcome {
    pub overlay: RgbaImage,
    pub failures: Vec<(String, Error)>,
}

pub struct OverlayComposer {
    renderer: TextRenderer,
}

impl OverlayComposer {
    pub fn new(renderer: TextRenderer) -> Self {
        Self { renderer }
    }

    /// Render one region's tile in its final orientation, or `None` for
    /// regions that are not drawn.
    pub fn render_region(&self, record: &RegionRecord) -> Result<Option<RgbaImage>> {
        let Some(background) = record.background.as_ref().filter(|_| record.renders) else {
            return Ok(None);
        };
        let mut tile = background.clone();
        if let Some(angle) = record.rotate {
            tile = rotate_rgba(&tile, angle);
        }
        let (width, height) = tile.dimensions();
        let fit = fit_text(&record.text, width, height, self.renderer.font())?;
        debug!(
            "region `{}`: {} line(s) at {}px in {}x{}",
            record.name,
            fit.lines.len(),
            fit.font_size,
            width,
            height
        );
        let mut drawn = self.renderer.draw(&tile, &fit)?;
        if let Some(angle) = record.rotate {
            drawn = rotate_rgba(&drawn, -angle);
        }
        Ok(Some(drawn))
    }

    /// Build the transparent overlay for `card`.
    ///
    /// A region that fails to render is logged, left blank and reported in
    /// [`OverlayOutcome::failures`]; the other regions are still drawn.
    pub fn compose(&self, card: &CardInstance) -> OverlayOutcome {
        let width = card.bounds.width().max(0) as u32;
        let height = card.bounds.height().max(0) as u32;
        let mut overlay = RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 0]));
        let mut failures = Vec::new();

        for record in &card.regions {
            if !record.renders {
                debug!("skipping `{}` region", record.name);
                continue;
            }
            match self.render_region(record) {
                Ok(Some(tile)) => {
                    if let Some(mask) = &record.background {
                        paste_with_mask(&mut overlay, &tile, record.rect.x0, record.rect.y0, mask);
                    }
                }
                Ok(None) => {}
                Err(err) => {
                    warn!("region `{}` left blank: {}", record.name, err);
                    failures.push((record.name.clone(), err));
                }
            }
        }

        OverlayOutcome { overlay, failures }
    }
}

/// Alpha-composite `overlay` over the card image.
pub fn composite(card: &RgbaImage, overlay: &RgbaImage) -> RgbaImage {
    let mut out = card.clone();
    image::imageops::overlay(&mut out, overlay, 0, 0);
    out
}
