//! Physical-to-pixel geometry.
//!
//! Card layouts are authored in millimetres and converted with a single
//! scale factor `dpi / 25.4`. Conversion truncates toward zero, so two
//! identical millimetre rectangles always map to identical pixel rectangles.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const MM_PER_INCH: f64 = 25.4;

/// Default side of the square patch sampled for a region background, in pixels.
pub const DEFAULT_BG_BOX_SIZE: u32 = 13;

pub fn mm_to_px(mm: f64, dpi: f64) -> i64 {
    (dpi * mm / MM_PER_INCH) as i64
}

/// Half-open pixel rectangle `[x0, x1) x [y0, y1)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PixelRect {
    pub x0: i64,
    pub y0: i64,
    pub x1: i64,
    pub y1: i64,
}

impl PixelRect {
    pub const fn new(x0: i64, y0: i64, x1: i64, y1: i64) -> Self {
        Self { x0, y0, x1, y1 }
    }

    pub fn width(&self) -> i64 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> i64 {
        self.y1 - self.y0
    }

    pub fn as_array(&self) -> [i64; 4] {
        [self.x0, self.y0, self.x1, self.y1]
    }

    /// True when the rectangle is non-empty and lies fully inside a
    /// `width x height` image.
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.x0 >= 0
            && self.y0 >= 0
            && self.x1 > self.x0
            && self.y1 > self.y0
            && self.x1 <= i64::from(width)
            && self.y1 <= i64::from(height)
    }

    /// Validate against an image extent and return `(x, y, w, h)` ready for
    /// `image::imageops::crop_imm`. Nothing is clipped silently.
    pub fn crop_bounds(&self, what: &str, width: u32, height: u32) -> Result<(u32, u32, u32, u32)> {
        if !self.fits_within(width, height) {
            return Err(Error::OutOfBounds {
                what: what.to_string(),
                rect: *self,
                width,
                height,
            });
        }
        Ok((
            self.x0 as u32,
            self.y0 as u32,
            self.width() as u32,
            self.height() as u32,
        ))
    }
}

impl fmt::Display for PixelRect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {}, {})", self.x0, self.y0, self.x1, self.y1)
    }
}

/// A named rectangular area of a card, in millimetres relative to the card's
/// own top-left corner.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    pub name: String,
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
    /// Whether translated text is drawn back onto the card.
    pub renders: bool,
    /// Rotation in degrees; negative values turn clockwise (text running
    /// along the card is typically `-90`).
    pub rotate: Option<f64>,
    pub bg_box_size: u32,
}

impl Region {
    pub fn new(name: impl Into<String>, x0: f64, x1: f64, y0: f64, y1: f64) -> Self {
        Self {
            name: name.into(),
            x0,
            y0,
            x1,
            y1,
            renders: true,
            rotate: None,
            bg_box_size: DEFAULT_BG_BOX_SIZE,
        }
    }

    pub fn hidden(mut self) -> Self {
        self.renders = false;
        self
    }

    pub fn rotated(mut self, degrees: f64) -> Self {
        self.rotate = Some(degrees);
        self
    }

    pub fn with_bg_box_size(mut self, size: u32) -> Self {
        self.bg_box_size = size;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.x1 > self.x0 && self.y1 > self.y0 {
            return Ok(());
        }
        Err(Error::InvalidRegion {
            name: self.name.clone(),
            x0: self.x0,
            y0: self.y0,
            x1: self.x1,
            y1: self.y1,
        })
    }

    pub fn pixel_rect(&self, dpi: f64) -> PixelRect {
        PixelRect::new(
            mm_to_px(self.x0, dpi),
            mm_to_px(self.y0, dpi),
            mm_to_px(self.x1, dpi),
            mm_to_px(self.y1, dpi),
        )
    }
}
