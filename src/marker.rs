//! Grid slicing of a scanned sheet into per-card images.

use image::RgbaImage;
use tracing::{debug, info};

use crate::error::Result;
use crate::geometry::PixelRect;
use crate::sheet::SheetLayout;

/// One card cut out of a sheet.
#[derive(Debug, Clone)]
pub struct CardSlice {
    pub row: u32,
    pub col: u32,
    pub image: RgbaImage,
    /// Position of the card within the sheet, in sheet pixels.
    pub bounds: PixelRect,
}

pub struct CardMarker {
    layout: SheetLayout,
}

impl CardMarker {
    pub fn new(layout: SheetLayout) -> Self {
        Self { layout }
    }

    /// Sheet rectangle of the card at `(row, col)`.
    ///
    /// The row index advances along x and the column index along y, matching
    /// the column-major traversal of [`CardMarker::slice`].
    pub fn card_rect(&self, row: u32, col: u32) -> PixelRect {
        let width = self.layout.card_width_px();
        let height = self.layout.card_height_px();
        let x0 = self.layout.left_margin_px()
            + i64::from(row) * (width + self.layout.spacing_x_px());
        let y0 = self.layout.top_margin_px()
            + i64::from(col) * (height + self.layout.spacing_y_px());
        PixelRect::new(x0, y0, x0 + width, y0 + height)
    }

    /// Cut the sheet into `rows * cols` cards: all rows of column 0, then
    /// column 1, and so on. Slice `k` is `row = k % rows`, `col = k / rows`.
    pub fn slice(&self, sheet: &RgbaImage) -> Result<Vec<CardSlice>> {
        let (width, height) = sheet.dimensions();
        let mut cards = Vec::with_capacity(self.layout.card_count());
        for col in 0..self.layout.cols {
            for row in 0..self.layout.rows {
                debug!("cutting card {}x{} ...", col + 1, row + 1);
                let bounds = self.card_rect(row, col);
                let what = format!("card (row {}, col {})", row, col);
                let (x, y, w, h) = bounds.crop_bounds(&what, width, height)?;
                let image = image::imageops::crop_imm(sheet, x, y, w, h).to_image();
                cards.push(CardSlice {
                    row,
                    col,
                    image,
                    bounds,
                });
            }
        }
        info!("sheet split into {} cards", cards.len());
        Ok(cards)
    }
}
