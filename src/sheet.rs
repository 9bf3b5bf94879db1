use serde::{Deserialize, Serialize};

use crate::geometry::mm_to_px;

fn default_dpi() -> f64 {
    300.0
}

fn default_card_width_mm() -> f64 {
    60.0
}

fn default_card_height_mm() -> f64 {
    80.0
}

fn default_spacing_mm() -> f64 {
    1.0
}

/// Physical layout of the cards on a scanned sheet.
///
/// All lengths are millimetres and convert to pixels through the one `dpi`
/// scale factor. Bounds are not checked here: a layout larger than the scan
/// is reported by [`crate::marker::CardMarker`] when slicing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SheetLayout {
    #[serde(default = "default_dpi")]
    pub dpi: f64,
    pub rows: u32,
    pub cols: u32,
    #[serde(default = "default_card_width_mm")]
    pub card_width_mm: f64,
    #[serde(default = "default_card_height_mm")]
    pub card_height_mm: f64,
    #[serde(default)]
    pub top_margin_mm: f64,
    #[serde(default)]
    pub left_margin_mm: f64,
    #[serde(default = "default_spacing_mm")]
    pub spacing_x_mm: f64,
    #[serde(default = "default_spacing_mm")]
    pub spacing_y_mm: f64,
}

impl SheetLayout {
    pub fn new(rows: u32, cols: u32) -> Self {
        Self {
            dpi: default_dpi(),
            rows,
            cols,
            card_width_mm: default_card_width_mm(),
            card_height_mm: default_card_height_mm(),
            top_margin_mm: 0.0,
            left_margin_mm: 0.0,
            spacing_x_mm: default_spacing_mm(),
            spacing_y_mm: default_spacing_mm(),
        }
    }

    fn px(&self, mm: f64) -> i64 {
        mm_to_px(mm, self.dpi)
    }

    pub fn card_width_px(&self) -> i64 {
        self.px(self.card_width_mm)
    }

    pub fn card_height_px(&self) -> i64 {
        self.px(self.card_height_mm)
    }

    pub fn spacing_x_px(&self) -> i64 {
        self.px(self.spacing_x_mm)
    }

    pub fn spacing_y_px(&self) -> i64 {
        self.px(self.spacing_y_mm)
    }

    pub fn top_margin_px(&self) -> i64 {
        self.px(self.top_margin_mm)
    }

    pub fn left_margin_px(&self) -> i64 {
        self.px(self.left_margin_mm)
    }

    pub fn card_count(&self) -> usize {
        self.rows as usize * self.cols as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_original_layout() {
        let layout: SheetLayout = toml::from_str("rows = 2\ncols = 4").expect("parse layout");
        assert_eq!(layout, SheetLayout::new(2, 4));
        assert_eq!(layout.card_width_px(), 708);
        assert_eq!(layout.card_height_px(), 944);
        assert_eq!(layout.spacing_x_px(), 11);
        assert_eq!(layout.card_count(), 8);
    }

    #[test]
    fn every_length_uses_the_same_scale() {
        let mut layout = SheetLayout::new(1, 1);
        layout.dpi = 254.0;
        layout.card_width_mm = 5.0;
        layout.card_height_mm = 7.0;
        layout.top_margin_mm = 2.0;
        layout.left_margin_mm = 3.0;
        layout.spacing_x_mm = 0.5;
        layout.spacing_y_mm = 0.25;
        assert_eq!(layout.card_width_px(), 50);
        assert_eq!(layout.card_height_px(), 70);
        assert_eq!(layout.top_margin_px(), 20);
        assert_eq!(layout.left_margin_px(), 30);
        assert_eq!(layout.spacing_x_px(), 5);
        assert_eq!(layout.spacing_y_px(), 2);
    }
}
