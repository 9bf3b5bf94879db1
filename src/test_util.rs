use std::collections::VecDeque;
use std::sync::Mutex;

use image::{DynamicImage, Rgba, RgbaImage};

use crate::ocr::{OcrEngine, OcrError};
use crate::sheet::SheetLayout;

/// 50x70 px cards at 254 dpi (10 px/mm), 5/2 px spacing, 30/20 px margins.
pub(crate) fn grid_layout(rows: u32, cols: u32) -> SheetLayout {
    SheetLayout {
        dpi: 254.0,
        rows,
        cols,
        card_width_mm: 5.0,
        card_height_mm: 7.0,
        top_margin_mm: 2.0,
        left_margin_mm: 3.0,
        spacing_x_mm: 0.5,
        spacing_y_mm: 0.25,
    }
}

/// White sheet exactly large enough for `layout`, each card a distinct
/// solid colour.
pub(crate) fn grid_sheet(layout: &SheetLayout) -> RgbaImage {
    let step_x = layout.card_width_px() + layout.spacing_x_px();
    let step_y = layout.card_height_px() + layout.spacing_y_px();
    let width = layout.left_margin_px() + step_x * i64::from(layout.rows);
    let height = layout.top_margin_px() + step_y * i64::from(layout.cols);
    let mut sheet = RgbaImage::from_pixel(width as u32, height as u32, Rgba([255, 255, 255, 255]));
    for col in 0..layout.cols {
        for row in 0..layout.rows {
            let k = (col * layout.rows + row) as u8;
            let color = Rgba([20 + k * 30, 120, 220 - k * 20, 255]);
            let x0 = layout.left_margin_px() + i64::from(row) * step_x;
            let y0 = layout.top_margin_px() + i64::from(col) * step_y;
            for y in y0..y0 + layout.card_height_px() {
                for x in x0..x0 + layout.card_width_px() {
                    sheet.put_pixel(x as u32, y as u32, color);
                }
            }
        }
    }
    sheet
}

/// OCR stub answering from a script, recording the size of every image.
pub(crate) struct ScriptedOcr {
    responses: Mutex<VecDeque<String>>,
    fallback: Option<String>,
    calls: Mutex<Vec<(u32, u32)>>,
}

impl ScriptedOcr {
    pub(crate) fn fixed(text: &str) -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            fallback: Some(text.to_string()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Answers in order, then empty strings.
    pub(crate) fn sequence<'a>(texts: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            responses: Mutex::new(texts.into_iter().map(str::to_string).collect()),
            fallback: Some(String::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn failing() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            fallback: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn calls(&self) -> Vec<(u32, u32)> {
        self.calls.lock().expect("calls lock").clone()
    }
}

impl OcrEngine for ScriptedOcr {
    fn recognize(&self, image: &DynamicImage, _lang: &str) -> Result<String, OcrError> {
        self.calls
            .lock()
            .expect("calls lock")
            .push((image.width(), image.height()));
        if let Some(next) = self.responses.lock().expect("responses lock").pop_front() {
            return Ok(next);
        }
        match &self.fallback {
            Some(text) => Ok(text.clone()),
            None => Err(OcrError::Failed {
                status: "exit status: 1".to_string(),
                stderr: "engine unavailable".to_string(),
            }),
        }
    }
}
