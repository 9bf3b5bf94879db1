use super::font::{FontMetrics, measure_text_height_px, measure_text_width_px};

pub const BASE_FONT_SIZE: u32 = 100;
pub const FONT_SIZE_STEP: u32 = 2;
/// Smallest size tried before giving up on a region.
pub const MIN_FONT_SIZE: u32 = 2;
/// Text may use at most `1 / FIT_RATIO` of the box in each direction.
pub const FIT_RATIO: f32 = 1.2;
/// Two-glyph probe covering an ascender and a descender; its height is the
/// line box used for fitting and line advance.
pub const LINE_PROBE: &str = "jN";

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("text does not fit a {width}x{height} box at any font size down to {min_size}")]
pub struct LayoutError {
    pub width: u32,
    pub height: u32,
    pub min_size: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextFit {
    pub font_size: f32,
    /// Probe line height at `font_size`.
    pub line_height: f32,
    pub lines: Vec<String>,
}

/// Largest font size, from 100 down in steps of 2, at which the widest line
/// fits `floor(width / 1.2)` and the stacked line boxes fit
/// `floor(height / 1.2)`.
pub fn fit_text(
    text: &str,
    width: u32,
    height: u32,
    font: Option<&FontMetrics>,
) -> Result<TextFit, LayoutError> {
    let lines: Vec<String> = text.lines().map(str::to_string).collect();
    let max_width = (width as f32 / FIT_RATIO).floor();
    let max_height = (height as f32 / FIT_RATIO).floor();
    let line_count = lines.len() as f32;

    for size in (MIN_FONT_SIZE..=BASE_FONT_SIZE)
        .rev()
        .step_by(FONT_SIZE_STEP as usize)
    {
        let font_size = size as f32;
        let line_height = measure_text_height_px(LINE_PROBE, font_size, font);
        let widest = lines
            .iter()
            .map(|line| measure_text_width_px(line, font_size, font))
            .fold(0.0, f32::max);
        if widest <= max_width && line_height * line_count <= max_height {
            return Ok(TextFit {
                font_size,
                line_height,
                lines,
            });
        }
    }

    Err(LayoutError {
        width,
        height,
        min_size: MIN_FONT_SIZE,
    })
}
