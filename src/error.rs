use crate::geometry::PixelRect;
use crate::ocr::OcrError;
use crate::overlay::LayoutError;

/// Errors raised by the slicing, extraction and overlay stages.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("{what} {rect} exceeds source image {width}x{height}")]
    OutOfBounds {
        what: String,
        rect: PixelRect,
        width: u32,
        height: u32,
    },
    #[error("region `{name}` has an empty rectangle ({x0}, {y0}, {x1}, {y1})")]
    InvalidRegion {
        name: String,
        x0: f64,
        y0: f64,
        x1: f64,
        y1: f64,
    },
    #[error("card type `{alias}`: {reason}")]
    InvalidSpec { alias: String, reason: String },
    #[error(transparent)]
    Ocr(#[from] OcrError),
    #[error(transparent)]
    Layout(#[from] LayoutError),
    #[error("failed to render text: {0}")]
    Render(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
