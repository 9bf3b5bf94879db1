//! OCR seam: the [`OcrEngine`] capability, the fixed enhancement pipeline and
//! text cleanup applied to every recognised region.

mod preprocess;
mod tesseract;
mod text;

use std::time::Duration;

use image::{DynamicImage, GrayImage, RgbaImage};

use crate::error::Result;
use crate::geometry::Region;
use crate::surface::rotate_gray;

pub use preprocess::enhance;
pub use tesseract::TesseractEngine;
pub use text::{clean_recognized, normalize_numeric};

#[derive(thiserror::Error, Debug)]
pub enum OcrError {
    #[error("failed to run {binary} (is it installed?): {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },
    #[error("ocr engine failed ({status}): {stderr}")]
    Failed { status: String, stderr: String },
    #[error("ocr engine timed out after {0:?}")]
    Timeout(Duration),
    #[error("{0}")]
    Language(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Encode(#[from] image::ImageError),
}

/// Text recognition capability. The concrete engine is injected so the
/// extraction code never depends on a particular OCR binding.
pub trait OcrEngine {
    fn recognize(&self, image: &DynamicImage, lang: &str) -> Result<String, OcrError>;
}

impl<T: OcrEngine + ?Sized> OcrEngine for &T {
    fn recognize(&self, image: &DynamicImage, lang: &str) -> Result<String, OcrError> {
        (**self).recognize(image, lang)
    }
}

impl<T: OcrEngine + ?Sized> OcrEngine for Box<T> {
    fn recognize(&self, image: &DynamicImage, lang: &str) -> Result<String, OcrError> {
        (**self).recognize(image, lang)
    }
}

/// Output of [`recognize_area`].
#[derive(Debug, Clone)]
pub struct Recognized {
    pub text: String,
    /// Enhanced (and rotated) image handed to the engine.
    pub enhanced: GrayImage,
    /// Untouched crop of the region.
    pub original: RgbaImage,
}

/// Crop `region` out of `card`, enhance it, undo its rotation and run OCR.
pub fn recognize_area<E: OcrEngine + ?Sized>(
    engine: &E,
    card: &RgbaImage,
    region: &Region,
    dpi: f64,
    lang: &str,
) -> Result<Recognized> {
    let rect = region.pixel_rect(dpi);
    let what = format!("region `{}`", region.name);
    let (x, y, w, h) = rect.crop_bounds(&what, card.width(), card.height())?;
    let original = image::imageops::crop_imm(card, x, y, w, h).to_image();

    let mut enhanced = enhance(&original);
    if let Some(angle) = region.rotate {
        enhanced = rotate_gray(&enhanced, angle);
    }

    let raw = engine.recognize(&DynamicImage::ImageLuma8(enhanced.clone()), lang)?;
    Ok(Recognized {
        text: clean_recognized(&raw),
        enhanced,
        original,
    })
}
