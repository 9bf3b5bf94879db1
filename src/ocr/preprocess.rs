use image::{GrayImage, Luma, RgbaImage};
use imageproc::contrast::{ThresholdType, threshold};

const BRIGHTNESS: f32 = 1.4;
const CONTRAST: f32 = 1.4;
const BORDER_PX: u32 = 60;
const THRESHOLD: u8 = 150;

/// Prepare a region crop for OCR: desaturate, brighten and add contrast by
/// 1.4, pad with a 60px white border, then binarize at luminance 150.
///
/// The constants are fixed; they are tuned for small printed card fonts.
pub fn enhance(image: &RgbaImage) -> GrayImage {
    let gray = desaturate(image);
    let bright = brighten(&gray, BRIGHTNESS);
    let contrasted = add_contrast(&bright, CONTRAST);
    let padded = pad_white(&contrasted, BORDER_PX);
    threshold(&padded, THRESHOLD, ThresholdType::Binary)
}

fn desaturate(image: &RgbaImage) -> GrayImage {
    let (width, height) = image.dimensions();
    let mut luma = GrayImage::new(width, height);
    for (x, y, pixel) in image.enumerate_pixels() {
        let [r, g, b, _] = pixel.0;
        let value = (u32::from(r) * 19595 + u32::from(g) * 38470 + u32::from(b) * 7471 + 0x8000) >> 16;
        luma.put_pixel(x, y, Luma([value.min(255) as u8]));
    }
    luma
}

fn brighten(image: &GrayImage, factor: f32) -> GrayImage {
    let mut output = image.clone();
    for pixel in output.pixels_mut() {
        pixel[0] = clamp_u8(pixel[0] as f32 * factor);
    }
    output
}

fn add_contrast(image: &GrayImage, factor: f32) -> GrayImage {
    let count = u64::from(image.width()) * u64::from(image.height());
    if count == 0 {
        return image.clone();
    }
    let sum: u64 = image.pixels().map(|p| u64::from(p[0])).sum();
    let mean = (sum as f32 / count as f32 + 0.5).floor();
    let mut output = image.clone();
    for pixel in output.pixels_mut() {
        pixel[0] = clamp_u8(mean + (pixel[0] as f32 - mean) * factor);
    }
    output
}

fn pad_white(image: &GrayImage, border: u32) -> GrayImage {
    let (width, height) = image.dimensions();
    let mut output = GrayImage::from_pixel(width + border * 2, height + border * 2, Luma([255]));
    image::imageops::replace(&mut output, image, i64::from(border), i64::from(border));
    output
}

fn clamp_u8(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}
