//! Raster helpers on top of `image`/`imageproc`: rotation, tiling and
//! masked pasting.

use image::{GrayImage, Luma, Rgba, RgbaImage};
use imageproc::geometric_transformations::{Interpolation, rotate_about_center};

/// Number of counter-clockwise quarter turns for `degrees`, if it is a
/// multiple of 90.
pub fn quarter_turns(degrees: f64) -> Option<u32> {
    let normalized = degrees.rem_euclid(360.0);
    if normalized.rem_euclid(90.0).abs() > f64::EPSILON {
        return None;
    }
    Some((normalized / 90.0).round() as u32 % 4)
}

/// Rotate counter-clockwise by `degrees`.
///
/// Quarter turns are exact and swap the canvas dimensions; any other angle
/// rotates about the centre on a same-size canvas, filling uncovered pixels
/// with transparency.
pub fn rotate_rgba(image: &RgbaImage, degrees: f64) -> RgbaImage {
    match quarter_turns(degrees) {
        Some(0) => image.clone(),
        Some(1) => image::imageops::rotate270(image),
        Some(2) => image::imageops::rotate180(image),
        Some(_) => image::imageops::rotate90(image),
        None => rotate_about_center(
            image,
            -(degrees.to_radians() as f32),
            Interpolation::Bilinear,
            Rgba([0, 0, 0, 0]),
        ),
    }
}

/// Grayscale variant of [`rotate_rgba`]; uncovered pixels become white.
pub fn rotate_gray(image: &GrayImage, degrees: f64) -> GrayImage {
    match quarter_turns(degrees) {
        Some(0) => image.clone(),
        Some(1) => image::imageops::rotate270(image),
        Some(2) => image::imageops::rotate180(image),
        Some(_) => image::imageops::rotate90(image),
        None => rotate_about_center(
            image,
            -(degrees.to_radians() as f32),
            Interpolation::Bilinear,
            Luma([255]),
        ),
    }
}

/// Repeat `patch` from the top-left corner until a `width x height`
/// transparent canvas is covered.
pub fn tile_fill(patch: &RgbaImage, width: u32, height: u32) -> RgbaImage {
    let mut canvas = RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 0]));
    let (step_x, step_y) = patch.dimensions();
    if step_x == 0 || step_y == 0 {
        return canvas;
    }
    for y in (0..height).step_by(step_y as usize) {
        for x in (0..width).step_by(step_x as usize) {
            image::imageops::replace(&mut canvas, patch, i64::from(x), i64::from(y));
        }
    }
    canvas
}

/// Paste `src` onto `dst` at `(x, y)`, weighting every channel by the alpha
/// of `mask` (which is aligned with `src`). Pixels outside `dst`, `src` or
/// `mask` are left untouched.
pub fn paste_with_mask(dst: &mut RgbaImage, src: &RgbaImage, x: i64, y: i64, mask: &RgbaImage) {
    let width = src.width().min(mask.width());
    let height = src.height().min(mask.height());
    for sy in 0..height {
        for sx in 0..width {
            let dx = x + i64::from(sx);
            let dy = y + i64::from(sy);
            if dx < 0 || dy < 0 || dx >= i64::from(dst.width()) || dy >= i64::from(dst.height()) {
                continue;
            }
            let weight = u32::from(mask.get_pixel(sx, sy).0[3]);
            if weight == 0 {
                continue;
            }
            let source = src.get_pixel(sx, sy).0;
            let target = dst.get_pixel_mut(dx as u32, dy as u32);
            for (channel, value) in target.0.iter_mut().enumerate() {
                let blended =
                    (u32::from(source[channel]) * weight + u32::from(*value) * (255 - weight) + 127) / 255;
                *value = blended as u8;
            }
        }
    }
}
