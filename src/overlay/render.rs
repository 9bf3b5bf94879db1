use std::io::Cursor;
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use image::RgbaImage;
use resvg::render;
use tiny_skia::Pixmap;
use usvg::{Options, Tree, fontdb};

use super::fit::TextFit;
use super::font::{FontMetrics, ascent_px};
use crate::error::{Error, Result};

/// Top-left corner of the first line inside a region.
pub const TEXT_ORIGIN: (f32, f32) = (4.0, 4.0);
/// Line advance as a multiple of the probe line height.
pub const LINE_SPACING: f32 = 1.25;

/// Draws fitted text onto background tiles through an SVG document rendered
/// by resvg.
pub struct TextRenderer {
    fontdb: Arc<fontdb::Database>,
    font: Option<FontMetrics>,
    family: Option<String>,
    color: String,
}

impl TextRenderer {
    /// With an explicit font only that face is loaded; otherwise system
    /// fonts are made available to the renderer.
    pub fn new(font: Option<FontMetrics>, family: Option<String>, color: impl Into<String>) -> Self {
        let mut db = fontdb::Database::new();
        match &font {
            Some(metrics) => db.load_font_data(metrics.data().to_vec()),
            None => db.load_system_fonts(),
        }
        let family = family
            .filter(|name| !name.trim().is_empty())
            .or_else(|| font.as_ref().and_then(|m| m.family().map(str::to_string)));
        Self {
            fontdb: Arc::new(db),
            font,
            family,
            color: color.into(),
        }
    }

    pub fn font(&self) -> Option<&FontMetrics> {
        self.font.as_ref()
    }

    /// Render `fit` on top of `tile`, first line at [`TEXT_ORIGIN`].
    pub fn draw(&self, tile: &RgbaImage, fit: &TextFit) -> Result<RgbaImage> {
        if fit.lines.iter().all(|line| line.trim().is_empty()) {
            return Ok(tile.clone());
        }
        let svg = self.build_svg(tile, fit)?;
        self.rasterize(&svg, tile.width(), tile.height())
    }

    fn build_svg(&self, tile: &RgbaImage, fit: &TextFit) -> Result<String> {
        let mut png = Vec::new();
        tile.write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
            .map_err(|err| Error::Render(format!("failed to encode background tile: {}", err)))?;
        let data_uri = format!("data:image/png;base64,{}", BASE64.encode(&png));
        let (width, height) = tile.dimensions();

        let mut svg = String::new();
        svg.push_str(&format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
            w = width,
            h = height
        ));
        svg.push_str(&format!(
            r#"<image href="{uri}" xlink:href="{uri}" x="0" y="0" width="{w}" height="{h}" preserveAspectRatio="none" image-rendering="optimizeSpeed"/>"#,
            uri = data_uri,
            w = width,
            h = height
        ));

        let ascent = ascent_px(fit.font_size, self.font.as_ref());
        let family_attr = self
            .family
            .as_deref()
            .map(|family| format!(r#" font-family="{}""#, escape_xml(family)))
            .unwrap_or_default();
        let (x, mut y) = TEXT_ORIGIN;
        for line in &fit.lines {
            if !line.trim().is_empty() {
                svg.push_str(&format!(
                    r#"<text x="{x}" y="{y}" font-size="{size}" fill="{color}"{family} xml:space="preserve">{text}</text>"#,
                    x = x,
                    y = y + ascent,
                    size = fit.font_size,
                    color = escape_xml(&self.color),
                    family = family_attr,
                    text = escape_xml(line)
                ));
            }
            y += fit.line_height * LINE_SPACING;
        }
        svg.push_str("</svg>");
        Ok(svg)
    }

    fn rasterize(&self, svg: &str, width: u32, height: u32) -> Result<RgbaImage> {
        let options = Options {
            fontdb: self.fontdb.clone(),
            ..Options::default()
        };
        let tree = Tree::from_str(svg, &options)
            .map_err(|err| Error::Render(format!("failed to parse SVG: {}", err)))?;
        let mut pixmap = Pixmap::new(width, height)
            .ok_or_else(|| Error::Render(format!("empty canvas {}x{}", width, height)))?;
        let mut pixmap_mut = pixmap.as_mut();
        render(&tree, tiny_skia::Transform::identity(), &mut pixmap_mut);

        let mut data = Vec::with_capacity(pixmap.pixels().len() * 4);
        for pixel in pixmap.pixels() {
            let color = pixel.demultiply();
            data.extend_from_slice(&[color.red(), color.green(), color.blue(), color.alpha()]);
        }
        RgbaImage::from_raw(width, height, data)
            .ok_or_else(|| Error::Render("failed to build image buffer from SVG".to_string()))
    }
}

fn escape_xml(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn renderer() -> TextRenderer {
        TextRenderer::new(None, Some("sans-serif".to_string()), "#000000")
    }

    fn fit(lines: &[&str]) -> TextFit {
        TextFit {
            font_size: 10.0,
            line_height: 10.0,
            lines: lines.iter().map(|l| l.to_string()).collect(),
        }
    }

    #[test]
    fn svg_places_lines_from_origin() {
        let tile = RgbaImage::from_pixel(60, 40, Rgba([200, 190, 180, 255]));
        let svg = renderer().build_svg(&tile, &fit(&["A & B", "", "C"])).expect("svg");
        // baseline = origin + 0.8 em, advance = 1.25 * line height
        assert!(svg.contains(r#"<text x="4" y="12" font-size="10""#));
        assert!(svg.contains(">A &amp; B</text>"));
        assert!(svg.contains(r#"<text x="4" y="37" font-size="10""#));
        assert!(svg.contains(r#"font-family="sans-serif""#));
        assert_eq!(svg.matches("<text").count(), 2);
    }

    #[test]
    fn draw_keeps_background_and_size() {
        let tile = RgbaImage::from_pixel(30, 20, Rgba([200, 190, 180, 255]));
        let out = renderer().draw(&tile, &fit(&["x"])).expect("draw");
        assert_eq!(out.dimensions(), (30, 20));
        assert_eq!(out.get_pixel(29, 19), &Rgba([200, 190, 180, 255]));
    }

    #[test]
    fn blank_text_returns_tile_untouched() {
        let tile = RgbaImage::from_pixel(8, 8, Rgba([1, 2, 3, 255]));
        assert_eq!(renderer().draw(&tile, &fit(&[" "])).expect("draw"), tile);
    }
}
