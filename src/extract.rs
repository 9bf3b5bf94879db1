//! Card classification and region extraction.

use std::collections::BTreeMap;

use image::{GrayImage, RgbaImage};
use tracing::{debug, info};

use crate::card_type::CardTypeSpec;
use crate::error::Result;
use crate::geometry::{PixelRect, Region};
use crate::marker::CardSlice;
use crate::ocr::{OcrEngine, normalize_numeric, recognize_area};
use crate::pipeline::CancelFlag;
use crate::surface::tile_fill;

/// Offset of the background sample from the region's top-right corner.
const BG_SAMPLE_INSET: u32 = 3;

/// Everything extracted for one region of one card.
#[derive(Debug, Clone)]
pub struct RegionRecord {
    pub name: String,
    /// Recognised text; replaced by the translation before rendering.
    pub text: String,
    /// Region rectangle in card pixels.
    pub rect: PixelRect,
    /// Tiled background patch covering the region; only for rendered regions.
    pub background: Option<RgbaImage>,
    pub original: RgbaImage,
    pub enhanced: GrayImage,
    pub renders: bool,
    pub rotate: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct CardInstance {
    /// 0-based position of the card in the sheet slice order.
    pub index: usize,
    pub image: RgbaImage,
    /// Card rectangle within the sheet.
    pub bounds: PixelRect,
    pub regions: Vec<RegionRecord>,
}

impl CardInstance {
    pub fn region(&self, name: &str) -> Option<&RegionRecord> {
        self.regions.iter().find(|r| r.name == name)
    }

    pub fn region_mut(&mut self, name: &str) -> Option<&mut RegionRecord> {
        self.regions.iter_mut().find(|r| r.name == name)
    }

    pub fn texts(&self) -> BTreeMap<String, String> {
        self.regions
            .iter()
            .map(|r| (r.name.clone(), r.text.clone()))
            .collect()
    }

    pub fn card_id(&self, spec: &CardTypeSpec) -> String {
        spec.card_id(self.index, &self.texts())
    }
}

/// Immutable settings for a [`CardClassifier`].
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    pub dpi: f64,
    pub lang: String,
}

pub struct CardClassifier<'a, E: OcrEngine + ?Sized> {
    engine: &'a E,
    config: ClassifierConfig,
    cancel: Option<CancelFlag>,
}

impl<'a, E: OcrEngine + ?Sized> CardClassifier<'a, E> {
    pub fn new(engine: &'a E, config: ClassifierConfig) -> Self {
        Self {
            engine,
            config,
            cancel: None,
        }
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Whether `card` carries the marker of `spec`. Specs without a marker
    /// accept every card.
    pub fn has_marker(&self, spec: &CardTypeSpec, card: &RgbaImage) -> Result<bool> {
        let Some((region, expected)) = spec.marker() else {
            return Ok(true);
        };
        let found = recognize_area(self.engine, card, region, self.config.dpi, &self.config.lang)?;
        debug!(
            "marker `{}`: expected `{}`, found `{}`",
            region.name, expected, found.text
        );
        Ok(spec.matches_marker(&found.text))
    }

    /// Keep the cards that match `spec` and extract all of its regions.
    ///
    /// Surviving cards keep their original slice index; non-matching cards
    /// are skipped, not renumbered. An inconsistent `spec` is rejected before
    /// any OCR runs.
    pub fn extract(&self, spec: &CardTypeSpec, cards: &[CardSlice]) -> Result<Vec<CardInstance>> {
        spec.validate()?;
        let mut matched = Vec::new();
        for (index, card) in cards.iter().enumerate() {
            if self.cancel.as_ref().is_some_and(CancelFlag::is_cancelled) {
                info!("extraction of `{}` cancelled after {} cards", spec.alias, index);
                break;
            }
            if !self.has_marker(spec, &card.image)? {
                continue;
            }
            let regions = self.extract_regions(spec, &card.image)?;
            matched.push(CardInstance {
                index,
                image: card.image.clone(),
                bounds: card.bounds,
                regions,
            });
        }
        info!("`{}`: {} of {} cards matched", spec.alias, matched.len(), cards.len());
        Ok(matched)
    }

    fn extract_regions(&self, spec: &CardTypeSpec, card: &RgbaImage) -> Result<Vec<RegionRecord>> {
        let mut records = Vec::with_capacity(spec.regions.len());
        for region in &spec.regions {
            records.push(self.extract_region(spec, region, card)?);
        }
        Ok(records)
    }

    fn extract_region(
        &self,
        spec: &CardTypeSpec,
        region: &Region,
        card: &RgbaImage,
    ) -> Result<RegionRecord> {
        let found = recognize_area(self.engine, card, region, self.config.dpi, &self.config.lang)?;
        let text = if spec.is_numeric(&region.name) {
            normalize_numeric(&found.text)
        } else {
            found.text
        };
        let background = region
            .renders
            .then(|| sample_background(&found.original, region.bg_box_size));
        Ok(RegionRecord {
            name: region.name.clone(),
            text,
            rect: region.pixel_rect(self.config.dpi),
            background,
            original: found.original,
            enhanced: found.enhanced,
            renders: region.renders,
            rotate: region.rotate,
        })
    }
}

/// Sample a `box_size` square near the top-right corner of `crop` and tile it
/// over the crop's full size.
pub fn sample_background(crop: &RgbaImage, box_size: u32) -> RgbaImage {
    let (width, height) = crop.dimensions();
    let box_w = box_size.clamp(1, width.max(1));
    let box_h = box_size.clamp(1, height.max(1));
    let x = width.saturating_sub(box_w + BG_SAMPLE_INSET);
    let y = BG_SAMPLE_INSET.min(height.saturating_sub(box_h));
    let patch = image::imageops::crop_imm(crop, x, y, box_w, box_h).to_image();
    tile_fill(&patch, width, height)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::marker::CardMarker;
    use crate::test_util::{ScriptedOcr, grid_layout, grid_sheet};
    use image::Rgba;

    fn config() -> ClassifierConfig {
        ClassifierConfig {
            dpi: 254.0,
            lang: "eng".to_string(),
        }
    }

    fn slices(rows: u32, cols: u32) -> Vec<CardSlice> {
        let layout = grid_layout(rows, cols);
        let sheet = grid_sheet(&layout);
        CardMarker::new(layout).slice(&sheet).expect("slice")
    }

    fn event_spec() -> CardTypeSpec {
        CardTypeSpec::new("event")
            .with_marker("type_name", "EVENT")
            .with_id_region("card_id")
            .with_numeric("card_id")
            .with_region(Region::new("type_name", 0.5, 3.0, 0.5, 1.5))
            .with_region(Region::new("card_id", 3.0, 4.5, 6.0, 6.8).hidden())
            .with_region(Region::new("text", 0.5, 4.5, 2.0, 5.5).with_bg_box_size(2))
    }

    #[test]
    fn non_matching_cards_keep_original_indices() {
        let cards = slices(2, 2);
        // marker OCR per card, then the three regions of each matching card
        let ocr = ScriptedOcr::sequence([
            "unit",
            "event", "EVENT", "1o7", "Strike",
            "fate",
            "Event", "Event", "D9\nx", "Hold",
        ]);
        let classifier = CardClassifier::new(&ocr, config());
        let spec = event_spec();
        let matched = classifier.extract(&spec, &cards).expect("extract");

        let indices: Vec<_> = matched.iter().map(|c| c.index).collect();
        assert_eq!(indices, vec![1, 3]);
        assert_eq!(matched[0].region("card_id").unwrap().text, "107");
        assert_eq!(matched[0].card_id(&spec), "2-107");
        assert_eq!(matched[1].card_id(&spec), "4-09");
        assert_eq!(matched[1].region("text").unwrap().text, "Hold");
        assert_eq!(matched[1].bounds, cards[3].bounds);
    }

    #[test]
    fn records_follow_region_flags() {
        let cards = slices(1, 1);
        let ocr = ScriptedOcr::fixed("EVENT");
        let matched = CardClassifier::new(&ocr, config())
            .extract(&event_spec(), &cards)
            .expect("extract");
        let card = &matched[0];
        let names: Vec<_> = card.regions.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["type_name", "card_id", "text"]);

        let hidden = card.region("card_id").unwrap();
        assert!(!hidden.renders);
        assert!(hidden.background.is_none());
        assert_eq!(hidden.text, "");

        let text = card.region("text").unwrap();
        assert_eq!(text.rect, PixelRect::new(5, 20, 45, 55));
        let bg = text.background.as_ref().expect("background");
        assert_eq!(bg.dimensions(), (40, 35));
        assert_eq!(text.original.dimensions(), (40, 35));
    }

    #[test]
    fn spec_without_marker_accepts_every_card() {
        let cards = slices(2, 1);
        let spec = CardTypeSpec::new("all").with_region(Region::new("text", 0.5, 4.5, 2.0, 5.5));
        let ocr = ScriptedOcr::fixed("X");
        let matched = CardClassifier::new(&ocr, config()).extract(&spec, &cards).expect("extract");
        assert_eq!(matched.len(), 2);
        assert_eq!(ocr.calls().len(), 2);
    }

    #[test]
    fn ocr_failure_aborts_extraction() {
        let cards = slices(1, 1);
        let err = CardClassifier::new(&ScriptedOcr::failing(), config())
            .extract(&event_spec(), &cards)
            .unwrap_err();
        assert!(matches!(err, Error::Ocr(_)));
    }

    #[test]
    fn dangling_marker_region_is_rejected_before_ocr() {
        let cards = slices(2, 2);
        let spec = CardTypeSpec::new("event")
            .with_marker("type", "EVENT")
            .with_region(Region::new("text", 0.5, 4.5, 2.0, 5.5));
        let ocr = ScriptedOcr::fixed("unit");
        let err = CardClassifier::new(&ocr, config())
            .extract(&spec, &cards)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidSpec { .. }));
        assert!(ocr.calls().is_empty());
    }

    #[test]
    fn marker_region_without_value_is_rejected() {
        let cards = slices(1, 1);
        let mut spec = event_spec();
        spec.marker_value = None;
        let err = CardClassifier::new(&ScriptedOcr::fixed("unit"), config())
            .extract(&spec, &cards)
            .unwrap_err();
        assert!(err.to_string().contains("without a marker value"));
    }

    #[test]
    fn cancelled_extraction_stops_between_cards() {
        let cards = slices(2, 2);
        let cancel = CancelFlag::default();
        cancel.cancel();
        let spec = CardTypeSpec::new("all").with_region(Region::new("text", 0.5, 4.5, 2.0, 5.5));
        let matched = CardClassifier::new(&ScriptedOcr::fixed("X"), config())
            .with_cancel(cancel)
            .extract(&spec, &cards)
            .expect("extract");
        assert!(matched.is_empty());
    }

    #[test]
    fn background_samples_top_right_patch() {
        let mut crop = RgbaImage::from_pixel(20, 10, Rgba([0, 0, 0, 255]));
        for y in 3..5 {
            for x in 15..17 {
                crop.put_pixel(x, y, Rgba([250, 240, 230, 255]));
            }
        }
        let bg = sample_background(&crop, 2);
        assert_eq!(bg.dimensions(), (20, 10));
        assert!(bg.pixels().all(|p| p == &Rgba([250, 240, 230, 255])));
    }

    #[test]
    fn background_of_tiny_region_is_clamped() {
        let crop = RgbaImage::from_pixel(4, 2, Rgba([9, 9, 9, 255]));
        let bg = sample_background(&crop, 13);
        assert_eq!(bg.dimensions(), (4, 2));
        assert!(bg.pixels().all(|p| p.0[3] == 255));
    }
}
