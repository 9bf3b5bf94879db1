//! Whole-sheet processing: slice, classify each declared card type, persist
//! and render every matched card.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result, anyhow, bail};
use image::RgbaImage;
use tracing::{error, info, warn};

use crate::card_type::CardTypeSpec;
use crate::extract::{CardClassifier, ClassifierConfig};
use crate::marker::{CardMarker, CardSlice};
use crate::ocr::OcrEngine;
use crate::overlay::{FALLBACK_FAMILIES, OverlayComposer, TextRenderer, composite, resolve_overlay_font};
use crate::project::Project;
use crate::settings::Settings;
use crate::store::{CardStore, Prepared, path_segment};

/// Directory under the target root that receives inspection crops.
pub const INSPECT_DIR: &str = "_inspect";

/// Cooperative cancellation, checked between cards.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegionFailure {
    pub card_id: String,
    pub region: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CardTypeReport {
    pub alias: String,
    /// Ids of the cards written, in slice order.
    pub card_ids: Vec<String>,
    /// Cards whose stored translation was merged back.
    pub merged: usize,
    pub failed_regions: Vec<RegionFailure>,
    /// Set when the card type aborted; cards written before remain.
    pub error: Option<String>,
}

impl CardTypeReport {
    fn new(alias: &str) -> Self {
        Self {
            alias: alias.to_string(),
            ..Self::default()
        }
    }
}

impl fmt::Display for CardTypeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} cards, {} failed regions",
            self.alias,
            self.card_ids.len(),
            self.failed_regions.len()
        )?;
        if let Some(err) = &self.error {
            write!(f, " (aborted: {err})")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SheetReport {
    pub cards_sliced: usize,
    pub card_types: Vec<CardTypeReport>,
    pub cancelled: bool,
}

/// One card seen by [`Pipeline::inspect`].
#[derive(Debug, Clone, PartialEq)]
pub struct InspectedCard {
    pub index: usize,
    pub card_id: String,
    pub text: String,
    pub image_path: PathBuf,
}

pub fn load_sheet(path: &Path) -> Result<RgbaImage> {
    let image = image::open(path)
        .with_context(|| format!("failed to open sheet image: {}", path.display()))?;
    Ok(image.to_rgba8())
}

/// Composer using the configured overlay font.
///
/// An explicit font path must load; otherwise a missing family falls back to
/// estimated metrics with a warning.
pub fn overlay_composer(settings: &Settings) -> Result<OverlayComposer> {
    let color = settings.overlay_text_color.clone();
    let family = settings.overlay_font_family.clone();
    if let Some(path) = settings.overlay_font_path.as_deref() {
        let font = resolve_overlay_font(Some(Path::new(path)), None, FALLBACK_FAMILIES)
            .with_context(|| format!("failed to load overlay font: {path}"))?;
        return Ok(OverlayComposer::new(TextRenderer::new(Some(font), family, color)));
    }
    let font = match resolve_overlay_font(None, family.as_deref(), FALLBACK_FAMILIES) {
        Ok(font) => Some(font),
        Err(err) => {
            warn!("no overlay font found, using estimated metrics: {:#}", err);
            None
        }
    };
    Ok(OverlayComposer::new(TextRenderer::new(font, family, color)))
}

/// Process the scan at `image_path` into `target_dir`.
pub fn process_sheet<E: OcrEngine + ?Sized>(
    image_path: &Path,
    project: &Project,
    settings: &Settings,
    engine: &E,
    target_dir: &Path,
    cancel: &CancelFlag,
) -> Result<SheetReport> {
    let sheet = load_sheet(image_path)?;
    let composer = overlay_composer(settings)?;
    info!("processing {} into {}", image_path.display(), target_dir.display());
    Pipeline::new(project, engine, &settings.ocr_lang, composer, target_dir)
        .with_cancel(cancel.clone())
        .run(&sheet)
}

pub struct Pipeline<'a, E: OcrEngine + ?Sized> {
    project: &'a Project,
    engine: &'a E,
    lang: String,
    composer: OverlayComposer,
    store: CardStore,
    cancel: CancelFlag,
}

impl<'a, E: OcrEngine + ?Sized> Pipeline<'a, E> {
    pub fn new(
        project: &'a Project,
        engine: &'a E,
        lang: &str,
        composer: OverlayComposer,
        target_dir: &Path,
    ) -> Self {
        Self {
            project,
            engine,
            lang: lang.to_string(),
            composer,
            store: CardStore::new(target_dir),
            cancel: CancelFlag::default(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    fn classifier(&self) -> CardClassifier<'a, E> {
        let config = ClassifierConfig {
            dpi: self.project.sheet.dpi,
            lang: self.lang.clone(),
        };
        CardClassifier::new(self.engine, config).with_cancel(self.cancel.clone())
    }

    fn slice(&self, sheet: &RgbaImage) -> Result<Vec<CardSlice>> {
        let slices = CardMarker::new(self.project.sheet.clone()).slice(sheet)?;
        Ok(slices)
    }

    /// Run every card type over `sheet`. Slicing errors abort the sheet; a
    /// failing card type is recorded and the next one still runs.
    pub fn run(&self, sheet: &RgbaImage) -> Result<SheetReport> {
        let slices = self.slice(sheet)?;
        let mut report = SheetReport {
            cards_sliced: slices.len(),
            ..SheetReport::default()
        };

        for spec in &self.project.card_types {
            if self.cancel.is_cancelled() {
                break;
            }
            let mut type_report = CardTypeReport::new(&spec.alias);
            if let Err(err) = self.process_type(spec, &slices, &mut type_report) {
                error!("card type `{}` failed: {:#}", spec.alias, err);
                type_report.error = Some(format!("{err:#}"));
            }
            report.card_types.push(type_report);
        }

        report.cancelled = self.cancel.is_cancelled();
        if report.cancelled {
            warn!("processing cancelled");
        }
        Ok(report)
    }

    fn process_type(
        &self,
        spec: &CardTypeSpec,
        slices: &[CardSlice],
        report: &mut CardTypeReport,
    ) -> Result<()> {
        let cards = self.classifier().extract(spec, slices)?;
        for mut card in cards {
            if self.cancel.is_cancelled() {
                break;
            }
            let card_id = card.card_id(spec);
            if self.store.prepare(&spec.alias, &card_id, &mut card)? == Prepared::Merged {
                report.merged += 1;
            }

            let outcome = self.composer.compose(&card);
            for (region, err) in outcome.failures {
                report.failed_regions.push(RegionFailure {
                    card_id: card_id.clone(),
                    region,
                    message: err.to_string(),
                });
            }
            let comp = composite(&card.image, &outcome.overlay);
            self.store
                .write_outputs(&spec.alias, &card_id, &outcome.overlay, &comp)?;
            info!("{}/{}: overlay written", spec.alias, card_id);
            report.card_ids.push(card_id);
        }
        Ok(())
    }

    /// Classify `sheet` for one card type and dump the enhanced pre-OCR crop
    /// of `area` for every matched card.
    pub fn inspect(&self, sheet: &RgbaImage, alias: &str, area: &str) -> Result<Vec<InspectedCard>> {
        let spec = self
            .project
            .card_type(alias)
            .ok_or_else(|| anyhow!("unknown card type `{}`", alias))?;
        if spec.region(area).is_none() {
            bail!("card type `{}` has no region `{}`", alias, area);
        }

        let slices = self.slice(sheet)?;
        let cards = self.classifier().extract(spec, &slices)?;
        let dir = self.store.root().join(INSPECT_DIR).join(path_segment(alias));
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create directory: {}", dir.display()))?;

        let mut inspected = Vec::with_capacity(cards.len());
        for card in &cards {
            let Some(record) = card.region(area) else {
                continue;
            };
            let card_id = card.card_id(spec);
            let image_path = dir.join(format!("{}-{}.png", path_segment(&card_id), path_segment(area)));
            record
                .enhanced
                .save_with_format(&image_path, image::ImageFormat::Png)
                .with_context(|| format!("failed to write image: {}", image_path.display()))?;
            inspected.push(InspectedCard {
                index: card.index,
                card_id,
                text: record.text.clone(),
                image_path,
            });
        }
        Ok(inspected)
    }
}
