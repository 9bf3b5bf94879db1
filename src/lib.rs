use anyhow::{Result, anyhow};
use std::path::{Path, PathBuf};

pub mod card_type;
pub mod error;
pub mod extract;
pub mod geometry;
pub mod logging;
pub mod marker;
pub mod ocr;
pub mod overlay;
pub mod pipeline;
pub mod project;
pub mod settings;
pub mod sheet;
pub mod store;
mod surface;
#[cfg(test)]
mod test_util;

pub use card_type::CardTypeSpec;
pub use error::Error;
pub use extract::{CardClassifier, CardInstance, ClassifierConfig, RegionRecord};
pub use geometry::{PixelRect, Region};
pub use marker::{CardMarker, CardSlice};
pub use ocr::{OcrEngine, OcrError, TesseractEngine};
pub use overlay::{LayoutError, OverlayComposer, TextRenderer};
pub use pipeline::{CancelFlag, CardTypeReport, InspectedCard, Pipeline, SheetReport, process_sheet};
pub use project::Project;
pub use settings::Settings;
pub use sheet::SheetLayout;
pub use store::CardStore;

/// Default region reported by inspect mode.
pub const DEFAULT_INSPECT_AREA: &str = "text";

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub project: Option<String>,
    pub image: Option<String>,
    pub target_dir: Option<String>,
    pub settings_path: Option<String>,
    pub lang: Option<String>,
    pub inspect: Option<String>,
    pub area: Option<String>,
    pub list_langs: bool,
}

pub fn run(config: Config) -> Result<String> {
    let settings_path = config.settings_path.as_deref().map(Path::new);
    let mut settings = settings::load_settings(settings_path)?;
    if let Some(lang) = config.lang.as_deref().filter(|lang| !lang.trim().is_empty()) {
        settings.ocr_lang = lang.trim().to_string();
    }

    let engine = TesseractEngine::new(&settings.ocr_binary)
        .with_psm(settings.ocr_psm)
        .with_timeout(settings.ocr_timeout());

    if config.list_langs {
        return Ok(engine.list_languages()?.join("\n"));
    }

    let project_path = config
        .project
        .as_deref()
        .ok_or_else(|| anyhow!("--project is required"))?;
    let image = config
        .image
        .as_deref()
        .ok_or_else(|| anyhow!("no sheet image given"))?;
    let project = Project::load(Path::new(project_path))?;
    settings.ocr_lang = engine.check_languages(&settings.ocr_lang)?;

    let image_path = Path::new(image);
    let target = target_dir_for(image_path, config.target_dir.as_deref());

    if let Some(alias) = config.inspect.as_deref() {
        let area = config.area.as_deref().unwrap_or(DEFAULT_INSPECT_AREA);
        let sheet = pipeline::load_sheet(image_path)?;
        let composer = pipeline::overlay_composer(&settings)?;
        let cards = Pipeline::new(&project, &engine, &settings.ocr_lang, composer, &target)
            .inspect(&sheet, alias, area)?;
        return Ok(format_inspect(alias, area, &cards));
    }

    let report = process_sheet(
        image_path,
        &project,
        &settings,
        &engine,
        &target,
        &CancelFlag::default(),
    )?;
    Ok(format_report(&report))
}

/// Output root for a sheet: the explicit target, else the image path
/// without its extension.
pub fn target_dir_for(image: &Path, target_dir: Option<&str>) -> PathBuf {
    match target_dir.filter(|dir| !dir.trim().is_empty()) {
        Some(dir) => PathBuf::from(dir),
        None => image.with_extension(""),
    }
}

fn format_report(report: &SheetReport) -> String {
    let mut lines = vec![format!("{} cards sliced", report.cards_sliced)];
    for card_type in &report.card_types {
        lines.push(card_type.to_string());
    }
    if report.cancelled {
        lines.push("cancelled".to_string());
    }
    lines.join("\n")
}

fn format_inspect(alias: &str, area: &str, cards: &[InspectedCard]) -> String {
    let mut lines = vec![format!("{} cards of `{}`", cards.len(), alias)];
    for card in cards {
        lines.push(format!("#{} [{}] {}: {}", card.index, card.card_id, area, card.text));
        lines.push(format!("  {}", card.image_path.display()));
    }
    lines.join("\n")
}
