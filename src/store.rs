//! On-disk translation project layout.
//!
//! Each matched card gets `{root}/{alias}/{card_id}/` holding `card.json`
//! (sheet coordinates and one `str` per region), the original crop
//! `card.png`, the overlay `card_tr.png` and the composite `card_comp.png`.
//! An existing `card.json` is never overwritten: its texts are merged back
//! into a fresh extraction, so edited translations survive reprocessing.

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::extract::CardInstance;

pub const CARD_JSON: &str = "card.json";
pub const CARD_PNG: &str = "card.png";
pub const OVERLAY_PNG: &str = "card_tr.png";
pub const COMPOSITE_PNG: &str = "card_comp.png";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredCard {
    pub coords: [i64; 4],
    pub areas: BTreeMap<String, StoredArea>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredArea {
    #[serde(rename = "str")]
    pub text: String,
}

impl StoredCard {
    pub fn from_card(card: &CardInstance) -> Self {
        let areas = card
            .regions
            .iter()
            .map(|r| (r.name.clone(), StoredArea { text: r.text.clone() }))
            .collect();
        Self {
            coords: card.bounds.as_array(),
            areas,
        }
    }

    /// Overwrite region texts of `card` with the stored ones. Returns how
    /// many regions were updated.
    pub fn merge_into(&self, card: &mut CardInstance) -> usize {
        let mut merged = 0;
        for (name, area) in &self.areas {
            match card.region_mut(name) {
                Some(record) => {
                    record.text = area.text.clone();
                    merged += 1;
                }
                None => debug!("stored area `{}` is not declared any more", name),
            }
        }
        merged
    }
}

/// What [`CardStore::prepare`] found on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prepared {
    /// No translation file existed; one was created from the extraction.
    Created,
    /// A translation file existed and its texts were merged in.
    Merged,
}

#[derive(Debug, Clone)]
pub struct CardStore {
    root: PathBuf,
}

impl CardStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Card directory below the root. Both parts become single path
    /// components, so OCR text in `card_id` cannot leave the root.
    pub fn card_dir(&self, alias: &str, card_id: &str) -> PathBuf {
        self.root.join(path_segment(alias)).join(path_segment(card_id))
    }

    pub fn load(&self, alias: &str, card_id: &str) -> Result<Option<StoredCard>> {
        let path = self.card_dir(alias, card_id).join(CARD_JSON);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)
            .with_context(|| format!("failed to read translation file: {}", path.display()))?;
        let stored = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse translation file: {}", path.display()))?;
        Ok(Some(stored))
    }

    /// Create the card directory and either seed it (`card.json` and
    /// `card.png`) or merge the existing translation into `card`.
    pub fn prepare(&self, alias: &str, card_id: &str, card: &mut CardInstance) -> Result<Prepared> {
        let dir = self.card_dir(alias, card_id);
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create card directory: {}", dir.display()))?;

        if let Some(stored) = self.load(alias, card_id)? {
            let merged = stored.merge_into(card);
            info!(
                "{}/{}: reusing {} ({} texts merged)",
                alias, card_id, CARD_JSON, merged
            );
            return Ok(Prepared::Merged);
        }

        write_png_if_absent(&dir.join(CARD_PNG), &card.image)?;
        let json_path = dir.join(CARD_JSON);
        info!("{}/{}: generating {}", alias, card_id, CARD_JSON);
        write_json_if_absent(&dir, &json_path, &StoredCard::from_card(card))?;
        Ok(Prepared::Created)
    }

    /// Write the regenerated overlay and composite images.
    pub fn write_outputs(
        &self,
        alias: &str,
        card_id: &str,
        overlay: &RgbaImage,
        composite: &RgbaImage,
    ) -> Result<()> {
        let dir = self.card_dir(alias, card_id);
        for (name, image) in [(OVERLAY_PNG, overlay), (COMPOSITE_PNG, composite)] {
            let path = dir.join(name);
            image
                .save_with_format(&path, image::ImageFormat::Png)
                .with_context(|| format!("failed to write image: {}", path.display()))?;
        }
        Ok(())
    }
}

/// `raw` as one file name: separators and control characters become `_`, and
/// a name made only of dots (or nothing) is replaced.
pub fn path_segment(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|ch| {
            if matches!(ch, '/' | '\\' | ':') || ch.is_control() {
                '_'
            } else {
                ch
            }
        })
        .collect();
    if cleaned.chars().all(|ch| ch == '.') {
        return "_".repeat(cleaned.len().max(1));
    }
    cleaned
}

fn write_png_if_absent(path: &Path, image: &RgbaImage) -> Result<()> {
    let file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == ErrorKind::AlreadyExists => {
            debug!("keeping existing {}", path.display());
            return Ok(());
        }
        Err(err) => {
            return Err(err).with_context(|| format!("failed to create image: {}", path.display()));
        }
    };
    let mut writer = BufWriter::new(file);
    image
        .write_to(&mut writer, image::ImageFormat::Png)
        .with_context(|| format!("failed to write image: {}", path.display()))?;
    writer
        .flush()
        .with_context(|| format!("failed to write image: {}", path.display()))?;
    Ok(())
}

fn write_json_if_absent(dir: &Path, path: &Path, stored: &StoredCard) -> Result<()> {
    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("failed to create temp file in {}", dir.display()))?;
    serde_json::to_writer_pretty(&mut tmp, stored)
        .with_context(|| format!("failed to serialize {}", path.display()))?;
    tmp.flush()
        .with_context(|| format!("failed to write {}", path.display()))?;
    tmp.persist_noclobber(path)
        .map_err(|err| err.error)
        .with_context(|| format!("refusing to overwrite translation file: {}", path.display()))?;
    Ok(())
}
