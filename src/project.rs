//! Project files: one sheet layout plus the card types printed on it.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use serde::Deserialize;

use crate::card_type::CardTypeSpec;
use crate::error::Error;
use crate::geometry::{DEFAULT_BG_BOX_SIZE, Region};
use crate::sheet::SheetLayout;

#[derive(Debug, Clone, PartialEq)]
pub struct Project {
    pub sheet: SheetLayout,
    /// Card types in declaration order, bases already applied.
    pub card_types: Vec<CardTypeSpec>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ProjectFile {
    sheet: SheetLayout,
    #[serde(default)]
    base: BTreeMap<String, TypeDecl>,
    #[serde(default)]
    card_type: Vec<TypeDecl>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct TypeDecl {
    alias: Option<String>,
    extends: Option<String>,
    marker_region: Option<String>,
    marker_value: Option<String>,
    id_region: Option<String>,
    #[serde(default)]
    numeric: Vec<String>,
    #[serde(default)]
    region: Vec<RegionDecl>,
}

fn default_renders() -> bool {
    true
}

fn default_bg_box_size() -> u32 {
    DEFAULT_BG_BOX_SIZE
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RegionDecl {
    name: String,
    x0: f64,
    x1: f64,
    y0: f64,
    y1: f64,
    #[serde(default = "default_bg_box_size")]
    bg_box_size: u32,
    #[serde(default = "default_renders")]
    renders: bool,
    rotate: Option<f64>,
}

impl RegionDecl {
    fn to_region(&self) -> Region {
        let mut region = Region::new(self.name.clone(), self.x0, self.x1, self.y0, self.y1)
            .with_bg_box_size(self.bg_box_size);
        if !self.renders {
            region = region.hidden();
        }
        if let Some(angle) = self.rotate {
            region = region.rotated(angle);
        }
        region
    }
}

impl TypeDecl {
    /// The declaration on its own, without its base.
    fn own_spec(&self, alias: &str) -> Result<CardTypeSpec> {
        let mut seen = HashSet::new();
        let mut spec = CardTypeSpec::new(alias);
        for decl in &self.region {
            if !seen.insert(decl.name.as_str()) {
                return Err(Error::InvalidSpec {
                    alias: alias.to_string(),
                    reason: format!("region `{}` declared twice", decl.name),
                }
                .into());
            }
            spec = spec.with_region(decl.to_region());
        }
        spec.marker_region = self.marker_region.clone();
        spec.marker_value = self.marker_value.clone();
        spec.id_region = self.id_region.clone();
        for name in &self.numeric {
            spec = spec.with_numeric(name.clone());
        }
        Ok(spec)
    }
}

impl Project {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read project: {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("invalid project: {}", path.display()))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: ProjectFile = toml::from_str(content).context("failed to parse project")?;
        if file.sheet.rows == 0 || file.sheet.cols == 0 {
            bail!("sheet must have at least one row and one column");
        }
        if !(file.sheet.dpi > 0.0) {
            bail!("sheet dpi must be positive");
        }

        let mut bases = BTreeMap::new();
        for name in file.base.keys() {
            resolve_base(name, &file.base, &mut bases, &mut Vec::new())?;
        }

        let mut card_types: Vec<CardTypeSpec> = Vec::with_capacity(file.card_type.len());
        for decl in &file.card_type {
            let alias = decl
                .alias
                .as_deref()
                .map(str::trim)
                .filter(|alias| !alias.is_empty())
                .ok_or_else(|| anyhow!("card type without an alias"))?;
            if card_types.iter().any(|spec| spec.alias == alias) {
                bail!("card type `{}` declared twice", alias);
            }
            let mut spec = decl.own_spec(alias)?;
            if let Some(parent) = decl.extends.as_deref() {
                let base = bases
                    .get(parent)
                    .or_else(|| card_types.iter().find(|spec| spec.alias == parent))
                    .ok_or_else(|| anyhow!("card type `{}` extends unknown base `{}`", alias, parent))?;
                spec = spec.extending(base);
            }
            spec.validate()?;
            card_types.push(spec);
        }

        Ok(Self {
            sheet: file.sheet,
            card_types,
        })
    }

    pub fn card_type(&self, alias: &str) -> Option<&CardTypeSpec> {
        self.card_types.iter().find(|spec| spec.alias == alias)
    }
}

fn resolve_base(
    name: &str,
    decls: &BTreeMap<String, TypeDecl>,
    resolved: &mut BTreeMap<String, CardTypeSpec>,
    chain: &mut Vec<String>,
) -> Result<CardTypeSpec> {
    if let Some(spec) = resolved.get(name) {
        return Ok(spec.clone());
    }
    if chain.iter().any(|seen| seen == name) {
        bail!("base `{}` extends itself ({} -> {})", name, chain.join(" -> "), name);
    }
    let decl = decls
        .get(name)
        .ok_or_else(|| anyhow!("unknown base `{}`", name))?;
    if decl.alias.is_some() {
        bail!("base `{}` must not declare an alias", name);
    }
    chain.push(name.to_string());
    let mut spec = decl.own_spec(name)?;
    if let Some(parent) = decl.extends.as_deref() {
        let base = resolve_base(parent, decls, resolved, chain)?;
        spec = spec.extending(&base);
    }
    chain.pop();
    resolved.insert(name.to_string(), spec.clone());
    Ok(spec)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LURE: &str = r#"
[sheet]
dpi = 600
rows = 3
cols = 3
card_width_mm = 62.1
card_height_mm = 88.35

[base.lure]
marker_region = "type_name"
id_region = "card_id"
numeric = ["card_id"]

[[card_type]]
alias = "enhance"
extends = "lure"
marker_value = "ENHANCE"

  [[card_type.region]]
  name = "type_name"
  x0 = 0.8
  x1 = 7.7
  y0 = 60.1
  y1 = 61.5
  bg_box_size = 3

  [[card_type.region]]
  name = "card_id"
  x0 = 55.4
  x1 = 60.5
  y0 = 78
  y1 = 80.7
  renders = false

  [[card_type.region]]
  name = "text"
  x0 = 13
  x1 = 61
  y0 = 63
  y1 = 78.7
"#;

    #[test]
    fn parses_sheet_and_applies_base() {
        let project = Project::from_toml_str(LURE).expect("parse");
        assert_eq!(project.sheet.dpi, 600.0);
        assert_eq!(project.sheet.spacing_x_mm, 1.0);
        assert_eq!(project.sheet.top_margin_mm, 0.0);

        let spec = project.card_type("enhance").expect("enhance");
        assert_eq!(spec.marker_region.as_deref(), Some("type_name"));
        assert_eq!(spec.marker_value.as_deref(), Some("ENHANCE"));
        assert_eq!(spec.id_region.as_deref(), Some("card_id"));
        assert!(spec.is_numeric("card_id"));
        let names: Vec<_> = spec.regions.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["type_name", "card_id", "text"]);
        assert_eq!(spec.region("type_name").unwrap().bg_box_size, 3);
        assert_eq!(spec.region("text").unwrap().bg_box_size, DEFAULT_BG_BOX_SIZE);
        assert!(!spec.region("card_id").unwrap().renders);
    }

    #[test]
    fn card_type_can_extend_earlier_card_type() {
        let content = format!(
            "{LURE}\n[[card_type]]\nalias = \"variant\"\nextends = \"enhance\"\nmarker_value = \"VARIANT\"\n  [[card_type.region]]\n  name = \"text\"\n  x0 = 1\n  x1 = 2\n  y0 = 1\n  y1 = 2\n  rotate = -90\n"
        );
        let project = Project::from_toml_str(&content).expect("parse");
        let spec = project.card_type("variant").expect("variant");
        let names: Vec<_> = spec.regions.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["type_name", "card_id", "text"]);
        assert_eq!(spec.region("text").unwrap().rotate, Some(-90.0));
        assert_eq!(spec.marker_value.as_deref(), Some("VARIANT"));
    }

    #[test]
    fn unknown_base_is_rejected() {
        let content = LURE.replace("extends = \"lure\"", "extends = \"missing\"");
        let err = Project::from_toml_str(&content).unwrap_err();
        assert!(format!("{err:#}").contains("unknown base `missing`"));
    }

    #[test]
    fn duplicate_alias_is_rejected() {
        let extra = "\n[[card_type]]\nalias = \"enhance\"\n  [[card_type.region]]\n  name = \"t\"\n  x0 = 1\n  x1 = 2\n  y0 = 1\n  y1 = 2\n";
        let err = Project::from_toml_str(&format!("{LURE}{extra}")).unwrap_err();
        assert!(format!("{err:#}").contains("declared twice"));
    }

    #[test]
    fn marker_without_value_is_rejected() {
        let content = LURE.replace("marker_value = \"ENHANCE\"\n", "");
        let err = Project::from_toml_str(&content).unwrap_err();
        assert!(format!("{err:#}").contains("marker region set without a marker value"));
    }

    #[test]
    fn inverted_region_is_rejected() {
        let content = LURE.replace("x1 = 61", "x1 = 10");
        let err = Project::from_toml_str(&content).unwrap_err();
        assert!(format!("{err:#}").contains("text"));
    }

    #[test]
    fn base_cycle_is_rejected() {
        let content = "[sheet]\nrows = 1\ncols = 1\n[base.a]\nextends = \"b\"\n[base.b]\nextends = \"a\"\n";
        let err = Project::from_toml_str(content).unwrap_err();
        assert!(format!("{err:#}").contains("extends itself"));
    }

    #[test]
    fn rows_are_required() {
        let err = Project::from_toml_str("[sheet]\ncols = 1\n").unwrap_err();
        assert!(format!("{err:#}").contains("rows"));
    }
}
