//! Declarative card type descriptions.
//!
//! A card type is a table of named regions plus optional classification
//! metadata. Shared declarations are reused by composition: a derived spec
//! is laid over a base with [`CardTypeSpec::extending`].

use std::collections::{BTreeMap, HashSet};

use crate::error::{Error, Result};
use crate::geometry::Region;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CardTypeSpec {
    /// Short name used for the output directory of this type.
    pub alias: String,
    /// Regions in declaration order; names are unique.
    pub regions: Vec<Region>,
    /// Region whose text decides whether a card belongs to this type.
    pub marker_region: Option<String>,
    /// Expected marker text, compared case-insensitively.
    pub marker_value: Option<String>,
    /// Region whose text becomes part of the card identifier.
    pub id_region: Option<String>,
    /// Regions whose text is reduced to digits.
    pub numeric: Vec<String>,
}

impl CardTypeSpec {
    pub fn new(alias: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            ..Self::default()
        }
    }

    pub fn with_region(mut self, region: Region) -> Self {
        self.upsert_region(region);
        self
    }

    pub fn with_marker(mut self, region: impl Into<String>, value: impl Into<String>) -> Self {
        self.marker_region = Some(region.into());
        self.marker_value = Some(value.into());
        self
    }

    pub fn with_id_region(mut self, region: impl Into<String>) -> Self {
        self.id_region = Some(region.into());
        self
    }

    pub fn with_numeric(mut self, region: impl Into<String>) -> Self {
        let region = region.into();
        if !self.numeric.contains(&region) {
            self.numeric.push(region);
        }
        self
    }

    /// Lay this spec over `base`.
    ///
    /// Base regions come first; a region redeclared here replaces the base
    /// region of the same name in place, new regions are appended. Metadata
    /// set here wins over the base, numeric sets are united.
    pub fn extending(self, base: &CardTypeSpec) -> Self {
        let mut merged = CardTypeSpec {
            alias: self.alias,
            regions: base.regions.clone(),
            marker_region: self.marker_region.or_else(|| base.marker_region.clone()),
            marker_value: self.marker_value.or_else(|| base.marker_value.clone()),
            id_region: self.id_region.or_else(|| base.id_region.clone()),
            numeric: base.numeric.clone(),
        };
        for region in self.regions {
            merged.upsert_region(region);
        }
        for name in self.numeric {
            if !merged.numeric.contains(&name) {
                merged.numeric.push(name);
            }
        }
        merged
    }

    fn upsert_region(&mut self, region: Region) {
        match self.regions.iter_mut().find(|r| r.name == region.name) {
            Some(slot) => *slot = region,
            None => self.regions.push(region),
        }
    }

    pub fn region(&self, name: &str) -> Option<&Region> {
        self.regions.iter().find(|r| r.name == name)
    }

    pub fn is_numeric(&self, name: &str) -> bool {
        self.numeric.iter().any(|n| n == name)
    }

    pub fn marker(&self) -> Option<(&Region, &str)> {
        let name = self.marker_region.as_deref()?;
        let region = self.region(name)?;
        Some((region, self.marker_value.as_deref().unwrap_or_default()))
    }

    /// Case-insensitive comparison of recognised marker text.
    pub fn matches_marker(&self, found: &str) -> bool {
        match self.marker_value.as_deref() {
            Some(expected) => found.to_lowercase() == expected.to_lowercase(),
            None => true,
        }
    }

    /// Identifier used to name a card's assets: its 1-based position on the
    /// sheet, suffixed with the id region text when one is declared.
    pub fn card_id(&self, index: usize, texts: &BTreeMap<String, String>) -> String {
        let number = index + 1;
        match self.id_region.as_deref() {
            Some(name) => {
                let id_text = texts.get(name).map(String::as_str).unwrap_or_default();
                format!("{}-{}", number, id_text)
            }
            None => number.to_string(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| Error::InvalidSpec {
            alias: self.alias.clone(),
            reason,
        };
        if self.alias.trim().is_empty() {
            return Err(invalid("alias is empty".to_string()));
        }
        if self.regions.is_empty() {
            return Err(invalid("no regions declared".to_string()));
        }
        let mut seen = HashSet::new();
        for region in &self.regions {
            if !seen.insert(region.name.as_str()) {
                return Err(invalid(format!("region `{}` declared twice", region.name)));
            }
            region.validate()?;
        }
        if let Some(name) = &self.marker_region {
            if self.region(name).is_none() {
                return Err(invalid(format!("marker region `{}` is not declared", name)));
            }
            if self.marker_value.is_none() {
                return Err(invalid("marker region set without a marker value".to_string()));
            }
        }
        if let Some(name) = &self.id_region {
            if self.region(name).is_none() {
                return Err(invalid(format!("id region `{}` is not declared", name)));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lure() -> CardTypeSpec {
        let mut base = CardTypeSpec::new("lure")
            .with_id_region("card_id")
            .with_numeric("card_id")
            .with_region(Region::new("card_id", 55.4, 60.5, 78.0, 80.7).hidden());
        base.marker_region = Some("type_name".to_string());
        base
    }

    #[test]
    fn extending_merges_base_and_overrides() {
        let event = CardTypeSpec::new("event")
            .with_marker("type_name", "EVENT")
            .with_region(Region::new("type_name", 2.0, 7.3, 61.4, 62.7).with_bg_box_size(2))
            .with_region(Region::new("card_id", 53.8, 59.0, 79.8, 81.4).hidden())
            .extending(&lure());

        let names: Vec<_> = event.regions.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["card_id", "type_name"]);
        assert_eq!(event.region("card_id").map(|r| r.x0), Some(53.8));
        assert_eq!(event.marker_value.as_deref(), Some("EVENT"));
        assert_eq!(event.id_region.as_deref(), Some("card_id"));
        assert!(event.is_numeric("card_id"));
        event.validate().expect("valid spec");
    }

    #[test]
    fn marker_match_ignores_case() {
        let spec = CardTypeSpec::new("event").with_marker("type_name", "EVENT");
        assert!(spec.matches_marker("event"));
        assert!(spec.matches_marker("Event"));
        assert!(!spec.matches_marker("events"));
        assert!(CardTypeSpec::new("any").matches_marker("whatever"));
    }

    #[test]
    fn card_id_uses_original_index() {
        let mut texts = BTreeMap::new();
        texts.insert("card_id".to_string(), "42".to_string());
        assert_eq!(lure().card_id(4, &texts), "5-42");
        assert_eq!(CardTypeSpec::new("plain").card_id(0, &texts), "1");
    }

    #[test]
    fn validate_rejects_dangling_names() {
        let spec = CardTypeSpec::new("broken")
            .with_region(Region::new("title", 1.0, 2.0, 1.0, 2.0))
            .with_marker("type_name", "X");
        let err = spec.validate().unwrap_err();
        assert!(err.to_string().contains("marker region `type_name`"));

        let spec = CardTypeSpec::new("flat").with_region(Region::new("title", 2.0, 1.0, 1.0, 2.0));
        assert!(matches!(spec.validate(), Err(Error::InvalidRegion { .. })));
    }
}
