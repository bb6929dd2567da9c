use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::errors::Result;

/// One selectable part for a slot.
///
/// An empty `source_locator` stands for "nothing": selecting it clears the slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    #[serde(alias = "label")]
    pub name: String,
    #[serde(alias = "url", default)]
    pub source_locator: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_locator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl CatalogEntry {
    #[must_use]
    pub fn new(name: impl Into<String>, source_locator: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source_locator: source_locator.into(),
            thumbnail_locator: None,
            note: None,
            tags: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn is_empty_choice(&self) -> bool {
        self.source_locator.trim().is_empty()
    }
}

/// Per-slot lists of selectable parts.
///
/// Serialized as a plain JSON object keyed by slot:
/// `{ "helmet": [ { "name": "...", "sourceLocator": "..." } ] }`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Catalog {
    slots: BTreeMap<String, Vec<CatalogEntry>>,
}

impl Catalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn insert(&mut self, slot: impl Into<String>, entry: CatalogEntry) {
        self.slots.entry(slot.into()).or_default().push(entry);
    }

    /// Entries for `slot` (empty if the slot has none).
    #[must_use]
    pub fn entries(&self, slot: &str) -> &[CatalogEntry] {
        self.slots.get(slot).map(Vec::as_slice).unwrap_or_default()
    }

    #[must_use]
    pub fn find(&self, slot: &str, name: &str) -> Option<&CatalogEntry> {
        self.entries(slot).iter().find(|e| e.name == name)
    }

    /// Entries of `slot` carrying `tag`.
    pub fn with_tag<'a>(&'a self, slot: &'a str, tag: &'a str) -> impl Iterator<Item = &'a CatalogEntry> {
        self.entries(slot)
            .iter()
            .filter(move |e| e.tags.iter().any(|t| t == tag))
    }

    pub fn slots(&self) -> impl Iterator<Item = &str> {
        self.slots.keys().map(String::as_str)
    }

    /// Applies a remote manifest on top of this catalog.
    ///
    /// Only slots this catalog already lists are updated. A slot present in
    /// the manifest replaces the local list wholesale; one absent from it (or
    /// `null`) keeps its local list. Manifest slots unknown locally are ignored.
    pub fn merge_manifest(&mut self, json: &str) -> Result<()> {
        let manifest: BTreeMap<String, Option<Vec<CatalogEntry>>> = serde_json::from_str(json)?;
        for (slot, entries) in manifest {
            let Some(entries) = entries else {
                continue;
            };
            match self.slots.get_mut(&slot) {
                Some(local) => {
                    log::debug!("Manifest replaces '{slot}' with {} entries", entries.len());
                    *local = entries;
                }
                None => log::debug!("Manifest slot '{slot}' is not in the catalog; ignored"),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_label_url_aliases() {
        let catalog = Catalog::from_json(
            r#"{ "helmet": [ { "label": "None", "url": "" },
                             { "label": "Mk V", "url": "parts/mk5.glb" } ] }"#,
        )
        .unwrap();

        assert_eq!(catalog.entries("helmet").len(), 2);
        assert!(catalog.entries("helmet")[0].is_empty_choice());
        assert_eq!(
            catalog.find("helmet", "Mk V").map(|e| e.source_locator.as_str()),
            Some("parts/mk5.glb")
        );
    }

    #[test]
    fn manifest_replaces_present_slots_only() {
        let mut catalog = Catalog::new();
        catalog.insert("helmet", CatalogEntry::new("Local", "local/helmet.glb"));
        catalog.insert("shoes", CatalogEntry::new("Boots", "local/boots.glb"));

        catalog
            .merge_manifest(
                r#"{ "helmet": [ { "name": "Remote", "sourceLocator": "cdn/helmet.glb", "tags": ["new"] } ],
                     "shoes": null,
                     "mask": [ { "name": "Gas", "sourceLocator": "cdn/gas.glb" } ] }"#,
            )
            .unwrap();

        assert_eq!(catalog.entries("helmet").len(), 1);
        assert_eq!(catalog.with_tag("helmet", "new").count(), 1);
        assert_eq!(catalog.find("shoes", "Boots").map(|e| e.name.as_str()), Some("Boots"));
        // Unknown locally, so not added.
        assert_eq!(catalog.slots().collect::<Vec<_>>(), vec!["helmet", "shoes"]);

        let round = Catalog::from_json(&catalog.to_json().unwrap()).unwrap();
        assert_eq!(round, catalog);
    }
}
