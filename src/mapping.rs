//! The persisted text-to-geometry mapping.
//!
//! A mapping is a JSON object whose keys are text (single characters or whole
//! runs) and whose values carry a bbox and a page index. Text that occurs
//! more than once gets disambiguated keys: the first occurrence keeps the
//! plain text, later ones become `text_1`, `text_2`, ... Entry order is the
//! insertion order and survives a save/load cycle.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::{debug, warn};

use crate::align::{AlignedRun, CharEntry};
use crate::domain::Bbox;
use crate::error::{MaskError, MaskResult};

/// Geometry of one mapping key.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MappingEntry {
    pub bbox: Bbox,
    #[serde(default)]
    pub page_index: usize,
    /// Character offset in the document text, `-1` for characters of runs
    /// that could not be aligned. Absent in run-level mappings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_index: Option<i64>,
}

/// A mapping key as offered to users looking for field names.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldListing {
    pub key: String,
    pub bbox: Bbox,
    pub page_index: usize,
}

/// Ordered map from (disambiguated) text to geometry.
#[derive(Debug, Clone, Default)]
pub struct BboxMapping {
    entries: Vec<(String, MappingEntry)>,
    index: HashMap<String, usize>,
    next_suffix: HashMap<String, usize>,
}

impl BboxMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// One entry per character, keyed by the character itself.
    pub fn from_char_entries(chars: &[CharEntry]) -> Self {
        let mut mapping = Self::new();
        let mut buf = [0u8; 4];
        for entry in chars {
            let document_index = entry.document_index.map_or(-1, |i| i as i64);
            mapping.insert(
                entry.ch.encode_utf8(&mut buf),
                MappingEntry {
                    bbox: entry.bbox,
                    page_index: entry.page_index,
                    document_index: Some(document_index),
                },
            );
        }
        debug!(entries = mapping.len(), "built character mapping");
        mapping
    }

    /// One entry per run, keyed by the run text.
    pub fn from_runs(runs: &[AlignedRun]) -> Self {
        let mut mapping = Self::new();
        for aligned in runs {
            mapping.insert(
                &aligned.run.text,
                MappingEntry {
                    bbox: aligned.run.bbox,
                    page_index: aligned.run.page_index,
                    document_index: None,
                },
            );
        }
        debug!(entries = mapping.len(), "built run mapping");
        mapping
    }

    /// Inserts under `text`, or under the next free `text_N` if `text` is
    /// already taken. Returns the key used.
    pub fn insert(&mut self, text: &str, entry: MappingEntry) -> String {
        let mut key = text.to_string();
        if self.index.contains_key(&key) {
            let mut n = self.next_suffix.get(text).copied().unwrap_or(1);
            loop {
                key = format!("{text}_{n}");
                n += 1;
                if !self.index.contains_key(&key) {
                    break;
                }
            }
            self.next_suffix.insert(text.to_string(), n);
        }
        self.push(key.clone(), entry);
        key
    }

    fn push(&mut self, key: String, entry: MappingEntry) {
        match self.index.get(&key) {
            Some(&i) => self.entries[i].1 = entry,
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push((key, entry));
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&MappingEntry> {
        self.index.get(key).map(|&i| &self.entries[i].1)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &MappingEntry)> + '_ {
        self.entries.iter().map(|(key, entry)| (key.as_str(), entry))
    }

    /// The text a key stands for: `X_N` is read as a repeat of `X` only when
    /// `X` is itself a key, so text that genuinely ends in `_N` is kept.
    pub fn base_text<'a>(&self, key: &'a str) -> &'a str {
        match key.rsplit_once('_') {
            Some((base, n))
                if !n.is_empty()
                    && n.bytes().all(|b| b.is_ascii_digit())
                    && self.index.contains_key(base) =>
            {
                base
            }
            _ => key,
        }
    }

    /// Keys containing `search` (case-insensitive), or every key.
    pub fn list_fields(&self, search: Option<&str>) -> Vec<FieldListing> {
        let needle = search.map(str::to_lowercase);
        self.iter()
            .filter(|(key, _)| match &needle {
                Some(needle) => key.to_lowercase().contains(needle.as_str()),
                None => true,
            })
            .map(|(key, entry)| FieldListing {
                key: key.to_string(),
                bbox: entry.bbox,
                page_index: entry.page_index,
            })
            .collect()
    }

    pub fn from_json_str(text: &str) -> MaskResult<Self> {
        serde_json::from_str(text).map_err(|e| MaskError::malformed("bbox mapping", e))
    }

    pub fn to_json_string(&self) -> MaskResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| MaskError::malformed("bbox mapping", e))
    }

    pub fn load(path: &Path) -> MaskResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| MaskError::io(path, e))?;
        let mapping: Self = serde_json::from_str(&text)
            .map_err(|e| MaskError::malformed(format!("mapping '{}'", path.display()), e))?;
        debug!(path = %path.display(), entries = mapping.len(), "loaded mapping");
        Ok(mapping)
    }

    pub fn save(&self, path: &Path) -> MaskResult<()> {
        let json = self.to_json_string()?;
        std::fs::write(path, json).map_err(|e| MaskError::io(path, e))
    }
}

impl PartialEq for BboxMapping {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl Serialize for BboxMapping {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, entry) in &self.entries {
            map.serialize_entry(key, entry)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for BboxMapping {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(MappingVisitor)
    }
}

struct MappingVisitor;

impl<'de> Visitor<'de> for MappingVisitor {
    type Value = BboxMapping;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("an object mapping text to {bbox, page_index}")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut mapping = BboxMapping::new();
        let mut skipped = 0usize;

        while let Some((key, value)) = access.next_entry::<String, serde_json::Value>()? {
            match serde_json::from_value::<MappingEntry>(value) {
                Ok(entry) => mapping.push(key, entry),
                Err(e) => {
                    skipped += 1;
                    warn!(key = %key, error = %e, "skipping malformed mapping entry");
                }
            }
        }

        if skipped > 0 {
            warn!(skipped, kept = mapping.len(), "mapping contained malformed entries");
        }
        Ok(mapping)
    }
}
