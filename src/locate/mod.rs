//! Resolution of requested field strings to boxes in a [`BboxMapping`].
//!
//! Tiers, in order:
//!
//! 1. **Exact**: the key (or the text a disambiguated key stands for) equals
//!    the field.
//! 2. **Substring**: the key's text contains the field, case-insensitively;
//!    the box is narrowed to the field's share of the key's width.
//! 3. **Cross-segment**: the field is covered by pieces found in several
//!    entries of one page, or spelled out by consecutive character entries.
//! 4. **Fuzzy**: keys no earlier tier used whose text contains the field
//!    once whitespace is ignored on both sides, so "张 三" answers "张三".
//!
//! Without `fuzzy`, a tier only runs when the earlier ones found nothing.
//! With `fuzzy`, every tier runs and results accumulate.

mod cover;

use std::collections::HashSet;
use std::fmt;

use serde::Serialize;
use tracing::{debug, warn};

use crate::domain::{merge_bboxes, Bbox, CharWidthModel};
use crate::mapping::BboxMapping;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    Exact,
    Substring,
    CrossSegment,
    Fuzzy,
}

impl fmt::Display for MatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MatchKind::Exact => "exact",
            MatchKind::Substring => "substring",
            MatchKind::CrossSegment => "cross-segment",
            MatchKind::Fuzzy => "fuzzy",
        };
        f.write_str(name)
    }
}

/// One box a field was resolved to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldMatch {
    pub field: String,
    pub bbox: Bbox,
    pub page_index: usize,
    pub kind: MatchKind,
    /// Mapping key the box was taken from.
    pub source_key: String,
    /// The part of the field this box covers.
    pub matched: String,
}

impl FieldMatch {
    /// Human-readable description of how the match was made.
    pub fn match_info(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for FieldMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.matched == self.source_key {
            write!(f, "{} match '{}'", self.kind, self.source_key)
        } else {
            write!(
                f,
                "{} match '{}' in '{}'",
                self.kind, self.matched, self.source_key
            )
        }
    }
}

/// All matches of one requested field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldReport {
    pub field: String,
    pub matches: Vec<FieldMatch>,
}

impl FieldReport {
    pub fn is_found(&self) -> bool {
        !self.matches.is_empty()
    }

    /// One box around every match of the field.
    pub fn merged_bbox(&self) -> Option<Bbox> {
        let boxes: Vec<Bbox> = self.matches.iter().map(|m| m.bbox).collect();
        merge_bboxes(&boxes)
    }
}

/// Looks up fields in a mapping.
#[derive(Debug, Clone, Default)]
pub struct FieldLocator {
    model: CharWidthModel,
}

impl FieldLocator {
    pub fn new(model: CharWidthModel) -> Self {
        Self { model }
    }

    /// Matches for every field, flattened in field order.
    pub fn locate<S: AsRef<str>>(
        &self,
        mapping: &BboxMapping,
        fields: &[S],
        fuzzy: bool,
    ) -> Vec<FieldMatch> {
        self.locate_report(mapping, fields, fuzzy)
            .into_iter()
            .flat_map(|report| report.matches)
            .collect()
    }

    /// Matches grouped per requested field, including fields without any.
    pub fn locate_report<S: AsRef<str>>(
        &self,
        mapping: &BboxMapping,
        fields: &[S],
        fuzzy: bool,
    ) -> Vec<FieldReport> {
        fields
            .iter()
            .map(|field| {
                let field = field.as_ref();
                let matches = self.locate_field(mapping, field, fuzzy);
                if matches.is_empty() {
                    warn!(field, "field not found in mapping");
                } else {
                    debug!(field, matches = matches.len(), "field located");
                }
                FieldReport {
                    field: field.to_string(),
                    matches,
                }
            })
            .collect()
    }

    fn locate_field(&self, mapping: &BboxMapping, field: &str, fuzzy: bool) -> Vec<FieldMatch> {
        if field.is_empty() {
            return Vec::new();
        }

        let mut matches = self.exact(mapping, field);

        if matches.is_empty() || fuzzy {
            matches.extend(self.substring(mapping, field));
        }

        if matches.is_empty() || fuzzy {
            let mut covered = cover::cover_field(&self.model, mapping, field);
            if covered.is_empty() {
                covered = cover::walk_char_sequence(mapping, field);
            }
            matches.extend(covered);
        }

        if fuzzy {
            let seen: HashSet<String> = matches.iter().map(|m| m.source_key.clone()).collect();
            matches.extend(self.spacing_insensitive(mapping, field, &seen));
        }

        matches
    }

    /// Containment with whitespace dropped from key and field. The box spans
    /// the key characters from the first to the last matched one.
    fn spacing_insensitive(
        &self,
        mapping: &BboxMapping,
        field: &str,
        seen: &HashSet<String>,
    ) -> Vec<FieldMatch> {
        let needle: Vec<char> = field.chars().filter(|c| !c.is_whitespace()).collect();
        if needle.is_empty() {
            return Vec::new();
        }

        mapping
            .iter()
            .filter(|(key, _)| !seen.contains(*key))
            .filter_map(|(key, entry)| {
                let base = mapping.base_text(key);
                let (positions, compact): (Vec<usize>, Vec<char>) = base
                    .chars()
                    .enumerate()
                    .filter(|(_, c)| !c.is_whitespace())
                    .unzip();
                let hit = find_ci(&compact, &needle)?;
                let start = positions[hit];
                let end = positions[hit + needle.len() - 1] + 1;
                Some(FieldMatch {
                    field: field.to_string(),
                    bbox: substring_bbox(&self.model, base, start, end - start, &entry.bbox),
                    page_index: entry.page_index,
                    kind: MatchKind::Fuzzy,
                    source_key: key.to_string(),
                    matched: base.chars().skip(start).take(end - start).collect(),
                })
            })
            .collect()
    }

    fn exact(&self, mapping: &BboxMapping, field: &str) -> Vec<FieldMatch> {
        mapping
            .iter()
            .filter(|(key, _)| mapping.base_text(key) == field)
            .map(|(key, entry)| FieldMatch {
                field: field.to_string(),
                bbox: entry.bbox,
                page_index: entry.page_index,
                kind: MatchKind::Exact,
                source_key: key.to_string(),
                matched: field.to_string(),
            })
            .collect()
    }

    /// Entries whose text contains the field without being equal to it.
    fn substring(&self, mapping: &BboxMapping, field: &str) -> Vec<FieldMatch> {
        let field_chars: Vec<char> = field.chars().collect();
        mapping
            .iter()
            .filter_map(|(key, entry)| {
                let base = mapping.base_text(key);
                if base == field {
                    return None;
                }
                let base_chars: Vec<char> = base.chars().collect();
                let start = find_ci(&base_chars, &field_chars)?;
                Some(FieldMatch {
                    field: field.to_string(),
                    bbox: substring_bbox(&self.model, base, start, field_chars.len(), &entry.bbox),
                    page_index: entry.page_index,
                    kind: MatchKind::Substring,
                    source_key: key.to_string(),
                    matched: field.to_string(),
                })
            })
            .collect()
    }
}

/// Case-insensitive search over characters; returns the character offset of
/// the first occurrence.
pub fn find_ci(haystack: &[char], needle: &[char]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|window| {
        window
            .iter()
            .zip(needle)
            .all(|(a, b)| a == b || a.to_lowercase().eq(b.to_lowercase()))
    })
}

/// Box of `len` characters starting at character `start` inside a text that
/// spans `bbox`, split by the character-width model.
///
/// Falls back to a linear split when the profile has no ratio for a bound.
pub fn substring_bbox(
    model: &CharWidthModel,
    text: &str,
    start: usize,
    len: usize,
    bbox: &Bbox,
) -> Bbox {
    let total = text.chars().count();
    if total == 0 {
        return *bbox;
    }
    let end = start + len;
    let profile = model.cumulative_profile(text);
    let (r0, r1) = match (profile.ratio(start), profile.ratio(end)) {
        (Some(r0), Some(r1)) => (r0, r1),
        _ => (
            (start as f64 / total as f64).min(1.0),
            (end as f64 / total as f64).min(1.0),
        ),
    };
    Bbox {
        x0: bbox.x0 + bbox.width() * r0,
        y0: bbox.y0,
        x1: bbox.x0 + bbox.width() * r1,
        y1: bbox.y1,
    }
}
