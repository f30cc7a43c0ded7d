//! Cross-segment matching: a field assembled from several mapping entries.

use std::collections::{BTreeMap, HashSet};

use super::{find_ci, substring_bbox, FieldMatch, MatchKind};
use crate::domain::{Bbox, CharWidthModel};
use crate::mapping::BboxMapping;

struct Segment<'m> {
    key: &'m str,
    base: Vec<char>,
    bbox: Bbox,
}

struct Selected {
    text: String,
    key: String,
    bbox: Bbox,
}

/// Covers `field` with proper substrings (two characters or more) found in
/// the entries of a single page.
///
/// Candidate substrings are taken longest first; one is kept when it covers
/// at least one field position not yet covered (its position is its first
/// occurrence in the field). Every page whose entries cover the whole field
/// contributes its selection, in page order; partially covered pages
/// contribute nothing.
pub(super) fn cover_field(
    model: &CharWidthModel,
    mapping: &BboxMapping,
    field: &str,
) -> Vec<FieldMatch> {
    let field_chars: Vec<char> = field.chars().collect();
    if field_chars.len() < 3 {
        return Vec::new();
    }

    let mut pages: BTreeMap<usize, Vec<Segment<'_>>> = BTreeMap::new();
    for (key, entry) in mapping.iter() {
        let base: Vec<char> = mapping.base_text(key).chars().collect();
        if base.len() >= 2 {
            pages.entry(entry.page_index).or_default().push(Segment {
                key,
                base,
                bbox: entry.bbox,
            });
        }
    }

    let substrings = substrings_longest_first(&field_chars);
    let mut matches = Vec::new();

    for (page_index, segments) in &pages {
        let mut covered = vec![false; field_chars.len()];
        let mut selected = Vec::new();

        for sub in &substrings {
            let Some((segment, offset)) = segments
                .iter()
                .find_map(|s| find_ci(&s.base, sub).map(|offset| (s, offset)))
            else {
                continue;
            };
            let Some(pos) = find_ci(&field_chars, sub) else {
                continue;
            };
            let range = pos..pos + sub.len();
            if covered[range.clone()].iter().all(|&c| c) {
                continue;
            }
            covered[range].iter_mut().for_each(|c| *c = true);

            let base: String = segment.base.iter().collect();
            selected.push(Selected {
                text: sub.iter().collect(),
                key: segment.key.to_string(),
                bbox: substring_bbox(model, &base, offset, sub.len(), &segment.bbox),
            });

            if covered.iter().all(|&c| c) {
                break;
            }
        }

        if covered.iter().all(|&c| c) {
            matches.extend(selected.into_iter().map(|s| FieldMatch {
                field: field.to_string(),
                bbox: s.bbox,
                page_index: *page_index,
                kind: MatchKind::CrossSegment,
                source_key: s.key,
                matched: s.text,
            }));
        }
    }

    matches
}

/// Every distinct proper substring of length two or more, longest first;
/// equal lengths keep left-to-right order. The whole text is left to the
/// substring tier.
fn substrings_longest_first(chars: &[char]) -> Vec<Vec<char>> {
    let mut seen = HashSet::new();
    let mut subs = Vec::new();
    for len in (2..chars.len()).rev() {
        for window in chars.windows(len) {
            let lowered: String = window.iter().flat_map(|c| c.to_lowercase()).collect();
            if seen.insert(lowered) {
                subs.push(window.to_vec());
            }
        }
    }
    subs
}

/// Matches `field` against consecutive single-character entries, in mapping
/// order. Each occurrence yields one match per character.
pub(super) fn walk_char_sequence(mapping: &BboxMapping, field: &str) -> Vec<FieldMatch> {
    let field_chars: Vec<char> = field.chars().collect();
    if field_chars.is_empty() {
        return Vec::new();
    }

    let singles: Vec<(&str, char, Bbox, usize)> = mapping
        .iter()
        .filter_map(|(key, entry)| {
            let mut chars = mapping.base_text(key).chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Some((key, c, entry.bbox, entry.page_index)),
                _ => None,
            }
        })
        .collect();

    let mut matches = Vec::new();
    if singles.len() < field_chars.len() {
        return matches;
    }

    for window in singles.windows(field_chars.len()) {
        let hit = window
            .iter()
            .zip(&field_chars)
            .all(|(&(_, c, _, _), f)| find_ci(&[c], &[*f]).is_some());
        if hit {
            matches.extend(window.iter().map(|&(key, c, bbox, page_index)| FieldMatch {
                field: field.to_string(),
                bbox,
                page_index,
                kind: MatchKind::CrossSegment,
                source_key: key.to_string(),
                matched: c.to_string(),
            }));
        }
    }
    matches
}
