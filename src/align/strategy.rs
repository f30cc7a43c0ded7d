//! Search strategies used to place a text run inside the document text.
//!
//! Strategies are tried in order and the first hit wins. They go from strict
//! (verbatim substring) to lenient (alphanumeric characters only), so a run
//! is always anchored by the most literal evidence available.

use super::text::{is_alnum_or_cjk, normalize_whitespace, strip_run_formatting, DocumentText};
use crate::config::AlignerConfig;

/// Byte range in the document text a run was matched to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchSpan {
    pub start: usize,
    pub end: usize,
}

impl MatchSpan {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

/// A run's text prepared for searching.
#[derive(Debug, Clone)]
pub struct RunQuery<'a> {
    pub raw: &'a str,
    /// Whitespace collapsed and trimmed.
    pub normalized: String,
}

impl<'a> RunQuery<'a> {
    pub fn new(raw: &'a str) -> Self {
        Self {
            raw,
            normalized: normalize_whitespace(raw),
        }
    }

    pub fn char_len(&self) -> usize {
        self.normalized.chars().count()
    }
}

/// One tier of the alignment search.
///
/// `cursor` is a byte offset; implementations never report a span starting
/// before it.
pub trait MatchStrategy: Send + Sync {
    fn find(&self, doc: &DocumentText<'_>, query: &RunQuery<'_>, cursor: usize) -> Option<MatchSpan>;

    /// Short name used in logs and alignment summaries.
    fn name(&self) -> &'static str;
}

/// The standard tiers in the order they are tried.
pub fn default_strategies(config: &AlignerConfig) -> Vec<Box<dyn MatchStrategy>> {
    let mut strategies: Vec<Box<dyn MatchStrategy>> = vec![
        Box::new(DirectSearch),
        Box::new(DecoratedSearch),
        Box::new(CleanTextSearch),
        Box::new(TableRowSearch),
        Box::new(HtmlTableSearch),
        Box::new(CollapsedWhitespaceSearch::new(config.clone())),
        Box::new(AlphanumericSearch::new(config.clone())),
    ];
    if let Some(min_chars) = config.prefix_fallback_min_chars {
        strategies.push(Box::new(PrefixSearch::new(min_chars)));
    }
    strategies
}

/// Verbatim search for the normalized run text.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectSearch;

impl MatchStrategy for DirectSearch {
    fn find(&self, doc: &DocumentText<'_>, query: &RunQuery<'_>, cursor: usize) -> Option<MatchSpan> {
        let start = doc.find(&query.normalized, cursor)?;
        Some(MatchSpan::new(start, start + query.normalized.len()))
    }

    fn name(&self) -> &'static str {
        "direct"
    }
}

const DECORATIONS: &[(&str, &str)] = &[
    ("# ", ""),
    ("## ", ""),
    ("### ", ""),
    ("#### ", ""),
    ("##### ", ""),
    ("###### ", ""),
    ("**", "**"),
    ("*", "*"),
    ("`", "`"),
];

/// The run text wrapped in a heading marker, emphasis or inline code.
///
/// The span covers the undecorated text only.
#[derive(Debug, Clone, Copy, Default)]
pub struct DecoratedSearch;

impl MatchStrategy for DecoratedSearch {
    fn find(&self, doc: &DocumentText<'_>, query: &RunQuery<'_>, cursor: usize) -> Option<MatchSpan> {
        DECORATIONS.iter().find_map(|(prefix, suffix)| {
            let decorated = format!("{prefix}{}{suffix}", query.normalized);
            let hit = doc.find(&decorated, cursor)?;
            let start = hit + prefix.len();
            Some(MatchSpan::new(start, start + query.normalized.len()))
        })
    }

    fn name(&self) -> &'static str {
        "markdown_decorated"
    }
}

/// Search in the formatting-stripped document for the formatting-stripped
/// run text.
#[derive(Debug, Clone, Copy, Default)]
pub struct CleanTextSearch;

impl MatchStrategy for CleanTextSearch {
    fn find(&self, doc: &DocumentText<'_>, query: &RunQuery<'_>, cursor: usize) -> Option<MatchSpan> {
        let needle = strip_run_formatting(query.raw);
        let (start, end) = doc.clean().find(&needle, cursor)?;
        Some(MatchSpan::new(start, end))
    }

    fn name(&self) -> &'static str {
        "markdown_stripped"
    }
}

/// Multi-token runs against markdown table rows.
///
/// The span starts at the first token; it covers the run's length, clamped
/// to the row's line.
#[derive(Debug, Clone, Copy, Default)]
pub struct TableRowSearch;

impl TableRowSearch {
    fn anchored(doc: &DocumentText<'_>, anchor: usize, query: &RunQuery<'_>) -> MatchSpan {
        let text = doc.text();
        let line_end = text[anchor..].find('\n').map_or(text.len(), |n| anchor + n);
        let mut end = (anchor + query.normalized.len()).min(line_end);
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        MatchSpan::new(anchor, end)
    }
}

impl MatchStrategy for TableRowSearch {
    fn find(&self, doc: &DocumentText<'_>, query: &RunQuery<'_>, cursor: usize) -> Option<MatchSpan> {
        let tokens: Vec<&str> = query.normalized.split(' ').collect();
        if tokens.len() < 2 {
            return None;
        }

        let joined = tokens.join(" | ");
        if let Some(hit) = doc.find(&format!("| {joined} |"), cursor) {
            return Some(Self::anchored(doc, hit + 2, query));
        }
        if let Some(hit) = doc.find(&joined, cursor) {
            return Some(Self::anchored(doc, hit, query));
        }

        let text = doc.text();
        let mut line_start = cursor;
        while line_start < text.len() {
            let line_end = text[line_start..]
                .find('\n')
                .map_or(text.len(), |n| line_start + n);
            let line = &text[line_start..line_end];
            if tokens.iter().all(|token| line.contains(token)) {
                if let Some(pos) = line.find(tokens[0]) {
                    return Some(MatchSpan::new(line_start + pos, line_end));
                }
            }
            line_start = line_end + 1;
        }
        None
    }

    fn name(&self) -> &'static str {
        "table_row"
    }
}

/// Runs found in the visible text of an inline `<table>` fragment.
///
/// The hit is anchored at the fragment start with an empty span, so the
/// cursor does not move past the rest of the fragment.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlTableSearch;

impl MatchStrategy for HtmlTableSearch {
    fn find(&self, doc: &DocumentText<'_>, query: &RunQuery<'_>, cursor: usize) -> Option<MatchSpan> {
        doc.html_fragments()
            .iter()
            .filter(|fragment| fragment.end > cursor)
            .find(|fragment| fragment.plain_text.contains(&query.normalized))
            .map(|fragment| {
                let anchor = fragment.start.max(cursor);
                MatchSpan::new(anchor, anchor)
            })
    }

    fn name(&self) -> &'static str {
        "html_table"
    }
}

fn within_tolerance(config: &AlignerConfig, doc: &DocumentText<'_>, span: MatchSpan, run_len: usize) -> bool {
    let slice_len = doc.char_len(span.start, span.end);
    (slice_len as f64 - run_len as f64).abs() <= config.length_tolerance(run_len)
}

/// Search with all whitespace removed from both sides.
#[derive(Debug, Clone, Default)]
pub struct CollapsedWhitespaceSearch {
    config: AlignerConfig,
}

impl CollapsedWhitespaceSearch {
    pub fn new(config: AlignerConfig) -> Self {
        Self { config }
    }
}

impl MatchStrategy for CollapsedWhitespaceSearch {
    fn find(&self, doc: &DocumentText<'_>, query: &RunQuery<'_>, cursor: usize) -> Option<MatchSpan> {
        let needle: String = query.normalized.chars().filter(|c| !c.is_whitespace()).collect();
        let (start, end) = doc.collapsed().find(&needle, cursor)?;
        let span = MatchSpan::new(start, end);
        within_tolerance(&self.config, doc, span, query.char_len()).then_some(span)
    }

    fn name(&self) -> &'static str {
        "whitespace_collapsed"
    }
}

/// Search over letters, digits and CJK ideographs only.
#[derive(Debug, Clone, Default)]
pub struct AlphanumericSearch {
    config: AlignerConfig,
}

impl AlphanumericSearch {
    pub fn new(config: AlignerConfig) -> Self {
        Self { config }
    }
}

impl MatchStrategy for AlphanumericSearch {
    fn find(&self, doc: &DocumentText<'_>, query: &RunQuery<'_>, cursor: usize) -> Option<MatchSpan> {
        let needle: String = query.normalized.chars().filter(|c| is_alnum_or_cjk(*c)).collect();
        let (start, end) = doc.alnum().find(&needle, cursor)?;
        let span = MatchSpan::new(start, end);
        within_tolerance(&self.config, doc, span, query.char_len()).then_some(span)
    }

    fn name(&self) -> &'static str {
        "alphanumeric"
    }
}

/// Last resort for runs with OCR noise at the tail: the longest prefix of at
/// least `min_chars` characters found verbatim.
#[derive(Debug, Clone, Copy)]
pub struct PrefixSearch {
    min_chars: usize,
}

impl PrefixSearch {
    pub fn new(min_chars: usize) -> Self {
        Self {
            min_chars: min_chars.max(1),
        }
    }
}

impl MatchStrategy for PrefixSearch {
    fn find(&self, doc: &DocumentText<'_>, query: &RunQuery<'_>, cursor: usize) -> Option<MatchSpan> {
        let boundaries: Vec<usize> = query
            .normalized
            .char_indices()
            .map(|(pos, _)| pos)
            .skip(self.min_chars)
            .collect();

        boundaries.into_iter().rev().find_map(|cut| {
            let prefix = query.normalized[..cut].trim_end();
            if prefix.is_empty() {
                return None;
            }
            let start = doc.find(prefix, cursor)?;
            Some(MatchSpan::new(start, start + prefix.len()))
        })
    }

    fn name(&self) -> &'static str {
        "prefix"
    }
}
