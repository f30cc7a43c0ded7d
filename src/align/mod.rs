//! Alignment of flattened text runs against the rendered document text.
//!
//! The document text (markdown produced by the same pipeline as the layout)
//! is the reference order of the page content. Each run is searched for at
//! or after the position where the previous run ended, using an ordered list
//! of [`MatchStrategy`] tiers. Runs that are not found from the cursor get a
//! second search from the start of the document; runs that are still not
//! found keep their geometry but carry no document position.

pub mod strategy;
pub mod text;

pub use strategy::{default_strategies, MatchSpan, MatchStrategy, RunQuery};
pub use text::{normalize_whitespace, DocumentText};

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, info, trace, warn};

use crate::config::AlignerConfig;
use crate::domain::{Bbox, LineToCharBboxExpander};
use crate::layout::TextRun;

/// One character with its estimated box and document position.
#[derive(Debug, Clone, PartialEq)]
pub struct CharEntry {
    pub ch: char,
    pub bbox: Bbox,
    pub page_index: usize,
    /// Character offset in the document text; `None` when the run it
    /// belongs to could not be aligned.
    pub document_index: Option<usize>,
}

/// A run together with where it was found.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedRun {
    pub run: TextRun,
    /// Character offset of the match start in the document text.
    pub document_index: Option<usize>,
    /// Name of the strategy that placed the run.
    pub strategy: Option<&'static str>,
}

impl AlignedRun {
    pub fn is_resolved(&self) -> bool {
        self.document_index.is_some()
    }
}

/// Counters describing one alignment pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AlignmentSummary {
    pub total: usize,
    pub resolved: usize,
    pub unresolved: usize,
    /// Runs only found by the search from the start of the document.
    pub retried: usize,
    pub by_strategy: BTreeMap<&'static str, usize>,
}

#[derive(Debug, Clone, Default)]
pub struct Alignment {
    pub runs: Vec<AlignedRun>,
    pub summary: AlignmentSummary,
}

impl Alignment {
    /// Splits every run into per-character entries.
    ///
    /// Characters of an aligned run are numbered consecutively from the run's
    /// document index.
    pub fn char_entries(&self, expander: &LineToCharBboxExpander) -> Vec<CharEntry> {
        let mut entries = Vec::new();
        for aligned in &self.runs {
            let run = &aligned.run;
            let boxes = expander.expand(&run.text, &run.bbox);
            entries.extend(run.text.chars().zip(boxes).enumerate().map(|(i, (ch, bbox))| {
                CharEntry {
                    ch,
                    bbox,
                    page_index: run.page_index,
                    document_index: aligned.document_index.map(|start| start + i),
                }
            }));
        }
        entries
    }
}

/// Places text runs in the document text.
pub struct TextPositionAligner {
    strategies: Vec<Box<dyn MatchStrategy>>,
    expander: LineToCharBboxExpander,
    config: AlignerConfig,
}

impl Default for TextPositionAligner {
    fn default() -> Self {
        Self::new(AlignerConfig::default())
    }
}

impl TextPositionAligner {
    pub fn new(config: AlignerConfig) -> Self {
        Self {
            strategies: default_strategies(&config),
            expander: LineToCharBboxExpander::default(),
            config,
        }
    }

    /// Replaces the strategy list. An empty list leaves every run unresolved.
    pub fn with_strategies(mut self, strategies: Vec<Box<dyn MatchStrategy>>) -> Self {
        self.strategies = strategies;
        self
    }

    /// Appends a strategy after the existing ones.
    pub fn with_strategy(mut self, strategy: Box<dyn MatchStrategy>) -> Self {
        self.strategies.push(strategy);
        self
    }

    pub fn with_expander(mut self, expander: LineToCharBboxExpander) -> Self {
        self.expander = expander;
        self
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    pub fn expander(&self) -> &LineToCharBboxExpander {
        &self.expander
    }

    /// Aligns `runs`, in order, against `document`.
    pub fn align(&self, runs: &[TextRun], document: &str) -> Alignment {
        let doc = DocumentText::new(document);
        let mut summary = AlignmentSummary {
            total: runs.len(),
            ..Default::default()
        };
        let mut cursor = 0;
        let mut aligned = Vec::with_capacity(runs.len());

        for (index, run) in runs.iter().enumerate() {
            let query = RunQuery::new(&run.text);
            let mut hit = None;

            if !query.normalized.is_empty() {
                hit = self.search(&doc, &query, cursor);
                match hit {
                    Some((span, _)) => cursor = cursor.max(span.end),
                    None if self.config.retry_from_start => {
                        // found before the cursor; the cursor stays put
                        hit = self.search(&doc, &query, 0);
                        if hit.is_some() {
                            summary.retried += 1;
                            debug!(run = index, text = %run.text, "run found by retry from document start");
                        }
                    }
                    None => {}
                }
            }

            let (document_index, strategy) = match hit {
                Some((span, name)) => {
                    *summary.by_strategy.entry(name).or_default() += 1;
                    summary.resolved += 1;
                    let start = doc.char_index(span.start);
                    trace!(run = index, strategy = name, start, "run aligned");
                    (Some(start), Some(name))
                }
                None => {
                    summary.unresolved += 1;
                    warn!(
                        run = index,
                        page = run.page_index,
                        text = %run.text,
                        "run not found in document text"
                    );
                    (None, None)
                }
            };

            aligned.push(AlignedRun {
                run: run.clone(),
                document_index,
                strategy,
            });
        }

        info!(
            total = summary.total,
            resolved = summary.resolved,
            unresolved = summary.unresolved,
            retried = summary.retried,
            "alignment finished"
        );

        Alignment {
            runs: aligned,
            summary,
        }
    }

    /// Aligns and splits into characters in one step.
    pub fn align_chars(&self, runs: &[TextRun], document: &str) -> (Vec<CharEntry>, AlignmentSummary) {
        let alignment = self.align(runs, document);
        (alignment.char_entries(&self.expander), alignment.summary)
    }

    fn search(
        &self,
        doc: &DocumentText<'_>,
        query: &RunQuery<'_>,
        cursor: usize,
    ) -> Option<(MatchSpan, &'static str)> {
        self.strategies
            .iter()
            .find_map(|strategy| strategy.find(doc, query, cursor).map(|span| (span, strategy.name())))
    }
}
