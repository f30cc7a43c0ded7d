//! Flattening of the layout tree into an ordered list of text runs.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use super::table::{OcrSize, TableCellProjector, TableOrientation};
use super::{Block, LayoutDocument, RecognizedCell, Span};
use crate::config::{Config, LayoutConfig};
use crate::domain::Bbox;

/// One contiguous piece of extracted text with a single source box.
///
/// A run is a span, a recognized table cell, or a synthetic table row.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub text: String,
    pub bbox: Bbox,
    pub page_index: usize,
    pub is_table: bool,
}

/// Walks pages -> blocks -> lines -> spans (and nested sub-blocks) in
/// reading order.
#[derive(Debug, Clone, Default)]
pub struct LayoutFlattener {
    config: LayoutConfig,
    orientation: TableOrientation,
}

impl LayoutFlattener {
    pub fn new(config: LayoutConfig) -> Self {
        Self {
            config,
            orientation: TableOrientation::default(),
        }
    }

    /// Layout and table sections of `config`.
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.layout.clone()).with_orientation(TableOrientation::new(config.table.clone()))
    }

    /// Heuristic deciding rotation for cells that carry no `rotated` flag.
    pub fn with_orientation(mut self, orientation: TableOrientation) -> Self {
        self.orientation = orientation;
        self
    }

    pub fn with_discarded(mut self, include: bool) -> Self {
        self.config.include_discarded = include;
        self
    }

    pub fn flatten(&self, doc: &LayoutDocument) -> Vec<TextRun> {
        let mut runs = Vec::new();

        for page in &doc.pdf_info {
            let page_index = page.index();
            let before = runs.len();

            self.flatten_blocks(&page.preproc_blocks, page_index, None, &mut runs);
            if self.config.include_discarded {
                self.flatten_blocks(&page.discarded_blocks, page_index, None, &mut runs);
            }

            debug!(page = page_index, runs = runs.len() - before, "flattened page");
        }

        runs
    }

    fn flatten_blocks(
        &self,
        blocks: &[Block],
        page_index: usize,
        table_bbox: Option<Bbox>,
        runs: &mut Vec<TextRun>,
    ) {
        for block in blocks {
            // A table block's own box is inherited by everything below it.
            let table_bbox = if block.is_table() {
                Bbox::from_slice(&block.bbox).or(table_bbox)
            } else {
                table_bbox
            };

            for line in &block.lines {
                for span in &line.spans {
                    self.flatten_span(span, page_index, table_bbox, runs);
                }
            }

            self.flatten_blocks(&block.blocks, page_index, table_bbox, runs);
        }
    }

    fn flatten_span(
        &self,
        span: &Span,
        page_index: usize,
        table_bbox: Option<Bbox>,
        runs: &mut Vec<TextRun>,
    ) {
        let content = span.content.as_deref().map(str::trim).unwrap_or_default();
        if !content.is_empty() && self.accepts(&span.kind) {
            match Bbox::from_slice(&span.bbox) {
                Some(bbox) => runs.push(TextRun {
                    text: content.to_string(),
                    bbox,
                    page_index,
                    is_table: table_bbox.is_some(),
                }),
                None => warn!(page = page_index, text = content, "skipping span without a valid bbox"),
            }
        }

        let rotated = self.crop_rotated(&span.table_cell_bboxes);
        for cell in &span.table_cell_bboxes {
            let text = cell.text.trim();
            if text.is_empty() {
                continue;
            }
            match project_cell(cell, table_bbox.as_ref(), rotated, page_index) {
                Some(bbox) => runs.push(TextRun {
                    text: text.to_string(),
                    bbox,
                    page_index,
                    is_table: true,
                }),
                None => warn!(page = page_index, text, "skipping table cell without a valid bbox"),
            }
        }

        if !span.table_texts.is_empty() {
            let rotated = self.crop_rotated(&span.table_texts);
            runs.extend(table_rows(&span.table_texts, table_bbox.as_ref(), rotated, page_index));
        }
    }

    /// Votes over the cell boxes of one recognized crop. Without a known
    /// crop size there is nothing to vote against.
    fn crop_rotated(&self, cells: &[RecognizedCell]) -> bool {
        let Some(size) = cells
            .iter()
            .find_map(|cell| cell.ocr_hw.as_deref().and_then(OcrSize::from_hw))
        else {
            return false;
        };
        let boxes: Vec<Bbox> = cells.iter().filter_map(|cell| Bbox::from_slice(&cell.bbox)).collect();
        let rotated = self.orientation.is_rotated(size.height, size.width, &boxes);
        if rotated {
            debug!(height = size.height, width = size.width, cells = boxes.len(), "table crop judged rotated");
        }
        rotated
    }

    fn accepts(&self, kind: &str) -> bool {
        self.config.content_span_types.is_empty()
            || self.config.content_span_types.iter().any(|t| t == kind)
    }
}

/// `crop_rotated` applies when the cell has no flag of its own.
fn project_cell(
    cell: &RecognizedCell,
    table_bbox: Option<&Bbox>,
    crop_rotated: bool,
    page_index: usize,
) -> Option<Bbox> {
    let bbox = Bbox::from_slice(&cell.bbox)?;
    let ocr = cell.ocr_hw.as_deref().and_then(OcrSize::from_hw);
    // A clockwise turn swaps the sides, so the rotated image is as wide as
    // the original crop was high.
    let rotated_width = match (cell.rotated.unwrap_or(crop_rotated), ocr) {
        (true, Some(size)) => Some(size.height),
        (true, None) => {
            warn!(
                page = page_index,
                text = cell.text.as_str(),
                "rotated table cell without a valid ocr_hw, rotation not undone"
            );
            None
        }
        (false, _) => None,
    };
    Some(TableCellProjector::project_to_page(
        &bbox,
        table_bbox,
        ocr,
        rotated_width,
    ))
}

/// Rebuilds rows from unaligned table texts: cells whose top edge rounds to
/// the same y form one run, joined by spaces, boxed by the first cell.
fn table_rows(
    cells: &[RecognizedCell],
    table_bbox: Option<&Bbox>,
    crop_rotated: bool,
    page_index: usize,
) -> Vec<TextRun> {
    let mut rows: BTreeMap<i64, Vec<(&str, Bbox)>> = BTreeMap::new();

    for cell in cells {
        let text = cell.text.trim();
        if text.is_empty() {
            continue;
        }
        let Some(raw) = Bbox::from_slice(&cell.bbox) else {
            warn!(page = page_index, text, "skipping table text without a valid bbox");
            continue;
        };
        let Some(bbox) = project_cell(cell, table_bbox, crop_rotated, page_index) else {
            continue;
        };
        rows.entry(raw.y0.round() as i64).or_default().push((text, bbox));
    }

    rows.into_values()
        .map(|row| TextRun {
            text: row.iter().map(|(text, _)| *text).collect::<Vec<_>>().join(" "),
            bbox: row[0].1,
            page_index,
            is_table: true,
        })
        .collect()
}
