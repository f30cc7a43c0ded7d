//! Layout tree produced by the upstream OCR/layout pipeline.
//!
//! The tree is consumed, never produced, by this crate: pages hold blocks,
//! blocks hold lines of spans and optionally nested sub-blocks (tables keep
//! their caption/body/footnote parts there). Unknown fields are ignored and
//! missing ones default, so partially populated records can be skipped one by
//! one instead of failing the document.

pub mod flatten;
pub mod table;

pub use flatten::{LayoutFlattener, TextRun};
pub use table::{OcrSize, TableCellProjector, TableOrientation};

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{MaskError, MaskResult};

/// Root of a layout document (`middle.json`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LayoutDocument {
    #[serde(default)]
    pub pdf_info: Vec<PageLayout>,
}

impl LayoutDocument {
    pub fn from_json_str(text: &str) -> MaskResult<Self> {
        serde_json::from_str(text).map_err(|e| MaskError::malformed("layout document", e))
    }

    pub fn from_file(path: &Path) -> MaskResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| MaskError::io(path, e))?;
        serde_json::from_str(&text)
            .map_err(|e| MaskError::malformed(format!("layout '{}'", path.display()), e))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageLayout {
    #[serde(default)]
    pub page_idx: Option<usize>,
    #[serde(default)]
    pub page_num: Option<usize>,
    #[serde(default)]
    pub page_size: Option<Vec<f64>>,
    #[serde(default)]
    pub preproc_blocks: Vec<Block>,
    #[serde(default)]
    pub discarded_blocks: Vec<Block>,
}

impl PageLayout {
    /// Zero-based page index, falling back to `page_num` when `page_idx` is
    /// absent.
    pub fn index(&self) -> usize {
        self.page_idx.or(self.page_num).unwrap_or(0)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Block {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub bbox: Vec<f64>,
    #[serde(default)]
    pub lines: Vec<Line>,
    #[serde(default)]
    pub blocks: Vec<Block>,
}

impl Block {
    pub fn is_table(&self) -> bool {
        self.kind == "table"
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Line {
    #[serde(default)]
    pub bbox: Vec<f64>,
    #[serde(default)]
    pub spans: Vec<Span>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Span {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub bbox: Vec<f64>,
    /// Cells recognized inside a cropped table image, one entry per cell.
    #[serde(default)]
    pub table_cell_bboxes: Vec<RecognizedCell>,
    /// Table texts without column alignment; rows are rebuilt by y-coordinate.
    #[serde(default)]
    pub table_texts: Vec<RecognizedCell>,
}

/// Text recognized by the table model, in crop-relative coordinates.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecognizedCell {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub bbox: Vec<f64>,
    #[serde(default)]
    pub confidence: Option<f64>,
    /// `[height, width]` of the image the recognizer actually saw.
    #[serde(default)]
    pub ocr_hw: Option<Vec<f64>>,
    /// The crop was rotated 90° clockwise before recognition. When absent
    /// the flattener estimates it from the cell shapes.
    #[serde(default)]
    pub rotated: Option<bool>,
}
