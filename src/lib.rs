//! Locate OCR'd text in pixel space and mask it in the source PDF.
//!
//! An upstream OCR/layout pipeline produces two artifacts for a document: a
//! layout tree with line- and span-level boxes, and a rendered markdown text.
//! This library joins the two into a text -> bbox mapping, resolves
//! requested field strings against that mapping, and covers the resolved
//! boxes in the PDF.
//!
//! # Features
//!
//! - **Character boxes**: line boxes are split per character with a
//!   CJK-aware width model
//! - **Table cells**: crop-relative cell boxes are projected back to the page,
//!   including crops that were rotated before recognition
//! - **Alignment**: runs are placed in the markdown despite formatting edits,
//!   through an ordered list of search strategies
//! - **Field lookup**: exact, substring, cross-segment and fuzzy matching
//! - **Masking**: opaque overlays (LoPDF) or true redaction (MuPDF)
//!
//! # Architecture
//!
//! - [`domain`]: Geometry and the character-width model
//! - [`layout`]: Layout tree model, flattening and table-cell projection
//! - [`align`]: Text position alignment against the document text
//! - [`mapping`]: The persisted text -> bbox mapping
//! - [`locate`]: Field resolution
//! - [`redaction`]: Redaction strategies and service layer
//! - [`pipeline`]: Layout + markdown -> mapping in one call
//! - [`config`]: Tunables loadable from TOML
//! - [`error`]: Error handling
//!
//! # Quick Start
//!
//! ```no_run
//! use fieldmask::{MappingPipeline, MaskColor, RedactionService};
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let build = MappingPipeline::default()
//!     .build_from_files(Path::new("doc_middle.json"), Path::new("doc.md"))?;
//! build.mapping.save(Path::new("mapping.json"))?;
//!
//! let service = RedactionService::with_overlay_strategy();
//! service.redact(
//!     Path::new("doc.pdf"),
//!     &["发票号码", "张三"],
//!     Path::new("mapping.json"),
//!     Path::new("masked.pdf"),
//!     MaskColor::BLACK,
//!     false,
//! )?;
//! # Ok(())
//! # }
//! ```
//!
//! # Examples
//!
//! ## Locate Fields
//!
//! ```
//! use fieldmask::{BboxMapping, FieldLocator, MatchKind};
//!
//! let mapping = BboxMapping::from_json_str(
//!     r#"{"发票": {"bbox": [0, 0, 20, 10], "page_index": 0},
//!         "号码": {"bbox": [30, 0, 50, 10], "page_index": 0}}"#,
//! ).unwrap();
//!
//! let matches = FieldLocator::default().locate(&mapping, &["发票号码"], false);
//! assert_eq!(matches.len(), 2);
//! assert!(matches.iter().all(|m| m.kind == MatchKind::CrossSegment));
//! ```

// Public API
pub mod align;
pub mod config;
pub mod domain;
pub mod error;
pub mod layout;
pub mod locate;
pub mod mapping;
pub mod pipeline;
pub mod redaction;

use std::path::Path;

// Re-exports for convenient access
pub use align::{AlignmentSummary, CharEntry, TextPositionAligner};
pub use config::Config;
pub use domain::{merge_bboxes, Bbox, CharWidthModel, LineToCharBboxExpander};
pub use error::{MaskError, MaskResult};
pub use layout::{LayoutDocument, LayoutFlattener, TableCellProjector, TextRun};
pub use locate::{FieldLocator, FieldMatch, FieldReport, MatchKind};
pub use mapping::{BboxMapping, FieldListing, MappingEntry};
pub use pipeline::{Granularity, MappingBuild, MappingPipeline};
pub use redaction::{
    MaskColor, OverlayRedactionStrategy, RedactionResult, RedactionService, RedactionStrategy,
    SecureRedactionStrategy,
};

/// Loads a mapping file and resolves `fields` against it.
pub fn locate_fields<S: AsRef<str>>(
    mapping_path: &Path,
    fields: &[S],
    fuzzy: bool,
) -> MaskResult<Vec<FieldMatch>> {
    let mapping = BboxMapping::load(mapping_path)?;
    Ok(FieldLocator::default().locate(&mapping, fields, fuzzy))
}

/// Loads a mapping file and lists its keys, optionally filtered.
pub fn list_available_fields(
    mapping_path: &Path,
    search: Option<&str>,
) -> MaskResult<Vec<FieldListing>> {
    Ok(BboxMapping::load(mapping_path)?.list_fields(search))
}
