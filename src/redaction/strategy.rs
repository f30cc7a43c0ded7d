//! Redaction strategy trait and supporting types.
//!
//! A strategy receives boxes that are already resolved to page coordinates
//! and decides how to cover them: an opaque overlay drawn on top of the page
//! content, or MuPDF redaction that removes what lies underneath.

use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;

use serde::Serialize;

use crate::domain::Bbox;
use crate::error::{MaskError, MaskResult};

/// A box to cover, in page pixel space (origin top-left).
#[derive(Debug, Clone, PartialEq)]
pub struct RedactionRegion {
    pub bbox: Bbox,
    pub page_index: usize,
    /// The field this region was resolved from.
    pub label: String,
}

/// Groups regions by page, pages in ascending order.
pub(crate) fn regions_by_page(regions: &[RedactionRegion]) -> BTreeMap<usize, Vec<&RedactionRegion>> {
    let mut pages: BTreeMap<usize, Vec<&RedactionRegion>> = BTreeMap::new();
    for region in regions {
        pages.entry(region.page_index).or_default().push(region);
    }
    pages
}

/// Statistics about a redaction operation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RedactionResult {
    /// Number of boxes drawn or redacted
    pub instances_redacted: usize,

    /// Pages in the document
    pub pages_processed: usize,

    /// Pages with redactions
    pub pages_modified: usize,

    /// Regions pointing past the last page
    pub skipped_out_of_range: usize,

    /// Requested fields with at least one match
    pub fields_found: Vec<String>,

    /// Requested fields without any match
    pub fields_missing: Vec<String>,

    /// Whether content was physically removed (vs visually obscured)
    pub secure: bool,
}

impl RedactionResult {
    /// Creates a result indicating no redactions were applied.
    pub fn none() -> Self {
        Self::default()
    }

    /// Returns true if any redactions were applied.
    pub fn has_redactions(&self) -> bool {
        self.instances_redacted > 0
    }
}

/// Fill color with components in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaskColor {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Default for MaskColor {
    fn default() -> Self {
        Self::BLACK
    }
}

impl MaskColor {
    pub const BLACK: MaskColor = MaskColor { r: 0.0, g: 0.0, b: 0.0 };
    pub const WHITE: MaskColor = MaskColor { r: 1.0, g: 1.0, b: 1.0 };
    pub const RED: MaskColor = MaskColor { r: 1.0, g: 0.0, b: 0.0 };
    pub const GREEN: MaskColor = MaskColor { r: 0.0, g: 1.0, b: 0.0 };
    pub const BLUE: MaskColor = MaskColor { r: 0.0, g: 0.0, b: 1.0 };
    pub const YELLOW: MaskColor = MaskColor { r: 1.0, g: 1.0, b: 0.0 };

    pub fn new(r: f32, g: f32, b: f32) -> MaskResult<Self> {
        if [r, g, b].iter().all(|c| (0.0..=1.0).contains(c)) {
            Ok(Self { r, g, b })
        } else {
            Err(MaskError::invalid(
                "color",
                format!("components must be within [0, 1], got ({r}, {g}, {b})"),
            ))
        }
    }

    pub fn components(&self) -> [f32; 3] {
        [self.r, self.g, self.b]
    }
}

impl FromStr for MaskColor {
    type Err = MaskError;

    /// Accepts a preset name or `"r,g,b"` with integer components in 0-255.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_lowercase();
        match name.as_str() {
            "black" => return Ok(Self::BLACK),
            "white" => return Ok(Self::WHITE),
            "red" => return Ok(Self::RED),
            "green" => return Ok(Self::GREEN),
            "blue" => return Ok(Self::BLUE),
            "yellow" => return Ok(Self::YELLOW),
            _ => {}
        }

        let parts: Vec<&str> = name.split(',').map(str::trim).collect();
        let [r, g, b] = parts.as_slice() else {
            return Err(MaskError::invalid(
                "color",
                format!("'{s}' is neither a preset nor an 'r,g,b' triple"),
            ));
        };

        let component = |part: &str| {
            part.parse::<u8>().map(|v| f32::from(v) / 255.0).map_err(|_| {
                MaskError::invalid("color", format!("'{part}' is not an integer in 0-255"))
            })
        };
        Ok(Self {
            r: component(r)?,
            g: component(g)?,
            b: component(b)?,
        })
    }
}

/// Strategy for covering regions of a PDF.
///
/// Implementations of this trait define how redaction is performed,
/// allowing for different approaches (secure deletion, visual overlay, etc.).
pub trait RedactionStrategy: Send + Sync {
    /// Covers `regions` and writes the result to `output`.
    ///
    /// Each box is widened horizontally by `margin` of its width per side,
    /// clipped to the page. Regions on pages the document does not have are
    /// skipped and counted.
    fn apply(
        &self,
        input: &Path,
        output: &Path,
        regions: &[RedactionRegion],
        color: MaskColor,
        margin: f64,
    ) -> MaskResult<RedactionResult>;

    /// Returns a human-readable name for this strategy.
    fn name(&self) -> &str;

    /// Returns whether this strategy removes the covered content.
    fn is_secure(&self) -> bool;
}
