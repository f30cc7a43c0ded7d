//! Tunable parameters, loadable from a TOML file.
//!
//! Every value has a default, so a config file only needs the keys it
//! overrides:
//!
//! ```toml
//! [table]
//! rotation_vote_threshold = 0.4
//!
//! [redaction]
//! horizontal_margin = 0.1
//! color = "255,0,0"
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{MaskError, MaskResult};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub aligner: AlignerConfig,
    pub layout: LayoutConfig,
    pub table: TableConfig,
    pub redaction: RedactionConfig,
}

impl Config {
    pub fn from_toml_str(text: &str) -> MaskResult<Self> {
        toml::from_str(text).map_err(|e| MaskError::malformed("config", e))
    }

    pub fn from_toml_file(path: &Path) -> MaskResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| MaskError::io(path, e))?;
        toml::from_str(&text)
            .map_err(|e| MaskError::malformed(format!("config '{}'", path.display()), e))
    }
}

/// Text position alignment settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignerConfig {
    /// Smallest accepted length drift for the whitespace/alnum fuzzy tiers.
    pub fuzzy_min_tolerance: usize,
    /// Accepted length drift as a fraction of the run length.
    pub fuzzy_tolerance_ratio: f64,
    /// Retry unresolved runs from the start of the document.
    pub retry_from_start: bool,
    /// Enables the prefix-truncation fallback with this minimum prefix length.
    pub prefix_fallback_min_chars: Option<usize>,
}

impl Default for AlignerConfig {
    fn default() -> Self {
        Self {
            fuzzy_min_tolerance: 5,
            fuzzy_tolerance_ratio: 0.3,
            retry_from_start: true,
            prefix_fallback_min_chars: None,
        }
    }
}

impl AlignerConfig {
    /// Maximum accepted difference between a run's length and the length of
    /// the document slice a fuzzy hit spans.
    pub fn length_tolerance(&self, run_len: usize) -> f64 {
        (run_len as f64 * self.fuzzy_tolerance_ratio).max(self.fuzzy_min_tolerance as f64)
    }
}

/// Layout tree flattening settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Also flatten discarded blocks (page headers, footers, page numbers).
    pub include_discarded: bool,
    /// Span types that carry text; empty accepts any span with content.
    pub content_span_types: Vec<String>,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            include_discarded: true,
            content_span_types: Vec::new(),
        }
    }
}

/// Parameters of the table rotation heuristic.
///
/// The heuristic only estimates orientation from detected text boxes; it is
/// not a guarantee.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableConfig {
    /// Crops with height/width above this are rotation candidates.
    pub portrait_ratio: f64,
    /// Text boxes with width/height below this count as "tall".
    pub tall_box_aspect: f64,
    /// Fraction of tall boxes at which the crop is judged rotated.
    pub rotation_vote_threshold: f64,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            portrait_ratio: 1.2,
            tall_box_aspect: 0.8,
            rotation_vote_threshold: 0.3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedactionConfig {
    /// Horizontal widening of each box, as a fraction of its width per side.
    pub horizontal_margin: f64,
    /// Named color or `"r,g,b"` with components in 0-255.
    pub color: String,
}

impl Default for RedactionConfig {
    fn default() -> Self {
        Self {
            horizontal_margin: 0.15,
            color: "black".to_string(),
        }
    }
}
