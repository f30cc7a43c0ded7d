//! Redaction strategies and the service that drives them.
//!
//! The service resolves requested fields to boxes through a
//! [`FieldLocator`], turns them into [`RedactionRegion`]s and hands those to
//! a [`RedactionStrategy`]. The input PDF is never modified in place.

pub mod overlay;
pub mod secure;
pub mod strategy;

pub use overlay::OverlayRedactionStrategy;
pub use secure::SecureRedactionStrategy;
pub use strategy::{MaskColor, RedactionRegion, RedactionResult, RedactionStrategy};

use std::path::Path;

use tracing::{info, warn};

use crate::config::RedactionConfig;
use crate::error::{MaskError, MaskResult};
use crate::locate::FieldLocator;
use crate::mapping::BboxMapping;

/// Redaction service coordinating field lookup and strategy execution.
pub struct RedactionService {
    strategy: Box<dyn RedactionStrategy>,
    locator: FieldLocator,
    margin: f64,
}

impl RedactionService {
    /// Creates a new redaction service with the specified strategy.
    pub fn new(strategy: Box<dyn RedactionStrategy>) -> Self {
        Self {
            strategy,
            locator: FieldLocator::default(),
            margin: RedactionConfig::default().horizontal_margin,
        }
    }

    /// Creates a service that paints boxes over the page content.
    pub fn with_overlay_strategy() -> Self {
        Self::new(Box::new(OverlayRedactionStrategy::new()))
    }

    /// Creates a service with secure (physical removal) redaction.
    pub fn with_secure_strategy() -> Self {
        Self::new(Box::new(SecureRedactionStrategy::new()))
    }

    /// Horizontal widening per side, as a fraction of each box's width.
    pub fn with_margin(mut self, margin: f64) -> Self {
        self.margin = margin;
        self
    }

    pub fn with_locator(mut self, locator: FieldLocator) -> Self {
        self.locator = locator;
        self
    }

    pub fn strategy_name(&self) -> &str {
        self.strategy.name()
    }

    /// Covers every match of `fields` in `input`, writing `output`.
    ///
    /// When no field matches anything, nothing is written and the returned
    /// result has no redactions.
    pub fn redact<S: AsRef<str>>(
        &self,
        input: &Path,
        fields: &[S],
        mapping_path: &Path,
        output: &Path,
        color: MaskColor,
        fuzzy: bool,
    ) -> MaskResult<RedactionResult> {
        if !input.exists() {
            return Err(MaskError::InputNotFound {
                path: input.to_path_buf(),
            });
        }
        let mapping = BboxMapping::load(mapping_path)?;
        self.redact_with_mapping(input, fields, &mapping, output, color, fuzzy)
    }

    /// Same as [`redact`](Self::redact) with an already loaded mapping.
    pub fn redact_with_mapping<S: AsRef<str>>(
        &self,
        input: &Path,
        fields: &[S],
        mapping: &BboxMapping,
        output: &Path,
        color: MaskColor,
        fuzzy: bool,
    ) -> MaskResult<RedactionResult> {
        // Validate inputs
        if !input.exists() {
            return Err(MaskError::InputNotFound {
                path: input.to_path_buf(),
            });
        }

        if fields.is_empty() {
            return Err(MaskError::invalid("fields", "No fields specified"));
        }

        if same_file(input, output) {
            return Err(MaskError::invalid(
                "output",
                "Output path must differ from the input PDF",
            ));
        }

        let reports = self.locator.locate_report(mapping, fields, fuzzy);

        let mut regions = Vec::new();
        let mut fields_found = Vec::new();
        let mut fields_missing = Vec::new();
        for report in reports {
            if report.is_found() {
                fields_found.push(report.field.clone());
            } else {
                fields_missing.push(report.field.clone());
            }
            regions.extend(report.matches.into_iter().map(|m| RedactionRegion {
                bbox: m.bbox,
                page_index: m.page_index,
                label: m.field,
            }));
        }

        if regions.is_empty() {
            warn!(fields = ?fields_missing, "no boxes found for the requested fields, nothing written");
            return Ok(RedactionResult {
                fields_missing,
                ..RedactionResult::none()
            });
        }

        let mut result = self
            .strategy
            .apply(input, output, &regions, color, self.margin)?;
        result.fields_found = fields_found;
        result.fields_missing = fields_missing;

        info!(
            strategy = self.strategy.name(),
            boxes = result.instances_redacted,
            pages = result.pages_modified,
            skipped = result.skipped_out_of_range,
            output = %output.display(),
            "redaction finished"
        );
        Ok(result)
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
