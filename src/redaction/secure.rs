//! Secure redaction strategy using MuPDF.
//!
//! This strategy physically removes content from PDF documents using MuPDF's
//! redaction API, ensuring that redacted content cannot be recovered.

use std::path::Path;

use mupdf::pdf::{PdfAnnotationType, PdfDocument, PdfPage};
use mupdf::Rect as MuRect;
use tracing::{debug, warn};

use super::strategy::{regions_by_page, MaskColor, RedactionRegion, RedactionResult, RedactionStrategy};
use crate::error::{MaskError, MaskResult};

/// Secure redaction strategy that physically removes content using MuPDF.
///
/// This strategy:
/// 1. Creates PDF redaction annotations over every region
/// 2. Applies redactions using `pdf_redact_page` (physical removal)
/// 3. Saves the modified PDF
///
/// MuPDF pages use a top-left origin like the layout boxes, so regions are
/// used as they are apart from the horizontal margin.
#[derive(Debug, Clone, Copy, Default)]
pub struct SecureRedactionStrategy;

impl SecureRedactionStrategy {
    pub fn new() -> Self {
        Self
    }

    fn apply_mupdf_redactions(
        &self,
        pdf_doc: &PdfDocument,
        regions: &[RedactionRegion],
        color: MaskColor,
        margin: f64,
    ) -> MaskResult<RedactionResult> {
        let page_count = pdf_doc.page_count().map_err(|e| MaskError::BackendError {
            backend: "MuPDF".to_string(),
            message: format!("Failed to get page count: {}", e),
            source: Some(Box::new(e)),
        })?;

        let mut result = RedactionResult {
            pages_processed: page_count as usize,
            secure: true,
            ..Default::default()
        };

        for (page_index, page_regions) in regions_by_page(regions) {
            if page_index >= page_count as usize {
                warn!(
                    page = page_index,
                    pages = page_count,
                    regions = page_regions.len(),
                    "page index out of range, skipping"
                );
                result.skipped_out_of_range += page_regions.len();
                continue;
            }

            let page = pdf_doc
                .load_page(page_index as i32)
                .map_err(|e| MaskError::PdfProcessing {
                    message: format!("Failed to load page {}", page_index + 1),
                    page: Some(page_index + 1),
                    source: Some(Box::new(e)),
                })?;

            let bounds = page.bounds().map_err(|e| MaskError::BackendError {
                backend: "MuPDF".to_string(),
                message: format!("Failed to get bounds for page {}", page_index + 1),
                source: Some(Box::new(e)),
            })?;

            // Convert to PDF page for annotation support
            let mut pdf_page = match PdfPage::try_from(page.clone()) {
                Ok(p) => p,
                Err(_) => {
                    warn!(page = page_index, "not a PDF page, skipping");
                    continue;
                }
            };

            for region in &page_regions {
                let expanded =
                    region
                        .bbox
                        .expand_horizontally(margin, f64::from(bounds.x0), f64::from(bounds.x1));

                let annot = pdf_page
                    .create_annotation(PdfAnnotationType::Redact)
                    .map_err(|e| MaskError::PdfProcessing {
                        message: "Failed to create redaction annotation".to_string(),
                        page: Some(page_index + 1),
                        source: Some(Box::new(e)),
                    })?;

                let rect = MuRect {
                    x0: expanded.x0 as f32,
                    y0: expanded.y0 as f32,
                    x1: expanded.x1 as f32,
                    y1: expanded.y1 as f32,
                };

                unsafe {
                    ffi::set_annotation_rect(&annot, rect);
                    ffi::set_annotation_interior_color(&annot, color.components());
                }
            }

            pdf_page.redact().map_err(|e| MaskError::PdfProcessing {
                message: format!("Failed to apply redactions on page {}", page_index + 1),
                page: Some(page_index + 1),
                source: Some(Box::new(e)),
            })?;

            debug!(page = page_index, boxes = page_regions.len(), "redactions applied");
            result.instances_redacted += page_regions.len();
            result.pages_modified += 1;
        }

        Ok(result)
    }
}

impl RedactionStrategy for SecureRedactionStrategy {
    fn apply(
        &self,
        input: &Path,
        output: &Path,
        regions: &[RedactionRegion],
        color: MaskColor,
        margin: f64,
    ) -> MaskResult<RedactionResult> {
        let input_str = input.to_str().ok_or_else(|| {
            MaskError::invalid("input", "Path contains invalid UTF-8")
        })?;

        let pdf_doc = PdfDocument::open(input_str).map_err(|e| MaskError::PdfProcessing {
            message: "Failed to open PDF with MuPDF".to_string(),
            page: None,
            source: Some(Box::new(e)),
        })?;

        let result = self.apply_mupdf_redactions(&pdf_doc, regions, color, margin)?;

        // Save if redactions were applied
        if result.has_redactions() {
            let output_str = output.to_str().ok_or_else(|| {
                MaskError::invalid("output", "Path contains invalid UTF-8")
            })?;

            pdf_doc
                .save(output_str)
                .map_err(|e| MaskError::PdfProcessing {
                    message: "Failed to save redacted PDF".to_string(),
                    page: None,
                    source: Some(Box::new(e)),
                })?;
        } else {
            // No redactions - just copy the file
            std::fs::copy(input, output).map_err(|e| MaskError::io(output, e))?;
        }

        Ok(result)
    }

    fn name(&self) -> &str {
        "SecureRedaction"
    }

    fn is_secure(&self) -> bool {
        true
    }
}

/// FFI helpers for MuPDF annotation operations.
mod ffi {
    use mupdf::pdf::PdfAnnotation;
    use mupdf::Rect;

    #[repr(C)]
    struct PdfAnnotRaw {
        inner: *mut mupdf_sys::pdf_annot,
    }

    /// Sets the rectangle for a PDF annotation via FFI.
    ///
    /// # Safety
    /// This function uses unsafe FFI calls to access MuPDF's C API.
    /// The annotation must be valid and the context properly initialized.
    pub unsafe fn set_annotation_rect(annot: &PdfAnnotation, rect: Rect) {
        let annot_raw = std::mem::transmute::<&PdfAnnotation, &PdfAnnotRaw>(annot);
        let ctx = mupdf_sys::mupdf_new_base_context();

        if !ctx.is_null() {
            let fz_rect = mupdf_sys::fz_rect {
                x0: rect.x0,
                y0: rect.y0,
                x1: rect.x1,
                y1: rect.y1,
            };

            mupdf_sys::pdf_set_annot_rect(ctx, annot_raw.inner, fz_rect);
            mupdf_sys::mupdf_drop_base_context(ctx);
        }
    }

    /// Sets the fill color a redaction annotation leaves behind.
    ///
    /// # Safety
    /// Same requirements as [`set_annotation_rect`].
    pub unsafe fn set_annotation_interior_color(annot: &PdfAnnotation, rgb: [f32; 3]) {
        let annot_raw = std::mem::transmute::<&PdfAnnotation, &PdfAnnotRaw>(annot);
        let ctx = mupdf_sys::mupdf_new_base_context();

        if !ctx.is_null() {
            mupdf_sys::pdf_set_annot_interior_color(ctx, annot_raw.inner, 3, rgb.as_ptr());
            mupdf_sys::mupdf_drop_base_context(ctx);
        }
    }
}
