//! Overlay redaction strategy using LoPDF.
//!
//! Draws filled rectangles on top of the existing page content. The text
//! underneath stays in the file; use the secure strategy when it has to go.

use std::path::Path;

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use tracing::{debug, warn};

use super::strategy::{regions_by_page, MaskColor, RedactionRegion, RedactionResult, RedactionStrategy};
use crate::domain::Bbox;
use crate::error::{MaskError, MaskResult};

/// Page box in PDF user space (origin bottom-left).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageBox {
    pub llx: f64,
    pub lly: f64,
    pub urx: f64,
    pub ury: f64,
}

impl PageBox {
    /// US Letter, used when a page has no readable MediaBox.
    pub const LETTER: PageBox = PageBox {
        llx: 0.0,
        lly: 0.0,
        urx: 612.0,
        ury: 792.0,
    };

    pub fn width(&self) -> f64 {
        self.urx - self.llx
    }

    /// Converts a top-left-origin box into a `re` rectangle
    /// `(x, y, width, height)` in PDF user space.
    pub fn to_pdf_rect(&self, bbox: &Bbox) -> [f64; 4] {
        [
            self.llx + bbox.x0,
            self.ury - bbox.y1,
            bbox.width(),
            bbox.height(),
        ]
    }
}

/// Visual redaction strategy that paints opaque boxes with LoPDF.
#[derive(Debug, Clone, Copy, Default)]
pub struct OverlayRedactionStrategy;

impl OverlayRedactionStrategy {
    pub fn new() -> Self {
        Self
    }
}

impl RedactionStrategy for OverlayRedactionStrategy {
    fn apply(
        &self,
        input: &Path,
        output: &Path,
        regions: &[RedactionRegion],
        color: MaskColor,
        margin: f64,
    ) -> MaskResult<RedactionResult> {
        let mut doc = Document::load(input).map_err(|e| MaskError::PdfProcessing {
            message: "Failed to open PDF with LoPDF".to_string(),
            page: None,
            source: Some(Box::new(e)),
        })?;

        let pages = doc.get_pages();
        let mut result = RedactionResult {
            pages_processed: pages.len(),
            secure: false,
            ..Default::default()
        };

        for (page_index, page_regions) in regions_by_page(regions) {
            let Some(&page_id) = pages.get(&(page_index as u32 + 1)) else {
                warn!(
                    page = page_index,
                    pages = pages.len(),
                    regions = page_regions.len(),
                    "page index out of range, skipping"
                );
                result.skipped_out_of_range += page_regions.len();
                continue;
            };

            let page_box = page_media_box(&doc, page_id);
            let rects: Vec<[f64; 4]> = page_regions
                .iter()
                .map(|region| {
                    let expanded = region.bbox.expand_horizontally(margin, 0.0, page_box.width());
                    page_box.to_pdf_rect(&expanded)
                })
                .collect();

            append_page_content(&mut doc, page_id, fill_operations(&rects, color)).map_err(|e| {
                MaskError::PdfProcessing {
                    message: "Failed to append overlay content".to_string(),
                    page: Some(page_index + 1),
                    source: Some(Box::new(e)),
                }
            })?;

            debug!(page = page_index, boxes = rects.len(), "overlay drawn");
            result.instances_redacted += rects.len();
            result.pages_modified += 1;
        }

        if result.has_redactions() {
            doc.save(output).map_err(|e| MaskError::PdfProcessing {
                message: format!("Failed to save '{}'", output.display()),
                page: None,
                source: Some(Box::new(e)),
            })?;
        } else {
            // Nothing drawn - just copy the file
            std::fs::copy(input, output).map_err(|e| MaskError::io(output, e))?;
        }

        Ok(result)
    }

    fn name(&self) -> &str {
        "OverlayRedaction"
    }

    fn is_secure(&self) -> bool {
        false
    }
}

fn real(value: f64) -> Object {
    Object::Real(value as f32)
}

/// `q <color> rg <rects> re ... f Q`
fn fill_operations(rects: &[[f64; 4]], color: MaskColor) -> Vec<Operation> {
    let mut operations = vec![
        Operation::new("q", vec![]),
        Operation::new(
            "rg",
            color.components().iter().map(|&c| Object::Real(c)).collect(),
        ),
    ];
    for rect in rects {
        operations.push(Operation::new("re", rect.iter().map(|&v| real(v)).collect()));
    }
    operations.push(Operation::new("f", vec![]));
    operations.push(Operation::new("Q", vec![]));
    operations
}

/// Appends `operations` after the page's content, with the existing content
/// wrapped in `q`/`Q` so its graphics state does not leak into the overlay.
fn append_page_content(
    doc: &mut Document,
    page_id: ObjectId,
    operations: Vec<Operation>,
) -> Result<(), lopdf::Error> {
    let overlay = Content { operations }.encode()?;

    let open_id = doc.add_object(Object::Stream(Stream::new(Dictionary::new(), b"q\n".to_vec())));
    let mut body = b"Q\n".to_vec();
    body.extend(overlay);
    let overlay_id = doc.add_object(Object::Stream(Stream::new(Dictionary::new(), body)));

    let page = doc.get_object_mut(page_id).and_then(Object::as_dict_mut)?;
    let mut contents = match page.get(b"Contents") {
        Ok(Object::Reference(id)) => vec![Object::Reference(*id)],
        Ok(Object::Array(items)) => items.clone(),
        _ => Vec::new(),
    };
    contents.insert(0, Object::Reference(open_id));
    contents.push(Object::Reference(overlay_id));
    page.set("Contents", Object::Array(contents));
    Ok(())
}

/// MediaBox of a page, following `Parent` links for inherited boxes.
pub(crate) fn page_media_box(doc: &Document, page_id: ObjectId) -> PageBox {
    let mut current = doc.get_dictionary(page_id).ok();
    let mut depth = 0;

    while let Some(dict) = current {
        if let Some(page_box) = dict.get(b"MediaBox").ok().and_then(|obj| parse_box(doc, obj)) {
            return page_box;
        }
        depth += 1;
        if depth > 32 {
            break;
        }
        current = dict
            .get(b"Parent")
            .and_then(Object::as_reference)
            .and_then(|id| doc.get_dictionary(id))
            .ok();
    }

    PageBox::LETTER
}

fn parse_box(doc: &Document, obj: &Object) -> Option<PageBox> {
    let obj = match obj {
        Object::Reference(id) => doc.get_object(*id).ok()?,
        other => other,
    };
    let values = obj
        .as_array()
        .ok()?
        .iter()
        .map(number)
        .collect::<Option<Vec<f64>>>()?;
    match values.as_slice() {
        [x0, y0, x1, y1] => Some(PageBox {
            llx: x0.min(*x1),
            lly: y0.min(*y1),
            urx: x0.max(*x1),
            ury: y0.max(*y1),
        }),
        _ => None,
    }
}

fn number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(f64::from(*r)),
        _ => None,
    }
}
