//! Custom assertions for mapping and masking tests.
//!
//! Provides domain-specific assertions that make tests more readable
//! and provide better error messages.

use fieldmask::Bbox;
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object};
use std::path::Path;

const TOLERANCE: f64 = 1e-3;

/// Asserts that a box matches `[x0, y0, x1, y1]` within a small tolerance.
///
/// # Panics
/// Panics if any component differs by more than the tolerance.
pub fn assert_bbox_eq(actual: Bbox, expected: [f64; 4]) {
    let actual = actual.to_array();
    assert!(
        actual
            .iter()
            .zip(expected.iter())
            .all(|(a, e)| (a - e).abs() < TOLERANCE),
        "bbox mismatch: got {:?}, expected {:?}",
        actual,
        expected
    );
}

/// Asserts that `outer` contains `inner`.
pub fn assert_bbox_contains(outer: Bbox, inner: Bbox) {
    assert!(
        outer.x0 <= inner.x0 + TOLERANCE
            && outer.y0 <= inner.y0 + TOLERANCE
            && outer.x1 + TOLERANCE >= inner.x1
            && outer.y1 + TOLERANCE >= inner.y1,
        "{:?} does not contain {:?}",
        outer.to_array(),
        inner.to_array()
    );
}

/// Asserts that a PDF exists and can be loaded.
///
/// # Panics
/// Panics if the PDF is missing or cannot be parsed.
pub fn assert_valid_pdf(pdf_path: &Path) {
    assert!(
        pdf_path.exists(),
        "PDF should exist at '{}'",
        pdf_path.display()
    );
    Document::load(pdf_path)
        .unwrap_or_else(|e| panic!("PDF at '{}' is not loadable: {}", pdf_path.display(), e));
}

/// Number of pages in a PDF.
pub fn page_count(pdf_path: &Path) -> usize {
    load_or_panic(pdf_path).get_pages().len()
}

/// Operations of the last content stream of a page (zero-based index), which
/// is where the overlay strategy appends its drawing.
pub fn overlay_operations(pdf_path: &Path, page_index: usize) -> Vec<Operation> {
    let doc = load_or_panic(pdf_path);
    let page_id = *doc
        .get_pages()
        .get(&(page_index as u32 + 1))
        .unwrap_or_else(|| panic!("page {} missing", page_index));

    let last = *doc
        .get_page_contents(page_id)
        .last()
        .expect("page has no content streams");
    let stream = doc
        .get_object(last)
        .and_then(Object::as_stream)
        .expect("content is a stream");
    let data = stream
        .decompressed_content()
        .unwrap_or_else(|_| stream.content.clone());

    Content::decode(&data)
        .expect("overlay content decodes")
        .operations
}

/// `re` operands of the overlay stream, as `[x, y, width, height]`.
pub fn overlay_rects(pdf_path: &Path, page_index: usize) -> Vec<[f64; 4]> {
    overlay_operations(pdf_path, page_index)
        .iter()
        .filter(|op| op.operator == "re")
        .map(|op| {
            let values: Vec<f64> = op.operands.iter().map(number).collect();
            [values[0], values[1], values[2], values[3]]
        })
        .collect()
}

/// Asserts that two PDF rectangles match within a small tolerance.
pub fn assert_rect_eq(actual: [f64; 4], expected: [f64; 4]) {
    assert!(
        actual
            .iter()
            .zip(expected.iter())
            .all(|(a, e)| (a - e).abs() < 0.01),
        "rect mismatch: got {:?}, expected {:?}",
        actual,
        expected
    );
}

// Helper functions

fn load_or_panic(pdf_path: &Path) -> Document {
    Document::load(pdf_path)
        .unwrap_or_else(|e| panic!("Failed to load PDF '{}': {}", pdf_path.display(), e))
}

fn number(obj: &Object) -> f64 {
    match obj {
        Object::Integer(i) => *i as f64,
        Object::Real(r) => f64::from(*r),
        other => panic!("expected a number, got {:?}", other),
    }
}
