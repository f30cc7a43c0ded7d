//! Test fixtures: layout documents, markdown, mappings and PDFs.
//!
//! The invoice fixture mirrors what the OCR/layout pipeline emits for a
//! one-page invoice: a title, labelled fields, a markdown table whose cells
//! come from a rescaled table crop, an HTML table spread over several lines,
//! and a page footer that never makes it into the markdown.

use anyhow::Result;
use printpdf::*;
use serde_json::{json, Value};
use std::fs;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

/// Rendered markdown of the invoice fixture.
pub const INVOICE_MARKDOWN: &str = "# 增值税电子普通发票

发票号码：12345678 开票日期：2024年01月05日

**购买方** 名称：深圳云创科技有限公司

| 项目 | 数量 | 金额 |
|---|---|---|
| 服务费 | 1 | 100.00 |

<table>
<tr><td>销售方</td>
<td>北京数据有限公司</td></tr>
</table>

注：**本发票**仅供测试

合计：¥100.00
";

fn text_span(content: &str, bbox: [f64; 4]) -> Value {
    json!({"type": "text", "content": content, "bbox": bbox})
}

fn text_block(bbox: [f64; 4], spans: Vec<Value>) -> Value {
    json!({"type": "text", "bbox": bbox, "lines": [{"bbox": bbox, "spans": spans}]})
}

fn table_block(bbox: [f64; 4], table_span: Value) -> Value {
    json!({
        "type": "table",
        "bbox": bbox,
        "blocks": [{
            "type": "table_body",
            "bbox": bbox,
            "lines": [{"bbox": bbox, "spans": [table_span]}]
        }]
    })
}

/// Layout JSON of the invoice fixture (one page, 15 runs once flattened).
pub fn invoice_layout() -> Value {
    // The table crop was recognized at twice its page size.
    let ocr_hw = [120.0, 1000.0];
    let cell = |text: &str, bbox: [f64; 4]| json!({"text": text, "bbox": bbox, "ocr_hw": ocr_hw});

    json!({
        "pdf_info": [{
            "page_idx": 0,
            "page_size": [595, 842],
            "preproc_blocks": [
                text_block([100.0, 40.0, 400.0, 70.0], vec![
                    text_span("增值税电子普通发票", [100.0, 40.0, 400.0, 70.0]),
                ]),
                text_block([50.0, 90.0, 550.0, 110.0], vec![
                    text_span("发票号码：12345678", [50.0, 90.0, 250.0, 110.0]),
                    text_span("开票日期：2024年01月05日", [300.0, 90.0, 550.0, 110.0]),
                ]),
                text_block([50.0, 130.0, 400.0, 150.0], vec![
                    text_span("购买方", [50.0, 130.0, 110.0, 150.0]),
                    text_span("名称：深圳云创科技有限公司", [120.0, 130.0, 400.0, 150.0]),
                ]),
                table_block([50.0, 170.0, 550.0, 230.0], json!({
                    "type": "table",
                    "bbox": [50, 170, 550, 230],
                    "table_cell_bboxes": [
                        cell("项目", [0.0, 0.0, 200.0, 60.0]),
                        cell("数量", [400.0, 0.0, 600.0, 60.0]),
                        cell("金额", [800.0, 0.0, 1000.0, 60.0]),
                        cell("服务费", [0.0, 60.0, 200.0, 120.0]),
                        cell("1", [400.0, 60.0, 600.0, 120.0]),
                        cell("100.00", [800.0, 60.0, 1000.0, 120.0]),
                    ]
                })),
                table_block([50.0, 240.0, 550.0, 280.0], json!({
                    "type": "table",
                    "bbox": [50, 240, 550, 280],
                    "table_texts": [
                        {"text": "销售方", "bbox": [0, 0, 100, 40]},
                        {"text": "北京数据有限公司", "bbox": [120, 0, 500, 40]}
                    ]
                })),
                text_block([50.0, 300.0, 300.0, 320.0], vec![
                    text_span("注：本发票仅供测试", [50.0, 300.0, 300.0, 320.0]),
                ]),
                text_block([50.0, 340.0, 200.0, 360.0], vec![
                    text_span("合计：¥100.00", [50.0, 340.0, 200.0, 360.0]),
                ]),
            ],
            "discarded_blocks": [
                text_block([280.0, 800.0, 320.0, 815.0], vec![
                    text_span("第1页", [280.0, 800.0, 320.0, 815.0]),
                ]),
            ]
        }]
    })
}

/// One table whose crop was recognized as a 100 x 300 portrait image. One
/// of its three cells is taller than wide. `rotated` is written onto the
/// first cell when given.
pub fn sideways_table_layout(rotated: Option<bool>) -> Value {
    let ocr_hw = [300.0, 100.0];
    let mut first = json!({"text": "单价", "bbox": [10, 30, 20, 60], "ocr_hw": ocr_hw});
    if let Some(flag) = rotated {
        first["rotated"] = json!(flag);
    }

    json!({
        "pdf_info": [{
            "page_idx": 0,
            "preproc_blocks": [
                table_block([100.0, 300.0, 300.0, 400.0], json!({
                    "type": "table",
                    "bbox": [100, 300, 300, 400],
                    "table_cell_bboxes": [
                        first,
                        {"text": "数量", "bbox": [30, 20, 90, 40], "ocr_hw": ocr_hw},
                        {"text": "金额", "bbox": [30, 50, 90, 70], "ocr_hw": ocr_hw},
                    ]
                })),
            ]
        }]
    })
}

/// Writes the invoice layout and markdown into `dir`.
pub fn write_invoice_inputs(dir: &Path) -> Result<(PathBuf, PathBuf)> {
    let layout = dir.join("invoice_middle.json");
    let markdown = dir.join("invoice.md");
    fs::write(&layout, serde_json::to_string_pretty(&invoice_layout())?)?;
    fs::write(&markdown, INVOICE_MARKDOWN)?;
    Ok((layout, markdown))
}

/// Character offset of the first occurrence of `needle` in `text`.
pub fn char_offset(text: &str, needle: &str) -> usize {
    let byte = text
        .find(needle)
        .unwrap_or_else(|| panic!("'{}' not in text", needle));
    text[..byte].chars().count()
}

/// Writes a mapping JSON value to `dir/name`.
pub fn write_mapping(dir: &Path, name: &str, mapping: &Value) -> Result<PathBuf> {
    let path = dir.join(name);
    fs::write(&path, serde_json::to_string_pretty(mapping)?)?;
    Ok(path)
}

/// Run-level mapping with a few labelled fields on the first page and one
/// entry on a page the test PDFs do not have.
pub fn sample_mapping() -> Value {
    json!({
        "发票号码：12345678": {"bbox": [100, 50, 200, 60], "page_index": 0},
        "发票": {"bbox": [300, 50, 320, 60], "page_index": 0},
        "号码": {"bbox": [330, 50, 350, 60], "page_index": 0},
        "张": {"bbox": [10, 10, 20, 20], "page_index": 1},
        "三": {"bbox": [20, 10, 30, 20], "page_index": 1},
        "附件": {"bbox": [50, 50, 90, 60], "page_index": 7}
    })
}

/// Builder for creating test PDFs with one or more pages of text.
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// # use anyhow::Result;
/// # fn main() -> Result<()> {
/// let pdf = TestPdfBuilder::new()
///     .with_page(&["Invoice No: 12345678", "Total: 100.00"])
///     .with_page(&["Attachment"])
///     .build(Path::new("/tmp/test.pdf"))?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct TestPdfBuilder {
    title: String,
    pages: Vec<Vec<String>>,
    page_width: Mm,
    page_height: Mm,
}

impl TestPdfBuilder {
    /// Creates a new test PDF builder with default settings.
    pub fn new() -> Self {
        Self {
            title: "Test Document".to_string(),
            pages: Vec::new(),
            page_width: Mm(210.0),  // A4 width
            page_height: Mm(297.0), // A4 height
        }
    }

    /// Sets the document title.
    pub fn with_title(mut self, title: &str) -> Self {
        self.title = title.to_string();
        self
    }

    /// Adds a page holding `lines` of text.
    pub fn with_page(mut self, lines: &[&str]) -> Self {
        self.pages.push(lines.iter().map(|l| l.to_string()).collect());
        self
    }

    /// Sets custom page dimensions.
    pub fn with_dimensions(mut self, width: f32, height: f32) -> Self {
        self.page_width = Mm(width);
        self.page_height = Mm(height);
        self
    }

    /// Builds the PDF and writes it to the specified path.
    pub fn build(self, output_path: &Path) -> Result<PathBuf> {
        let (doc, page1, layer1) =
            PdfDocument::new(&self.title, self.page_width, self.page_height, "Layer 1");
        let font = doc.add_builtin_font(BuiltinFont::Helvetica)?;

        let pages = if self.pages.is_empty() {
            vec![vec![self.title.clone()]]
        } else {
            self.pages
        };

        for (index, lines) in pages.iter().enumerate() {
            let layer = if index == 0 {
                doc.get_page(page1).get_layer(layer1)
            } else {
                let (page, layer) = doc.add_page(self.page_width, self.page_height, "Layer 1");
                doc.get_page(page).get_layer(layer)
            };

            for (i, line) in lines.iter().enumerate() {
                let y = self.page_height.0 - 25.0 - 8.0 * i as f32;
                layer.use_text(line.as_str(), 12.0, Mm(20.0), Mm(y), &font);
            }
        }

        doc.save(&mut BufWriter::new(fs::File::create(output_path)?))?;

        Ok(output_path.to_path_buf())
    }
}

impl Default for TestPdfBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Quick helper to create a two-page invoice PDF.
pub fn create_invoice_pdf(path: &Path) -> Result<PathBuf> {
    TestPdfBuilder::new()
        .with_title("Invoice")
        .with_page(&["Invoice No: 12345678", "Date: 2024-01-05", "Total: 100.00"])
        .with_page(&["Buyer: Zhang San"])
        .build(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_pattern() {
        let builder = TestPdfBuilder::new()
            .with_title("Test")
            .with_page(&["a", "b"])
            .with_page(&["c"]);

        assert_eq!(builder.title, "Test");
        assert_eq!(builder.pages.len(), 2);
    }

    #[test]
    fn test_char_offset() {
        assert_eq!(char_offset("发票号码", "号码"), 2);
    }
}
