//! Table cell geometry: crop-relative coordinates back to page space.
//!
//! The table recognizer works on a cropped (possibly rescaled, possibly
//! rotated) image of the table, so its cell boxes are relative to that crop.
//! Projecting a cell back means undoing the rotation, rescaling from the
//! recognizer's pixel size to the table's page size, and offsetting by the
//! table's top-left corner.

use crate::config::TableConfig;
use crate::domain::Bbox;

/// Pixel size of the image the table recognizer saw.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OcrSize {
    pub height: f64,
    pub width: f64,
}

impl OcrSize {
    /// Reads an `ocr_hw = [height, width]` pair; anything else (wrong length,
    /// non-positive sides) is treated as absent.
    pub fn from_hw(hw: &[f64]) -> Option<Self> {
        match hw {
            [height, width] if *height > 0.0 && *width > 0.0 => Some(Self {
                height: *height,
                width: *width,
            }),
            _ => None,
        }
    }
}

/// Maps table-cell boxes from crop space to page space.
#[derive(Debug, Clone, Copy, Default)]
pub struct TableCellProjector;

impl TableCellProjector {
    /// Projects `cell` into page coordinates.
    ///
    /// * `table` - the table block's page bbox; without it the cell passes
    ///   through unchanged.
    /// * `ocr` - recognizer image size; without it the scale is 1.0.
    /// * `rotated_width` - set when the crop was rotated 90° clockwise before
    ///   recognition. It is the width of the rotated image, and every corner
    ///   `(x, y)` is first mapped back with `(y, rotated_width - x)`.
    pub fn project_to_page(
        cell: &Bbox,
        table: Option<&Bbox>,
        ocr: Option<OcrSize>,
        rotated_width: Option<f64>,
    ) -> Bbox {
        let Some(table) = table else {
            return *cell;
        };

        let cell = match rotated_width {
            Some(width) => Self::unrotate(cell, width),
            None => *cell,
        };

        let (sx, sy) = match ocr {
            Some(size) => (table.width() / size.width, table.height() / size.height),
            None => (1.0, 1.0),
        };

        Bbox::new(
            cell.x0 * sx + table.x0,
            cell.y0 * sy + table.y0,
            cell.x1 * sx + table.x0,
            cell.y1 * sy + table.y0,
        )
    }

    /// Inverse of a 90° clockwise rotation applied to all four corners.
    fn unrotate(cell: &Bbox, rotated_width: f64) -> Bbox {
        let corners = [
            (cell.x0, cell.y0),
            (cell.x1, cell.y0),
            (cell.x0, cell.y1),
            (cell.x1, cell.y1),
        ];
        let mapped = corners.map(|(x, y)| (y, rotated_width - x));

        let xs = mapped.map(|(x, _)| x);
        let ys = mapped.map(|(_, y)| y);
        Bbox::new(
            xs.iter().copied().fold(f64::INFINITY, f64::min),
            ys.iter().copied().fold(f64::INFINITY, f64::min),
            xs.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            ys.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        )
    }
}

/// Heuristic that decides whether a table crop was captured sideways.
///
/// A crop is a candidate when it is clearly portrait; it is judged rotated
/// when enough of its detected text boxes are taller than wide. This is an
/// estimate from box shapes, not a guarantee.
#[derive(Debug, Clone, Default)]
pub struct TableOrientation {
    config: TableConfig,
}

impl TableOrientation {
    pub fn new(config: TableConfig) -> Self {
        Self { config }
    }

    pub fn is_portrait(&self, height: f64, width: f64) -> bool {
        width > 0.0 && height / width > self.config.portrait_ratio
    }

    /// Votes over `text_boxes` detected in a crop of `height` x `width`.
    pub fn is_rotated(&self, height: f64, width: f64, text_boxes: &[Bbox]) -> bool {
        if !self.is_portrait(height, width) || text_boxes.is_empty() {
            return false;
        }

        let tall = text_boxes
            .iter()
            .filter(|b| {
                let aspect = if b.height() > 0.0 {
                    b.width() / b.height()
                } else {
                    1.0
                };
                aspect < self.config.tall_box_aspect
            })
            .count();

        tall as f64 >= text_boxes.len() as f64 * self.config.rotation_vote_threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_without_ocr_size() {
        let cell = Bbox::new(5.0, 5.0, 15.0, 10.0);
        let table = Bbox::new(100.0, 200.0, 300.0, 400.0);
        let projected = TableCellProjector::project_to_page(&cell, Some(&table), None, None);
        assert_eq!(projected.to_array(), [105.0, 205.0, 115.0, 210.0]);
    }

    #[test]
    fn test_rescale_from_ocr_size() {
        let cell = Bbox::new(10.0, 10.0, 20.0, 20.0);
        let table = Bbox::new(100.0, 200.0, 300.0, 300.0);
        // recognizer saw 400x200 (w x h); table is 200x100 on the page
        let ocr = OcrSize::from_hw(&[200.0, 400.0]);
        let projected = TableCellProjector::project_to_page(&cell, Some(&table), ocr, None);
        assert_eq!(projected.to_array(), [105.0, 205.0, 110.0, 210.0]);
    }

    #[test]
    fn test_no_table_bbox_passes_through() {
        let cell = Bbox::new(1.0, 2.0, 3.0, 4.0);
        let ocr = OcrSize::from_hw(&[10.0, 10.0]);
        let projected = TableCellProjector::project_to_page(&cell, None, ocr, Some(50.0));
        assert_eq!(projected, cell);
    }

    #[test]
    fn test_rotation_is_undone_before_offset() {
        // corners (10,20) and (30,40) in a rotated crop 100 px wide map back
        // to (20,90) and (40,70)
        let cell = Bbox::new(10.0, 20.0, 30.0, 40.0);
        let table = Bbox::new(0.0, 0.0, 100.0, 100.0);
        let projected = TableCellProjector::project_to_page(&cell, Some(&table), None, Some(100.0));
        assert_eq!(projected.to_array(), [20.0, 70.0, 40.0, 90.0]);
    }

    #[test]
    fn test_ocr_size_rejects_bad_pairs() {
        assert!(OcrSize::from_hw(&[10.0]).is_none());
        assert!(OcrSize::from_hw(&[0.0, 10.0]).is_none());
        assert!(OcrSize::from_hw(&[10.0, 20.0, 30.0]).is_none());
    }

    #[test]
    fn test_orientation_vote() {
        let orientation = TableOrientation::default();
        let tall = Bbox::new(0.0, 0.0, 10.0, 40.0);
        let wide = Bbox::new(0.0, 0.0, 40.0, 10.0);

        // 1 of 3 tall boxes reaches the 30% threshold
        assert!(orientation.is_rotated(300.0, 100.0, &[tall, wide, wide]));
        // 1 of 4 does not
        assert!(!orientation.is_rotated(300.0, 100.0, &[tall, wide, wide, wide]));
        // landscape crops are never candidates
        assert!(!orientation.is_rotated(100.0, 300.0, &[tall, tall]));
    }

    #[test]
    fn test_orientation_threshold_is_configurable() {
        let orientation = TableOrientation::new(TableConfig {
            rotation_vote_threshold: 0.6,
            ..TableConfig::default()
        });
        let tall = Bbox::new(0.0, 0.0, 10.0, 40.0);
        let wide = Bbox::new(0.0, 0.0, 40.0, 10.0);
        assert!(!orientation.is_rotated(300.0, 100.0, &[tall, wide]));
        assert!(orientation.is_rotated(300.0, 100.0, &[tall, tall, wide]));
    }
}
