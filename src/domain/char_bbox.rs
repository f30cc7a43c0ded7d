//! Subdivision of a line box into per-character boxes.

use super::{Bbox, CharWidthModel};

/// Splits a line-level bounding box into one box per character.
///
/// Horizontal spans follow the cumulative width profile of the text. OCR
/// line boxes hug the glyphs tightly, so each span is widened by
/// `extension` of its own width on both sides and clipped back to the line.
/// Every character keeps the line's full vertical extent.
#[derive(Debug, Clone)]
pub struct LineToCharBboxExpander {
    model: CharWidthModel,
    extension: f64,
}

impl Default for LineToCharBboxExpander {
    fn default() -> Self {
        Self::new(CharWidthModel::default())
    }
}

impl LineToCharBboxExpander {
    pub fn new(model: CharWidthModel) -> Self {
        Self {
            model,
            extension: 0.5,
        }
    }

    /// Sets the per-side extension as a fraction of each character's width.
    pub fn with_extension(mut self, extension: f64) -> Self {
        self.extension = extension;
        self
    }

    pub fn model(&self) -> &CharWidthModel {
        &self.model
    }

    /// Returns exactly one box per character of `text`, or nothing for an
    /// empty text.
    pub fn expand(&self, text: &str, line: &Bbox) -> Vec<Bbox> {
        let profile = self.model.cumulative_profile(text);
        if profile.len() <= 1 {
            return Vec::new();
        }

        let ratios = profile.ratios();
        let width = line.width();

        ratios
            .windows(2)
            .map(|pair| {
                let start = line.x0 + width * pair[0];
                let end = line.x0 + width * pair[1];
                let extension = (end - start) * self.extension;
                Bbox {
                    x0: (start - extension).max(line.x0),
                    y0: line.y0,
                    x1: (end + extension).min(line.x1),
                    y1: line.y1,
                }
            })
            .collect()
    }

    /// Like [`expand`](Self::expand) for raw coordinates; fewer than four
    /// components yield no boxes.
    pub fn expand_raw(&self, text: &str, line: &[f64]) -> Vec<Bbox> {
        match Bbox::from_slice(line) {
            Some(bbox) => self.expand(text, &bbox),
            None => Vec::new(),
        }
    }
}
