//! Geometry primitives and the character-width model.
//!
//! Everything here is pure: bounding boxes in page pixel space, the
//! relative advance assigned to each character, and the subdivision of a
//! line box into per-character boxes.

pub mod char_bbox;
pub mod char_width;

pub use char_bbox::LineToCharBboxExpander;
pub use char_width::{CharClass, CharWidthModel, CumulativeWidthProfile};

use serde::{Deserialize, Serialize};

/// Axis-aligned box `[x0, y0, x1, y1]` in page pixel space, origin top-left.
///
/// Serialized as a plain 4-element array. Constructors normalize the corners
/// so that `x1 >= x0` and `y1 >= y0` always hold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "[f64; 4]")]
pub struct Bbox {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl Bbox {
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self {
            x0: x0.min(x1),
            y0: y0.min(y1),
            x1: x0.max(x1),
            y1: y0.max(y1),
        }
    }

    /// Reads the first four components of a raw coordinate list.
    ///
    /// Returns `None` when fewer than four components are present.
    pub fn from_slice(coords: &[f64]) -> Option<Self> {
        match coords {
            [x0, y0, x1, y1, ..] => Some(Self::new(*x0, *y0, *x1, *y1)),
            _ => None,
        }
    }

    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f64 {
        self.y1 - self.y0
    }

    /// Smallest box containing both `self` and `other`.
    pub fn union(&self, other: &Bbox) -> Bbox {
        Bbox {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }

    /// Widens the box by `ratio` of its width on each side, then clips the
    /// horizontal extent to `[min_x, max_x]`. The vertical extent is kept.
    pub fn expand_horizontally(&self, ratio: f64, min_x: f64, max_x: f64) -> Bbox {
        let margin = self.width() * ratio;
        Bbox {
            x0: (self.x0 - margin).max(min_x),
            y0: self.y0,
            x1: (self.x1 + margin).min(max_x),
            y1: self.y1,
        }
    }

    pub fn to_array(self) -> [f64; 4] {
        [self.x0, self.y0, self.x1, self.y1]
    }
}

impl TryFrom<Vec<f64>> for Bbox {
    type Error = String;

    fn try_from(coords: Vec<f64>) -> Result<Self, Self::Error> {
        Bbox::from_slice(&coords)
            .ok_or_else(|| format!("bbox needs 4 components, got {}", coords.len()))
    }
}

impl From<Bbox> for [f64; 4] {
    fn from(bbox: Bbox) -> Self {
        bbox.to_array()
    }
}

/// Merges boxes into the single box containing all of them.
///
/// Used by callers that want one redaction rectangle per field rather than
/// one per matched segment. Returns `None` for an empty input.
pub fn merge_bboxes(bboxes: &[Bbox]) -> Option<Bbox> {
    let (first, rest) = bboxes.split_first()?;
    Some(rest.iter().fold(*first, |acc, b| acc.union(b)))
}
