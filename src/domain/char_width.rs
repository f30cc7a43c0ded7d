//! Relative horizontal advance of characters.
//!
//! OCR engines report geometry per line, never per glyph. To place a single
//! character inside a line box we need its share of the line's width, which
//! this model estimates from the character's script/category. CJK ideographs
//! are the unit (1.0); Latin letters and digits are half as wide.

use unicode_width::UnicodeWidthChar;

/// ASCII punctuation treated as narrow.
const NARROW_PUNCTUATION: &str = ".,!?;:()[]{}\"'-_/\\@#$%^&*+=<>|`~";

/// Width class of a character, in classification order (first match wins).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CharClass {
    /// CJK unified ideographs, U+4E00..=U+9FFF
    CjkIdeograph,
    /// CJK punctuation, fullwidth forms, or East-Asian Wide/Fullwidth
    Fullwidth,
    /// ASCII 0-9; other numeric characters fall through to later classes
    Digit,
    AsciiLetter,
    Punctuation,
    Whitespace,
    /// East-Asian Narrow or Halfwidth
    Narrow,
    Other,
}

impl CharClass {
    pub fn classify(c: char) -> Self {
        if is_cjk_ideograph(c) {
            Self::CjkIdeograph
        } else if matches!(c, '\u{3000}'..='\u{303F}' | '\u{FF00}'..='\u{FFEF}')
            || c.width() == Some(2)
        {
            Self::Fullwidth
        } else if c.is_ascii_digit() {
            Self::Digit
        } else if c.is_ascii_alphabetic() {
            Self::AsciiLetter
        } else if NARROW_PUNCTUATION.contains(c) {
            Self::Punctuation
        } else if c.is_whitespace() {
            Self::Whitespace
        } else if is_east_asian_narrow(c) {
            Self::Narrow
        } else {
            Self::Other
        }
    }
}

/// True for CJK unified ideographs (U+4E00..=U+9FFF).
pub fn is_cjk_ideograph(c: char) -> bool {
    ('\u{4E00}'..='\u{9FFF}').contains(&c)
}

/// East-Asian-Width `Na` or `H` outside printable ASCII.
///
/// `unicode-width` folds Narrow, Halfwidth, Neutral and Ambiguous into width
/// 1, so the few non-ASCII Narrow/Halfwidth ranges are listed explicitly.
fn is_east_asian_narrow(c: char) -> bool {
    matches!(
        c,
        '\u{0020}'..='\u{007E}'
            | '\u{00A2}'
            | '\u{00A3}'
            | '\u{00A5}'
            | '\u{00A6}'
            | '\u{00AC}'
            | '\u{00AF}'
            | '\u{20A9}'
            | '\u{27E6}'..='\u{27ED}'
            | '\u{2985}'
            | '\u{2986}'
            | '\u{FF61}'..='\u{FFDC}'
            | '\u{FFE8}'..='\u{FFEE}'
    )
}

/// Maps characters to a positive relative advance.
#[derive(Debug, Clone, PartialEq)]
pub struct CharWidthModel {
    wide: f64,
    narrow: f64,
    other: f64,
}

impl Default for CharWidthModel {
    fn default() -> Self {
        Self {
            wide: 1.0,
            narrow: 0.5,
            other: 0.8,
        }
    }
}

impl CharWidthModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn width_of(&self, c: char) -> f64 {
        self.width_of_class(CharClass::classify(c))
    }

    pub fn width_of_class(&self, class: CharClass) -> f64 {
        match class {
            CharClass::CjkIdeograph | CharClass::Fullwidth => self.wide,
            CharClass::Digit
            | CharClass::AsciiLetter
            | CharClass::Punctuation
            | CharClass::Whitespace
            | CharClass::Narrow => self.narrow,
            CharClass::Other => self.other,
        }
    }

    /// Prefix sums of per-character advances, normalized to `[0, 1]`.
    ///
    /// For a text of `n` characters the profile holds `n + 1` ratios with
    /// `ratio[0] == 0` and `ratio[n] == 1`. An empty text yields an empty
    /// profile.
    pub fn cumulative_profile(&self, text: &str) -> CumulativeWidthProfile {
        let widths: Vec<f64> = text.chars().map(|c| self.width_of(c)).collect();
        if widths.is_empty() {
            return CumulativeWidthProfile(Vec::new());
        }

        let total: f64 = widths.iter().sum();
        let mut ratios = Vec::with_capacity(widths.len() + 1);
        ratios.push(0.0);

        let mut running = 0.0;
        for width in widths {
            running += width;
            ratios.push(if total > 0.0 { running / total } else { 0.0 });
        }

        CumulativeWidthProfile(ratios)
    }
}

/// Normalized prefix sums produced by [`CharWidthModel::cumulative_profile`].
#[derive(Debug, Clone, PartialEq)]
pub struct CumulativeWidthProfile(Vec<f64>);

impl CumulativeWidthProfile {
    pub fn ratios(&self) -> &[f64] {
        &self.0
    }

    /// Ratio at character boundary `i` (0 = left edge, `n` = right edge).
    pub fn ratio(&self, i: usize) -> Option<f64> {
        self.0.get(i).copied()
    }

    /// Number of boundaries, i.e. characters + 1 (0 for an empty text).
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
