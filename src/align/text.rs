//! Document text views used by the alignment strategies.
//!
//! Each view is a projection of the rendered document text (markdown
//! stripped, whitespace removed, ...) that remembers, for every character it
//! keeps, where that character came from. A hit in a projection can then be
//! mapped back to byte offsets in the original text.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::char_width::is_cjk_ideograph;

/// Collapses every whitespace run to one space and trims both ends.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[derive(Debug, Clone, Copy)]
struct Origin {
    projected: usize,
    source: usize,
    source_len: usize,
}

/// A filtered copy of a source text with a map back to source offsets.
#[derive(Debug, Clone, Default)]
pub struct ProjectedText {
    text: String,
    origins: Vec<Origin>,
}

impl ProjectedText {
    /// Keeps only the characters accepted by `keep`.
    pub fn filtered(source: &str, keep: impl Fn(char) -> bool) -> Self {
        let mut projected = Self::default();
        for (pos, c) in source.char_indices() {
            if keep(c) {
                projected.push(c, pos, c.len_utf8());
            }
        }
        projected
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    fn push(&mut self, c: char, source: usize, source_len: usize) {
        self.origins.push(Origin {
            projected: self.text.len(),
            source,
            source_len,
        });
        self.text.push(c);
    }

    /// Pushes whitespace as a single space, merging with a preceding space.
    fn push_space(&mut self, source: usize, source_len: usize) {
        if !self.text.ends_with(' ') {
            self.push(' ', source, source_len);
        }
    }

    /// Projected offset of the first kept character at or after `source`.
    fn projected_cursor(&self, source: usize) -> usize {
        let i = self.origins.partition_point(|o| o.source < source);
        self.origins
            .get(i)
            .map_or(self.text.len(), |origin| origin.projected)
    }

    /// Source byte range covered by the projected range `[start, end)`.
    fn source_span(&self, start: usize, end: usize) -> Option<(usize, usize)> {
        let first = self
            .origins
            .binary_search_by_key(&start, |o| o.projected)
            .ok()?;
        let last = self.origins.partition_point(|o| o.projected < end).checked_sub(1)?;
        let first = self.origins[first];
        let last = self.origins[last];
        Some((first.source, last.source + last.source_len))
    }

    /// Finds `needle` in the projection, starting at the first character that
    /// comes from at or after `source_cursor`, and returns the source range.
    pub fn find(&self, needle: &str, source_cursor: usize) -> Option<(usize, usize)> {
        if needle.is_empty() {
            return None;
        }
        let from = self.projected_cursor(source_cursor);
        let pos = from + self.text[from..].find(needle)?;
        self.source_span(pos, pos + needle.len())
    }
}

/// Removes markdown formatting while keeping a map to the source text.
///
/// Drops heading markers, emphasis asterisks, inline code and fence
/// backticks, list/quote/ordered-list markers, horizontal rules and table
/// pipes; keeps the anchor text of links and images. Whitespace runs collapse
/// to one space.
pub fn strip_formatting(source: &str) -> ProjectedText {
    let chars: Vec<(usize, char)> = source.char_indices().collect();
    let mut out = ProjectedText::default();
    let mut line_start = true;
    let mut i = 0;

    while i < chars.len() {
        let (pos, c) = chars[i];

        if c == '\n' {
            out.push_space(pos, 1);
            line_start = true;
            i += 1;
            continue;
        }

        if line_start {
            if c.is_whitespace() {
                out.push_space(pos, c.len_utf8());
                i += 1;
                continue;
            }
            if let Some(next) = skip_line_marker(&chars, i) {
                i = next;
                // quotes may nest ("> > text"), everything else ends the prefix
                line_start = c == '>';
                continue;
            }
            line_start = false;
        }

        match c {
            '*' | '`' | '|' => i += 1,
            '!' if next_char(&chars, i) == Some('[') => i += 1,
            '[' => match link_parts(&chars, i) {
                Some((text_end, after)) => {
                    for &(p, lc) in &chars[i + 1..text_end] {
                        if lc.is_whitespace() {
                            out.push_space(p, lc.len_utf8());
                        } else {
                            out.push(lc, p, lc.len_utf8());
                        }
                    }
                    i = after;
                }
                None => {
                    out.push(c, pos, 1);
                    i += 1;
                }
            },
            _ if c.is_whitespace() => {
                out.push_space(pos, c.len_utf8());
                i += 1;
            }
            _ => {
                out.push(c, pos, c.len_utf8());
                i += 1;
            }
        }
    }

    out
}

/// Formatting-stripped, whitespace-normalized form of a run's text.
pub fn strip_run_formatting(text: &str) -> String {
    strip_formatting(text).as_str().trim().to_string()
}

fn next_char(chars: &[(usize, char)], i: usize) -> Option<char> {
    chars.get(i + 1).map(|&(_, c)| c)
}

/// Recognizes a block marker at the start of a line and returns the index
/// just past it (and any following spaces).
fn skip_line_marker(chars: &[(usize, char)], i: usize) -> Option<usize> {
    let c = chars[i].1;
    let line_end = chars[i..]
        .iter()
        .position(|&(_, c)| c == '\n')
        .map_or(chars.len(), |n| i + n);
    let line = &chars[i..line_end];

    let is_rule = line.iter().filter(|&&(_, c)| !c.is_whitespace()).count() >= 3
        && line
            .iter()
            .all(|&(_, c)| c.is_whitespace() || c == line[0].1)
        && matches!(c, '-' | '*' | '_');
    if is_rule {
        return Some(line_end);
    }

    let after_marker = match c {
        '#' => i + line.iter().take_while(|&&(_, c)| c == '#').count(),
        '>' => i + 1,
        '-' | '+' | '*' if matches!(next_char(chars, i), Some(' ' | '\t')) => i + 1,
        _ if c.is_ascii_digit() => {
            let digits = line.iter().take_while(|&&(_, c)| c.is_ascii_digit()).count();
            let dot = i + digits;
            let followed_by_space = chars
                .get(dot + 1)
                .is_some_and(|&(_, c)| c == ' ' || c == '\t');
            if chars.get(dot).map(|&(_, c)| c) == Some('.') && followed_by_space {
                dot + 1
            } else {
                return None;
            }
        }
        _ => return None,
    };

    let spaces = chars[after_marker..line_end]
        .iter()
        .take_while(|&&(_, c)| c == ' ' || c == '\t')
        .count();
    Some(after_marker + spaces)
}

/// For `[text](url)` starting at `open`, returns the index of `]` and the
/// index just past `)`.
fn link_parts(chars: &[(usize, char)], open: usize) -> Option<(usize, usize)> {
    let close = open + chars[open..].iter().position(|&(_, c)| c == ']' || c == '\n')?;
    if chars[close].1 != ']' || next_char(chars, close) != Some('(') {
        return None;
    }
    let paren = close + 1;
    let end = paren + chars[paren..].iter().position(|&(_, c)| c == ')' || c == '\n')?;
    if chars[end].1 != ')' {
        return None;
    }
    Some((close, end + 1))
}

/// An inline `<table>...</table>` fragment and its visible text.
#[derive(Debug, Clone)]
pub struct HtmlFragment {
    pub start: usize,
    pub end: usize,
    pub plain_text: String,
}

fn table_pattern() -> &'static Regex {
    static PATTERN: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"(?is)<table\b.*?</table\s*>").expect("Valid table regex"));
    &PATTERN
}

fn tag_pattern() -> &'static Regex {
    static PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("Valid tag regex"));
    &PATTERN
}

pub fn html_fragments(text: &str) -> Vec<HtmlFragment> {
    table_pattern()
        .find_iter(text)
        .map(|m| HtmlFragment {
            start: m.start(),
            end: m.end(),
            plain_text: html_plain_text(m.as_str()),
        })
        .collect()
}

/// Visible text of an HTML fragment: tags become spaces, common entities
/// are decoded, whitespace is normalized.
pub fn html_plain_text(html: &str) -> String {
    let without_tags = tag_pattern().replace_all(html, " ");
    let decoded = without_tags
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");
    normalize_whitespace(&decoded)
}

/// True for characters the alphanumeric fuzzy tier keeps.
pub fn is_alnum_or_cjk(c: char) -> bool {
    c.is_alphanumeric() || is_cjk_ideograph(c)
}

/// The rendered document text with every precomputed view the strategies
/// search in. All offsets handed out are byte offsets into `text`.
#[derive(Debug)]
pub struct DocumentText<'a> {
    text: &'a str,
    char_starts: Vec<usize>,
    clean: ProjectedText,
    collapsed: ProjectedText,
    alnum: ProjectedText,
    html: Vec<HtmlFragment>,
}

impl<'a> DocumentText<'a> {
    pub fn new(text: &'a str) -> Self {
        Self {
            text,
            char_starts: text.char_indices().map(|(pos, _)| pos).collect(),
            clean: strip_formatting(text),
            collapsed: ProjectedText::filtered(text, |c| !c.is_whitespace()),
            alnum: ProjectedText::filtered(text, is_alnum_or_cjk),
            html: html_fragments(text),
        }
    }

    pub fn text(&self) -> &'a str {
        self.text
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Substring search from byte offset `from`.
    pub fn find(&self, needle: &str, from: usize) -> Option<usize> {
        if needle.is_empty() || from > self.text.len() {
            return None;
        }
        self.text[from..].find(needle).map(|pos| from + pos)
    }

    /// Character index of a byte offset on a char boundary.
    pub fn char_index(&self, byte: usize) -> usize {
        self.char_starts.partition_point(|&start| start < byte)
    }

    /// Number of characters in the byte range `[start, end)`.
    pub fn char_len(&self, start: usize, end: usize) -> usize {
        self.char_index(end) - self.char_index(start)
    }

    pub fn clean(&self) -> &ProjectedText {
        &self.clean
    }

    pub fn collapsed(&self) -> &ProjectedText {
        &self.collapsed
    }

    pub fn alnum(&self) -> &ProjectedText {
        &self.alnum
    }

    pub fn html_fragments(&self) -> &[HtmlFragment] {
        &self.html
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_whitespace() {
        assert_eq!(normalize_whitespace("  a \n\t b  "), "a b");
        assert_eq!(normalize_whitespace("   "), "");
    }

    #[test]
    fn test_strip_headings_emphasis_and_pipes() {
        let clean = strip_formatting("# Title\n**bold** and `code`\n| a | b |");
        assert_eq!(clean.as_str(), "Title bold and code a b ");
    }

    #[test]
    fn test_strip_lists_quotes_and_rules() {
        let clean = strip_formatting("- item\n> quoted\n---\n12. step\n+ plus");
        assert_eq!(clean.as_str(), "item quoted step plus");
    }

    #[test]
    fn test_strip_links_and_images() {
        let clean = strip_formatting("see [the docs](http://x.y) and ![logo](a.png)");
        assert_eq!(clean.as_str(), "see the docs and logo");
    }

    #[test]
    fn test_unmatched_bracket_is_kept() {
        let clean = strip_formatting("[draft] v2");
        assert_eq!(clean.as_str(), "[draft] v2");
    }

    #[test]
    fn test_projected_find_maps_back_to_source() {
        let source = "x **张三** y";
        let clean = strip_formatting(source);
        let (start, end) = clean.find("张三", 0).unwrap();
        assert_eq!(&source[start..end], "张三");
    }

    #[test]
    fn test_projected_find_respects_cursor() {
        let source = "ab ab";
        let collapsed = ProjectedText::filtered(source, |c| !c.is_whitespace());
        assert_eq!(collapsed.find("ab", 0), Some((0, 2)));
        assert_eq!(collapsed.find("ab", 1), Some((3, 5)));
        assert_eq!(collapsed.find("ab", 4), None);
    }

    #[test]
    fn test_html_fragments() {
        let text = "intro <table><tr><td>单价</td><td>A&amp;B</td></tr></table> outro";
        let fragments = html_fragments(text);
        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0].start, text.find("<table>").unwrap());
        assert_eq!(fragments[0].plain_text, "单价 A&B");
    }

    #[test]
    fn test_char_index_counts_scalar_values() {
        let doc = DocumentText::new("发票 no");
        assert_eq!(doc.char_index(0), 0);
        assert_eq!(doc.char_index(3), 1);
        assert_eq!(doc.char_index(7), 3);
        assert_eq!(doc.char_len(0, doc.len()), 5);
    }
}
