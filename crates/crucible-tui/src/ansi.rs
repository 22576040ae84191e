//! Display-width measurement and ANSI-safe truncation.
//!
//! A "column" here is one terminal cell: wide CJK glyphs and emoji occupy
//! two, zero-width joiners, combining marks and escape sequences occupy none.

use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthChar;

/// Marker appended when a line is cut. Always one cell wide.
pub const ELLIPSIS: &str = "…";

/// Tabs are expanded to a fixed number of cells; terminals disagree on tab stops.
pub const TAB_WIDTH: usize = 4;

const ESC: u8 = 0x1b;
const BEL: u8 = 0x07;
const SGR_RESET: &str = "\x1b[0m";

/// Length in bytes of the escape sequence starting at `idx`, if any.
///
/// Recognizes CSI (`ESC [ ... final`), OSC (`ESC ] ... BEL | ESC \`) and
/// two-byte escapes. An unterminated sequence swallows the rest of the input.
pub fn escape_len(s: &str, idx: usize) -> Option<usize> {
    let bytes = s.as_bytes();
    if bytes.get(idx) != Some(&ESC) {
        return None;
    }
    match bytes.get(idx + 1) {
        None => Some(1),
        Some(b'[') => {
            let mut end = idx + 2;
            while end < bytes.len() {
                if (0x40..=0x7e).contains(&bytes[end]) {
                    return Some(end + 1 - idx);
                }
                end += 1;
            }
            Some(bytes.len() - idx)
        }
        Some(b']') => {
            let mut end = idx + 2;
            while end < bytes.len() {
                if bytes[end] == BEL {
                    return Some(end + 1 - idx);
                }
                if bytes[end] == ESC && bytes.get(end + 1) == Some(&b'\\') {
                    return Some(end + 2 - idx);
                }
                end += 1;
            }
            Some(bytes.len() - idx)
        }
        Some(_) => {
            // Two-byte escape; keep multi-byte followers intact.
            let follower = s[idx + 1..].chars().next().map_or(1, char::len_utf8);
            Some(1 + follower)
        }
    }
}

/// Removes every escape sequence, leaving only printable content.
pub fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut idx = 0;
    while idx < s.len() {
        if let Some(len) = escape_len(s, idx) {
            idx += len;
            continue;
        }
        let next_esc = s[idx..].find('\x1b').map_or(s.len(), |off| idx + off);
        out.push_str(&s[idx..next_esc]);
        idx = next_esc;
    }
    out
}

/// Cell width of a single grapheme cluster.
pub fn grapheme_width(grapheme: &str) -> usize {
    let mut chars = grapheme.chars();
    let Some(first) = chars.next() else {
        return 0;
    };
    if first == '\t' {
        return TAB_WIDTH;
    }
    if first.is_control() {
        return 0;
    }
    let base = UnicodeWidthChar::width(first).unwrap_or(0);
    if base > 0 && grapheme.contains('\u{fe0f}') {
        // Emoji presentation selector forces a two-cell glyph.
        return 2;
    }
    base.min(2)
}

/// Iterates the grapheme clusters of `s` with their cell widths, skipping
/// escape sequences.
pub fn graphemes_with_width(s: &str) -> impl Iterator<Item = (&str, usize)> + '_ {
    TextSegments::new(s)
        .filter_map(|segment| match segment {
            Segment::Text(text) => Some(text),
            Segment::Escape(_) => None,
        })
        .flat_map(|text| text.graphemes(true).map(|g| (g, grapheme_width(g))))
}

/// Display width of `s` in terminal cells. Escape sequences count as zero.
pub fn visible_width(s: &str) -> usize {
    if s.is_ascii() && !s.bytes().any(|b| b == ESC || b == b'\t' || b < 0x20) {
        return s.len();
    }
    graphemes_with_width(s).map(|(_, w)| w).sum()
}

/// Truncates `s` to at most `max_width` cells.
///
/// Content that already fits is returned unchanged. Otherwise the line is cut
/// to `max_width - 1` cells and [`ELLIPSIS`] appended; escape sequences seen
/// before the cut are kept, and a reset is appended if any were.
pub fn truncate_to_width(s: &str, max_width: usize) -> String {
    if visible_width(s) <= max_width {
        return s.to_string();
    }
    if max_width == 0 {
        return String::new();
    }

    let budget = max_width - 1;
    let mut out = String::with_capacity(s.len().min(max_width * 4));
    let mut used = 0;
    let mut saw_escape = false;

    'outer: for segment in TextSegments::new(s) {
        match segment {
            Segment::Escape(seq) => {
                saw_escape = true;
                out.push_str(seq);
            }
            Segment::Text(text) => {
                for grapheme in text.graphemes(true) {
                    let w = grapheme_width(grapheme);
                    if used + w > budget {
                        break 'outer;
                    }
                    out.push_str(grapheme);
                    used += w;
                }
            }
        }
    }

    out.push_str(ELLIPSIS);
    if saw_escape {
        out.push_str(SGR_RESET);
    }
    out
}

enum Segment<'a> {
    Text(&'a str),
    Escape(&'a str),
}

struct TextSegments<'a> {
    source: &'a str,
    idx: usize,
}

impl<'a> TextSegments<'a> {
    fn new(source: &'a str) -> Self {
        Self { source, idx: 0 }
    }
}

impl<'a> Iterator for TextSegments<'a> {
    type Item = Segment<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let s = self.source;
        if self.idx >= s.len() {
            return None;
        }
        let start = self.idx;
        if let Some(len) = escape_len(s, start) {
            self.idx = (start + len).min(s.len());
            return Some(Segment::Escape(&s[start..self.idx]));
        }
        let end = s[start..].find('\x1b').map_or(s.len(), |off| start + off);
        self.idx = end;
        Some(Segment::Text(&s[start..end]))
    }
}
