//! Display form of a row and the pixel/offset coordinate algebra.
//!
//! A row's bytes are turned into display glyphs without touching the
//! stored bytes: malformed UTF-8 becomes U+FFFD, control characters other
//! than tab become their caret-notation letter. Every pixel measurement
//! in the editor goes through this layer so that cursor positioning,
//! mouse hit testing and drawing all agree.

use core_screen::{FontMetrics, Px};
use core_text::Buffer;

pub const REPLACEMENT: &str = "\u{fffd}";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlyphKind {
    Normal,
    /// Control character drawn in caret notation.
    Ctrl,
    /// Malformed byte drawn as U+FFFD.
    Bad,
}

/// One display glyph: the substituted text plus the byte offset of its
/// source in the row.
#[derive(Debug, Clone)]
pub struct Glyph {
    pub text: String,
    pub offset: usize,
    pub kind: GlyphKind,
}

fn caret_notation(c: char) -> char {
    if c == '\x7f' {
        '?'
    } else {
        ((c as u8) ^ 0x40) as char
    }
}

/// Decompose a row into display glyphs.
pub fn glyphs(buf: &Buffer, row: usize) -> Vec<Glyph> {
    let mut out = Vec::new();
    let mut offset = 0usize;

    loop {
        let begin = offset;
        let Some(chunk) = buf.chunk_at(row, &mut offset) else {
            break;
        };
        let (body, bad) = if chunk.malformed {
            (&chunk.bytes[..chunk.bytes.len() - 1], true)
        } else {
            (chunk.bytes, false)
        };

        // The chunk minus its offending tail is valid UTF-8.
        let text = std::str::from_utf8(body).unwrap_or_default();
        let mut at = begin;
        for ch in text.chars() {
            if ch != '\t' && (ch < ' ' || ch == '\x7f') {
                out.push(Glyph {
                    text: caret_notation(ch).to_string(),
                    offset: at,
                    kind: GlyphKind::Ctrl,
                });
            } else {
                out.push(Glyph {
                    text: ch.to_string(),
                    offset: at,
                    kind: GlyphKind::Normal,
                });
            }
            at += ch.len_utf8();
        }

        if bad {
            out.push(Glyph {
                text: REPLACEMENT.to_string(),
                offset: begin + body.len(),
                kind: GlyphKind::Bad,
            });
        }
    }

    out
}

/// Pixel x of the left edge of the glyph at `byte_offset`, plus that
/// glyph's width. At end of line the width falls back to a space.
pub fn offset_to_px<F: FontMetrics + ?Sized>(
    font: &F,
    buf: &Buffer,
    row: usize,
    byte_offset: usize,
) -> (Px, Px) {
    let mut x: Px = 0;
    for g in glyphs(buf, row) {
        let w = font.str_width(x, g.text.as_bytes());
        if g.offset >= byte_offset {
            return (x, w);
        }
        x += w;
    }
    (x, font.space_width())
}

/// Byte offset of the glyph whose extent contains pixel `px`; end of line
/// when `px` lies past the last glyph.
pub fn px_to_offset<F: FontMetrics + ?Sized>(font: &F, buf: &Buffer, row: usize, px: Px) -> usize {
    let mut x: Px = 0;
    for g in glyphs(buf, row) {
        let w = font.str_width(x, g.text.as_bytes());
        if x + w > px {
            return g.offset;
        }
        x += w;
    }
    buf.bytes_at(row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_screen::MonoMetrics;
    use core_text::Cursor;

    fn buf(bytes: &[u8]) -> Buffer {
        let mut b = Buffer::new();
        let mut cur = Cursor::default();
        b.insert(&mut cur, bytes);
        b
    }

    #[test]
    fn plain_text_one_glyph_per_char() {
        let b = buf(b"ab");
        let gs = glyphs(&b, 0);
        assert_eq!(gs.len(), 2);
        assert_eq!(gs[0].text, "a");
        assert_eq!(gs[1].offset, 1);
    }

    #[test]
    fn overlong_renders_two_replacements() {
        // C0 80: neither byte decodes; each draws as U+FFFD.
        let b = buf(b"\xc0\x80");
        let gs = glyphs(&b, 0);
        assert_eq!(gs.len(), 2);
        assert!(gs.iter().all(|g| g.kind == GlyphKind::Bad));
        assert!(gs.iter().all(|g| g.text == REPLACEMENT));
        assert_eq!(gs[0].offset, 0);
        assert_eq!(gs[1].offset, 1);
    }

    #[test]
    fn control_chars_use_caret_notation() {
        let b = buf(b"\x01\x7fa");
        let gs = glyphs(&b, 0);
        assert_eq!(gs[0].text, "A");
        assert_eq!(gs[0].kind, GlyphKind::Ctrl);
        assert_eq!(gs[1].text, "?");
        assert_eq!(gs[2].kind, GlyphKind::Normal);
    }

    #[test]
    fn tab_is_not_substituted() {
        let b = buf(b"\ta");
        let gs = glyphs(&b, 0);
        assert_eq!(gs[0].text, "\t");
        assert_eq!(gs[0].kind, GlyphKind::Normal);
    }

    #[test]
    fn offset_px_round_trip() {
        let b = buf(b"h\xc3\xa9llo");
        let m = MonoMetrics;
        // Glyph offsets: h=0, é=1, l=3, l=4, o=5.
        assert_eq!(offset_to_px(&m, &b, 0, 0), (0, 1));
        assert_eq!(offset_to_px(&m, &b, 0, 1), (1, 1));
        assert_eq!(offset_to_px(&m, &b, 0, 3), (2, 1));
        assert_eq!(px_to_offset(&m, &b, 0, 0), 0);
        assert_eq!(px_to_offset(&m, &b, 0, 1), 1);
        assert_eq!(px_to_offset(&m, &b, 0, 2), 3);
        assert_eq!(px_to_offset(&m, &b, 0, 99), 6);
    }

    #[test]
    fn tab_widths_feed_positions() {
        let b = buf(b"a\tb");
        let m = MonoMetrics;
        // 'a' at 0 (1 wide), tab advances to column 8, 'b' at 8.
        assert_eq!(offset_to_px(&m, &b, 0, 2), (8, 1));
        assert_eq!(px_to_offset(&m, &b, 0, 4), 1);
        assert_eq!(px_to_offset(&m, &b, 0, 8), 2);
    }
}
