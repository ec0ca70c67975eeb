//! Cell-grid font metrics shared by the crossterm adapter and the test
//! screen: one pixel per cell, glyph widths from `unicode-width`.

use unicode_width::UnicodeWidthChar;

use crate::{FontMetrics, Px};

#[derive(Debug, Clone, Copy, Default)]
pub struct MonoMetrics;

impl FontMetrics for MonoMetrics {
    fn line_height(&self) -> Px {
        1
    }

    fn space_width(&self) -> Px {
        1
    }

    fn str_width(&self, x: Px, bytes: &[u8]) -> Px {
        let grid = 8 * self.space_width();
        let text = String::from_utf8_lossy(bytes);
        let mut at = x;
        for ch in text.chars() {
            if ch == '\t' {
                at += grid - (at.rem_euclid(grid));
            } else {
                at += ch.width().unwrap_or(1) as Px;
            }
        }
        at - x
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_is_one_cell_per_char() {
        assert_eq!(MonoMetrics.str_width(0, b"hello"), 5);
    }

    #[test]
    fn wide_glyphs_are_two_cells() {
        assert_eq!(MonoMetrics.str_width(0, "宽".as_bytes()), 2);
    }

    #[test]
    fn tabs_advance_to_next_stop() {
        assert_eq!(MonoMetrics.str_width(0, b"\t"), 8);
        assert_eq!(MonoMetrics.str_width(3, b"\t"), 5);
        assert_eq!(MonoMetrics.str_width(8, b"\t"), 8);
        assert_eq!(MonoMetrics.str_width(0, b"ab\tc"), 9);
    }

    #[test]
    fn replacement_char_is_one_cell() {
        assert_eq!(MonoMetrics.str_width(0, "\u{fffd}".as_bytes()), 1);
    }
}
