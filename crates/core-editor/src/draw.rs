//! Damage-driven painting.
//!
//! Nothing here runs from buffer mutation handlers; the enclosing panel
//! calls [`EditorView::paint`] from the event loop's idle turn, which
//! flushes the accumulated band in one pass.

use core_screen::{ColorId, DamageSpan, FontMetrics, Px, Rect, Screen};
use core_text::{Buffer, RowFlags};

use crate::glyphs::{self, Glyph, GlyphKind};
use crate::EditorView;

/// Break draw runs after this many bytes so a single span never paints
/// far beyond the window width.
const CHUNK_BREAK_LIMIT: usize = 80;

impl EditorView {
    /// Flush accumulated damage into draw calls.
    pub fn paint(&mut self, buf: &mut Buffer, screen: &mut dyn Screen) {
        let span = self.damage.borrow_mut().take();
        if span.is_none() && !self.prompt_dirty {
            return;
        }

        let lh = screen.font().line_height();
        let visible = self.visible_rows(lh);
        let bottom = self.top_row + visible - 1;

        match span {
            Some(DamageSpan::Full) => self.draw_rows(buf, screen, self.top_row, bottom),
            Some(DamageSpan::Rows(a, b)) => {
                let a = a.max(self.top_row);
                let b = b.min(bottom);
                if a <= b {
                    self.draw_rows(buf, screen, a, b);
                }
            }
            None => {}
        }

        if self.prompt_visible() {
            self.draw_prompt(screen);
        }
        self.prompt_dirty = false;
    }

    /// Draw an inclusive row band (already clamped to the viewport).
    pub(crate) fn draw_rows(
        &mut self,
        buf: &mut Buffer,
        screen: &mut dyn Screen,
        from: usize,
        to: usize,
    ) {
        for row in from..=to {
            self.draw_row(buf, screen, row);
        }
    }

    fn draw_row(&mut self, buf: &mut Buffer, screen: &mut dyn Screen, row: usize) {
        let lh = screen.font().line_height();
        let y = self.frame.y + ((row - self.top_row) as Px) * lh;
        if y >= self.frame.y + self.frame.h {
            return;
        }

        let rows = buf.rows();
        let right = self.frame.x + self.frame.w;
        let base_x = self.frame.x - self.begin_offset;

        let row_bg = if buf.row_flags(row).contains(RowFlags::CMDLINE) {
            ColorId::TitleBgNormal
        } else {
            self.bg()
        };

        let mut x: Px = 0;
        if row < rows {
            // Coalesce glyphs into same-background runs, expanding tabs
            // against the logical (line-relative) tab grid.
            let mut runs: Vec<(Px, String, ColorId)> = Vec::new();
            let mut run = String::new();
            let mut run_x: Px = 0;
            let mut run_bg = row_bg;

            for g in glyphs::glyphs(buf, row) {
                if base_x + x >= right {
                    break;
                }
                let w = screen.font().str_width(x, g.text.as_bytes());
                let bg = self.glyph_bg(buf, row, &g, row_bg);

                if (bg != run_bg || run.len() >= CHUNK_BREAK_LIMIT) && !run.is_empty() {
                    runs.push((run_x, std::mem::take(&mut run), run_bg));
                }
                if run.is_empty() {
                    run_x = x;
                    run_bg = bg;
                }
                if g.text == "\t" {
                    for _ in 0..w {
                        run.push(' ');
                    }
                } else {
                    run.push_str(&g.text);
                }
                x += w;
            }
            if !run.is_empty() {
                runs.push((run_x, run, run_bg));
            }

            for (rx, text, bg) in runs {
                screen.draw_span(base_x + rx, y, text.as_bytes(), ColorId::TextFg, bg);
            }

            // Cursor cell at end of line.
            let row_len = buf.bytes_at(row);
            let at_eol_cur =
                self.focused() && self.cur.row == row && self.cur.offset >= row_len;
            let at_eol_ocur = self
                .ocur
                .is_some_and(|o| self.focused() && o.row == row && o.offset >= row_len);
            if at_eol_cur || at_eol_ocur {
                let bg = if at_eol_cur {
                    ColorId::TextCursor
                } else {
                    ColorId::TextOutputCursor
                };
                screen.draw_span(base_x + x, y, b" ", ColorId::TextFg, bg);
                x += screen.font().space_width();
            }
        }

        // Clear the remainder of the line.
        let cx = (base_x + x).max(self.frame.x);
        if cx < right {
            screen.clear_rect(Rect::new(cx, y, right - cx, lh), row_bg);
        }
    }

    fn glyph_bg(&self, buf: &Buffer, row: usize, g: &Glyph, row_bg: ColorId) -> ColorId {
        if self.focused() && row == self.cur.row && g.offset == self.cur.offset {
            return ColorId::TextCursor;
        }
        if let Some(o) = self.ocur {
            if self.focused() && row == o.row && g.offset == o.offset {
                return ColorId::TextOutputCursor;
            }
        }
        if g.kind == GlyphKind::Ctrl {
            return ColorId::TextCtrl;
        }
        if buf.has_mark() && buf.is_marked(row, g.offset, self.cur.row, self.cur.offset) {
            return ColorId::TextMark;
        }
        row_bg
    }

    fn draw_prompt(&mut self, screen: &mut dyn Screen) {
        let lh = screen.font().line_height();
        let frame = self.frame;
        if let Some(p) = self.prompt.as_mut() {
            let overlay = Rect::new(frame.x, frame.y + frame.h - lh, frame.w, lh);
            p.view.set_frame(overlay);
            p.view.mark_dirty();
            p.view.paint(&mut p.buffer, screen);
        }
    }
}
