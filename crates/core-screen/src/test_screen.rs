//! Headless screen for tests: a cell grid that applies draw calls and
//! records them, plus a queue of scripted input events.

use std::collections::VecDeque;
use std::os::unix::io::RawFd;

use anyhow::Result;
use unicode_width::UnicodeWidthChar;

use crate::{ColorId, FontMetrics, MonoMetrics, Px, Rect, Screen, ScreenEvent};

#[derive(Debug, Clone)]
pub struct SpanRecord {
    pub x: Px,
    pub y: Px,
    pub text: String,
    pub fg: ColorId,
    pub bg: ColorId,
}

#[derive(Debug, Clone, Copy)]
struct Cell {
    ch: char,
    fg: ColorId,
    bg: ColorId,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            ch: ' ',
            fg: ColorId::TextFg,
            bg: ColorId::TextBg,
        }
    }
}

pub struct TestScreen {
    size: (Px, Px),
    grid: Vec<Vec<Cell>>,
    pub spans: Vec<SpanRecord>,
    pub flushes: usize,
    events: VecDeque<ScreenEvent>,
}

impl TestScreen {
    pub fn new(w: Px, h: Px) -> Self {
        Self {
            size: (w, h),
            grid: vec![vec![Cell::default(); w.max(0) as usize]; h.max(0) as usize],
            spans: Vec::new(),
            flushes: 0,
            events: VecDeque::new(),
        }
    }

    pub fn push_event(&mut self, ev: ScreenEvent) {
        self.events.push_back(ev);
    }

    /// The visible text of one grid row, trailing spaces trimmed.
    pub fn row_text(&self, y: Px) -> String {
        let row = &self.grid[y as usize];
        let s: String = row.iter().map(|c| c.ch).collect();
        s.trim_end().to_string()
    }

    pub fn bg_at(&self, x: Px, y: Px) -> ColorId {
        self.grid[y as usize][x as usize].bg
    }

    pub fn char_at(&self, x: Px, y: Px) -> char {
        self.grid[y as usize][x as usize].ch
    }

    fn put(&mut self, x: Px, y: Px, ch: char, fg: ColorId, bg: ColorId) {
        let (w, h) = self.size;
        if x < 0 || y < 0 || x >= w || y >= h {
            return;
        }
        self.grid[y as usize][x as usize] = Cell { ch, fg, bg };
    }
}

impl Screen for TestScreen {
    fn font(&self) -> &dyn FontMetrics {
        &MonoMetrics
    }

    fn size(&self) -> (Px, Px) {
        self.size
    }

    fn draw_span(&mut self, x: Px, y: Px, bytes: &[u8], fg: ColorId, bg: ColorId) {
        let text = String::from_utf8_lossy(bytes).into_owned();
        self.spans.push(SpanRecord {
            x,
            y,
            text: text.clone(),
            fg,
            bg,
        });

        let grid = 8 * MonoMetrics.space_width();
        let mut at = x;
        for ch in text.chars() {
            if ch == '\t' {
                let adv = grid - at.rem_euclid(grid);
                for i in 0..adv {
                    self.put(at + i, y, ' ', fg, bg);
                }
                at += adv;
            } else {
                let w = ch.width().unwrap_or(1) as Px;
                self.put(at, y, ch, fg, bg);
                for i in 1..w {
                    self.put(at + i, y, ' ', fg, bg);
                }
                at += w;
            }
        }
    }

    fn clear_rect(&mut self, rect: Rect, bg: ColorId) {
        for y in rect.y..rect.y + rect.h {
            for x in rect.x..rect.x + rect.w {
                self.put(x, y, ' ', ColorId::TextFg, bg);
            }
        }
    }

    fn copy_rect(&mut self, src: Rect, dst_y: Px) -> bool {
        let (w, h) = self.size;
        let rows = src.h;
        if rows <= 0 {
            return true;
        }
        let down = dst_y > src.y;
        for i in 0..rows {
            let i = if down { rows - 1 - i } else { i };
            let from = src.y + i;
            let to = dst_y + i;
            if from < 0 || from >= h || to < 0 || to >= h {
                continue;
            }
            for x in src.x.max(0)..(src.x + src.w).min(w) {
                self.grid[to as usize][x as usize] = self.grid[from as usize][x as usize];
            }
        }
        true
    }

    fn flush(&mut self) -> Result<()> {
        self.flushes += 1;
        Ok(())
    }

    fn poll_fd(&self) -> Option<RawFd> {
        None
    }

    fn drain_pending(&mut self, sink: &mut dyn FnMut(ScreenEvent)) -> Result<()> {
        while let Some(ev) = self.events.pop_front() {
            sink(ev);
        }
        Ok(())
    }

    fn read_events(&mut self, sink: &mut dyn FnMut(ScreenEvent)) -> Result<()> {
        self.drain_pending(sink)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_applies_spans() {
        let mut s = TestScreen::new(10, 2);
        s.draw_span(1, 0, b"hi", ColorId::TextFg, ColorId::TextBg);
        assert_eq!(s.row_text(0), " hi");
        assert_eq!(s.char_at(1, 0), 'h');
    }

    #[test]
    fn copy_rect_blits_rows() {
        let mut s = TestScreen::new(4, 3);
        s.draw_span(0, 1, b"xy", ColorId::TextFg, ColorId::TextBg);
        assert!(s.copy_rect(Rect::new(0, 1, 4, 1), 0));
        assert_eq!(s.row_text(0), "xy");
    }

    #[test]
    fn events_queue_in_order() {
        let mut s = TestScreen::new(4, 4);
        s.push_event(ScreenEvent::WheelUp { x: 0, y: 0 });
        s.push_event(ScreenEvent::WheelDown { x: 1, y: 1 });
        let mut seen = Vec::new();
        s.drain_pending(&mut |e| seen.push(e)).unwrap();
        assert_eq!(seen.len(), 2);
        assert!(matches!(seen[0], ScreenEvent::WheelUp { .. }));
    }
}
