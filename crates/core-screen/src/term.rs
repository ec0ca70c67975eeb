//! Crossterm cell-grid adapter.
//!
//! One pixel equals one terminal cell, so every pixel quantity the core
//! computes (line height 1, space width 1, tab grid 8) maps straight onto
//! the cell grid. Raw mode, the alternate screen and mouse capture are
//! held for the adapter's lifetime and restored on drop.

use std::io::{self, Stdout, Write};
use std::os::unix::io::RawFd;
use std::time::Duration;

use anyhow::Result;
use crossterm::{
    cursor::{Hide, Show},
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind, KeyModifiers,
        MouseEventKind,
    },
    execute, queue,
    style::{Color, Print, SetBackgroundColor, SetForegroundColor},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use unicode_width::UnicodeWidthChar;

use crate::{
    ColorId, FontMetrics, Key, KeyInput, Mods, MonoMetrics, MouseButton, Px, Rect, Screen,
    ScreenEvent,
};

pub struct TermScreen {
    out: Stdout,
    size: (Px, Px),
    entered: bool,
}

impl TermScreen {
    pub fn new() -> Result<Self> {
        enable_raw_mode()?;
        let mut out = io::stdout();
        execute!(out, EnterAlternateScreen, EnableMouseCapture, Hide)?;
        let (w, h) = crossterm::terminal::size()?;
        Ok(Self {
            out,
            size: (w as Px, h as Px),
            entered: true,
        })
    }

    fn leave(&mut self) {
        if self.entered {
            let _ = execute!(self.out, DisableMouseCapture, LeaveAlternateScreen, Show);
            let _ = disable_raw_mode();
            self.entered = false;
        }
    }

    fn forward(&mut self, ev: Event, sink: &mut dyn FnMut(ScreenEvent)) {
        if let Event::Resize(w, h) = ev {
            self.size = (w as Px, h as Px);
        }
        if let Some(mapped) = map_event(ev) {
            sink(mapped);
        }
    }
}

impl Drop for TermScreen {
    fn drop(&mut self) {
        self.leave();
    }
}

impl Screen for TermScreen {
    fn font(&self) -> &dyn FontMetrics {
        &MonoMetrics
    }

    fn size(&self) -> (Px, Px) {
        self.size
    }

    fn draw_span(&mut self, x: Px, y: Px, bytes: &[u8], fg: ColorId, bg: ColorId) {
        let (w, h) = self.size;
        if y < 0 || y >= h {
            return;
        }
        let expanded = expand_tabs(x, bytes);
        if let Some((draw_x, visible)) = clip_span(x, &expanded, w) {
            let _ = queue!(
                self.out,
                crossterm::cursor::MoveTo(draw_x as u16, y as u16),
                SetForegroundColor(map_color(fg)),
                SetBackgroundColor(map_color(bg)),
                Print(visible),
            );
        }
    }

    fn clear_rect(&mut self, rect: Rect, bg: ColorId) {
        let (w, h) = self.size;
        let x0 = rect.x.max(0);
        let x1 = (rect.x + rect.w).min(w);
        if x1 <= x0 {
            return;
        }
        let blank = " ".repeat((x1 - x0) as usize);
        for y in rect.y.max(0)..(rect.y + rect.h).min(h) {
            let _ = queue!(
                self.out,
                crossterm::cursor::MoveTo(x0 as u16, y as u16),
                SetBackgroundColor(map_color(bg)),
                Print(&blank),
            );
        }
    }

    fn copy_rect(&mut self, _src: Rect, _dst_y: Px) -> bool {
        // The cell grid has no general blit; callers redraw the band.
        false
    }

    fn flush(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }

    fn poll_fd(&self) -> Option<RawFd> {
        Some(libc::STDIN_FILENO)
    }

    fn drain_pending(&mut self, sink: &mut dyn FnMut(ScreenEvent)) -> Result<()> {
        while event::poll(Duration::ZERO)? {
            let ev = event::read()?;
            self.forward(ev, sink);
        }
        Ok(())
    }

    fn read_events(&mut self, sink: &mut dyn FnMut(ScreenEvent)) -> Result<()> {
        self.drain_pending(sink)
    }
}

fn map_color(id: ColorId) -> Color {
    match id {
        ColorId::TextBg => Color::Black,
        ColorId::TextFg => Color::White,
        ColorId::TextCursor => Color::DarkYellow,
        ColorId::TextOutputCursor => Color::DarkMagenta,
        ColorId::TextCtrl => Color::DarkRed,
        ColorId::TextMark => Color::DarkBlue,
        ColorId::TitleBgNormal => Color::DarkBlue,
        ColorId::TitleFgNormal => Color::DarkCyan,
        ColorId::StatusBg => Color::DarkGrey,
        ColorId::StatusFg => Color::White,
        ColorId::MenuBg => Color::Grey,
        ColorId::MenuFg => Color::Black,
    }
}

fn map_event(ev: Event) -> Option<ScreenEvent> {
    match ev {
        Event::Key(key) => {
            if !matches!(key.kind, KeyEventKind::Press | KeyEventKind::Repeat) {
                return None;
            }
            let mut mods = Mods::empty();
            if key.modifiers.contains(KeyModifiers::SHIFT) {
                mods |= Mods::SHIFT;
            }
            if key.modifiers.contains(KeyModifiers::CONTROL) {
                mods |= Mods::CTRL;
            }
            if key.modifiers.contains(KeyModifiers::ALT) {
                mods |= Mods::ALT;
            }
            let sym = match key.code {
                KeyCode::Char(c) => Key::Char(c),
                KeyCode::Tab => Key::Char('\t'),
                KeyCode::Enter => Key::Enter,
                KeyCode::Backspace => Key::Backspace,
                KeyCode::Delete => Key::Delete,
                KeyCode::Left => Key::Left,
                KeyCode::Right => Key::Right,
                KeyCode::Up => Key::Up,
                KeyCode::Down => Key::Down,
                KeyCode::PageUp => Key::PageUp,
                KeyCode::PageDown => Key::PageDown,
                KeyCode::Esc => Key::Escape,
                KeyCode::Insert => Key::Insert,
                _ => return None,
            };
            Some(ScreenEvent::Key(KeyInput::new(sym, mods)))
        }
        Event::Mouse(m) => {
            let (x, y) = (m.column as Px, m.row as Px);
            match m.kind {
                MouseEventKind::Down(b) => Some(ScreenEvent::MousePress {
                    button: map_button(b)?,
                    x,
                    y,
                }),
                MouseEventKind::Up(b) => Some(ScreenEvent::MouseRelease {
                    button: map_button(b)?,
                    x,
                    y,
                }),
                MouseEventKind::Drag(event::MouseButton::Left) => {
                    Some(ScreenEvent::MouseMotion { x, y })
                }
                MouseEventKind::ScrollUp => Some(ScreenEvent::WheelUp { x, y }),
                MouseEventKind::ScrollDown => Some(ScreenEvent::WheelDown { x, y }),
                _ => None,
            }
        }
        Event::Resize(w, h) => Some(ScreenEvent::Resize {
            w: w as Px,
            h: h as Px,
        }),
        _ => None,
    }
}

fn map_button(b: event::MouseButton) -> Option<MouseButton> {
    match b {
        event::MouseButton::Left => Some(MouseButton::Left),
        event::MouseButton::Middle => Some(MouseButton::Middle),
        event::MouseButton::Right => Some(MouseButton::Right),
    }
}

/// Replace tabs with the spaces their grid position dictates, so the
/// printed cells match what [`MonoMetrics::str_width`] measured.
fn expand_tabs(x: Px, bytes: &[u8]) -> String {
    let grid = 8 * MonoMetrics.space_width();
    let text = String::from_utf8_lossy(bytes);
    let mut out = String::new();
    let mut at = x;
    for ch in text.chars() {
        if ch == '\t' {
            let adv = grid - at.rem_euclid(grid);
            for _ in 0..adv {
                out.push(' ');
            }
            at += adv;
        } else {
            out.push(ch);
            at += ch.width().unwrap_or(1) as Px;
        }
    }
    out
}

/// Clip a span against the horizontal screen bounds. Glyphs straddling
/// the left edge degrade to padding spaces.
fn clip_span(x: Px, text: &str, max_w: Px) -> Option<(Px, String)> {
    let mut at = x;
    let mut out = String::new();
    let mut draw_x: Option<Px> = None;
    for ch in text.chars() {
        let w = ch.width().unwrap_or(1) as Px;
        let next = at + w;
        if next <= 0 {
            at = next;
            continue;
        }
        if at >= max_w {
            break;
        }
        if at < 0 {
            for _ in 0..next {
                out.push(' ');
            }
            draw_x.get_or_insert(0);
        } else {
            draw_x.get_or_insert(at);
            out.push(ch);
        }
        at = next;
    }
    draw_x.map(|dx| (dx, out))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clip_keeps_visible_middle() {
        let (x, s) = clip_span(-2, "abcdef", 3).unwrap();
        assert_eq!(x, 0);
        assert_eq!(s, "cde");
    }

    #[test]
    fn clip_drops_fully_hidden() {
        assert!(clip_span(-10, "abc", 80).is_none());
        assert!(clip_span(100, "abc", 80).is_none());
    }

    #[test]
    fn tabs_expand_against_grid() {
        assert_eq!(expand_tabs(0, b"\tx"), "        x");
        assert_eq!(expand_tabs(6, b"\tx"), "  x");
    }
}
