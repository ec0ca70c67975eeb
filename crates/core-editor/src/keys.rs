//! Key handling: the Emacs-like binding table, the Ctrl+x latch, and the
//! prompt child (goto-line, forward and reverse incremental search).

use core_screen::{Key, KeyInput, Mods, Screen};
use core_text::{utf8, Buffer, Cursor};

use crate::{glyphs, EditorAction, EditorView, PromptMode};

impl EditorView {
    pub fn handle_key(
        &mut self,
        buf: &mut Buffer,
        screen: &mut dyn Screen,
        input: KeyInput,
    ) -> EditorAction {
        if self.prompt_visible() {
            return self.handle_prompt_key(buf, screen, input);
        }

        if input.mods.contains(Mods::ALT) || input.key == Key::Escape {
            return EditorAction::Pass;
        }

        let ctrl = input.mods.contains(Mods::CTRL);

        if ctrl && self.x_on {
            self.x_on = false;
            match input.key {
                // Saving is the panel scope's business.
                Key::Char('s') => return EditorAction::Save,
                Key::Char('g') => {
                    self.open_prompt(PromptMode::Goto);
                    return EditorAction::Handled;
                }
                _ => {}
            }
        } else if ctrl && input.key == Key::Char('x') {
            self.x_on = true;
            return EditorAction::Handled;
        } else {
            self.x_on = false;
        }

        // The preferred column survives only an unbroken run of vertical
        // moves.
        if !matches!(input.key, Key::Up | Key::Down) {
            self.prefer_offset = None;
        }

        if ctrl {
            match input.key {
                Key::Char('s') if self.prompt.is_some() => {
                    self.open_prompt(PromptMode::FSearch);
                    return EditorAction::Handled;
                }
                Key::Char('r') if self.prompt.is_some() => {
                    self.open_prompt(PromptMode::RSearch);
                    return EditorAction::Handled;
                }
                Key::Char('a') => {
                    let row = self.cur.row;
                    buf.set_cursor(&mut self.cur, row, 0);
                    self.scroll_into_view(buf, screen);
                    return EditorAction::Handled;
                }
                Key::Char('e') => {
                    let row = self.cur.row;
                    let len = buf.bytes_at(row);
                    buf.set_cursor(&mut self.cur, row, len);
                    self.scroll_into_view(buf, screen);
                    return EditorAction::Handled;
                }
                Key::Char('k') => {
                    if buf.bytes_at(self.cur.row) == 0 {
                        buf.remove_row(self.cur.row);
                    } else {
                        buf.erase_eol(&self.cur);
                    }
                    self.scroll_into_view(buf, screen);
                    return EditorAction::Handled;
                }
                Key::Char('b') => return self.move_cols(buf, screen, -1),
                Key::Char('f') => return self.move_cols(buf, screen, 1),
                Key::Char('p') => {
                    buf.update_cursor(&mut self.cur, -1, 0);
                    self.scroll_into_view(buf, screen);
                    return EditorAction::Handled;
                }
                Key::Char('n') => {
                    buf.update_cursor(&mut self.cur, 1, 0);
                    self.scroll_into_view(buf, screen);
                    return EditorAction::Handled;
                }
                Key::Char('d') => {
                    buf.delete_char(&mut self.cur);
                    self.scroll_into_view(buf, screen);
                    return EditorAction::Handled;
                }
                Key::Char('o') => {
                    let saved = self.cur;
                    buf.insert(&mut self.cur, b"\n");
                    self.cur = saved;
                    self.scroll_into_view(buf, screen);
                    return EditorAction::Handled;
                }
                Key::Char('l') => {
                    self.recenter(buf, screen);
                    return EditorAction::Handled;
                }
                _ => {}
            }
            // Any other control chord inserts the control byte the
            // toolkit reports for it, which then renders in caret
            // notation.
            if let Key::Char(c) = input.key {
                if c.is_ascii_lowercase() {
                    buf.insert(&mut self.cur, &[(c as u8) & 0x1f]);
                    self.scroll_into_view(buf, screen);
                }
            }
            return EditorAction::Handled;
        }

        match input.key {
            Key::Enter => {
                if self.has_submit {
                    return EditorAction::Submit(self.current_line(buf));
                }
                buf.insert(&mut self.cur, b"\n");
                self.scroll_into_view(buf, screen);
                EditorAction::Handled
            }
            Key::Left | Key::Right => {
                let step: isize = if input.mods.contains(Mods::SHIFT) { 8 } else { 1 };
                let step = if input.key == Key::Left { -step } else { step };
                self.move_cols(buf, screen, step)
            }
            Key::Up | Key::Down => {
                self.vertical_move(
                    buf,
                    screen,
                    input.key == Key::Down,
                    input.mods.contains(Mods::SHIFT),
                );
                EditorAction::Handled
            }
            Key::PageUp => {
                self.page_up(buf, screen);
                self.scroll_into_view(buf, screen);
                EditorAction::Handled
            }
            Key::PageDown => {
                self.page_down(buf, screen);
                self.scroll_into_view(buf, screen);
                EditorAction::Handled
            }
            Key::Backspace => {
                buf.erase(&mut self.cur);
                self.scroll_into_view(buf, screen);
                EditorAction::Handled
            }
            Key::Delete => {
                self.scroll_into_view(buf, screen);
                EditorAction::Handled
            }
            Key::Char(c) => {
                let mut tmp = [0u8; 4];
                let s = c.encode_utf8(&mut tmp);
                buf.insert(&mut self.cur, s.as_bytes());
                self.scroll_into_view(buf, screen);
                EditorAction::Handled
            }
            _ => EditorAction::Handled,
        }
    }

    fn move_cols(
        &mut self,
        buf: &mut Buffer,
        screen: &mut dyn Screen,
        dcol: isize,
    ) -> EditorAction {
        buf.update_cursor(&mut self.cur, 0, dcol);
        self.scroll_into_view(buf, screen);
        EditorAction::Handled
    }

    /// Up/Down at the preferred pixel column, captured at the first
    /// vertical move of a run.
    fn vertical_move(&mut self, buf: &mut Buffer, screen: &mut dyn Screen, down: bool, fast: bool) {
        let row = self.cur.row;
        if self.prefer_offset.is_none() {
            let (x, _) = glyphs::offset_to_px(screen.font(), buf, row, self.cur.offset);
            self.prefer_offset = Some(x);
        }
        let px = self.prefer_offset.unwrap_or(0);

        let step = if fast { 8 } else { 1 };
        let new_row = if down {
            (row + step).min(buf.rows() - 1)
        } else {
            row.saturating_sub(step)
        };

        let offset = glyphs::px_to_offset(screen.font(), buf, new_row, px);
        buf.set_cursor(&mut self.cur, new_row, offset);
        self.scroll_into_view(buf, screen);
    }

    // ---------------------------------------------------------------
    // Prompt child
    // ---------------------------------------------------------------

    pub fn open_prompt(&mut self, mode: PromptMode) {
        if let Some(p) = self.prompt.as_mut() {
            p.mode = mode;
            p.visible = true;
            p.view.focused = true;
            p.buffer.clear();
            p.view.cur = Cursor::default();
            self.prompt_dirty = true;
        }
    }

    /// Hide the prompt and restore the viewport under it. Returns the
    /// mode the prompt was in.
    pub fn close_prompt(&mut self) -> Option<PromptMode> {
        let p = self.prompt.as_mut()?;
        if !p.visible {
            return None;
        }
        p.visible = false;
        p.buffer.clear();
        p.view.cur = Cursor::default();
        self.prompt_dirty = true;
        self.damage.borrow_mut().mark_all();
        Some(p.mode)
    }

    fn handle_prompt_key(
        &mut self,
        buf: &mut Buffer,
        screen: &mut dyn Screen,
        input: KeyInput,
    ) -> EditorAction {
        let cancel = (input.mods.contains(Mods::CTRL) && input.key == Key::Char('g'))
            || input.key == Key::Escape;
        if cancel {
            self.close_prompt();
            return EditorAction::Handled;
        }

        if input.key == Key::Enter {
            let line = match self.prompt.as_ref() {
                Some(p) => String::from_utf8_lossy(p.buffer.row_bytes(p.view.cur.row)).into_owned(),
                None => return EditorAction::Handled,
            };
            match self.close_prompt() {
                Some(PromptMode::Goto) => self.goto_line(buf, screen, &line),
                Some(PromptMode::FSearch) => self.search(buf, screen, line.as_bytes(), 1),
                Some(PromptMode::RSearch) => self.search(buf, screen, line.as_bytes(), -1),
                None => {}
            }
            return EditorAction::Handled;
        }

        if let Some(p) = self.prompt.as_mut() {
            p.view.handle_key(&mut p.buffer, screen, input);
        }
        self.prompt_dirty = true;
        EditorAction::Handled
    }

    fn goto_line(&mut self, buf: &mut Buffer, screen: &mut dyn Screen, s: &str) {
        let Ok(val) = s.trim().parse::<i64>() else {
            return;
        };
        if val <= 0 {
            return;
        }
        buf.set_cursor(&mut self.cur, (val - 1) as usize, 0);
        self.scroll_into_view(buf, screen);
    }

    /// Walk rows forward (`dir > 0`) or backward from the cursor, wrap
    /// around once, and land after the first match.
    fn search(&mut self, buf: &mut Buffer, screen: &mut dyn Screen, needle: &[u8], dir: i32) {
        if needle.is_empty() {
            return;
        }
        let rows = buf.rows();

        let mut start = self.cur.row;
        let mut first_offset = self.cur.offset;
        if dir < 0 {
            first_offset = 0;
            if start > 0 {
                start -= 1;
            }
        } else {
            let mut o = first_offset;
            utf8::incr(buf.row_bytes(start), &mut o);
            first_offset = o;
        }

        let order: Vec<usize> = if dir >= 0 {
            (start..rows).chain(0..start).collect()
        } else {
            (0..=start).rev().chain(((start + 1)..rows).rev()).collect()
        };

        let mut hit = None;
        for (i, &row) in order.iter().enumerate() {
            let mut offset = if i == 0 { first_offset } else { 0 };
            if buf.match_at(row, needle, &mut offset) {
                hit = Some((row, offset));
                break;
            }
        }

        if let Some((row, offset)) = hit {
            buf.set_cursor(&mut self.cur, row, offset + needle.len());
            self.scroll_into_view(buf, screen);
        }
    }
}
