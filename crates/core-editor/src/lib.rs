//! Editor view: a viewport over a buffer with input and output cursors,
//! vertical and horizontal scrolling, Emacs-like bindings, incremental
//! damage-driven drawing, and an optional single-row prompt child for
//! goto-line and incremental search.
//!
//! The view does not own its buffer; every operation borrows it from the
//! caller. Buffer updates land in a shared [`Damage`] band via a change
//! listener, and the enclosing panel flushes the band once per event-loop
//! turn.

use std::cell::RefCell;
use std::rc::Rc;

use core_screen::{ColorId, Damage, FontMetrics, MouseButton, Px, Rect, Screen, ScreenEvent};
use core_text::{Buffer, Cursor, ListenerId};
use tracing::warn;

pub mod glyphs;

mod draw;
mod keys;

/// What a key or mouse event amounted to, for the enclosing panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorAction {
    /// Consumed by the editor.
    Handled,
    /// Not an editor key (Alt chords, Escape); the panel scope decides.
    Pass,
    /// Enter in an editor with a submit role: the full current row.
    Submit(String),
    /// Mouse button 3: the full text of the clicked row.
    Exec(String),
    /// Ctrl+x Ctrl+s: the panel scope saves.
    Save,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptMode {
    Goto,
    FSearch,
    RSearch,
}

pub(crate) struct PromptChild {
    pub view: Box<EditorView>,
    pub buffer: Buffer,
    pub mode: PromptMode,
    pub visible: bool,
}

pub struct EditorView {
    pub cur: Cursor,
    pub ocur: Option<Cursor>,

    top_row: usize,
    begin_offset: Px,
    prefer_offset: Option<Px>,
    frame: Rect,
    largest_height: Px,
    max_rows: Option<usize>,
    bg: ColorId,
    has_submit: bool,
    focused: bool,
    x_on: bool,

    damage: Rc<RefCell<Damage>>,
    listener: Option<ListenerId>,

    prompt: Option<PromptChild>,
    prompt_dirty: bool,
}

impl EditorView {
    /// A full editor with a prompt child.
    pub fn new(bg: ColorId, max_rows: Option<usize>, has_submit: bool) -> Self {
        let mut ed = Self::bare(bg, max_rows, has_submit);
        ed.prompt = Some(PromptChild {
            view: Box::new(Self::bare(ColorId::TitleFgNormal, Some(1), false)),
            buffer: Buffer::new(),
            mode: PromptMode::Goto,
            visible: false,
        });
        ed
    }

    /// An editor without a prompt child (used for the prompt itself and
    /// for the single-row command editor).
    pub fn bare(bg: ColorId, max_rows: Option<usize>, has_submit: bool) -> Self {
        Self {
            cur: Cursor::default(),
            ocur: None,
            top_row: 0,
            begin_offset: 0,
            prefer_offset: None,
            frame: Rect::new(0, 0, 0, 0),
            largest_height: 0,
            max_rows,
            bg,
            has_submit,
            focused: false,
            x_on: false,
            damage: Rc::default(),
            listener: None,
            prompt: None,
            prompt_dirty: false,
        }
    }

    pub fn bg(&self) -> ColorId {
        self.bg
    }

    /// Register the damage listener on a (new) backing buffer.
    pub fn attach(&mut self, buf: &mut Buffer) {
        let damage = self.damage.clone();
        let id = buf.add_listener(move |u| {
            damage.borrow_mut().mark_rows(u.from_row, u.to_row);
        });
        if self.listener.replace(id).is_some() {
            warn!("editor attached without detaching its previous buffer");
        }
        self.damage.borrow_mut().mark_all();
    }

    pub fn detach(&mut self, buf: &mut Buffer) {
        if let Some(id) = self.listener.take() {
            buf.remove_listener(id);
        }
    }

    /// Point the view at fresh cursors (after the panel rebuilt its
    /// typescript buffer) and reset the viewport.
    pub fn reset_cursors(&mut self, cur: Cursor, ocur: Option<Cursor>) {
        self.cur = cur;
        self.ocur = ocur;
        self.top_row = 0;
        self.begin_offset = 0;
        self.prefer_offset = None;
        self.damage.borrow_mut().mark_all();
    }

    pub fn set_frame(&mut self, frame: Rect) {
        if frame != self.frame {
            self.frame = frame;
            self.damage.borrow_mut().mark_all();
        }
    }

    pub fn frame(&self) -> Rect {
        self.frame
    }

    pub fn contains(&self, x: Px, y: Px) -> bool {
        x >= self.frame.x
            && x < self.frame.x + self.frame.w
            && y >= self.frame.y
            && y < self.frame.y + self.frame.h
    }

    pub fn focused(&self) -> bool {
        self.focused
    }

    pub fn set_focused(&mut self, buf: &mut Buffer, screen: &mut dyn Screen, focused: bool) {
        if self.focused == focused {
            return;
        }
        self.focused = focused;
        if focused {
            // Focus returning to the parent cancels an open prompt.
            self.close_prompt();
            self.scroll_into_view(buf, screen);
        }
        let mut damage = self.damage.borrow_mut();
        damage.mark_rows(self.cur.row, self.cur.row);
        if let Some(o) = self.ocur {
            damage.mark_rows(o.row, o.row);
        }
    }

    pub fn top_row(&self) -> usize {
        self.top_row
    }

    pub fn begin_offset(&self) -> Px {
        self.begin_offset
    }

    pub fn mark_dirty(&self) {
        self.damage.borrow_mut().mark_all();
    }

    pub fn needs_paint(&self) -> bool {
        self.damage.borrow().is_dirty() || self.prompt_dirty
    }

    pub fn prompt_visible(&self) -> bool {
        self.prompt.as_ref().is_some_and(|p| p.visible)
    }

    /// The full text of the cursor's row.
    pub fn current_line(&self, buf: &Buffer) -> String {
        String::from_utf8_lossy(buf.row_bytes(self.cur.row)).into_owned()
    }

    fn visible_rows(&self, lh: Px) -> usize {
        if lh <= 0 {
            return 1;
        }
        ((self.frame.h / lh).max(1)) as usize
    }

    fn row_visible(&self, row: usize, visible: usize) -> bool {
        row >= self.top_row && row <= self.top_row + visible - 1
    }

    // ---------------------------------------------------------------
    // Geometry preferences (the panel layout consumes these)
    // ---------------------------------------------------------------

    /// Preferred widget height: tall enough for the content, never
    /// shrinking on its own, capped for single-line editors.
    pub fn prefer_height(&mut self, buf: &mut Buffer, lh: Px) -> Px {
        let content = (buf.rows() as Px) * lh;
        let height = content.max(self.largest_height);
        self.largest_height = height;
        match self.max_rows {
            Some(n) => height.min((n as Px) * lh),
            None => height.max(lh),
        }
    }

    /// Drop the grow-only height back to the actual content height.
    pub fn shrink(&mut self, buf: &mut Buffer, lh: Px) {
        self.largest_height = (buf.rows() as Px) * lh;
    }

    // ---------------------------------------------------------------
    // Scrolling
    // ---------------------------------------------------------------

    /// Scroll vertically and horizontally until the cursor glyph lies
    /// entirely inside the viewport. Returns true when the view scrolled
    /// vertically.
    pub fn scroll_into_view(&mut self, buf: &mut Buffer, screen: &mut dyn Screen) -> bool {
        let lh = screen.font().line_height();
        let visible = self.visible_rows(lh);
        let mut scrolled = false;

        let bottom = self.top_row + visible - 1;
        if self.cur.row > bottom {
            let d = self.cur.row - bottom;
            self.top_row += d;
            self.scroll_blit(screen, d as Px, lh, true);
            scrolled = true;
        } else if self.cur.row < self.top_row {
            let d = self.top_row - self.cur.row;
            self.top_row -= d;
            self.scroll_blit(screen, d as Px, lh, false);
            scrolled = true;
        }

        let rbound = self.frame.w;
        let half = self.frame.w / 2;
        for _ in 0..64 {
            let (x, w) = glyphs::offset_to_px(screen.font(), buf, self.cur.row, self.cur.offset);
            let diff = x - self.begin_offset;
            if diff + w > rbound && half > 0 {
                self.begin_offset += half;
                self.damage.borrow_mut().mark_all();
            } else if diff < 0 && self.begin_offset > 0 {
                self.begin_offset = (self.begin_offset - half).max(0);
                self.damage.borrow_mut().mark_all();
            } else {
                break;
            }
        }

        scrolled
    }

    /// Blit the still-visible part of the viewport after a vertical
    /// scroll of `d` rows and expose only the fresh band; fall back to a
    /// full repaint when the surface cannot blit or the distance exceeds
    /// the viewport.
    fn scroll_blit(&mut self, screen: &mut dyn Screen, d: Px, lh: Px, down: bool) {
        let visible = self.visible_rows(lh);
        let keep = self.frame.h - d * lh;
        let ok = keep > 0
            && if down {
                screen.copy_rect(
                    Rect::new(self.frame.x, self.frame.y + d * lh, self.frame.w, keep),
                    self.frame.y,
                )
            } else {
                screen.copy_rect(
                    Rect::new(self.frame.x, self.frame.y, self.frame.w, keep),
                    self.frame.y + d * lh,
                )
            };

        let mut damage = self.damage.borrow_mut();
        if !ok {
            damage.mark_all();
        } else if down {
            let bottom = self.top_row + visible - 1;
            damage.mark_rows(bottom - (d as usize - 1), bottom);
        } else {
            damage.mark_rows(self.top_row, self.top_row + d as usize - 1);
        }
    }

    /// First press inside a page snaps the cursor to the page top; a
    /// second press moves up one page.
    pub fn page_up(&mut self, buf: &mut Buffer, screen: &mut dyn Screen) {
        let per_page = self.visible_rows(screen.font().line_height());
        let page = self.cur.row / per_page;
        let target = page * per_page;

        if self.cur.row != target && self.row_visible(target, per_page) {
            buf.set_cursor(&mut self.cur, target, 0);
        } else {
            let page = page.saturating_sub(1);
            self.top_row = page * per_page;
            buf.set_cursor(&mut self.cur, self.top_row, 0);
        }
        self.damage.borrow_mut().mark_all();
    }

    pub fn page_down(&mut self, buf: &mut Buffer, screen: &mut dyn Screen) {
        let per_page = self.visible_rows(screen.font().line_height());
        let rows = buf.rows();
        let page = self.cur.row / per_page;
        let bottom = (page * per_page + per_page - 1).min(rows - 1);

        if self.cur.row != bottom && self.row_visible(bottom, per_page) {
            buf.set_cursor(&mut self.cur, bottom, 0);
        } else if (page + 1) * per_page < rows {
            self.top_row = (page + 1) * per_page;
            buf.set_cursor(&mut self.cur, self.top_row + per_page - 1, 0);
        }
        self.damage.borrow_mut().mark_all();
    }

    /// Scroll so the cursor sits on the middle viewport row.
    pub fn recenter(&mut self, buf: &mut Buffer, screen: &mut dyn Screen) {
        let visible = self.visible_rows(screen.font().line_height());
        let mid = (2 * self.top_row + visible - 1) / 2;
        let diff = self.cur.row as i64 - mid as i64;
        if self.top_row as i64 + diff <= 0 {
            return;
        }
        self.top_row = (self.top_row as i64 + diff) as usize;
        self.damage.borrow_mut().mark_all();
        self.scroll_into_view(buf, screen);
    }

    // ---------------------------------------------------------------
    // Mouse
    // ---------------------------------------------------------------

    pub fn handle_mouse(
        &mut self,
        buf: &mut Buffer,
        screen: &mut dyn Screen,
        ev: ScreenEvent,
    ) -> EditorAction {
        let lh = screen.font().line_height();
        match ev {
            ScreenEvent::MousePress {
                button: MouseButton::Left,
                x,
                y,
            } => {
                let (row, offset) = self.hit(buf, screen, x, y, lh);
                buf.set_cursor(&mut self.cur, row, offset);
                self.prefer_offset = None;
                EditorAction::Handled
            }
            ScreenEvent::MouseMotion { x, y } => {
                let (row, offset) = self.hit(buf, screen, x, y, lh);
                buf.set_cursor(&mut self.cur, row, offset);
                self.scroll_into_view(buf, screen);
                EditorAction::Handled
            }
            ScreenEvent::MousePress {
                button: MouseButton::Right,
                y,
                ..
            } => {
                let row = self.row_at(y, lh);
                let text = String::from_utf8_lossy(buf.row_bytes(row)).into_owned();
                EditorAction::Exec(text)
            }
            ScreenEvent::WheelUp { .. } => {
                self.page_up(buf, screen);
                self.scroll_into_view(buf, screen);
                EditorAction::Handled
            }
            ScreenEvent::WheelDown { .. } => {
                self.page_down(buf, screen);
                self.scroll_into_view(buf, screen);
                EditorAction::Handled
            }
            _ => EditorAction::Handled,
        }
    }

    fn row_at(&self, y: Px, lh: Px) -> usize {
        let rel = ((y - self.frame.y) / lh).max(0) as usize;
        self.top_row + rel
    }

    fn hit(&self, buf: &Buffer, screen: &dyn Screen, x: Px, y: Px, lh: Px) -> (usize, usize) {
        let row = self.row_at(y, lh);
        let px = x - self.frame.x + self.begin_offset;
        let offset = glyphs::px_to_offset(screen.font(), buf, row, px);
        (row, offset)
    }
}
