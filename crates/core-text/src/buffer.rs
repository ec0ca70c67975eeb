//! Gap-free byte-oriented text buffer with change broadcast.
//!
//! A buffer is an ordered sequence of rows of raw bytes. Bytes are
//! arbitrary 8-bit values; they are only *interpreted* as UTF-8 for
//! display and cursor movement, so subprocess output that is not valid
//! UTF-8 survives a round trip through the buffer unchanged.
//!
//! Every public mutation notifies the registered listeners with a row
//! range covering all changed rows before it returns. Listeners must not
//! mutate the buffer re-entrantly; a buffer shared through `RefCell`
//! turns such an attempt into a nested-borrow panic.

use bitflags::bitflags;
use tracing::warn;

use crate::cursor::Cursor;
use crate::utf8;

bitflags! {
    /// Per-row user flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct RowFlags: u32 {
        /// The row holds a submitted command line, separating successive
        /// invocations inside one typescript.
        const CMDLINE = 1 << 0;
    }
}

#[derive(Debug, Default)]
struct Row {
    bytes: Vec<u8>,
    flags: RowFlags,
}

/// The only update kind: a span of whole rows changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateKind {
    Line,
}

/// Change notification delivered to buffer listeners.
///
/// Columns are informational only; listeners decide what to redraw based
/// on the row range.
#[derive(Debug, Clone, Copy)]
pub struct BufferUpdate {
    pub from_row: usize,
    pub from_col: usize,
    pub to_row: usize,
    pub to_col: usize,
    pub kind: UpdateKind,
}

/// Handle returned by [`Buffer::add_listener`], used for removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type ListenerFn = Box<dyn FnMut(&BufferUpdate)>;

/// A maximal run of bytes returned by [`Buffer::chunk_at`].
///
/// When `malformed` is set the final byte of the chunk is the offending
/// byte; consumers typically substitute U+FFFD for it when drawing.
#[derive(Debug, Clone, Copy)]
pub struct Chunk<'a> {
    pub bytes: &'a [u8],
    pub malformed: bool,
}

#[derive(Default)]
pub struct Buffer {
    rows: Vec<Row>,
    listeners: Vec<(ListenerId, ListenerFn)>,
    next_listener: u64,
    mark: Option<Cursor>,
}

impl Buffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current row count. A read that finds no rows lazily inserts one
    /// empty row (and broadcasts it), so the buffer is never observably
    /// empty to writers.
    pub fn rows(&mut self) -> usize {
        if self.rows.is_empty() {
            self.insert_row_at(0);
        }
        self.rows.len()
    }

    /// Byte length of a row, or 0 when the row does not exist.
    pub fn bytes_at(&self, row: usize) -> usize {
        self.rows.get(row).map_or(0, |r| r.bytes.len())
    }

    /// Borrow a row's bytes; empty for rows that do not exist. The slice
    /// is valid until the next mutation.
    pub fn row_bytes(&self, row: usize) -> &[u8] {
        self.rows.get(row).map_or(&[], |r| r.bytes.as_slice())
    }

    pub fn row_flags(&self, row: usize) -> RowFlags {
        self.rows.get(row).map_or(RowFlags::empty(), |r| r.flags)
    }

    pub fn set_row_flags(&mut self, row: usize, flags: RowFlags) {
        if let Some(r) = self.rows.get_mut(row) {
            r.flags = flags;
            self.broadcast_range(row, row);
        }
    }

    // ---------------------------------------------------------------
    // Listeners
    // ---------------------------------------------------------------

    pub fn add_listener<F>(&mut self, callback: F) -> ListenerId
    where
        F: FnMut(&BufferUpdate) + 'static,
    {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push((id, Box::new(callback)));
        id
    }

    pub fn remove_listener(&mut self, id: ListenerId) {
        match self.listeners.iter().position(|(lid, _)| *lid == id) {
            Some(i) => {
                self.listeners.remove(i);
            }
            None => warn!(?id, "did not find buffer listener to remove"),
        }
    }

    fn broadcast_range(&mut self, a: usize, b: usize) {
        let (from_row, to_row) = if a <= b { (a, b) } else { (b, a) };
        let update = BufferUpdate {
            from_row,
            from_col: 0,
            to_row,
            to_col: 0,
            kind: UpdateKind::Line,
        };
        for (_, callback) in &mut self.listeners {
            callback(&update);
        }
    }

    // ---------------------------------------------------------------
    // Reads
    // ---------------------------------------------------------------

    /// Iterate valid UTF-8 runs of a row. Returns the run starting at
    /// `offset` and advances `offset` past it; `None` once the row is
    /// exhausted. A run that ends in a malformed byte includes that byte
    /// and carries the `malformed` flag.
    pub fn chunk_at(&self, row: usize, offset: &mut usize) -> Option<Chunk<'_>> {
        let r = self.rows.get(row)?;
        let s = r.bytes.as_slice();
        if *offset >= s.len() {
            return None;
        }

        let begin = *offset;
        let mut malformed = false;
        loop {
            let step = utf8::incr(s, offset);
            if step.advanced == 0 {
                break;
            }
            if step.malformed {
                malformed = true;
                break;
            }
        }

        if *offset == begin {
            return None;
        }
        Some(Chunk {
            bytes: &s[begin..*offset],
            malformed,
        })
    }

    /// Select the whitespace-delimited word surrounding `offset`, leaving
    /// `offset` at the end of the word. Pointing at or past end of line
    /// selects the whole row (with `offset` reset to 0).
    pub fn word_at(&self, row: usize, offset: &mut usize) -> Option<&[u8]> {
        let r = self.rows.get(row)?;
        let s = r.bytes.as_slice();

        if *offset >= s.len() {
            *offset = 0;
            return Some(s);
        }

        let orig = *offset;
        while s[*offset].is_ascii_whitespace() && utf8::decr(s, offset) > 0 {}
        if s[*offset].is_ascii_whitespace() {
            *offset = orig;
            return None;
        }

        let anchor = *offset;
        while !s[*offset].is_ascii_whitespace() && utf8::decr(s, offset) > 0 {}
        let begin = if s[*offset].is_ascii_whitespace() {
            *offset + 1
        } else {
            *offset
        };

        *offset = anchor;
        while *offset < s.len() && !s[*offset].is_ascii_whitespace() {
            if utf8::incr(s, offset).advanced == 0 {
                break;
            }
        }
        let end = *offset;

        if begin >= end {
            *offset = orig;
            return None;
        }
        Some(&s[begin..end])
    }

    /// Search for `needle` in a row starting at `*offset`. On a hit,
    /// `offset` is set to the match start snapped back onto a UTF-8
    /// boundary (a match landing inside a multibyte sequence reports the
    /// sequence's start).
    pub fn match_at(&self, row: usize, needle: &[u8], offset: &mut usize) -> bool {
        let Some(r) = self.rows.get(row) else {
            return false;
        };
        if needle.is_empty() || *offset > r.bytes.len() {
            return false;
        }

        let begin = *offset;
        let hay = &r.bytes[begin..];
        let Some(found) = hay.windows(needle.len()).position(|w| w == needle) else {
            return false;
        };

        *offset = begin + utf8::snap(hay, found);
        true
    }

    // ---------------------------------------------------------------
    // Mutations
    // ---------------------------------------------------------------

    fn insert_row_at(&mut self, row: usize) {
        let row = row.min(self.rows.len());
        self.rows.insert(row, Row::default());
        let last = self.rows.len() - 1;
        self.broadcast_range(row, last);
    }

    fn insert_byte_at(&mut self, row: usize, offset: &mut usize, byte: u8) {
        if self.rows.is_empty() {
            self.insert_row_at(0);
        }
        let row = row.min(self.rows.len() - 1);
        let r = &mut self.rows[row];
        let at = (*offset).min(r.bytes.len());
        r.bytes.insert(at, byte);
        *offset = at + 1;

        if let Some(mut m) = self.mark {
            if m.row == row && at < m.offset {
                Self::step(&self.rows, &mut m, 0, 1);
                self.mark = Some(m);
            }
        }
    }

    /// Insert raw bytes at the cursor. A `\n` byte splits the current row
    /// at the cursor and moves it to column 0 of the new row below; every
    /// other byte, including invalid UTF-8, is inserted as-is with the
    /// cursor offset advancing one byte per byte. The offset may thus land
    /// inside a multibyte sequence; the movement API snaps it back.
    pub fn insert(&mut self, cur: &mut Cursor, s: &[u8]) {
        if self.rows.is_empty() {
            self.insert_row_at(0);
        }
        cur.row = cur.row.min(self.rows.len() - 1);
        let from_row = cur.row;
        let mut offset = cur.offset;

        for &byte in s {
            if byte == b'\n' {
                cur.offset = offset.min(self.rows[cur.row].bytes.len());
                self.insert_row_at(cur.row + 1);
                let tail = self.rows[cur.row].bytes.split_off(cur.offset);
                self.rows[cur.row + 1].bytes = tail;
                cur.row += 1;
                cur.offset = 0;
                offset = 0;
            } else {
                self.insert_byte_at(cur.row, &mut offset, byte);
            }
        }

        cur.offset = offset;
        self.broadcast_range(from_row, cur.row);
    }

    /// Forward-delete one codepoint at the cursor, joining the next row
    /// when the cursor sits at end of line.
    pub fn delete_char(&mut self, cur: &mut Cursor) {
        if self.rows.is_empty() || cur.row >= self.rows.len() {
            return;
        }

        let row_len = self.rows[cur.row].bytes.len();
        if cur.offset >= row_len {
            if cur.row + 1 >= self.rows.len() {
                return;
            }

            let mut rejoined_mark = None;
            if let Some(m) = self.mark {
                if m.row == cur.row + 1 {
                    rejoined_mark = Some(m.offset + row_len);
                }
            }

            let next = self.rows.remove(cur.row + 1);
            self.rows[cur.row].bytes.extend_from_slice(&next.bytes);

            if let Some(moffset) = rejoined_mark {
                let len = self.rows[cur.row].bytes.len();
                self.mark = Some(Cursor::new(cur.row, moffset.min(len)));
            }

            let last = self.rows.len() - 1;
            self.broadcast_range(cur.row, last.max(cur.row));
            return;
        }

        if let Some(m) = self.mark {
            if m.row == cur.row {
                if cur.offset < m.offset {
                    let mut m2 = m;
                    Self::step(&self.rows, &mut m2, 0, -1);
                    self.mark = Some(m2);
                } else if cur.offset == m.offset {
                    self.clear_mark(cur.row);
                }
            }
        }

        let r = &mut self.rows[cur.row];
        let mut end = cur.offset;
        utf8::incr(&r.bytes, &mut end);
        r.bytes.drain(cur.offset..end);
        self.broadcast_range(cur.row, cur.row);
    }

    /// Backward-delete one codepoint before the cursor, joining with the
    /// previous row when the cursor sits at column 0.
    pub fn erase(&mut self, cur: &mut Cursor) {
        if cur.row == 0 && cur.offset == 0 {
            return;
        }
        self.update_cursor(cur, 0, -1);
        self.delete_char(cur);
    }

    /// Truncate the cursor's row at the cursor.
    pub fn erase_eol(&mut self, cur: &Cursor) {
        if let Some(r) = self.rows.get_mut(cur.row) {
            r.bytes.truncate(cur.offset);
            self.broadcast_range(cur.row, cur.row);
        }
    }

    pub fn remove_row(&mut self, row: usize) {
        if row >= self.rows.len() {
            return;
        }
        self.rows.remove(row);

        let from = row.saturating_sub(1);
        let to = self.rows.len().saturating_sub(1);
        self.broadcast_range(from, to.max(from));
    }

    pub fn clear_row(&mut self, row: usize) {
        if let Some(r) = self.rows.get_mut(row) {
            r.bytes = Vec::new();
            r.flags = RowFlags::empty();
            self.broadcast_range(row, row);
        }
    }

    /// Drop every row and the mark, releasing all row storage.
    pub fn clear(&mut self) {
        let old = self.rows.len();
        self.rows = Vec::new();
        self.broadcast_range(0, old.saturating_sub(1));
        self.clear_mark(0);
    }

    // ---------------------------------------------------------------
    // Cursor movement
    // ---------------------------------------------------------------

    /// Jump the cursor, clamping the row into `[0, rows-1]` (0 when the
    /// buffer is empty) and the offset into `[0, row_len]`.
    pub fn set_cursor(&mut self, cur: &mut Cursor, row: usize, offset: usize) {
        let row = if self.rows.is_empty() {
            0
        } else {
            row.min(self.rows.len() - 1)
        };
        let len = self.bytes_at(row);

        let old_row = cur.row;
        cur.row = row;
        cur.offset = offset.min(len);

        self.broadcast_range(old_row, cur.row);
    }

    /// Step the cursor `|drow|` rows and `|dcol|` codepoints, one step at
    /// a time. Column steps wrap at row boundaries: off end of line onto
    /// the next row's column 0, off column 0 onto the previous row's end
    /// of line.
    pub fn update_cursor(&mut self, cur: &mut Cursor, drow: isize, dcol: isize) {
        let old_row = cur.row;
        Self::step(&self.rows, cur, drow, dcol);
        self.broadcast_range(old_row, cur.row);
    }

    fn step(rows: &[Row], cur: &mut Cursor, drow: isize, dcol: isize) {
        if rows.is_empty() {
            *cur = Cursor::default();
            return;
        }
        cur.row = cur.row.min(rows.len() - 1);

        if drow != 0 {
            let mut n = drow;
            while n < 0 {
                if cur.row > 0 {
                    cur.row -= 1;
                }
                n += 1;
            }
            while n > 0 {
                if cur.row + 1 < rows.len() {
                    cur.row += 1;
                }
                n -= 1;
            }
            // Landing on another row may leave the offset past its end or
            // inside a multibyte sequence.
            cur.offset = utf8::snap(&rows[cur.row].bytes, cur.offset);
        }

        let mut n = dcol;
        while n < 0 {
            if cur.offset > 0 {
                utf8::decr(&rows[cur.row].bytes, &mut cur.offset);
            } else if cur.row > 0 {
                cur.row -= 1;
                cur.offset = rows[cur.row].bytes.len();
            }
            n += 1;
        }
        while n > 0 {
            if cur.offset < rows[cur.row].bytes.len() {
                utf8::incr(&rows[cur.row].bytes, &mut cur.offset);
            } else if cur.row + 1 < rows.len() {
                cur.row += 1;
                cur.offset = 0;
            }
            n -= 1;
        }
    }

    // ---------------------------------------------------------------
    // Mark / region
    // ---------------------------------------------------------------

    /// Place the mark. The position must name an existing byte of an
    /// existing row; anything else is ignored.
    pub fn set_mark(&mut self, row: usize, offset: usize) {
        let Some(r) = self.rows.get(row) else {
            return;
        };
        if offset >= r.bytes.len() {
            return;
        }
        self.clear_mark(row);
        self.mark = Some(Cursor::new(row, offset));
    }

    /// Remove the mark, broadcasting the span from the mark's row to
    /// `current_row` so marked rows get redrawn.
    pub fn clear_mark(&mut self, current_row: usize) {
        if let Some(m) = self.mark.take() {
            self.broadcast_range(m.row, current_row);
        }
    }

    pub fn has_mark(&self) -> bool {
        self.mark.is_some()
    }

    pub fn mark(&self) -> Option<Cursor> {
        self.mark
    }

    /// Region membership test: the region is `[mark, dot)` in row-major
    /// order, where `dot` is the cursor defining the far end. The mark
    /// must precede the dot.
    pub fn is_marked(&self, row: usize, offset: usize, dot_row: usize, dot_offset: usize) -> bool {
        let Some(m) = self.mark else {
            return false;
        };

        if m.row > row {
            false
        } else if m.row == row && dot_row > row && offset >= m.offset {
            true
        } else if m.row < row && dot_row > row {
            true
        } else if m.row < row && dot_row == row && offset < dot_offset {
            true
        } else {
            m.row == row && dot_row == row && offset >= m.offset && offset < dot_offset
        }
    }
}
