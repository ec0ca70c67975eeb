//! A pty panel: one command editor, a status/cwd row, and a typescript
//! editor fed by a subprocess, a file, or a directory listing.
//!
//! The panel owns its buffers and editors outright. Cross-panel concerns
//! (slave routing, descriptor registration, focus) belong to the panel
//! list; the panel exposes the pieces those flows need.

use std::cell::Cell;
use std::io;
use std::os::unix::io::RawFd;
use std::os::unix::process::ExitStatusExt;
use std::path::PathBuf;
use std::process::Child;
use std::rc::Rc;

use core_editor::EditorView;
use core_screen::{layout, ColorId, FontMetrics, Px, Rect, Screen};
use core_text::{Buffer, Cursor, RowFlags};
use tracing::{info, warn};

use crate::spawn::{spawn_shell, PtyChild, SpawnError};

/// Width reserved for the status label, matching its padded text.
const STATUS_WIDTH: Px = 12;

/// Integer handle addressing a panel inside the panel-list arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PanelId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelState {
    NotStarted,
    Started(u32),
    FileSaved,
    FileUnsaved,
    Exited(i32),
    Signaled(i32),
}

#[derive(Debug, Clone, Copy)]
enum ExitKind {
    Exited(i32),
    Signaled(i32),
}

pub struct Panel {
    pub id: PanelId,

    pub cmd_buffer: Buffer,
    pub cmd_editor: EditorView,

    pub ts_buffer: Buffer,
    pub ts_editor: EditorView,
    pub ts_hidden: bool,

    pub child: Option<Child>,
    pub pty_fd: Option<RawFd>,
    exit: Option<ExitKind>,

    pub file: Option<PathBuf>,
    file_unsaved: Rc<Cell<bool>>,

    pub master: Option<PanelId>,
    pub slaves: Vec<PanelId>,
    pub active_slave: Option<PanelId>,

    pub cwd: PathBuf,
    pub status: String,

    frame: Rect,
    cwd_rect: Rect,
    status_rect: Rect,
    chrome_dirty: bool,
}

impl Panel {
    pub fn new(id: PanelId) -> Self {
        let mut cmd_buffer = Buffer::new();
        let mut cmd_editor = EditorView::bare(ColorId::TitleBgNormal, Some(1), true);
        cmd_editor.attach(&mut cmd_buffer);

        let mut ts_buffer = Buffer::new();
        let mut ts_editor = EditorView::new(ColorId::TextBg, None, true);
        ts_editor.ocur = Some(Cursor::default());
        ts_editor.attach(&mut ts_buffer);

        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

        let mut panel = Self {
            id,
            cmd_buffer,
            cmd_editor,
            ts_buffer,
            ts_editor,
            ts_hidden: false,
            child: None,
            pty_fd: None,
            exit: None,
            file: None,
            file_unsaved: Rc::new(Cell::new(false)),
            master: None,
            slaves: Vec::new(),
            active_slave: None,
            cwd,
            status: String::new(),
            frame: Rect::new(0, 0, 0, 0),
            cwd_rect: Rect::new(0, 0, 0, 0),
            status_rect: Rect::new(0, 0, 0, 0),
            chrome_dirty: true,
        };
        panel.update_status();
        panel
    }

    pub fn state(&self) -> PanelState {
        if let Some(child) = &self.child {
            return PanelState::Started(child.id());
        }
        if let Some(exit) = self.exit {
            return match exit {
                ExitKind::Exited(code) => PanelState::Exited(code),
                ExitKind::Signaled(sig) => PanelState::Signaled(sig),
            };
        }
        if self.file.is_some() {
            if self.file_unsaved.get() {
                return PanelState::FileUnsaved;
            }
            return PanelState::FileSaved;
        }
        PanelState::NotStarted
    }

    pub fn started(&self) -> bool {
        self.pty_fd.is_some()
    }

    /// Refresh the status label text from the derived state.
    pub fn update_status(&mut self) {
        let lines = self.ts_buffer.rows();
        let text = match self.state() {
            PanelState::Started(pid) => format!("{lines}L {pid}"),
            PanelState::Exited(code) => format!("{lines}L E{code}"),
            PanelState::Signaled(sig) => format!("{lines}L S{sig}"),
            PanelState::FileUnsaved => format!("{lines}L *"),
            PanelState::FileSaved | PanelState::NotStarted => format!("{lines}L"),
        };
        let text = format!("{text:<12}");
        if text != self.status {
            self.status = text;
            self.chrome_dirty = true;
        }
    }

    // ---------------------------------------------------------------
    // Typescript lifecycle
    // ---------------------------------------------------------------

    /// Replace the typescript with a fresh buffer and cursors.
    pub fn reset_typescript(&mut self) {
        self.ts_editor.detach(&mut self.ts_buffer);
        self.ts_buffer = Buffer::new();
        self.ts_editor.reset_cursors(Cursor::default(), Some(Cursor::default()));
        self.ts_editor.attach(&mut self.ts_buffer);
        self.file = None;
        self.file_unsaved = Rc::new(Cell::new(false));
        self.update_status();
    }

    /// Typescript contents as written to a child or a file: every row
    /// followed by a newline, the terminating empty row skipped.
    pub fn ts_dump(&mut self) -> Vec<u8> {
        let rows = self.ts_buffer.rows();
        let mut out = Vec::new();
        for row in 0..rows {
            if row == rows - 1 && self.ts_buffer.bytes_at(row) == 0 {
                break;
            }
            out.extend_from_slice(self.ts_buffer.row_bytes(row));
            out.push(b'\n');
        }
        out
    }

    /// Payload a slave forwards to its master: the command line, then
    /// optionally the typescript and its terminator.
    pub fn build_master_payload(&mut self, cmd: &str, term: Option<&'static [u8]>) -> Vec<u8> {
        let mut payload = cmd.as_bytes().to_vec();
        payload.push(b'\n');
        if let Some(term) = term {
            payload.extend(self.ts_dump());
            payload.extend_from_slice(term);
        }
        payload
    }

    /// Append subprocess output at the output cursor.
    pub fn on_output(&mut self, bytes: &[u8]) {
        let mut ocur = self.ts_editor.ocur.unwrap_or_default();
        self.ts_buffer.insert(&mut ocur, bytes);
        self.ts_editor.ocur = Some(ocur);
        self.update_status();
    }

    /// The child's descriptor reached end of file: close it, reap the
    /// child, record the exit, shrink the view back to the content.
    pub fn on_eof(&mut self, lh: Px) {
        let Some(fd) = self.pty_fd.take() else {
            return;
        };
        let _ = nix::unistd::close(fd);

        if let Some(mut child) = self.child.take() {
            match child.wait() {
                Ok(status) => {
                    self.exit = Some(if let Some(sig) = status.signal() {
                        ExitKind::Signaled(sig)
                    } else {
                        ExitKind::Exited(status.code().unwrap_or(0))
                    });
                }
                Err(e) => warn!(panel = self.id.0, error = %e, "reaping child"),
            }
        }

        self.ts_editor.shrink(&mut self.ts_buffer, lh);
        self.update_status();
    }

    /// Kill and reap a running child, discarding pending output.
    pub fn kill_child(&mut self) {
        if let Some(fd) = self.pty_fd.take() {
            let _ = nix::unistd::close(fd);
        }
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
        self.exit = None;
        self.update_status();
    }

    /// Spawn `shell -c cmd` on a fresh pty. On success the master
    /// descriptor is returned for event-loop registration.
    pub fn spawn(&mut self, shell: &str, cmd: &str) -> Result<RawFd, SpawnError> {
        let PtyChild { child, master } = spawn_shell(shell, cmd)?;
        info!(panel = self.id.0, pid = child.id(), cmd, "spawned");
        self.child = Some(child);
        self.pty_fd = Some(master);
        self.exit = None;
        self.update_status();
        Ok(master)
    }

    /// Write bytes to the child, dropping them with a warning when the
    /// descriptor is gone or the write fails.
    pub fn write_to_child(&mut self, mut bytes: &[u8]) {
        let Some(fd) = self.pty_fd else {
            warn!(panel = self.id.0, "write to a panel without a child");
            return;
        };
        while !bytes.is_empty() {
            match nix::unistd::write(fd, bytes) {
                Ok(n) => bytes = &bytes[n..],
                Err(e) => {
                    warn!(panel = self.id.0, error = %e, "writing to child");
                    break;
                }
            }
        }
    }

    /// Enter in the typescript of a started panel: rewrite the cursor's
    /// row as the new command row, drop stale output below it, sync the
    /// output cursor, and hand back the bytes to send to the child.
    ///
    /// In a panel without a child this inserts a literal newline.
    pub fn submit_stdin(&mut self, line: &str) -> Option<Vec<u8>> {
        if self.pty_fd.is_none() {
            let mut cur = self.ts_editor.cur;
            self.ts_buffer.insert(&mut cur, b"\n");
            self.ts_editor.cur = cur;
            return None;
        }

        let row = self.ts_editor.cur.row;
        self.ts_buffer.clear_row(row);
        while row + 1 < self.ts_buffer.rows()
            && !self.ts_buffer.row_flags(row + 1).contains(RowFlags::CMDLINE)
        {
            self.ts_buffer.remove_row(row + 1);
        }
        self.ts_buffer.set_row_flags(row, RowFlags::CMDLINE);

        let mut cur = Cursor::new(row, 0);
        self.ts_buffer.insert(&mut cur, line.as_bytes());
        self.ts_editor.cur = cur;
        self.ts_editor.ocur = Some(cur);

        let mut out = line.as_bytes().to_vec();
        out.push(b'\n');
        Some(out)
    }

    // ---------------------------------------------------------------
    // File and directory sources
    // ---------------------------------------------------------------

    /// `:path`: load a file into the typescript. A missing file becomes
    /// a new empty one; other errors land in the typescript as text.
    pub fn open_file(&mut self, path: &str) {
        self.reset_typescript();
        match std::fs::read(path) {
            Ok(bytes) => {
                self.on_output(&bytes);
                self.file = Some(PathBuf::from(path));
                self.file_unsaved.set(false);
                self.install_file_listener();
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                self.file = Some(PathBuf::from(path));
                self.file_unsaved.set(false);
                self.install_file_listener();
            }
            Err(e) => {
                self.on_output(format!("{path}: {e}").as_bytes());
            }
        }
        self.update_status();
    }

    fn install_file_listener(&mut self) {
        let flag = self.file_unsaved.clone();
        self.ts_buffer.add_listener(move |_| flag.set(true));
        // The listener fires for every later mutation; loading is done.
        self.file_unsaved.set(false);
    }

    /// `:path/`: change into the directory and list it, one `:entry`
    /// per row with a `/` suffix on subdirectories.
    pub fn open_dir(&mut self, path: &str) {
        if let Err(e) = std::env::set_current_dir(path) {
            self.on_output(format!("{path}: {e}").as_bytes());
            return;
        }
        self.reset_typescript();

        match std::fs::read_dir(".") {
            Ok(entries) => {
                let mut names: Vec<String> = Vec::new();
                for entry in entries.flatten() {
                    let name = entry.file_name().to_string_lossy().into_owned();
                    let is_dir = std::fs::symlink_metadata(entry.path())
                        .map(|m| m.is_dir())
                        .unwrap_or(false);
                    if is_dir {
                        names.push(format!(":{name}/"));
                    } else {
                        names.push(format!(":{name}"));
                    }
                }
                names.sort();
                let mut listing = Vec::new();
                for name in names {
                    listing.extend_from_slice(name.as_bytes());
                    listing.push(b'\n');
                }
                self.on_output(&listing);
            }
            Err(e) => self.on_output(format!("{path}: {e}").as_bytes()),
        }

        if let Ok(cwd) = std::env::current_dir() {
            self.cwd = cwd;
            self.chrome_dirty = true;
        }

        // The cmdline now refers to the new directory.
        self.cmd_buffer.clear();
        let mut cur = Cursor::default();
        self.cmd_buffer.insert(&mut cur, b":./");
        self.cmd_editor.cur = cur;

        self.update_status();
    }

    /// Write the typescript back to the file backing it.
    pub fn save(&mut self) {
        let Some(path) = self.file.clone() else {
            warn!(panel = self.id.0, "save on a panel without a file");
            return;
        };
        let bytes = self.ts_dump();
        match std::fs::write(&path, bytes) {
            Ok(()) => {
                self.file_unsaved.set(false);
                self.update_status();
                info!(path = %path.display(), "saved");
            }
            Err(e) => {
                self.on_output(format!("{}: {e}", path.display()).as_bytes());
            }
        }
    }

    // ---------------------------------------------------------------
    // Typescript visibility
    // ---------------------------------------------------------------

    pub fn hide_output(&mut self) {
        self.ts_hidden = true;
    }

    pub fn show_output(&mut self) {
        if self.ts_hidden {
            self.ts_hidden = false;
            self.ts_editor.mark_dirty();
        }
    }

    pub fn toggle_hide_output(&mut self) {
        if self.ts_hidden {
            self.show_output();
        } else {
            self.hide_output();
        }
    }

    // ---------------------------------------------------------------
    // Geometry and painting
    // ---------------------------------------------------------------

    /// Height the panel wants: one command row plus the typescript.
    pub fn prefer_height(&mut self, font: &dyn FontMetrics) -> Px {
        let lh = font.line_height();
        if self.ts_hidden {
            lh
        } else {
            lh + self.ts_editor.prefer_height(&mut self.ts_buffer, lh)
        }
    }

    /// Lay out the command row (cwd label, command editor, status label)
    /// and the typescript beneath it.
    pub fn layout(&mut self, frame: Rect, font: &dyn FontMetrics) {
        let lh = font.line_height();
        if frame != self.frame {
            self.chrome_dirty = true;
        }
        self.frame = frame;

        let cwd_text = self.cwd.display().to_string();
        let cwd_w = font.str_width(0, cwd_text.as_bytes());
        let sides = layout::distribute(frame.w, &[cwd_w, 9999, STATUS_WIDTH]);
        let offs = layout::offsets(&sides);

        self.cwd_rect = Rect::new(frame.x + offs[0], frame.y, sides[0], lh);
        self.cmd_editor
            .set_frame(Rect::new(frame.x + offs[1], frame.y, sides[1], lh));
        self.status_rect = Rect::new(frame.x + offs[2], frame.y, sides[2], lh);

        if !self.ts_hidden && frame.h > lh {
            self.ts_editor
                .set_frame(Rect::new(frame.x, frame.y + lh, frame.w, frame.h - lh));
        }
    }

    pub fn frame(&self) -> Rect {
        self.frame
    }

    /// Force a repaint of the whole panel on the next flush.
    pub fn mark_dirty(&mut self) {
        self.chrome_dirty = true;
        self.cmd_editor.mark_dirty();
        self.ts_editor.mark_dirty();
    }

    pub fn needs_paint(&self) -> bool {
        self.chrome_dirty
            || self.cmd_editor.needs_paint()
            || (!self.ts_hidden && self.ts_editor.needs_paint())
    }

    pub fn paint(&mut self, screen: &mut dyn Screen) {
        if self.chrome_dirty {
            let cwd = self.cwd.display().to_string();
            draw_label(screen, self.cwd_rect, &cwd);
            let status = self.status.clone();
            draw_label(screen, self.status_rect, &status);
            self.chrome_dirty = false;
        }
        self.cmd_editor.paint(&mut self.cmd_buffer, screen);
        if !self.ts_hidden {
            self.ts_editor.paint(&mut self.ts_buffer, screen);
        }
    }
}

impl Drop for Panel {
    fn drop(&mut self) {
        // A live child dies with its panel; pending output is discarded.
        self.kill_child();
    }
}

fn draw_label(screen: &mut dyn Screen, rect: Rect, text: &str) {
    if rect.w <= 0 || rect.h <= 0 {
        return;
    }
    screen.clear_rect(rect, ColorId::StatusBg);

    // Clip to the label's width; the spans to either side belong to
    // neighboring widgets.
    let mut w = 0;
    let mut fit = String::new();
    for ch in text.chars() {
        let cw = screen.font().str_width(w, ch.to_string().as_bytes());
        if w + cw > rect.w {
            break;
        }
        fit.push(ch);
        w += cw;
    }
    screen.draw_span(rect.x, rect.y, fit.as_bytes(), ColorId::StatusFg, ColorId::StatusBg);
}
