//! Panel list and window set.
//!
//! A window holds an ordered arena of pty panels stacked vertically.
//! Panels are addressed by [`PanelId`]; the master/slave relation is a
//! pair of handles, never a pointer. The window set owns the display
//! surface and the panel lists, routes toolkit events to the focused
//! editor, carries out panel-scope bindings, and moves subprocess output
//! from descriptors into typescripts (including active-slave routing).

use std::cell::RefCell;
use std::os::unix::io::RawFd;
use std::rc::{Rc, Weak};

use core_editor::EditorAction;
use core_events::EventLoop;
use core_pty::{parse_submission, Panel, PanelId, Submission};
use core_screen::{
    layout, FontMetrics, Key, KeyInput, Mods, Px, Rect, Screen, ScreenEvent,
};
use tracing::{error, info, warn};

mod menu;

pub use menu::{Menu, MenuItem};

/// Focus level of command editors.
pub const LEVEL_CMD: u8 = 0;
/// Focus level of typescript editors.
pub const LEVEL_TS: u8 = 1;

/// One window: an ordered list of panels in a vertical layout.
pub struct PanelList {
    pub id: u32,
    pub panels: Vec<Panel>,
    next_seq: u32,
    pub focus_panel: Option<PanelId>,
    pub level: u8,
    pub menu: Option<Menu>,
    frame: Rect,
}

impl PanelList {
    pub fn new(id: u32) -> Self {
        let mut list = Self {
            id,
            panels: Vec::new(),
            next_seq: 1,
            focus_panel: None,
            level: LEVEL_CMD,
            menu: None,
            frame: Rect::new(0, 0, 0, 0),
        };
        list.add_panel(None);
        list
    }

    pub fn index_of(&self, id: PanelId) -> Option<usize> {
        self.panels.iter().position(|p| p.id == id)
    }

    pub fn panel(&self, id: PanelId) -> Option<&Panel> {
        self.index_of(id).map(|i| &self.panels[i])
    }

    pub fn panel_mut(&mut self, id: PanelId) -> Option<&mut Panel> {
        self.index_of(id).map(move |i| &mut self.panels[i])
    }

    /// Insert a new panel after the focused one (at the end when focus
    /// is elsewhere), register it as a slave when a master is given, and
    /// focus it.
    pub fn add_panel(&mut self, master: Option<PanelId>) -> PanelId {
        let pid = PanelId(self.next_seq);
        self.next_seq += 1;

        let mut panel = Panel::new(pid);
        panel.master = master;

        let at = self
            .focus_panel
            .and_then(|f| self.index_of(f))
            .map(|i| i + 1)
            .unwrap_or(self.panels.len());
        self.panels.insert(at, panel);

        if let Some(m) = master {
            if let Some(mp) = self.panel_mut(m) {
                mp.slaves.push(pid);
                mp.active_slave = Some(pid);
            }
        }

        self.focus_panel = Some(pid);
        self.level = LEVEL_CMD;
        pid
    }

    pub fn remove_slave(&mut self, master: PanelId, slave: PanelId) {
        if let Some(mp) = self.panel_mut(master) {
            if mp.active_slave == Some(slave) {
                mp.active_slave = None;
            }
            mp.slaves.retain(|&s| s != slave);
        }
        if let Some(sp) = self.panel_mut(slave) {
            if sp.master == Some(master) {
                sp.master = None;
            }
        }
    }

    /// Detach every slave, most recently added first.
    pub fn detach_slaves(&mut self, master: PanelId) {
        let slaves = self
            .panel(master)
            .map(|p| p.slaves.clone())
            .unwrap_or_default();
        for &sid in slaves.iter().rev() {
            self.remove_slave(master, sid);
        }
    }

    fn unlink(&mut self, id: PanelId) {
        if let Some(m) = self.panel(id).and_then(|p| p.master) {
            self.remove_slave(m, id);
        }
        self.detach_slaves(id);
    }

    /// Close a panel, moving focus to the previous panel (or the next).
    /// Refused when no other panel could take focus.
    pub fn close_panel(&mut self, id: PanelId, ev_loop: &EventLoop) -> bool {
        let Some(i) = self.index_of(id) else {
            return false;
        };
        let replacement = if i > 0 {
            Some(self.panels[i - 1].id)
        } else if i + 1 < self.panels.len() {
            Some(self.panels[i + 1].id)
        } else {
            None
        };
        let Some(replacement) = replacement else {
            return false;
        };

        self.unlink(id);
        let mut panel = self.panels.remove(i);
        if let Some(fd) = panel.pty_fd {
            ev_loop.remove_source(fd);
        }
        panel.kill_child();

        if self.focus_panel == Some(id) {
            self.focus_panel = Some(replacement);
            if self.level == LEVEL_TS && self.panel(replacement).is_some_and(|p| p.ts_hidden) {
                self.level = LEVEL_CMD;
            }
        }
        true
    }

    /// Focusable panels at the current level, in stacking order.
    fn ring(&self) -> Vec<PanelId> {
        self.panels
            .iter()
            .filter(|p| self.level == LEVEL_CMD || !p.ts_hidden)
            .map(|p| p.id)
            .collect()
    }

    pub fn cycle_focus(&mut self, forward: bool) {
        let ring = self.ring();
        if ring.is_empty() {
            return;
        }
        let at = self
            .focus_panel
            .and_then(|f| ring.iter().position(|&r| r == f))
            .unwrap_or(0);
        let next = if forward {
            (at + 1) % ring.len()
        } else {
            (at + ring.len() - 1) % ring.len()
        };
        self.focus_panel = Some(ring[next]);
    }

    pub fn toggle_level(&mut self) {
        self.level ^= 1;
        if self.level == LEVEL_TS {
            let hidden = self
                .focus_panel
                .and_then(|f| self.panel(f))
                .is_some_and(|p| p.ts_hidden);
            if hidden {
                self.level = LEVEL_CMD;
            }
        }
    }

    /// Stack the panels vertically, splitting height by preference.
    pub fn layout(&mut self, frame: Rect, font: &dyn FontMetrics) {
        self.frame = frame;
        let lh = font.line_height();
        let prefers: Vec<Px> = self
            .panels
            .iter_mut()
            .map(|p| p.prefer_height(font).max(lh))
            .collect();
        let sides = layout::distribute(frame.h, &prefers);
        let offs = layout::offsets(&sides);
        for (i, p) in self.panels.iter_mut().enumerate() {
            p.layout(Rect::new(frame.x, frame.y + offs[i], frame.w, sides[i]), font);
        }
    }
}

/// The set of windows plus the display surface and loop plumbing.
pub struct WindowSet {
    screen: Box<dyn Screen>,
    ev_loop: EventLoop,
    shell: String,
    pub windows: Vec<PanelList>,
    self_ref: Weak<RefCell<WindowSet>>,
}

impl WindowSet {
    /// Build the shared window set with its first window.
    pub fn shared(screen: Box<dyn Screen>, ev_loop: EventLoop, shell: String) -> Rc<RefCell<Self>> {
        let ws = Rc::new(RefCell::new(Self {
            screen,
            ev_loop,
            shell,
            windows: vec![PanelList::new(1)],
            self_ref: Weak::new(),
        }));
        ws.borrow_mut().self_ref = Rc::downgrade(&ws);
        ws.borrow_mut().sync_focus();
        ws
    }

    pub fn screen_poll_fd(&self) -> Option<RawFd> {
        self.screen.poll_fd()
    }

    pub fn screen_mut(&mut self) -> &mut dyn Screen {
        &mut *self.screen
    }

    /// Deliver toolkit events the display library buffered synchronously.
    pub fn drain_screen_events(&mut self) {
        let mut events = Vec::new();
        if let Err(e) = self.screen.drain_pending(&mut |ev| events.push(ev)) {
            warn!(error = %e, "draining display events");
        }
        for ev in events {
            self.handle_event(ev);
        }
    }

    /// Deliver events after the input descriptor signalled readable.
    pub fn read_screen_events(&mut self) {
        let mut events = Vec::new();
        if let Err(e) = self.screen.read_events(&mut |ev| events.push(ev)) {
            warn!(error = %e, "reading display events");
        }
        for ev in events {
            self.handle_event(ev);
        }
    }

    pub fn handle_event(&mut self, ev: ScreenEvent) {
        if self.windows.is_empty() {
            return;
        }
        match ev {
            ScreenEvent::Resize { .. } => self.mark_panels_dirty(),
            ScreenEvent::CloseRequested => self.close_window(),
            ScreenEvent::Key(input) => self.handle_key(input),
            _ => self.handle_mouse(ev),
        }
    }

    fn handle_key(&mut self, input: KeyInput) {
        if self.windows[0].menu.is_some() {
            if input.key == Key::Escape {
                self.windows[0].menu = None;
                self.mark_panels_dirty();
            }
            return;
        }

        let Some(pid) = self.windows[0].focus_panel else {
            return;
        };
        let level = self.windows[0].level;

        let action = {
            let Self { windows, screen, .. } = self;
            match windows[0].panel_mut(pid) {
                Some(p) if level == LEVEL_CMD => {
                    p.cmd_editor.handle_key(&mut p.cmd_buffer, &mut **screen, input)
                }
                Some(p) => p.ts_editor.handle_key(&mut p.ts_buffer, &mut **screen, input),
                None => EditorAction::Handled,
            }
        };

        match action {
            EditorAction::Handled | EditorAction::Exec(_) => {}
            EditorAction::Submit(line) if level == LEVEL_CMD => self.submit_command(pid, &line),
            EditorAction::Submit(line) => self.submit_stdin(pid, &line),
            EditorAction::Save => {
                if let Some(p) = self.windows[0].panel_mut(pid) {
                    p.save();
                }
            }
            EditorAction::Pass => self.scope_key(pid, input),
        }
    }

    /// Panel-list bindings: Alt chords and the Escape/Enter level toggle.
    fn scope_key(&mut self, pid: PanelId, input: KeyInput) {
        if input.mods.contains(Mods::ALT) {
            match input.key {
                Key::Char('n') => self.new_window(),
                Key::Char(' ') | Key::Insert => {
                    self.windows[0].add_panel(None);
                    self.sync_focus();
                }
                Key::Char('s') => self.add_slave_panel(pid),
                Key::Char('H') => self.solo(pid),
                Key::Char('h') if input.mods.contains(Mods::SHIFT) => self.solo(pid),
                Key::Char('h') => {
                    if let Some(p) = self.windows[0].panel_mut(pid) {
                        p.toggle_hide_output();
                    }
                    self.after_visibility_change();
                }
                Key::Backspace => {
                    let closed = {
                        let Self {
                            windows, ev_loop, ..
                        } = self;
                        windows[0].close_panel(pid, ev_loop)
                    };
                    if closed {
                        self.sync_focus();
                        self.mark_panels_dirty();
                    }
                }
                Key::Up => {
                    self.windows[0].cycle_focus(false);
                    self.sync_focus();
                }
                Key::Down => {
                    self.windows[0].cycle_focus(true);
                    self.sync_focus();
                }
                _ => {}
            }
        } else if matches!(input.key, Key::Escape | Key::Enter) {
            self.windows[0].toggle_level();
            self.sync_focus();
        }
    }

    fn add_slave_panel(&mut self, pid: PanelId) {
        let target = {
            let win = &self.windows[0];
            let Some(p) = win.panel(pid) else {
                return;
            };
            if p.started() {
                Some(pid)
            } else {
                p.master
            }
        };
        if let Some(m) = target {
            self.windows[0].add_panel(Some(m));
            self.sync_focus();
        }
    }

    /// Show the given panel's typescript and hide everyone else's.
    fn solo(&mut self, pid: PanelId) {
        for p in &mut self.windows[0].panels {
            if p.id == pid {
                p.show_output();
            } else {
                p.hide_output();
            }
        }
        self.after_visibility_change();
    }

    fn after_visibility_change(&mut self) {
        let win = &mut self.windows[0];
        if win.level == LEVEL_TS {
            let hidden = win
                .focus_panel
                .and_then(|f| win.panel(f))
                .is_some_and(|p| p.ts_hidden);
            if hidden {
                win.level = LEVEL_CMD;
            }
        }
        self.sync_focus();
        self.mark_panels_dirty();
    }

    // ---------------------------------------------------------------
    // Command submission
    // ---------------------------------------------------------------

    pub fn submit_command(&mut self, pid: PanelId, line: &str) {
        match parse_submission(line) {
            Submission::OpenFile { path } => {
                if let Some(p) = self.windows[0].panel_mut(pid) {
                    p.open_file(&path);
                }
            }
            Submission::OpenDir { path } => {
                if let Some(p) = self.windows[0].panel_mut(pid) {
                    p.open_dir(&path);
                }
            }
            Submission::Run { cmd } => self.run_or_route(pid, &cmd, None),
            Submission::Pipe { cmd, term } => self.run_or_route(pid, &cmd, Some(term)),
        }
    }

    fn run_or_route(&mut self, pid: PanelId, cmd: &str, term: Option<&'static [u8]>) {
        let master = self.windows[0].panel(pid).and_then(|p| p.master);

        if let Some(mid) = master {
            // Slave: the command (and optionally the typescript) goes to
            // the master's child; this panel becomes the active slave.
            let payload = match self.windows[0].panel_mut(pid) {
                Some(p) => p.build_master_payload(cmd, term),
                None => return,
            };
            let Some(mp) = self.windows[0].panel_mut(mid) else {
                warn!(panel = pid.0, "slave without a live master");
                return;
            };
            if !mp.started() {
                warn!(panel = pid.0, master = mid.0, "master has no running child");
                return;
            }
            mp.write_to_child(&payload);
            mp.active_slave = Some(pid);
            if let Some(p) = self.windows[0].panel_mut(pid) {
                p.reset_typescript();
                p.show_output();
            }
            return;
        }

        // A piped typescript is captured before the respawn clears it.
        let dump = term.map(|t| {
            let mut d = self.windows[0]
                .panel_mut(pid)
                .map(|p| p.ts_dump())
                .unwrap_or_default();
            d.extend_from_slice(t);
            d
        });

        self.windows[0].detach_slaves(pid);
        if let Some(fd) = self.windows[0].panel(pid).and_then(|p| p.pty_fd) {
            self.ev_loop.remove_source(fd);
        }
        {
            let Some(p) = self.windows[0].panel_mut(pid) else {
                return;
            };
            p.kill_child();
            p.reset_typescript();
        }

        let shell = self.shell.clone();
        let spawned = self.windows[0].panel_mut(pid).map(|p| p.spawn(&shell, cmd));
        match spawned {
            Some(Ok(fd)) => {
                self.register_pty(pid, fd);
                if let Some(bytes) = dump {
                    if let Some(p) = self.windows[0].panel_mut(pid) {
                        p.write_to_child(&bytes);
                    }
                }
            }
            Some(Err(e)) => error!(panel = pid.0, error = %e, "spawn failed"),
            None => {}
        }
    }

    fn register_pty(&mut self, pid: PanelId, fd: RawFd) {
        let wsr = self.self_ref.clone();
        self.ev_loop.add_source(fd, move |fd| {
            if let Some(ws) = wsr.upgrade() {
                ws.borrow_mut().on_pty_readable(pid, fd);
            }
        });
    }

    fn submit_stdin(&mut self, pid: PanelId, line: &str) {
        if let Some(p) = self.windows[0].panel_mut(pid) {
            if let Some(bytes) = p.submit_stdin(line) {
                p.write_to_child(&bytes);
            }
        }
    }

    /// Readable pty master: up to 8 KiB goes to the active slave's
    /// typescript (the panel's own otherwise); end of file detaches the
    /// slaves and reaps the child.
    pub fn on_pty_readable(&mut self, pid: PanelId, fd: RawFd) {
        if self.windows.is_empty() {
            return;
        }

        let mut buf = [0u8; 8192];
        let n = nix::unistd::read(fd, &mut buf).unwrap_or(0);
        if n > 0 {
            let target = {
                let win = &self.windows[0];
                win.panel(pid)
                    .and_then(|p| p.active_slave)
                    .filter(|s| win.panel(*s).is_some())
                    .unwrap_or(pid)
            };
            if let Some(p) = self.windows[0].panel_mut(target) {
                p.on_output(&buf[..n]);
            }
            return;
        }

        self.ev_loop.remove_source(fd);
        self.windows[0].detach_slaves(pid);
        let lh = self.screen.font().line_height();
        if let Some(p) = self.windows[0].panel_mut(pid) {
            p.on_eof(lh);
        }
    }

    // ---------------------------------------------------------------
    // Mouse
    // ---------------------------------------------------------------

    fn handle_mouse(&mut self, ev: ScreenEvent) {
        let (x, y) = match ev {
            ScreenEvent::MousePress { x, y, .. }
            | ScreenEvent::MouseRelease { x, y, .. }
            | ScreenEvent::MouseMotion { x, y }
            | ScreenEvent::WheelUp { x, y }
            | ScreenEvent::WheelDown { x, y } => (x, y),
            _ => return,
        };

        if let Some(menu) = self.windows[0].menu.clone() {
            match ev {
                ScreenEvent::MousePress { .. } => {
                    if let Some(item) = menu.hit(self.screen.font(), x, y) {
                        self.windows[0].menu = None;
                        self.mark_panels_dirty();
                        self.dispatch_menu(item, menu.text);
                    }
                }
                ScreenEvent::MouseRelease { .. } => {
                    if !menu.contains(self.screen.font(), x, y) {
                        self.windows[0].menu = None;
                        self.mark_panels_dirty();
                    }
                }
                _ => {}
            }
            return;
        }

        let hit = {
            let win = &self.windows[0];
            let mut found = None;
            for p in &win.panels {
                if p.cmd_editor.contains(x, y) {
                    found = Some((p.id, LEVEL_CMD));
                    break;
                }
                if !p.ts_hidden && p.ts_editor.contains(x, y) {
                    found = Some((p.id, LEVEL_TS));
                    break;
                }
            }
            found
        };

        let (pid, lvl) = match ev {
            // Drags keep following the editor that took the press.
            ScreenEvent::MouseMotion { .. } => {
                let win = &self.windows[0];
                match win.focus_panel {
                    Some(f) => (f, win.level),
                    None => return,
                }
            }
            _ => match hit {
                Some(h) => h,
                None => return,
            },
        };

        if matches!(ev, ScreenEvent::MousePress { .. }) {
            self.windows[0].focus_panel = Some(pid);
            self.windows[0].level = lvl;
            self.sync_focus();
        }

        let action = {
            let Self { windows, screen, .. } = self;
            match windows[0].panel_mut(pid) {
                Some(p) if lvl == LEVEL_CMD => {
                    p.cmd_editor.handle_mouse(&mut p.cmd_buffer, &mut **screen, ev)
                }
                Some(p) => p.ts_editor.handle_mouse(&mut p.ts_buffer, &mut **screen, ev),
                None => return,
            }
        };

        if let EditorAction::Exec(text) = action {
            if lvl == LEVEL_TS {
                self.windows[0].menu = Some(Menu::new(x, y, text));
                self.mark_panels_dirty();
            }
        }
    }

    fn dispatch_menu(&mut self, item: MenuItem, text: String) {
        let new_pid = self.windows[0].add_panel(None);
        self.sync_focus();
        match item {
            MenuItem::Open => self.submit_command(new_pid, &format!(":{text}")),
            MenuItem::Exec => self.submit_command(new_pid, &text),
        }
    }

    // ---------------------------------------------------------------
    // Windows
    // ---------------------------------------------------------------

    pub fn new_window(&mut self) {
        // The window-set model allows several top-level panel lists, but
        // the cell-grid adapter drives a single surface.
        warn!("display adapter drives a single surface; cannot open another window");
    }

    /// Close the (last) window: kill every child and stop the loop.
    pub fn close_window(&mut self) {
        info!("closing window");
        let Self {
            windows, ev_loop, ..
        } = self;
        for win in windows.iter_mut() {
            for p in &mut win.panels {
                if let Some(fd) = p.pty_fd {
                    ev_loop.remove_source(fd);
                }
                p.kill_child();
            }
        }
        self.windows.clear();
        self.ev_loop.quit();
    }

    /// Submit the argv-joined startup command into the focused panel and
    /// drop focus onto its typescript.
    pub fn initial_command(&mut self, cmd: &str) {
        if self.windows.is_empty() {
            return;
        }
        let Some(pid) = self.windows[0].focus_panel else {
            return;
        };
        self.submit_command(pid, cmd);
        self.windows[0].toggle_level();
        self.sync_focus();
    }

    // ---------------------------------------------------------------
    // Focus and painting
    // ---------------------------------------------------------------

    fn sync_focus(&mut self) {
        let Self { windows, screen, .. } = self;
        let win = &mut windows[0];
        let focus = win.focus_panel;
        let level = win.level;
        let lh = screen.font().line_height();
        for p in &mut win.panels {
            let focused = focus == Some(p.id);
            p.cmd_editor
                .set_focused(&mut p.cmd_buffer, &mut **screen, focused && level == LEVEL_CMD);
            p.ts_editor
                .set_focused(&mut p.ts_buffer, &mut **screen, focused && level == LEVEL_TS);
            if focused {
                // The focused panel's grow-only typescript height drops
                // back to its content so the stack redistributes.
                p.ts_editor.shrink(&mut p.ts_buffer, lh);
            }
        }
    }

    fn mark_panels_dirty(&mut self) {
        for win in &mut self.windows {
            for p in &mut win.panels {
                p.mark_dirty();
            }
        }
    }

    /// Idle-turn flush: relayout, repaint dirty panels, draw the menu
    /// overlay, and push everything to the display at once.
    pub fn flush(&mut self) {
        if self.windows.is_empty() {
            return;
        }
        let (w, h) = self.screen.size();
        let mut painted = false;
        {
            let Self { windows, screen, .. } = self;
            let win = &mut windows[0];
            win.layout(Rect::new(0, 0, w, h), screen.font());
            for p in &mut win.panels {
                if p.needs_paint() {
                    painted = true;
                }
                p.paint(&mut **screen);
            }
            if painted {
                if let Some(menu) = &win.menu {
                    menu.draw(&mut **screen);
                }
            }
        }
        if painted {
            if let Err(e) = self.screen.flush() {
                warn!(error = %e, "flushing display");
            }
        }
    }
}
