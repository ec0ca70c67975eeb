//! Panel-list behavior: arena order, focus, master/slave routing, and
//! the submission flows that need no live subprocess.

use core_events::EventLoop;
use core_panels::{PanelList, WindowSet, LEVEL_CMD, LEVEL_TS};
use core_screen::{Key, KeyInput, Mods, MouseButton, ScreenEvent, TestScreen};
use nix::unistd::{close, pipe, write};

fn window_set() -> std::rc::Rc<std::cell::RefCell<WindowSet>> {
    WindowSet::shared(
        Box::new(TestScreen::new(80, 24)),
        EventLoop::new(),
        "/bin/sh".to_string(),
    )
}

fn key(ws: &std::rc::Rc<std::cell::RefCell<WindowSet>>, input: KeyInput) {
    ws.borrow_mut().handle_event(ScreenEvent::Key(input));
}

fn alt(k: Key) -> KeyInput {
    KeyInput::new(k, Mods::ALT)
}

#[test]
fn panels_insert_after_focus() {
    let mut list = PanelList::new(1);
    let first = list.panels[0].id;
    let second = list.add_panel(None);
    // Focus back on the first, then insert: the newcomer lands between.
    list.focus_panel = Some(first);
    let third = list.add_panel(None);

    let order: Vec<_> = list.panels.iter().map(|p| p.id).collect();
    assert_eq!(order, vec![first, third, second]);
    assert_eq!(list.focus_panel, Some(third));
}

#[test]
fn closing_last_panel_is_refused() {
    let ev = EventLoop::new();
    let mut list = PanelList::new(1);
    let only = list.panels[0].id;
    assert!(!list.close_panel(only, &ev));
    assert_eq!(list.panels.len(), 1);
}

#[test]
fn close_moves_focus_to_previous() {
    let ev = EventLoop::new();
    let mut list = PanelList::new(1);
    let first = list.panels[0].id;
    let second = list.add_panel(None);
    assert!(list.close_panel(second, &ev));
    assert_eq!(list.focus_panel, Some(first));
    assert_eq!(list.panels.len(), 1);
}

#[test]
fn newest_slave_is_active() {
    let mut list = PanelList::new(1);
    let master = list.panels[0].id;
    let s1 = list.add_panel(Some(master));
    list.focus_panel = Some(master);
    let s2 = list.add_panel(Some(master));

    let mp = list.panel(master).unwrap();
    assert_eq!(mp.slaves, vec![s1, s2]);
    assert_eq!(mp.active_slave, Some(s2));

    list.remove_slave(master, s2);
    let mp = list.panel(master).unwrap();
    assert_eq!(mp.active_slave, None);
    assert_eq!(mp.slaves, vec![s1]);
    assert_eq!(list.panel(s2).unwrap().master, None);
}

#[test]
fn detach_slaves_clears_every_link() {
    let mut list = PanelList::new(1);
    let master = list.panels[0].id;
    let s1 = list.add_panel(Some(master));
    list.focus_panel = Some(master);
    let s2 = list.add_panel(Some(master));

    list.detach_slaves(master);
    assert!(list.panel(master).unwrap().slaves.is_empty());
    assert_eq!(list.panel(master).unwrap().active_slave, None);
    assert_eq!(list.panel(s1).unwrap().master, None);
    assert_eq!(list.panel(s2).unwrap().master, None);
}

#[test]
fn output_routes_to_active_slave_until_detached() {
    let ws = window_set();
    let (master, slave) = {
        let mut w = ws.borrow_mut();
        let master = w.windows[0].focus_panel.unwrap();
        let slave = w.windows[0].add_panel(Some(master));
        (master, slave)
    };

    // A pipe stands in for the pty master descriptor.
    let (r, w_fd) = pipe().unwrap();
    ws.borrow_mut().windows[0].panel_mut(master).unwrap().pty_fd = Some(r);

    write(w_fd, b"routed\n").unwrap();
    ws.borrow_mut().on_pty_readable(master, r);

    {
        let mut w = ws.borrow_mut();
        let sp = w.windows[0].panel_mut(slave).unwrap();
        assert_eq!(sp.ts_buffer.row_bytes(0), b"routed");
        let mp = w.windows[0].panel_mut(master).unwrap();
        assert_eq!(mp.ts_buffer.bytes_at(0), 0);
    }

    // Removing the slave redirects output to the master itself.
    ws.borrow_mut().windows[0].remove_slave(master, slave);
    write(w_fd, b"home\n").unwrap();
    ws.borrow_mut().on_pty_readable(master, r);
    {
        let mut w = ws.borrow_mut();
        let mp = w.windows[0].panel_mut(master).unwrap();
        assert_eq!(mp.ts_buffer.row_bytes(0), b"home");
    }

    // EOF detaches and closes; the descriptor is gone from the panel.
    close(w_fd).unwrap();
    ws.borrow_mut().on_pty_readable(master, r);
    assert_eq!(ws.borrow_mut().windows[0].panel(master).unwrap().pty_fd, None);
}

#[test]
fn master_eof_detaches_all_slaves() {
    let ws = window_set();
    let (master, s1, s2) = {
        let mut w = ws.borrow_mut();
        let master = w.windows[0].focus_panel.unwrap();
        let s1 = w.windows[0].add_panel(Some(master));
        w.windows[0].focus_panel = Some(master);
        let s2 = w.windows[0].add_panel(Some(master));
        (master, s1, s2)
    };

    let (r, w_fd) = pipe().unwrap();
    ws.borrow_mut().windows[0].panel_mut(master).unwrap().pty_fd = Some(r);
    close(w_fd).unwrap();
    ws.borrow_mut().on_pty_readable(master, r);

    let mut w = ws.borrow_mut();
    assert!(w.windows[0].panel(master).unwrap().slaves.is_empty());
    assert_eq!(w.windows[0].panel(s1).unwrap().master, None);
    assert_eq!(w.windows[0].panel(s2).unwrap().master, None);
}

#[test]
fn typing_lands_in_focused_cmd_editor() {
    let ws = window_set();
    for c in "hi".chars() {
        key(&ws, KeyInput::plain(Key::Char(c)));
    }
    let mut w = ws.borrow_mut();
    let pid = w.windows[0].focus_panel.unwrap();
    assert_eq!(w.windows[0].panel_mut(pid).unwrap().cmd_buffer.row_bytes(0), b"hi");
}

#[test]
fn submitting_a_colon_path_opens_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("f.txt");
    std::fs::write(&path, b"contents\n").unwrap();

    let ws = window_set();
    for c in format!(":{}", path.display()).chars() {
        key(&ws, KeyInput::plain(Key::Char(c)));
    }
    key(&ws, KeyInput::plain(Key::Enter));

    let mut w = ws.borrow_mut();
    let pid = w.windows[0].focus_panel.unwrap();
    let p = w.windows[0].panel_mut(pid).unwrap();
    assert_eq!(p.ts_buffer.row_bytes(0), b"contents");
    assert_eq!(p.file.as_deref(), Some(path.as_path()));
}

#[test]
fn escape_toggles_focus_level() {
    let ws = window_set();
    assert_eq!(ws.borrow().windows[0].level, LEVEL_CMD);
    key(&ws, KeyInput::plain(Key::Escape));
    assert_eq!(ws.borrow().windows[0].level, LEVEL_TS);
    key(&ws, KeyInput::plain(Key::Escape));
    assert_eq!(ws.borrow().windows[0].level, LEVEL_CMD);
}

#[test]
fn alt_arrows_cycle_focus_in_order() {
    let ws = window_set();
    let (first, second) = {
        let mut w = ws.borrow_mut();
        let first = w.windows[0].focus_panel.unwrap();
        let second = w.windows[0].add_panel(None);
        (first, second)
    };

    key(&ws, alt(Key::Up));
    assert_eq!(ws.borrow().windows[0].focus_panel, Some(first));
    key(&ws, alt(Key::Down));
    assert_eq!(ws.borrow().windows[0].focus_panel, Some(second));
    // Wraps.
    key(&ws, alt(Key::Down));
    assert_eq!(ws.borrow().windows[0].focus_panel, Some(first));
}

#[test]
fn alt_space_adds_a_panel() {
    let ws = window_set();
    key(&ws, alt(Key::Char(' ')));
    assert_eq!(ws.borrow().windows[0].panels.len(), 2);
}

#[test]
fn alt_h_hides_and_solo_shows_only_focused() {
    let ws = window_set();
    let (first, second) = {
        let mut w = ws.borrow_mut();
        let first = w.windows[0].focus_panel.unwrap();
        let second = w.windows[0].add_panel(None);
        (first, second)
    };

    key(&ws, alt(Key::Char('h')));
    assert!(ws.borrow().windows[0].panel(second).unwrap().ts_hidden);
    key(&ws, alt(Key::Char('h')));
    assert!(!ws.borrow().windows[0].panel(second).unwrap().ts_hidden);

    key(&ws, KeyInput::new(Key::Char('H'), Mods::ALT | Mods::SHIFT));
    assert!(!ws.borrow().windows[0].panel(second).unwrap().ts_hidden);
    assert!(ws.borrow().windows[0].panel(first).unwrap().ts_hidden);
}

#[test]
fn right_click_on_typescript_pops_menu_and_open_spawns_panel() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("seen.txt");
    std::fs::write(&path, b"payload\n").unwrap();

    let ws = window_set();
    {
        // Give the typescript a row holding the path.
        let mut w = ws.borrow_mut();
        let pid = w.windows[0].focus_panel.unwrap();
        let p = w.windows[0].panel_mut(pid).unwrap();
        p.on_output(format!("{}\n", path.display()).as_bytes());
    }
    ws.borrow_mut().flush();

    // Button 3 on the first typescript row (command row occupies y=0).
    ws.borrow_mut().handle_event(ScreenEvent::MousePress {
        button: MouseButton::Right,
        x: 1,
        y: 1,
    });
    assert!(ws.borrow().windows[0].menu.is_some());

    // Press on "open" (first menu row).
    ws.borrow_mut().handle_event(ScreenEvent::MousePress {
        button: MouseButton::Left,
        x: 2,
        y: 1,
    });

    let mut w = ws.borrow_mut();
    assert!(w.windows[0].menu.is_none());
    assert_eq!(w.windows[0].panels.len(), 2);
    let pid = w.windows[0].focus_panel.unwrap();
    let p = w.windows[0].panel_mut(pid).unwrap();
    assert_eq!(p.file.as_deref(), Some(path.as_path()));
    assert_eq!(p.ts_buffer.row_bytes(0), b"payload");
}

#[test]
fn close_window_stops_the_loop() {
    let ws = window_set();
    ws.borrow_mut().handle_event(ScreenEvent::CloseRequested);
    assert!(ws.borrow().windows.is_empty());
}
