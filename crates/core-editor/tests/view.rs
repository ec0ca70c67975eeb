//! Editor view behavior driven through the headless screen.

use core_editor::{EditorAction, EditorView, PromptMode};
use core_screen::{ColorId, Key, KeyInput, Mods, MouseButton, Rect, ScreenEvent, TestScreen};
use core_text::{Buffer, Cursor};

fn editor(w: i32, h: i32) -> (EditorView, Buffer, TestScreen) {
    let mut screen = TestScreen::new(w, h);
    let mut buf = Buffer::new();
    let mut view = EditorView::new(ColorId::TextBg, None, false);
    view.set_frame(Rect::new(0, 0, w, h));
    view.attach(&mut buf);
    view.set_focused(&mut buf, &mut screen, true);
    (view, buf, screen)
}

fn type_text(view: &mut EditorView, buf: &mut Buffer, screen: &mut TestScreen, text: &str) {
    for c in text.chars() {
        let key = if c == '\n' {
            KeyInput::plain(Key::Enter)
        } else {
            KeyInput::plain(Key::Char(c))
        };
        view.handle_key(buf, screen, key);
    }
}

#[test]
fn preferred_column_survives_vertical_run() {
    let (mut view, mut buf, mut screen) = editor(40, 10);
    let mut cur = Cursor::default();
    buf.insert(&mut cur, b"abc\nx\n");
    view.cur = Cursor::new(0, 3);

    view.handle_key(&mut buf, &mut screen, KeyInput::plain(Key::Down));
    assert_eq!(view.cur, Cursor::new(1, 1));

    view.handle_key(&mut buf, &mut screen, KeyInput::plain(Key::Down));
    assert_eq!(view.cur, Cursor::new(2, 0));

    // Going back up, the captured column still applies.
    view.handle_key(&mut buf, &mut screen, KeyInput::plain(Key::Up));
    assert_eq!(view.cur, Cursor::new(1, 1));
    view.handle_key(&mut buf, &mut screen, KeyInput::plain(Key::Up));
    assert_eq!(view.cur, Cursor::new(0, 3));

    // A horizontal key resets the run.
    view.handle_key(&mut buf, &mut screen, KeyInput::plain(Key::Left));
    view.handle_key(&mut buf, &mut screen, KeyInput::plain(Key::Down));
    assert_eq!(view.cur.row, 1);
}

#[test]
fn goto_line_clamps_to_last_row() {
    let (mut view, mut buf, mut screen) = editor(40, 5);
    let mut cur = Cursor::default();
    buf.insert(&mut cur, b"0\n1\n2\n3\n4\n5\n6\n7\n8\n9");
    assert_eq!(buf.rows(), 10);

    view.open_prompt(PromptMode::Goto);
    assert!(view.prompt_visible());
    type_text(&mut view, &mut buf, &mut screen, "999");
    view.handle_key(&mut buf, &mut screen, KeyInput::plain(Key::Enter));

    assert!(!view.prompt_visible());
    assert_eq!(view.cur, Cursor::new(9, 0));
}

#[test]
fn overlong_sequence_draws_two_replacement_glyphs() {
    let (mut view, mut buf, mut screen) = editor(40, 5);
    let mut cur = Cursor::default();
    buf.insert(&mut cur, b"\xc0\x80");

    view.mark_dirty();
    view.paint(&mut buf, &mut screen);
    assert_eq!(screen.char_at(0, 0), '\u{fffd}');
    assert_eq!(screen.char_at(1, 0), '\u{fffd}');
}

#[test]
fn control_bytes_draw_in_caret_notation() {
    let (mut view, mut buf, mut screen) = editor(40, 5);
    let mut cur = Cursor::default();
    buf.insert(&mut cur, b"\x01ok\x7f");
    // Park the cursor at end of line so its tint hides no glyph.
    view.cur = Cursor::new(0, 4);

    view.mark_dirty();
    view.paint(&mut buf, &mut screen);
    assert_eq!(screen.char_at(0, 0), 'A');
    assert_eq!(screen.bg_at(0, 0), ColorId::TextCtrl);
    assert_eq!(screen.char_at(1, 0), 'o');
    assert_eq!(screen.char_at(3, 0), '?');
}

#[test]
fn cursor_row_stays_in_viewport() {
    let (mut view, mut buf, mut screen) = editor(40, 4);
    let mut cur = Cursor::default();
    for i in 0..20 {
        buf.insert(&mut cur, format!("line {i}\n").as_bytes());
    }

    for _ in 0..12 {
        view.handle_key(&mut buf, &mut screen, KeyInput::plain(Key::Down));
        let visible = 4;
        assert!(view.cur.row >= view.top_row());
        assert!(view.cur.row < view.top_row() + visible);
    }
    for _ in 0..12 {
        view.handle_key(&mut buf, &mut screen, KeyInput::plain(Key::Up));
        assert!(view.cur.row >= view.top_row());
        assert!(view.cur.row < view.top_row() + 4);
    }
}

#[test]
fn horizontal_scroll_follows_cursor() {
    let (mut view, mut buf, mut screen) = editor(10, 3);
    let mut cur = Cursor::default();
    buf.insert(&mut cur, b"abcdefghijklmnopqrstuvwxyz");

    for _ in 0..15 {
        view.handle_key(&mut buf, &mut screen, KeyInput::plain(Key::Right));
    }
    assert!(view.begin_offset() > 0, "view must have scrolled right");

    for _ in 0..15 {
        view.handle_key(&mut buf, &mut screen, KeyInput::plain(Key::Left));
    }
    assert_eq!(view.begin_offset(), 0);
}

#[test]
fn submit_role_reports_the_line() {
    let mut screen = TestScreen::new(40, 1);
    let mut buf = Buffer::new();
    let mut view = EditorView::bare(ColorId::TitleBgNormal, Some(1), true);
    view.set_frame(Rect::new(0, 0, 40, 1));
    view.attach(&mut buf);
    view.set_focused(&mut buf, &mut screen, true);

    type_text(&mut view, &mut buf, &mut screen, "ls -l");
    let action = view.handle_key(&mut buf, &mut screen, KeyInput::plain(Key::Enter));
    assert_eq!(action, EditorAction::Submit("ls -l".into()));
}

#[test]
fn ctrl_x_ctrl_s_bubbles_save() {
    let (mut view, mut buf, mut screen) = editor(40, 5);
    let a = view.handle_key(&mut buf, &mut screen, KeyInput::ctrl('x'));
    assert_eq!(a, EditorAction::Handled);
    let a = view.handle_key(&mut buf, &mut screen, KeyInput::ctrl('s'));
    assert_eq!(a, EditorAction::Save);
}

#[test]
fn plain_ctrl_s_opens_search_and_finds_forward() {
    let (mut view, mut buf, mut screen) = editor(40, 10);
    let mut cur = Cursor::default();
    buf.insert(&mut cur, b"alpha\nbeta\ngamma beta\n");

    view.handle_key(&mut buf, &mut screen, KeyInput::ctrl('s'));
    assert!(view.prompt_visible());
    type_text(&mut view, &mut buf, &mut screen, "beta");
    view.handle_key(&mut buf, &mut screen, KeyInput::plain(Key::Enter));

    // Cursor lands just after the hit on row 1.
    assert_eq!(view.cur, Cursor::new(1, 4));

    // Search again: the next hit is on row 2.
    view.handle_key(&mut buf, &mut screen, KeyInput::ctrl('s'));
    type_text(&mut view, &mut buf, &mut screen, "beta");
    view.handle_key(&mut buf, &mut screen, KeyInput::plain(Key::Enter));
    assert_eq!(view.cur, Cursor::new(2, 10));
}

#[test]
fn search_wraps_around_once() {
    let (mut view, mut buf, mut screen) = editor(40, 10);
    let mut cur = Cursor::default();
    buf.insert(&mut cur, b"needle\nplain\nplain\n");
    view.cur = Cursor::new(2, 0);

    view.handle_key(&mut buf, &mut screen, KeyInput::ctrl('s'));
    type_text(&mut view, &mut buf, &mut screen, "needle");
    view.handle_key(&mut buf, &mut screen, KeyInput::plain(Key::Enter));
    assert_eq!(view.cur, Cursor::new(0, 6));
}

#[test]
fn prompt_cancel_restores_editing() {
    let (mut view, mut buf, mut screen) = editor(40, 5);
    let mut cur = Cursor::default();
    buf.insert(&mut cur, b"hello");

    view.handle_key(&mut buf, &mut screen, KeyInput::ctrl('s'));
    assert!(view.prompt_visible());
    view.handle_key(&mut buf, &mut screen, KeyInput::ctrl('g'));
    assert!(!view.prompt_visible());

    // Keys edit the parent again.
    view.cur = Cursor::new(0, 5);
    view.handle_key(&mut buf, &mut screen, KeyInput::plain(Key::Char('!')));
    assert_eq!(buf.row_bytes(0), b"hello!");
}

#[test]
fn mouse_click_places_cursor() {
    let (mut view, mut buf, mut screen) = editor(40, 5);
    let mut cur = Cursor::default();
    buf.insert(&mut cur, b"hello\nworld");

    let a = view.handle_mouse(
        &mut buf,
        &mut screen,
        ScreenEvent::MousePress {
            button: MouseButton::Left,
            x: 3,
            y: 1,
        },
    );
    assert_eq!(a, EditorAction::Handled);
    assert_eq!(view.cur, Cursor::new(1, 3));
}

#[test]
fn right_click_reports_row_text() {
    let (mut view, mut buf, mut screen) = editor(40, 5);
    let mut cur = Cursor::default();
    buf.insert(&mut cur, b"src/main.rs\nother");

    let a = view.handle_mouse(
        &mut buf,
        &mut screen,
        ScreenEvent::MousePress {
            button: MouseButton::Right,
            x: 2,
            y: 0,
        },
    );
    assert_eq!(a, EditorAction::Exec("src/main.rs".into()));
}

#[test]
fn cmdline_rows_get_distinct_background() {
    let (mut view, mut buf, mut screen) = editor(40, 5);
    let mut cur = Cursor::default();
    buf.insert(&mut cur, b"ls\noutput");
    buf.set_row_flags(0, core_text::RowFlags::CMDLINE);
    view.cur = Cursor::new(1, 0);

    view.mark_dirty();
    view.paint(&mut buf, &mut screen);
    assert_eq!(screen.bg_at(0, 0), ColorId::TitleBgNormal);
    assert_eq!(screen.char_at(0, 1), 'o');
}

#[test]
fn ctrl_k_erases_to_eol_then_removes_empty_row() {
    let (mut view, mut buf, mut screen) = editor(40, 5);
    let mut cur = Cursor::default();
    buf.insert(&mut cur, b"abcdef\nnext");
    view.cur = Cursor::new(0, 3);

    view.handle_key(&mut buf, &mut screen, KeyInput::ctrl('k'));
    assert_eq!(buf.row_bytes(0), b"abc");

    view.cur = Cursor::new(0, 0);
    view.handle_key(&mut buf, &mut screen, KeyInput::ctrl('k'));
    assert_eq!(buf.row_bytes(0), b"");
    view.handle_key(&mut buf, &mut screen, KeyInput::ctrl('k'));
    assert_eq!(buf.rows(), 1);
    assert_eq!(buf.row_bytes(0), b"next");
}

#[test]
fn ctrl_o_opens_line_without_moving() {
    let (mut view, mut buf, mut screen) = editor(40, 5);
    let mut cur = Cursor::default();
    buf.insert(&mut cur, b"ab");
    view.cur = Cursor::new(0, 1);

    view.handle_key(&mut buf, &mut screen, KeyInput::ctrl('o'));
    assert_eq!(buf.rows(), 2);
    assert_eq!(buf.row_bytes(0), b"a");
    assert_eq!(buf.row_bytes(1), b"b");
    assert_eq!(view.cur, Cursor::new(0, 1));
}

#[test]
fn alt_keys_pass_to_panel_scope() {
    let (mut view, mut buf, mut screen) = editor(40, 5);
    let a = view.handle_key(
        &mut buf,
        &mut screen,
        KeyInput::new(Key::Char('h'), Mods::ALT),
    );
    assert_eq!(a, EditorAction::Pass);
    let a = view.handle_key(&mut buf, &mut screen, KeyInput::plain(Key::Escape));
    assert_eq!(a, EditorAction::Pass);
}
