//! Cross-cutting invariants of the scanner, cursor, and region logic.

use core_text::{utf8, Buffer, Cursor};

// Mixed corpus: ASCII, multibyte, malformed starts, truncated tails.
const CORPUS: &[&[u8]] = &[
    b"plain ascii",
    b"h\xc3\xa9llo w\xc3\xb6rld",
    b"\xe2\x82\xac 100",
    b"\xf0\x9f\x91\x8d ok",
    b"bad\xc0\x80bytes",
    b"\xed\xa0\x80surrogate",
    b"trunc\xe2\x82",
    b"\x80leading continuation",
    b"tab\thas\twidth",
];

#[test]
fn scanner_is_deterministic() {
    for s in CORPUS {
        let mut offset = 0;
        while offset < s.len() {
            let mut a = offset;
            let mut b = offset;
            let step_a = utf8::incr(s, &mut a);
            let step_b = utf8::incr(s, &mut b);
            assert_eq!(step_a, step_b);
            assert_eq!(a, b);
            assert!(step_a.advanced > 0);
            offset = a;
        }
    }
}

#[test]
fn decr_undoes_incr_along_boundaries() {
    for s in CORPUS {
        let mut offset = 0;
        loop {
            let before = offset;
            let step = utf8::incr(s, &mut offset);
            if step.advanced == 0 {
                break;
            }
            let mut back = offset;
            utf8::decr(s, &mut back);
            if step.malformed {
                // Errors advance one byte; stepping back lands at the
                // erroring byte's own position.
                assert_eq!(back, before);
            } else {
                assert_eq!(back, before);
            }
        }
    }
}

#[test]
fn set_cursor_always_clamps_into_bounds() {
    let mut b = Buffer::new();
    let mut cur = Cursor::default();
    b.insert(&mut cur, b"h\xc3\xa9llo\n\nlong line here\nx");

    let rows = b.rows();
    for row in [0usize, 1, 2, 3, 7, 100] {
        for offset in [0usize, 1, 2, 6, 50] {
            let mut cur = Cursor::default();
            b.set_cursor(&mut cur, row, offset);
            assert!(cur.row < rows);
            assert!(cur.offset <= b.bytes_at(cur.row));
        }
    }
}

#[test]
fn movement_api_keeps_offsets_on_boundaries() {
    let mut b = Buffer::new();
    let mut cur = Cursor::default();
    b.insert(&mut cur, b"h\xc3\xa9l\xf0\x9f\x91\x8do\nsecond\n\xe2\x82\xac");

    let mut cur = Cursor::default();
    for _ in 0..40 {
        b.update_cursor(&mut cur, 0, 1);
        let bytes = b.row_bytes(cur.row);
        assert_eq!(cur.offset, utf8::snap(bytes, cur.offset));
    }
    for _ in 0..40 {
        b.update_cursor(&mut cur, 0, -1);
        let bytes = b.row_bytes(cur.row);
        assert_eq!(cur.offset, utf8::snap(bytes, cur.offset));
    }
}

#[test]
fn region_is_exactly_half_open_row_major() {
    let mut b = Buffer::new();
    let mut cur = Cursor::default();
    b.insert(&mut cur, b"abcd\nef\nghij");
    b.set_mark(0, 2);
    let (dot_row, dot_offset) = (2, 2);

    for row in 0..3 {
        for offset in 0..=b.bytes_at(row) {
            let inside = (row, offset) >= (0, 2) && (row, offset) < (dot_row, dot_offset);
            assert_eq!(
                b.is_marked(row, offset, dot_row, dot_offset),
                inside,
                "({row},{offset})"
            );
        }
    }
}
