//! Byte-row text storage: the UTF-8 scanner, the change-broadcasting
//! buffer, and cursor positions over it.

pub mod utf8;

mod buffer;
mod cursor;

pub use buffer::{Buffer, BufferUpdate, Chunk, ListenerId, RowFlags, UpdateKind};
pub use cursor::Cursor;
