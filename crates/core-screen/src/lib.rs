//! Toolkit capability contract.
//!
//! The windowing layer proper is an external collaborator; this crate
//! defines the capabilities the core consumes from it: font metrics,
//! draw surface, event demultiplexing, colors, box-layout arithmetic and
//! damage accumulation. Two implementations ship: a crossterm cell grid
//! (`TermScreen`, one pixel == one terminal cell) and a headless recorder
//! for tests (`TestScreen`).

use std::os::unix::io::RawFd;

use anyhow::Result;
use bitflags::bitflags;

pub mod color;
pub mod damage;
pub mod layout;

mod metrics;
mod term;
mod test_screen;

pub use color::ColorId;
pub use damage::{Damage, DamageSpan};
pub use metrics::MonoMetrics;
pub use term::TermScreen;
pub use test_screen::{SpanRecord, TestScreen};

/// Pixel coordinate. The cell-grid adapter equates one pixel with one
/// terminal cell.
pub type Px = i32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: Px,
    pub y: Px,
    pub w: Px,
    pub h: Px,
}

impl Rect {
    pub fn new(x: Px, y: Px, w: Px, h: Px) -> Self {
        Self { x, y, w, h }
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Mods: u8 {
        const SHIFT = 1 << 0;
        const CTRL = 1 << 1;
        const ALT = 1 << 2;
    }
}

/// Key symbol after toolkit decoding. Printable input (including IME
/// output and tabs) arrives as `Char`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Enter,
    Backspace,
    Delete,
    Left,
    Right,
    Up,
    Down,
    PageUp,
    PageDown,
    Escape,
    Insert,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyInput {
    pub key: Key,
    pub mods: Mods,
}

impl KeyInput {
    pub fn new(key: Key, mods: Mods) -> Self {
        Self { key, mods }
    }

    pub fn plain(key: Key) -> Self {
        Self::new(key, Mods::empty())
    }

    pub fn ctrl(c: char) -> Self {
        Self::new(Key::Char(c), Mods::CTRL)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Middle,
    Right,
}

/// Demultiplexed toolkit event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenEvent {
    Key(KeyInput),
    MousePress { button: MouseButton, x: Px, y: Px },
    MouseRelease { button: MouseButton, x: Px, y: Px },
    /// Pointer motion while button 1 is held.
    MouseMotion { x: Px, y: Px },
    WheelUp { x: Px, y: Px },
    WheelDown { x: Px, y: Px },
    Resize { w: Px, h: Px },
    CloseRequested,
}

/// Font capabilities: metrics and span measurement. Tabs advance to the
/// next stop on a grid of `8 * space_width`.
pub trait FontMetrics {
    fn line_height(&self) -> Px;
    fn space_width(&self) -> Px;
    /// Pixel width of a byte span drawn starting at `x`.
    fn str_width(&self, x: Px, bytes: &[u8]) -> Px;
}

/// Draw surface plus event source. All coordinates are in pixels from the
/// surface's top-left corner.
pub trait Screen {
    /// The metrics of the surface's current font.
    fn font(&self) -> &dyn FontMetrics;

    fn size(&self) -> (Px, Px);

    fn draw_span(&mut self, x: Px, y: Px, bytes: &[u8], fg: ColorId, bg: ColorId);
    fn clear_rect(&mut self, rect: Rect, bg: ColorId);

    /// Vertically blit `src` so its top edge lands at `dst_y`. Returns
    /// false when the surface cannot blit; the caller then redraws the
    /// exposed region instead.
    fn copy_rect(&mut self, src: Rect, dst_y: Px) -> bool;

    /// Push queued draw commands out to the display.
    fn flush(&mut self) -> Result<()>;

    /// Descriptor to register with the event loop, when input arrives via
    /// a pollable descriptor.
    fn poll_fd(&self) -> Option<RawFd>;

    /// Deliver events the toolkit has already buffered. Called before
    /// every descriptor wait, because toolkit calls may buffer events
    /// synchronously.
    fn drain_pending(&mut self, sink: &mut dyn FnMut(ScreenEvent)) -> Result<()>;

    /// Deliver events after the input descriptor signalled readable.
    fn read_events(&mut self, sink: &mut dyn FnMut(ScreenEvent)) -> Result<()>;
}
