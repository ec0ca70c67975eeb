//! Color palette.
//!
//! The core names colors by role; adapters map roles to whatever the
//! display offers and cache the allocation.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorId {
    /// Typescript background.
    TextBg,
    /// Regular text.
    TextFg,
    /// Input cursor glyph background.
    TextCursor,
    /// Output cursor glyph background.
    TextOutputCursor,
    /// Control-character glyph background.
    TextCtrl,
    /// Marked-region background.
    TextMark,
    /// Command editor background.
    TitleBgNormal,
    /// Prompt editor background.
    TitleFgNormal,
    /// Status and cwd labels.
    StatusBg,
    StatusFg,
    /// Context menu.
    MenuBg,
    MenuFg,
}
