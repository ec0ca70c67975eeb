//! Transient context menu for typescript rows.
//!
//! Mouse button 3 on a typescript row pops this two-item menu at the
//! click: "open" loads the row's text as a `:path` in a new panel,
//! "exec" runs it as a command in a new panel. A press on an item
//! dispatches it; a release outside closes the menu.

use core_screen::{ColorId, FontMetrics, Px, Rect, Screen};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuItem {
    Open,
    Exec,
}

const ITEMS: [(&str, MenuItem); 2] = [("open", MenuItem::Open), ("exec", MenuItem::Exec)];

#[derive(Debug, Clone)]
pub struct Menu {
    pub x: Px,
    pub y: Px,
    /// The row text the menu acts on.
    pub text: String,
}

impl Menu {
    pub fn new(x: Px, y: Px, text: String) -> Self {
        Self { x, y, text }
    }

    fn extent(&self, font: &dyn FontMetrics) -> Rect {
        let w = ITEMS
            .iter()
            .map(|(label, _)| font.str_width(0, label.as_bytes()))
            .max()
            .unwrap_or(0)
            + 2 * font.space_width();
        let h = font.line_height() * ITEMS.len() as Px;
        Rect::new(self.x, self.y, w, h)
    }

    pub fn contains(&self, font: &dyn FontMetrics, x: Px, y: Px) -> bool {
        let r = self.extent(font);
        x >= r.x && x < r.x + r.w && y >= r.y && y < r.y + r.h
    }

    /// The item under a pixel position, if any.
    pub fn hit(&self, font: &dyn FontMetrics, x: Px, y: Px) -> Option<MenuItem> {
        if !self.contains(font, x, y) {
            return None;
        }
        let idx = ((y - self.y) / font.line_height()) as usize;
        ITEMS.get(idx).map(|&(_, item)| item)
    }

    pub fn draw(&self, screen: &mut dyn Screen) {
        let r = self.extent(screen.font());
        screen.clear_rect(r, ColorId::MenuBg);
        let lh = screen.font().line_height();
        for (i, (label, _)) in ITEMS.iter().enumerate() {
            screen.draw_span(
                r.x + screen.font().space_width(),
                r.y + lh * i as Px,
                label.as_bytes(),
                ColorId::MenuFg,
                ColorId::MenuBg,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_screen::MonoMetrics;

    #[test]
    fn hit_maps_rows_to_items() {
        let m = Menu::new(10, 5, "file.txt".into());
        assert_eq!(m.hit(&MonoMetrics, 11, 5), Some(MenuItem::Open));
        assert_eq!(m.hit(&MonoMetrics, 11, 6), Some(MenuItem::Exec));
        assert_eq!(m.hit(&MonoMetrics, 2, 5), None);
        assert_eq!(m.hit(&MonoMetrics, 11, 9), None);
    }
}
