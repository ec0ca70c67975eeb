//! Damage accumulation.
//!
//! Editors never paint from mutation handlers. Buffer events mark a row
//! band here; the event loop's idle turn flushes every dirty band once,
//! coalescing all mutations from the turn into a single redraw.

/// Accumulated damage for one editor viewport.
#[derive(Debug, Default, Clone, Copy)]
pub struct Damage {
    span: Option<(usize, usize)>,
    full: bool,
}

/// What to repaint, produced by [`Damage::take`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DamageSpan {
    /// Redraw the whole viewport.
    Full,
    /// Redraw the inclusive row range.
    Rows(usize, usize),
}

impl Damage {
    pub fn mark_rows(&mut self, from: usize, to: usize) {
        let (from, to) = if from <= to { (from, to) } else { (to, from) };
        self.span = match self.span {
            None => Some((from, to)),
            Some((a, b)) => Some((a.min(from), b.max(to))),
        };
    }

    pub fn mark_all(&mut self) {
        self.full = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.full || self.span.is_some()
    }

    /// Return the pending band and reset to clean.
    pub fn take(&mut self) -> Option<DamageSpan> {
        let out = if self.full {
            Some(DamageSpan::Full)
        } else {
            self.span.map(|(a, b)| DamageSpan::Rows(a, b))
        };
        self.span = None;
        self.full = false;
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bands_coalesce() {
        let mut d = Damage::default();
        d.mark_rows(5, 7);
        d.mark_rows(2, 3);
        assert_eq!(d.take(), Some(DamageSpan::Rows(2, 7)));
        assert_eq!(d.take(), None);
    }

    #[test]
    fn full_wins() {
        let mut d = Damage::default();
        d.mark_rows(1, 2);
        d.mark_all();
        assert_eq!(d.take(), Some(DamageSpan::Full));
        assert!(!d.is_dirty());
    }
}
