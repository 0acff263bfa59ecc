//! Maps the continuous scroll offset to the current card and keeps the
//! assistive-layer attributes in step with it.

use crate::card::AccessibilityAttrs;
use crate::synchronizer::CardCollection;
use crate::window::WindowId;
use tracing::debug;

/// Index of the card under `scroll_offset`, or `None` for an empty strip.
///
/// Cards overlap by design, so the divisor is the card width alone rather
/// than the full stride.
pub fn current_index(scroll_offset: f64, card_width: f64, count: usize) -> Option<usize> {
    if count == 0 {
        return None;
    }
    if card_width.is_nan() || card_width <= 0.0 || !scroll_offset.is_finite() {
        return Some(0);
    }

    let raw = (scroll_offset / card_width).floor();
    let index = if raw <= 0.0 { 0 } else { raw as usize };
    Some(index.min(count - 1))
}

/// Tracks which card is current and writes accessibility attributes only
/// when that changes.
#[derive(Debug, Default)]
pub struct PositionTracker {
    last_current: Option<WindowId>,
    writes: usize,
}

impl PositionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recompute the current card. Returns its index.
    pub fn update(&mut self, scroll_offset: f64, card_width: f64, cards: &CardCollection) -> Option<usize> {
        let index = current_index(scroll_offset, card_width, cards.len())?;
        let current_id = cards.window_at(index).map(|w| w.id());

        if current_id == self.last_current {
            return Some(index);
        }

        debug!("Current card is now {} ({:?})", index, current_id);
        let count = cards.len();
        for (i, record) in cards.records_in_order().enumerate() {
            record
                .card
                .set_accessibility(AccessibilityAttrs::for_position(i, index, count));
            self.writes += 1;
        }
        self.last_current = current_id;

        Some(index)
    }

    /// Forget the last current card so the next update rewrites every
    /// attribute.
    pub fn invalidate(&mut self) {
        self.last_current = None;
    }

    pub fn last_current(&self) -> Option<WindowId> {
        self.last_current
    }

    /// Total attribute writes issued so far.
    pub fn writes(&self) -> usize {
        self.writes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::desktop::{Call, Desktop, Scenario};
    use crate::stack::{StackFilter, StackProvider};

    #[test]
    fn test_current_index_floor_and_clamp() {
        assert_eq!(current_index(0.0, 160.0, 3), Some(0));
        assert_eq!(current_index(159.9, 160.0, 3), Some(0));
        assert_eq!(current_index(185.0, 160.0, 3), Some(1));
        assert_eq!(current_index(370.0, 160.0, 3), Some(2));
        assert_eq!(current_index(10_000.0, 160.0, 3), Some(2));
        assert_eq!(current_index(-50.0, 160.0, 3), Some(0));
    }

    #[test]
    fn test_current_index_empty() {
        assert_eq!(current_index(100.0, 160.0, 0), None);
    }

    #[test]
    fn test_current_index_degenerate_width() {
        assert_eq!(current_index(100.0, 0.0, 3), Some(0));
        assert_eq!(current_index(f64::NAN, 160.0, 3), Some(0));
    }

    fn collection(desktop: &Desktop) -> CardCollection {
        let mut cards = CardCollection::default();
        cards.reconcile(desktop.snapshot(), &StackFilter::All, desktop, false);
        cards
    }

    #[test]
    fn test_update_writes_every_card_once() {
        let desktop = Desktop::new(Scenario::stack(&["A", "B", "C"]));
        let cards = collection(&desktop);
        let mut tracker = PositionTracker::new();

        assert_eq!(tracker.update(185.0, 160.0, &cards), Some(1));
        assert_eq!(tracker.writes(), 3);

        let attrs: Vec<_> = desktop
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Accessibility(id, attrs) => Some((id.0, attrs)),
                _ => None,
            })
            .collect();
        assert_eq!(attrs.len(), 3);
        assert!(attrs[0].1.hidden);
        assert!(!attrs[1].1.hidden);
        assert_eq!(attrs[1].1.pos_in_set, 2);
        assert!(attrs.iter().all(|(_, a)| a.set_size == 3));
    }

    #[test]
    fn test_unchanged_offset_writes_nothing() {
        let desktop = Desktop::new(Scenario::stack(&["A", "B", "C"]));
        let cards = collection(&desktop);
        let mut tracker = PositionTracker::new();

        tracker.update(0.0, 160.0, &cards);
        let writes = tracker.writes();
        tracker.update(0.0, 160.0, &cards);
        // Same card under a different offset is still no change
        tracker.update(100.0, 160.0, &cards);

        assert_eq!(tracker.writes(), writes);
    }

    #[test]
    fn test_invalidate_forces_rewrite() {
        let desktop = Desktop::new(Scenario::stack(&["A", "B"]));
        let cards = collection(&desktop);
        let mut tracker = PositionTracker::new();

        tracker.update(0.0, 160.0, &cards);
        tracker.invalidate();
        tracker.update(0.0, 160.0, &cards);

        assert_eq!(tracker.writes(), 4);
        assert_eq!(tracker.last_current(), Some(WindowId(1)));
    }
}
