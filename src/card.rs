//! Card rendering contract.
//!
//! A card draws one window's thumbnail and controls. The switcher only
//! positions cards, toggles their screenshot mode and writes the attributes
//! an assistive layer reads.

use crate::window::{Settle, WindowRef};

/// Attributes exposed to the assistive layer for one card.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessibilityAttrs {
    /// Hidden from assistive technology. True for every card but the
    /// current one.
    pub hidden: bool,
    /// Number of cards in the strip.
    pub set_size: usize,
    /// 1-based position in the strip.
    pub pos_in_set: usize,
}

impl AccessibilityAttrs {
    pub fn for_position(index: usize, current: usize, count: usize) -> Self {
        AccessibilityAttrs {
            hidden: index != current,
            set_size: count,
            pos_in_set: index + 1,
        }
    }
}

pub trait Card {
    /// Move the card to a horizontal offset within the strip.
    fn translate(&self, offset: f64);

    fn set_screenshots_disabled(&self, disabled: bool);

    fn set_accessibility(&self, attrs: AccessibilityAttrs);

    /// Drop any transient presentation state before the card is destroyed.
    fn clear_flags(&self);

    /// Resolves once a drop gesture on this card has visually settled.
    fn drop_settled(&self) -> Settle;
}

pub trait CardFactory {
    fn create(&self, window: WindowRef, screenshots_disabled: bool) -> Box<dyn Card>;
}
