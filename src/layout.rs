//! Horizontal strip layout.
//!
//! Cards are half the viewport in each dimension and separated by a fixed
//! gutter. The scroll container gets half a margin of slack on each side so
//! the first and the last card can both be centred.

use serde::{Deserialize, Serialize};

/// Size of the area the strip is shown in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Viewport {
            width: 320.0,
            height: 480.0,
        }
    }
}

/// The scrollable container the cards live in.
pub trait ScrollSurface {
    fn scroll_offset(&self) -> f64;

    fn scroll_to(&self, offset: f64, animated: bool);

    fn set_content_width(&self, width: f64);

    /// Suspend or restore user scrolling.
    fn set_scroll_enabled(&self, enabled: bool);

    /// Mark the card view as the presented surface.
    fn set_presented(&self, presented: bool);
}

/// Result of one layout pass.
#[derive(Debug, Clone, PartialEq)]
pub struct StripLayout {
    pub card_width: f64,
    pub card_height: f64,
    pub gutter: f64,
    /// Viewport width not covered by one card.
    pub margin: f64,
    /// Horizontal offset of each card, in strip order.
    pub offsets: Vec<f64>,
    /// Width of the scroll container.
    pub total_width: f64,
}

impl StripLayout {
    #[must_use]
    pub fn compute(viewport: Viewport, gutter: f64, count: usize) -> Self {
        let width = viewport.width.max(0.0);
        let height = viewport.height.max(0.0);
        let gutter = gutter.max(0.0);

        let card_width = width / 2.0;
        let card_height = height / 2.0;
        let margin = width - card_width;
        let stride = card_width + gutter;

        let offsets = (0..count)
            .map(|i| margin / 2.0 + i as f64 * stride)
            .collect();

        let strip = if count == 0 {
            0.0
        } else {
            card_width * count as f64 + gutter * (count - 1) as f64
        };

        StripLayout {
            card_width,
            card_height,
            gutter,
            margin,
            offsets,
            total_width: margin + strip.max(card_width),
        }
    }

    /// Distance between the left edges of neighbouring cards.
    pub fn stride(&self) -> f64 {
        self.card_width + self.gutter
    }

    /// Scroll offset that centres the card at `index`.
    pub fn scroll_offset_for(&self, index: usize) -> f64 {
        index as f64 * self.stride()
    }

    /// Index of the card that `scroll_offset` brings to the centre, the
    /// inverse of [`scroll_offset_for`](Self::scroll_offset_for).
    pub fn centred_index(&self, scroll_offset: f64) -> Option<usize> {
        let last = self.len().checked_sub(1)?;
        let stride = self.stride();
        if !scroll_offset.is_finite() || stride <= 0.0 {
            return Some(0);
        }
        Some(((scroll_offset / stride).round().max(0.0) as usize).min(last))
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }
}
