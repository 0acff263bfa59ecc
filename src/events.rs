//! Notifications published by the card view.
//!
//! Publishing is fire-and-forget: nobody answers and a closed receiver is
//! not an error.

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SwitcherEvent {
    /// A show transition started
    BeforeShow,
    /// The show transition completed
    Shown,
    /// The card view is closing onto a window at this stack position
    Closed { new_stack_position: Option<usize> },
    Activated,
    Deactivated,
}

impl SwitcherEvent {
    /// The event name observers subscribe to.
    pub fn name(&self) -> &'static str {
        match self {
            SwitcherEvent::BeforeShow => "cardviewbeforeshow",
            SwitcherEvent::Shown => "cardviewshown",
            SwitcherEvent::Closed { .. } => "cardviewclosed",
            SwitcherEvent::Activated => "taskmanager-activated",
            SwitcherEvent::Deactivated => "taskmanager-deactivated",
        }
    }
}

pub type EventReceiver = mpsc::UnboundedReceiver<SwitcherEvent>;

/// Sending half of the notification channel.
#[derive(Debug, Clone)]
pub struct Publisher {
    tx: mpsc::UnboundedSender<SwitcherEvent>,
}

impl Publisher {
    pub fn channel() -> (Self, EventReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Publisher { tx }, rx)
    }

    pub fn publish(&self, event: SwitcherEvent) {
        debug!("Publishing {}", event.name());
        if self.tx.send(event).is_err() {
            debug!("No listener for card view notifications");
        }
    }
}
