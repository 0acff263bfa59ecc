//! Window stack abstraction for testability.
//!
//! The stack itself is owned by an external stack manager. These traits
//! describe the little the switcher needs from it and from the shell around
//! it, so tests and the daemon can plug in an in-memory desktop.

use crate::window::{AppWindow, Settle, WindowId, WindowRef};
use std::fmt;
use std::rc::Rc;

/// Source of truth for the ordered window stack.
pub trait StackProvider {
    /// A copy of the stack, in stack order. Mutating it has no effect on the
    /// provider.
    fn snapshot(&self) -> Vec<WindowRef>;

    /// The window the stack considers current, if any.
    fn current(&self) -> Option<WindowRef>;
}

/// The system shell hosting the switcher.
pub trait Shell {
    /// The window currently in the foreground.
    fn active_window(&self) -> Option<WindowRef>;

    fn homescreen(&self) -> Option<WindowRef>;

    /// Resolves once pending orientation changes and keyboard dismissal have
    /// settled.
    fn ready(&self) -> Settle;

    /// Launch a fresh browser sheet. Returns the new window if one was
    /// created synchronously.
    fn open_new_sheet(&self, private: bool) -> Option<WindowRef>;
}

/// Which windows of the stack get a card.
#[derive(Clone, Default)]
pub enum StackFilter {
    #[default]
    All,
    /// Browser windows only.
    Browser,
    Custom(Rc<dyn Fn(&dyn AppWindow) -> bool>),
}

impl fmt::Debug for StackFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StackFilter::All => write!(f, "All"),
            StackFilter::Browser => write!(f, "Browser"),
            StackFilter::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

impl StackFilter {
    pub fn custom(predicate: impl Fn(&dyn AppWindow) -> bool + 'static) -> Self {
        StackFilter::Custom(Rc::new(predicate))
    }

    pub fn matches(&self, window: &dyn AppWindow) -> bool {
        match self {
            StackFilter::All => true,
            StackFilter::Browser => window.is_browser(),
            StackFilter::Custom(predicate) => predicate(window),
        }
    }

    /// Filter a snapshot into a new, still ordered working copy.
    #[must_use]
    pub fn apply(&self, snapshot: &[WindowRef]) -> Vec<WindowRef> {
        snapshot
            .iter()
            .filter(|w| self.matches(w.as_ref()))
            .cloned()
            .collect()
    }
}

/// Position of `id` in `stack`.
pub fn position_of(stack: &[WindowRef], id: WindowId) -> Option<usize> {
    stack.iter().position(|w| w.id() == id)
}
