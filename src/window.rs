//! Window identity and the contract every application window honours
//! while it is shown in the card view.
//!
//! Windows are owned elsewhere. The switcher only holds shared references
//! to them and asks them to open, close or die.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::rc::Rc;
use std::time::Duration;
use tokio::sync::oneshot;

/// Stable identity of an application window.
///
/// Cards are keyed by this id, never by anything belonging to the
/// rendering layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WindowId(pub u64);

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Acknowledgment that a window or card finished a visual transition.
///
/// A dropped sender counts as acknowledged: the other side went away and
/// there is nothing left to wait for.
pub type Settle = oneshot::Receiver<()>;

/// A settle that has already completed.
pub fn settled() -> Settle {
    let (tx, rx) = oneshot::channel();
    let _ = tx.send(());
    rx
}

/// Wait for `settle`, giving up after `bound`.
///
/// Returns `false` if the bound elapsed first. Callers proceed either way.
pub async fn wait_settled(settle: Settle, bound: Duration) -> bool {
    tokio::time::timeout(bound, settle).await.is_ok()
}

/// Transition names handed to windows when they open or close around the
/// card view.
pub mod transition {
    pub const TO_CARDVIEW: &str = "to-cardview";
    pub const HOME_TO_CARDVIEW: &str = "home-to-cardview";
    pub const FROM_CARDVIEW: &str = "from-cardview";
    pub const HOME_FROM_CARDVIEW: &str = "home-from-cardview";
}

/// An application window as seen from the switcher.
pub trait AppWindow {
    fn id(&self) -> WindowId;

    fn name(&self) -> &str;

    /// True for the home/launcher surface.
    fn is_homescreen(&self) -> bool;

    fn is_browser(&self) -> bool;

    /// Whether the user may kill this window from the card view.
    fn killable(&self) -> bool;

    /// The window now has a card. It should pause its own rendering.
    fn enter_switcher(&self);

    /// The window's card is gone.
    fn leave_switcher(&self);

    /// Start opening with the named transition. Resolves once opened.
    fn open(&self, transition: &str) -> Settle;

    /// Start closing with the named transition. Resolves once closed.
    fn close(&self, transition: &str) -> Settle;

    fn kill(&self);
}

pub type WindowRef = Rc<dyn AppWindow>;
