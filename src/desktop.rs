//! In-memory desktop.
//!
//! One object plays every collaborator the card view needs: the window
//! stack, the shell, the card factory and the scroll surface. Everything
//! they are asked to do lands in a shared call journal, which is what the
//! daemon logs and what tests assert on.

use crate::card::{AccessibilityAttrs, Card, CardFactory};
use crate::layout::{ScrollSurface, Viewport};
use crate::stack::{Shell, StackProvider};
use crate::task_manager::{Collaborators, WindowEvent};
use crate::window::{AppWindow, Settle, WindowId, WindowRef, settled};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};
use std::fs;
use std::path::Path;
use std::rc::{Rc, Weak};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

/// Something a collaborator was asked to do.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    EnterSwitcher(WindowId),
    LeaveSwitcher(WindowId),
    Open(WindowId, String),
    Close(WindowId, String),
    Kill(WindowId),
    NewSheet { private: bool },
    CardCreated(WindowId, bool),
    Translate(WindowId, f64),
    Screenshots(WindowId, bool),
    Accessibility(WindowId, AccessibilityAttrs),
    ClearFlags(WindowId),
    ScrollTo(f64, bool),
    ScrollEnabled(bool),
    ContentWidth(f64),
    Presented(bool),
}

/// How a window (or card) acknowledges transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AckPolicy {
    #[default]
    Immediate,
    /// Never acknowledge, so callers run into their bounds
    Never,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowSpec {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub browser: bool,
    #[serde(default = "default_true")]
    pub killable: bool,
    #[serde(default)]
    pub ack: AckPolicy,
}

impl WindowSpec {
    pub fn new(id: u64, name: &str) -> Self {
        WindowSpec {
            id,
            name: name.to_string(),
            browser: false,
            killable: true,
            ack: AckPolicy::Immediate,
        }
    }
}

/// Initial desktop state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// The window stack, bottom first
    pub windows: Vec<WindowSpec>,
    #[serde(default)]
    pub homescreen: Option<WindowSpec>,
    /// Current window of the stack. Defaults to the last window.
    #[serde(default)]
    pub current: Option<u64>,
    /// Foreground window. Defaults to the current window.
    #[serde(default)]
    pub active: Option<u64>,
    #[serde(default)]
    pub viewport: Viewport,
    /// Acknowledgment of drop settles on every card
    #[serde(default)]
    pub drop_ack: AckPolicy,
}

impl Scenario {
    /// A homescreen (id 0) plus one window per name, ids from 1.
    pub fn stack(names: &[&str]) -> Self {
        Scenario {
            windows: names
                .iter()
                .enumerate()
                .map(|(i, name)| WindowSpec::new(i as u64 + 1, name))
                .collect(),
            homescreen: Some(WindowSpec {
                killable: false,
                ..WindowSpec::new(0, "Homescreen")
            }),
            current: None,
            active: None,
            viewport: Viewport::default(),
            drop_ack: AckPolicy::Immediate,
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenario {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("Invalid scenario {}", path.display()))
    }
}

impl Default for Scenario {
    fn default() -> Self {
        let mut scenario = Scenario::stack(&["Browser", "Mail", "Music"]);
        scenario.windows[0].browser = true;
        scenario
    }
}

struct Shared {
    journal: RefCell<Vec<Call>>,
    stack: RefCell<Vec<Rc<SimWindow>>>,
    current: Cell<Option<WindowId>>,
    active: Cell<Option<WindowId>>,
    scroll: Cell<f64>,
    next_id: Cell<u64>,
    drop_ack: Cell<AckPolicy>,
    cards_created: Cell<usize>,
    events: RefCell<Option<mpsc::UnboundedSender<WindowEvent>>>,
    /// Senders of acknowledgments that are being withheld, kept only while
    /// their receiver is alive
    withheld: RefCell<Vec<oneshot::Sender<()>>>,
}

impl Shared {
    fn record(&self, call: Call) {
        self.journal.borrow_mut().push(call);
    }

    fn settle(&self, policy: AckPolicy) -> Settle {
        match policy {
            AckPolicy::Immediate => settled(),
            AckPolicy::Never => {
                let (tx, rx) = oneshot::channel();
                let mut withheld = self.withheld.borrow_mut();
                // Nobody waits on these any more
                withheld.retain(|sender| !sender.is_closed());
                withheld.push(tx);
                rx
            }
        }
    }

    fn notify(&self, event: WindowEvent) {
        if let Some(tx) = self.events.borrow().as_ref()
            && tx.send(event).is_err()
        {
            warn!("Window event receiver dropped");
        }
    }

    fn position(&self, id: WindowId) -> Option<usize> {
        self.stack.borrow().iter().position(|w| w.id() == id)
    }
}

pub struct SimWindow {
    spec: WindowSpec,
    homescreen: bool,
    ack: Cell<AckPolicy>,
    shared: Weak<Shared>,
}

impl SimWindow {
    fn with_shared(&self, f: impl FnOnce(&Shared)) {
        if let Some(shared) = self.shared.upgrade() {
            f(&shared);
        }
    }
}

impl AppWindow for SimWindow {
    fn id(&self) -> WindowId {
        WindowId(self.spec.id)
    }

    fn name(&self) -> &str {
        &self.spec.name
    }

    fn is_homescreen(&self) -> bool {
        self.homescreen
    }

    fn is_browser(&self) -> bool {
        self.spec.browser
    }

    fn killable(&self) -> bool {
        self.spec.killable
    }

    fn enter_switcher(&self) {
        self.with_shared(|s| s.record(Call::EnterSwitcher(self.id())));
    }

    fn leave_switcher(&self) {
        self.with_shared(|s| s.record(Call::LeaveSwitcher(self.id())));
    }

    fn open(&self, transition: &str) -> Settle {
        let Some(shared) = self.shared.upgrade() else {
            return settled();
        };
        shared.record(Call::Open(self.id(), transition.to_string()));
        shared.active.set(Some(self.id()));
        if shared.position(self.id()).is_some() {
            shared.current.set(Some(self.id()));
        }
        shared.settle(self.ack.get())
    }

    fn close(&self, transition: &str) -> Settle {
        let Some(shared) = self.shared.upgrade() else {
            return settled();
        };
        shared.record(Call::Close(self.id(), transition.to_string()));
        shared.settle(self.ack.get())
    }

    fn kill(&self) {
        let id = self.id();
        self.with_shared(|s| {
            s.record(Call::Kill(id));
            s.stack.borrow_mut().retain(|w| w.id() != id);
            if s.current.get() == Some(id) {
                s.current.set(s.stack.borrow().last().map(|w| w.id()));
            }
            if s.active.get() == Some(id) {
                s.active.set(None);
            }
            debug!("{} ({}) terminated", id, self.spec.name);
            s.notify(WindowEvent::Terminated(id));
        });
    }
}

struct SimCard {
    window: WindowId,
    shared: Rc<Shared>,
}

impl Card for SimCard {
    fn translate(&self, offset: f64) {
        self.shared.record(Call::Translate(self.window, offset));
    }

    fn set_screenshots_disabled(&self, disabled: bool) {
        self.shared.record(Call::Screenshots(self.window, disabled));
    }

    fn set_accessibility(&self, attrs: AccessibilityAttrs) {
        self.shared.record(Call::Accessibility(self.window, attrs));
    }

    fn clear_flags(&self) {
        self.shared.record(Call::ClearFlags(self.window));
    }

    fn drop_settled(&self) -> Settle {
        self.shared.settle(self.shared.drop_ack.get())
    }
}

pub struct Desktop {
    shared: Rc<Shared>,
    homescreen: Option<Rc<SimWindow>>,
    viewport: Viewport,
}

impl Desktop {
    pub fn new(scenario: Scenario) -> Rc<Self> {
        let next_id = scenario
            .windows
            .iter()
            .chain(scenario.homescreen.iter())
            .map(|w| w.id)
            .max()
            .map_or(1, |id| id + 1);
        let current = scenario
            .current
            .or_else(|| scenario.windows.last().map(|w| w.id))
            .map(WindowId);

        let shared = Rc::new(Shared {
            journal: RefCell::new(Vec::new()),
            stack: RefCell::new(Vec::new()),
            current: Cell::new(current),
            active: Cell::new(scenario.active.map(WindowId).or(current)),
            scroll: Cell::new(0.0),
            next_id: Cell::new(next_id),
            drop_ack: Cell::new(scenario.drop_ack),
            cards_created: Cell::new(0),
            events: RefCell::new(None),
            withheld: RefCell::new(Vec::new()),
        });

        let make = |spec: WindowSpec, homescreen: bool| {
            Rc::new(SimWindow {
                ack: Cell::new(spec.ack),
                spec,
                homescreen,
                shared: Rc::downgrade(&shared),
            })
        };
        *shared.stack.borrow_mut() = scenario.windows.into_iter().map(|s| make(s, false)).collect();
        let homescreen = scenario.homescreen.map(|s| make(s, true));

        Rc::new(Desktop {
            shared,
            homescreen,
            viewport: scenario.viewport,
        })
    }

    pub fn collaborators(self: &Rc<Self>) -> Collaborators {
        Collaborators {
            stack: self.clone(),
            shell: self.clone(),
            cards: self.clone(),
            surface: self.clone(),
        }
    }

    /// Route window notifications (kills, new sheets) to `tx`.
    pub fn set_event_sender(&self, tx: mpsc::UnboundedSender<WindowEvent>) {
        *self.shared.events.borrow_mut() = Some(tx);
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn calls(&self) -> Vec<Call> {
        self.shared.journal.borrow().clone()
    }

    /// Hand the journal over, leaving it empty.
    pub fn take_calls(&self) -> Vec<Call> {
        std::mem::take(&mut *self.shared.journal.borrow_mut())
    }

    pub fn clear_calls(&self) {
        self.shared.journal.borrow_mut().clear();
    }

    pub fn cards_created(&self) -> usize {
        self.shared.cards_created.get()
    }

    pub fn window(&self, id: WindowId) -> Option<WindowRef> {
        self.find(id).map(|w| w as WindowRef)
    }

    fn find(&self, id: WindowId) -> Option<Rc<SimWindow>> {
        self.shared
            .stack
            .borrow()
            .iter()
            .find(|w| w.id() == id)
            .cloned()
            .or_else(|| self.homescreen.clone().filter(|h| h.id() == id))
    }

    /// Push a new window on top of the stack without notifying anyone.
    pub fn add_window(&self, name: &str) -> WindowId {
        self.push_window(name, false)
    }

    fn push_window(&self, name: &str, browser: bool) -> WindowId {
        let id = self.shared.next_id.get();
        self.shared.next_id.set(id + 1);
        let window = Rc::new(SimWindow {
            spec: WindowSpec {
                browser,
                ..WindowSpec::new(id, name)
            },
            homescreen: false,
            ack: Cell::new(AckPolicy::Immediate),
            shared: Rc::downgrade(&self.shared),
        });
        self.shared.stack.borrow_mut().push(window);
        WindowId(id)
    }

    /// Drop a window from the stack without notifying anyone.
    pub fn remove_window(&self, id: WindowId) {
        self.shared.stack.borrow_mut().retain(|w| w.id() != id);
    }

    pub fn set_ack(&self, id: WindowId, policy: AckPolicy) {
        if let Some(window) = self.find(id) {
            window.ack.set(policy);
        }
    }

    pub fn set_drop_ack(&self, policy: AckPolicy) {
        self.shared.drop_ack.set(policy);
    }

    pub fn set_active(&self, id: Option<WindowId>) {
        self.shared.active.set(id);
    }

    /// Move the scroll position as a user would.
    pub fn set_scroll(&self, offset: f64) {
        self.shared.scroll.set(offset);
    }
}

impl StackProvider for Desktop {
    fn snapshot(&self) -> Vec<WindowRef> {
        self.shared
            .stack
            .borrow()
            .iter()
            .map(|w| w.clone() as WindowRef)
            .collect()
    }

    fn current(&self) -> Option<WindowRef> {
        let id = self.shared.current.get()?;
        self.shared.position(id)?;
        self.window(id)
    }
}

impl Shell for Desktop {
    fn active_window(&self) -> Option<WindowRef> {
        self.window(self.shared.active.get()?)
    }

    fn homescreen(&self) -> Option<WindowRef> {
        self.homescreen.clone().map(|h| h as WindowRef)
    }

    fn ready(&self) -> Settle {
        settled()
    }

    fn open_new_sheet(&self, private: bool) -> Option<WindowRef> {
        self.shared.record(Call::NewSheet { private });
        let name = if private { "Private sheet" } else { "Sheet" };
        let id = self.push_window(name, true);
        self.shared.notify(WindowEvent::Opened(id));
        self.window(id)
    }
}

impl CardFactory for Desktop {
    fn create(&self, window: WindowRef, screenshots_disabled: bool) -> Box<dyn Card> {
        let id = window.id();
        self.shared.cards_created.set(self.shared.cards_created.get() + 1);
        self.shared.record(Call::CardCreated(id, screenshots_disabled));
        Box::new(SimCard {
            window: id,
            shared: self.shared.clone(),
        })
    }
}

impl ScrollSurface for Desktop {
    fn scroll_offset(&self) -> f64 {
        self.shared.scroll.get()
    }

    fn scroll_to(&self, offset: f64, animated: bool) {
        self.shared.record(Call::ScrollTo(offset, animated));
        self.shared.scroll.set(offset);
    }

    fn set_content_width(&self, width: f64) {
        self.shared.record(Call::ContentWidth(width));
    }

    fn set_scroll_enabled(&self, enabled: bool) {
        self.shared.record(Call::ScrollEnabled(enabled));
    }

    fn set_presented(&self, presented: bool) {
        self.shared.record(Call::Presented(presented));
    }
}

#[cfg(test)]
pub(crate) fn harness(
    scenario: Scenario,
) -> (
    Rc<Desktop>,
    crate::task_manager::TaskManager,
    crate::events::EventReceiver,
) {
    let desktop = Desktop::new(scenario);
    let (publisher, rx) = crate::events::Publisher::channel();
    let tm = crate::task_manager::TaskManager::new(
        desktop.collaborators(),
        crate::config::Policy::default(),
        desktop.viewport(),
        publisher,
    );
    (desktop, tm, rx)
}

#[cfg(test)]
pub(crate) fn drain(rx: &mut crate::events::EventReceiver) -> Vec<crate::events::SwitcherEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
