//! The card view: visibility lifecycle, synchronization passes and panning.
//!
//! Everything runs on one thread. Methods take `&self` and never hold a
//! borrow across an `.await`, so a second `show()` or `hide()` issued while
//! one is in flight sees the transitional state and returns at once.

use crate::card::CardFactory;
use crate::config::Policy;
use crate::events::{Publisher, SwitcherEvent};
use crate::layout::{ScrollSurface, StripLayout, Viewport};
use crate::position::{self, PositionTracker};
use crate::stack::{Shell, StackFilter, StackProvider, position_of};
use crate::synchronizer::CardCollection;
use crate::window::{WindowId, WindowRef, transition, wait_settled};
use serde::{Deserialize, Serialize};
use std::cell::{Cell, Ref, RefCell};
use std::rc::Rc;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Hidden,
    TransitioningIn,
    Shown,
    TransitioningOut,
}

/// Notifications about the window stack and the screen.
#[derive(Debug, Clone, PartialEq)]
pub enum WindowEvent {
    Opened(WindowId),
    Terminated(WindowId),
    StackChanged,
    Resized(Viewport),
}

#[derive(Debug, Clone, Default)]
pub struct ShowOptions {
    pub filter: StackFilter,
}

/// Everything the card view talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub stack: Rc<dyn StackProvider>,
    pub shell: Rc<dyn Shell>,
    pub cards: Rc<dyn CardFactory>,
    pub surface: Rc<dyn ScrollSurface>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub visibility: Visibility,
    pub card_count: usize,
    pub current_index: Option<usize>,
}

pub struct TaskManager {
    stack: Rc<dyn StackProvider>,
    shell: Rc<dyn Shell>,
    factory: Rc<dyn CardFactory>,
    surface: Rc<dyn ScrollSurface>,
    policy: Policy,
    publisher: Publisher,
    visibility: Cell<Visibility>,
    listening: Cell<bool>,
    screenshots_enabled: Cell<bool>,
    viewport: Cell<Viewport>,
    filter: RefCell<StackFilter>,
    cards: RefCell<CardCollection>,
    layout: RefCell<StripLayout>,
    tracker: RefCell<PositionTracker>,
    /// Stack events arrived while transitioning in
    resync_pending: Cell<bool>,
    /// Time of the most recent scroll event
    pub(crate) last_scroll_at: Cell<Option<Instant>>,
    /// Card being dragged, while scrolling is suspended
    pub(crate) dragging: Cell<Option<WindowId>>,
}

impl TaskManager {
    pub fn new(
        collaborators: Collaborators,
        policy: Policy,
        viewport: Viewport,
        publisher: Publisher,
    ) -> Self {
        let layout = StripLayout::compute(viewport, policy.gutter, 0);
        TaskManager {
            stack: collaborators.stack,
            shell: collaborators.shell,
            factory: collaborators.cards,
            surface: collaborators.surface,
            screenshots_enabled: Cell::new(policy.screenshots_enabled),
            policy,
            publisher,
            visibility: Cell::new(Visibility::Hidden),
            listening: Cell::new(false),
            viewport: Cell::new(viewport),
            filter: RefCell::new(StackFilter::All),
            cards: RefCell::new(CardCollection::default()),
            layout: RefCell::new(layout),
            tracker: RefCell::new(PositionTracker::new()),
            resync_pending: Cell::new(false),
            last_scroll_at: Cell::new(None),
            dragging: Cell::new(None),
        }
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility.get()
    }

    pub fn is_shown(&self) -> bool {
        self.visibility.get() == Visibility::Shown
    }

    /// Whether input listeners are attached.
    pub fn is_listening(&self) -> bool {
        self.listening.get()
    }

    pub fn status(&self) -> Status {
        Status {
            visibility: self.visibility.get(),
            card_count: self.cards.borrow().len(),
            current_index: self.current_index(),
        }
    }

    pub fn card_ids(&self) -> Vec<WindowId> {
        self.cards.borrow().ids()
    }

    pub fn layout(&self) -> StripLayout {
        self.layout.borrow().clone()
    }

    pub fn current_index(&self) -> Option<usize> {
        position::current_index(
            self.surface.scroll_offset(),
            self.layout.borrow().card_width,
            self.cards.borrow().len(),
        )
    }

    /// Card the strip is actually centred on. Unlike [`current_index`]
    /// this accounts for the gutter, so it is what navigation steps from.
    ///
    /// [`current_index`]: Self::current_index
    pub fn centred_index(&self) -> Option<usize> {
        self.layout
            .borrow()
            .centred_index(self.surface.scroll_offset())
    }

    /// Attribute writes issued by position tracking so far.
    pub fn attribute_writes(&self) -> usize {
        self.tracker.borrow().writes()
    }

    pub(crate) fn cards(&self) -> Ref<'_, CardCollection> {
        self.cards.borrow()
    }

    pub(crate) fn shell(&self) -> &Rc<dyn Shell> {
        &self.shell
    }

    pub(crate) fn surface(&self) -> &Rc<dyn ScrollSurface> {
        &self.surface
    }

    pub(crate) fn policy(&self) -> &Policy {
        &self.policy
    }

    /// Enter the card view.
    ///
    /// Returns `false` without doing anything if the view is not hidden.
    #[instrument(skip_all)]
    pub async fn show(&self, options: ShowOptions) -> bool {
        if self.visibility.get() != Visibility::Hidden {
            debug!("Show ignored while {:?}", self.visibility.get());
            return false;
        }

        self.visibility.set(Visibility::TransitioningIn);
        *self.filter.borrow_mut() = options.filter;
        self.publisher.publish(SwitcherEvent::BeforeShow);
        info!("Showing card view");

        if !wait_settled(self.shell.ready(), self.policy.open_timeout()).await {
            warn!("Shell did not settle before show, continuing");
        }

        self.listening.set(true);
        // Track position only once the strip sits on the current card
        self.reconcile_cards();
        self.apply_layout();

        let current = self.stack.current().map(|w| w.id());
        let index = self.index_for(current);
        self.scroll_to_index(index, true);
        self.update_position();
        self.surface.set_presented(true);

        if let Some(app) = self.shell.active_window() {
            let name = if app.is_homescreen() {
                transition::HOME_TO_CARDVIEW
            } else {
                transition::TO_CARDVIEW
            };
            debug!("Closing {} with {}", app.id(), name);
            if !wait_settled(app.close(name), self.policy.open_timeout()).await {
                warn!("{} did not acknowledge close, continuing", app.id());
            }
        }

        self.set_active(true);
        self.publisher.publish(SwitcherEvent::Shown);

        if self.resync_pending.take() {
            debug!("Stack changed during show, resynchronizing");
            self.resync().await;
        }
        true
    }

    /// Leave the card view onto `target`, or the active window, or the
    /// homescreen.
    ///
    /// Returns `false` without doing anything if the view is not shown.
    #[instrument(skip_all)]
    pub async fn hide(&self, target: Option<WindowRef>, transition_name: Option<&str>) -> bool {
        if self.visibility.get() != Visibility::Shown {
            debug!("Hide ignored while {:?}", self.visibility.get());
            return false;
        }

        self.visibility.set(Visibility::TransitioningOut);
        self.detach_input();

        let target = target
            .or_else(|| self.shell.active_window())
            .or_else(|| self.shell.homescreen());
        let position = target
            .as_ref()
            .and_then(|t| position_of(&self.stack.snapshot(), t.id()));
        self.publisher.publish(SwitcherEvent::Closed {
            new_stack_position: position,
        });

        match target {
            Some(window) => {
                let name = transition_name.unwrap_or(if window.is_homescreen() {
                    transition::HOME_FROM_CARDVIEW
                } else {
                    transition::FROM_CARDVIEW
                });
                info!("Hiding card view onto {} ({})", window.id(), name);
                if !wait_settled(window.open(name), self.policy.open_timeout()).await {
                    warn!("{} did not acknowledge open, continuing", window.id());
                }
            }
            None => warn!("No window to hide onto, tearing down anyway"),
        }

        self.set_active(false);
        self.surface.set_presented(false);
        self.teardown();
        true
    }

    /// Completes a transition. Called exactly once per show or hide.
    fn set_active(&self, active: bool) {
        if active {
            self.visibility.set(Visibility::Shown);
            self.publisher.publish(SwitcherEvent::Activated);
        } else {
            self.visibility.set(Visibility::Hidden);
            self.publisher.publish(SwitcherEvent::Deactivated);
        }
    }

    fn detach_input(&self) {
        self.listening.set(false);
        self.last_scroll_at.set(None);
        if self.dragging.take().is_some() {
            self.surface.set_scroll_enabled(true);
        }
    }

    fn teardown(&self) {
        self.resync_pending.set(false);
        let records = self.cards.borrow_mut().teardown();
        self.tracker.borrow_mut().invalidate();
        debug!("Tearing down {} cards", records.len());
        for record in records {
            record.card.clear_flags();
            record.window.leave_switcher();
        }
        self.relayout();
    }

    /// Reconcile cards with the stack, then lay out and track position.
    pub fn synchronize(&self) {
        self.reconcile_cards();
        self.relayout();
    }

    /// Synchronize, and go home if that left the strip empty.
    async fn resync(&self) {
        self.synchronize();
        if self.cards.borrow().is_empty() {
            info!("No cards left, going home");
            let home = self.shell.homescreen();
            self.hide(home, None).await;
        }
    }

    fn reconcile_cards(&self) {
        let snapshot = self.stack.snapshot();
        let report = {
            let filter = self.filter.borrow();
            self.cards.borrow_mut().reconcile(
                snapshot,
                &filter,
                self.factory.as_ref(),
                !self.screenshots_enabled.get(),
            )
        };

        if report.changed() {
            self.tracker.borrow_mut().invalidate();
        }
        for record in report.removed {
            record.card.clear_flags();
            record.window.leave_switcher();
        }
        for window in report.added {
            window.enter_switcher();
        }
    }

    fn relayout(&self) {
        self.apply_layout();
        self.update_position();
    }

    /// Translate cards and size the strip, without position tracking.
    fn apply_layout(&self) {
        let layout = StripLayout::compute(
            self.viewport.get(),
            self.policy.gutter,
            self.cards.borrow().len(),
        );
        {
            let cards = self.cards.borrow();
            for (record, offset) in cards.records_in_order().zip(&layout.offsets) {
                record.card.translate(*offset);
            }
        }
        self.surface.set_content_width(layout.total_width);
        *self.layout.borrow_mut() = layout;
    }

    /// Recompute the current card from the scroll offset.
    pub fn update_position(&self) -> Option<usize> {
        let card_width = self.layout.borrow().card_width;
        let cards = self.cards.borrow();
        self.tracker
            .borrow_mut()
            .update(self.surface.scroll_offset(), card_width, &cards)
    }

    /// Strip index of `window`, falling back to the last card.
    fn index_for(&self, window: Option<WindowId>) -> usize {
        let cards = self.cards.borrow();
        window
            .and_then(|id| cards.position(id))
            .unwrap_or(cards.len().saturating_sub(1))
    }

    /// Returns whether a scroll was issued.
    fn scroll_to_index(&self, index: usize, immediate: bool) -> bool {
        let desired = self.layout.borrow().scroll_offset_for(index);
        if self.surface.scroll_offset().round() == desired.round() {
            return false;
        }
        debug!("Scrolling to card {} at {}", index, desired);
        self.surface.scroll_to(desired, !immediate);
        true
    }

    /// Bring `window`'s card to the centre. Unknown windows pan to the last
    /// card.
    pub async fn pan_to_app(&self, window: Option<WindowId>, immediate: bool) {
        let index = self.index_for(window);
        self.pan_to_index(index, immediate).await;
    }

    pub(crate) async fn pan_to_index(&self, index: usize, immediate: bool) {
        // Scroll end is not observed, the settle delay stands in for it
        if self.scroll_to_index(index, immediate) {
            tokio::time::sleep(self.policy.pan_settle()).await;
        }
        self.update_position();
    }

    /// Kill the window behind a card. The last card pans left first.
    pub async fn close_card(&self, id: WindowId) -> bool {
        let found = {
            let cards = self.cards.borrow();
            cards
                .position(id)
                .and_then(|index| Some((index, cards.len(), cards.window_at(index)?.clone())))
        };
        let Some((index, len, window)) = found else {
            debug!("No card for {}", id);
            return false;
        };

        if len > 1 && index == len - 1 {
            self.pan_to_index(index - 1, false).await;
        }

        info!("Killing {}", id);
        window.kill();
        true
    }

    pub async fn handle_window_event(&self, event: WindowEvent) {
        debug!("Window event: {:?}, State: {:?}", event, self.visibility.get());

        match event {
            WindowEvent::Resized(viewport) => {
                let current = self.tracker.borrow().last_current();
                self.viewport.set(viewport);
                self.relayout();
                if self.is_shown() {
                    let index = self.index_for(current);
                    self.scroll_to_index(index, true);
                    self.update_position();
                }
            }
            WindowEvent::Opened(_) | WindowEvent::Terminated(_) | WindowEvent::StackChanged => {
                match self.visibility.get() {
                    Visibility::Shown => self.resync().await,
                    // Cards were already built from an older snapshot
                    Visibility::TransitioningIn => self.resync_pending.set(true),
                    Visibility::Hidden | Visibility::TransitioningOut => {}
                }
            }
        }
    }

    /// Apply the screenshot preference to every card, now and later.
    pub fn set_screenshots_enabled(&self, enabled: bool) {
        if self.screenshots_enabled.replace(enabled) == enabled {
            return;
        }
        info!("Card screenshots {}", if enabled { "enabled" } else { "disabled" });
        for record in self.cards.borrow().records_in_order() {
            record.card.set_screenshots_disabled(!enabled);
        }
    }

    /// Follow the screenshot preference until its sender goes away.
    pub async fn follow_screenshot_preference(&self, mut preference: watch::Receiver<bool>) {
        let enabled = *preference.borrow_and_update();
        self.set_screenshots_enabled(enabled);
        while preference.changed().await.is_ok() {
            let enabled = *preference.borrow_and_update();
            self.set_screenshots_enabled(enabled);
        }
    }
}
