//! Input dispatch.
//!
//! Every raw input event resolves to exactly one [`Action`]; performing the
//! action yields a [`Dispatch`] telling the caller whether the event was
//! used, prevented, ignored or should keep propagating.

use crate::task_manager::{ShowOptions, TaskManager};
use crate::window::{WindowId, wait_settled};
use tokio::time::Instant;
use tracing::{debug, info};

/// Where a tap landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TapTarget {
    Card(WindowId),
    CloseButton(WindowId),
    FavoriteButton(WindowId),
    NewSheet,
    NewPrivateSheet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WheelDirection {
    Up,
    Down,
    Left,
    Right,
}

/// Navigation requests coming from the rest of the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HierarchyRequest {
    Home,
    HoldHome,
    /// An attention surface (e.g. an incoming call) is opening
    AttentionOpened,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    Tap(TapTarget),
    Scroll { at: Instant },
    DragStart { window: WindowId, touch_started_at: Instant },
    Drop { window: WindowId, will_kill: bool },
    /// Wheel or assistive page gesture
    Wheel(WheelDirection),
    Hierarchy(HierarchyRequest),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    OpenNewSheet { private: bool },
    Select(WindowId),
    Close(WindowId),
    Favorite(WindowId),
    Pan(usize),
    TrackScroll(Instant),
    BeginDrag(WindowId),
    EndDrag { window: WindowId, kill: bool },
    Show,
    /// Hide onto the homescreen when `home` is set, else the active window
    Hide { home: bool },
    Prevent,
    Ignore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Handled,
    /// The default behaviour of the gesture must be cancelled
    Prevented,
    Ignored,
    /// The request changed visibility and must not propagate further
    Consumed,
    /// The request did not apply here and should keep propagating
    PassedThrough,
}

impl TaskManager {
    pub async fn handle_input(&self, event: InputEvent) -> Dispatch {
        let action = self.resolve(&event);
        debug!("Input {:?} resolved to {:?}", event, action);
        self.perform(action).await
    }

    /// Decide what an event means given the current state. No side effects.
    pub fn resolve(&self, event: &InputEvent) -> Action {
        if let InputEvent::Hierarchy(request) = event {
            return match request {
                HierarchyRequest::Home => Action::Hide { home: true },
                HierarchyRequest::AttentionOpened => Action::Hide { home: false },
                HierarchyRequest::HoldHome => Action::Show,
            };
        }

        if !self.is_listening() {
            return Action::Ignore;
        }

        let cards = self.cards();
        let known = |id: &WindowId| cards.contains(*id);

        match *event {
            InputEvent::Tap(target) => match target {
                TapTarget::NewSheet => Action::OpenNewSheet { private: false },
                TapTarget::NewPrivateSheet => Action::OpenNewSheet { private: true },
                TapTarget::Card(id) if known(&id) => Action::Select(id),
                TapTarget::CloseButton(id) if known(&id) => Action::Close(id),
                TapTarget::FavoriteButton(id) if known(&id) => Action::Favorite(id),
                _ => Action::Ignore,
            },
            InputEvent::Scroll { at } => Action::TrackScroll(at),
            InputEvent::DragStart {
                window,
                touch_started_at,
            } => {
                if !known(&window) {
                    return Action::Ignore;
                }
                // Axis lock: a scroll after the touch began owns the gesture
                match self.last_scroll_at.get() {
                    Some(scrolled) if scrolled > touch_started_at => Action::Prevent,
                    _ => Action::BeginDrag(window),
                }
            }
            InputEvent::Drop { window, will_kill } => {
                if known(&window) {
                    Action::EndDrag {
                        window,
                        kill: will_kill,
                    }
                } else if self.dragging.get() == Some(window) {
                    // The card went away mid-drag; still give scrolling back
                    Action::EndDrag { window, kill: false }
                } else {
                    Action::Ignore
                }
            }
            InputEvent::Wheel(direction) => {
                let Some(index) = self.centred_index() else {
                    return Action::Ignore;
                };
                match direction {
                    WheelDirection::Down => match cards.window_at(index) {
                        Some(window) if window.killable() => Action::Close(window.id()),
                        _ => Action::Ignore,
                    },
                    WheelDirection::Left if index > 0 => Action::Pan(index - 1),
                    WheelDirection::Right if index + 1 < cards.len() => Action::Pan(index + 1),
                    _ => Action::Ignore,
                }
            }
            InputEvent::Hierarchy(_) => Action::Ignore,
        }
    }

    pub async fn perform(&self, action: Action) -> Dispatch {
        match action {
            Action::Ignore => Dispatch::Ignored,
            Action::Prevent => Dispatch::Prevented,
            Action::Show => {
                if self.show(ShowOptions::default()).await {
                    Dispatch::Consumed
                } else {
                    Dispatch::PassedThrough
                }
            }
            Action::Hide { home } => {
                let target = if home { self.shell().homescreen() } else { None };
                if self.hide(target, None).await {
                    Dispatch::Consumed
                } else {
                    Dispatch::PassedThrough
                }
            }
            Action::Select(id) => {
                let window = self.cards().get(id).map(|r| r.window.clone());
                self.hide(window, None).await;
                Dispatch::Handled
            }
            Action::Close(id) => {
                self.close_card(id).await;
                Dispatch::Handled
            }
            Action::Favorite(id) => {
                info!("Favorite requested for {}, not supported", id);
                Dispatch::Handled
            }
            Action::OpenNewSheet { private } => {
                let sheet = self.shell().open_new_sheet(private);
                self.hide(sheet, None).await;
                Dispatch::Handled
            }
            Action::Pan(index) => {
                self.pan_to_index(index, false).await;
                Dispatch::Handled
            }
            Action::TrackScroll(at) => {
                self.last_scroll_at.set(Some(at));
                self.update_position();
                Dispatch::Handled
            }
            Action::BeginDrag(id) => {
                self.dragging.set(Some(id));
                self.surface().set_scroll_enabled(false);
                Dispatch::Handled
            }
            Action::EndDrag { window, kill } => {
                if self.dragging.take().is_some() {
                    self.surface().set_scroll_enabled(true);
                }
                if kill {
                    let settle = self.cards().get(window).map(|r| r.card.drop_settled());
                    if let Some(settle) = settle
                        && !wait_settled(settle, self.policy().drop_settle()).await
                    {
                        debug!("Drop of {} did not settle in time", window);
                    }
                    self.close_card(window).await;
                }
                Dispatch::Handled
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::desktop::{AckPolicy, Call, Desktop, Scenario, harness};
    use crate::task_manager::Visibility;
    use std::rc::Rc;
    use std::time::Duration;

    async fn shown(names: &[&str]) -> (Rc<Desktop>, TaskManager) {
        let (desktop, tm, _rx) = harness(Scenario::stack(names));
        tm.show(ShowOptions::default()).await;
        desktop.clear_calls();
        (desktop, tm)
    }

    fn position(calls: &[Call], wanted: &Call) -> usize {
        calls
            .iter()
            .position(|c| c == wanted)
            .unwrap_or_else(|| panic!("{:?} not in {:?}", wanted, calls))
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_last_card_pans_before_kill() {
        let (desktop, tm) = shown(&["A", "B", "C"]).await;
        assert_eq!(tm.current_index(), Some(2));

        let start = Instant::now();
        let result = tm
            .handle_input(InputEvent::Tap(TapTarget::CloseButton(WindowId(3))))
            .await;

        assert_eq!(result, Dispatch::Handled);
        assert!(start.elapsed() >= Duration::from_millis(200));
        let calls = desktop.calls();
        assert!(
            position(&calls, &Call::ScrollTo(185.0, true)) < position(&calls, &Call::Kill(WindowId(3)))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_earlier_card_kills_immediately() {
        let (desktop, tm) = shown(&["A", "B", "C"]).await;

        let start = Instant::now();
        tm.handle_input(InputEvent::Tap(TapTarget::CloseButton(WindowId(1))))
            .await;

        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(desktop.calls(), vec![Call::Kill(WindowId(1))]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_only_card_does_not_pan() {
        let (desktop, tm) = shown(&["A"]).await;

        tm.handle_input(InputEvent::Tap(TapTarget::CloseButton(WindowId(1))))
            .await;

        assert_eq!(desktop.calls(), vec![Call::Kill(WindowId(1))]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tap_card_selects_it() {
        let (desktop, tm, mut rx) = harness(Scenario::stack(&["A", "B", "C"]));
        tm.show(ShowOptions::default()).await;
        crate::desktop::drain(&mut rx);

        let result = tm.handle_input(InputEvent::Tap(TapTarget::Card(WindowId(1)))).await;

        assert_eq!(result, Dispatch::Handled);
        assert_eq!(tm.visibility(), Visibility::Hidden);
        assert!(desktop.calls().contains(&Call::Open(WindowId(1), "from-cardview".into())));
        assert_eq!(
            crate::desktop::drain(&mut rx)[0],
            crate::events::SwitcherEvent::Closed {
                new_stack_position: Some(0)
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_card_is_ignored() {
        let (desktop, tm) = shown(&["A"]).await;

        let result = tm
            .handle_input(InputEvent::Tap(TapTarget::CloseButton(WindowId(99))))
            .await;

        assert_eq!(result, Dispatch::Ignored);
        assert!(desktop.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_input_ignored_while_hidden() {
        let (desktop, tm, _rx) = harness(Scenario::stack(&["A"]));

        let result = tm.handle_input(InputEvent::Wheel(WheelDirection::Down)).await;

        assert_eq!(result, Dispatch::Ignored);
        assert!(desktop.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_favorite_is_a_stub() {
        let (desktop, tm) = shown(&["A"]).await;

        let result = tm
            .handle_input(InputEvent::Tap(TapTarget::FavoriteButton(WindowId(1))))
            .await;

        assert_eq!(result, Dispatch::Handled);
        assert!(desktop.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_private_sheet_hides_onto_it() {
        let (desktop, tm) = shown(&["A"]).await;

        tm.handle_input(InputEvent::Tap(TapTarget::NewPrivateSheet)).await;

        let calls = desktop.calls();
        assert!(calls.contains(&Call::NewSheet { private: true }));
        assert!(calls.contains(&Call::Open(WindowId(2), "from-cardview".into())));
        assert_eq!(tm.visibility(), Visibility::Hidden);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drag_after_scroll_is_prevented() {
        let (desktop, tm) = shown(&["A", "B"]).await;
        let touch = Instant::now();
        tokio::time::advance(Duration::from_millis(10)).await;

        tm.handle_input(InputEvent::Scroll { at: Instant::now() }).await;
        let result = tm
            .handle_input(InputEvent::DragStart {
                window: WindowId(1),
                touch_started_at: touch,
            })
            .await;

        assert_eq!(result, Dispatch::Prevented);
        assert!(!desktop.calls().contains(&Call::ScrollEnabled(false)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_drag_suspends_scrolling_until_drop() {
        let (desktop, tm) = shown(&["A", "B"]).await;
        tm.handle_input(InputEvent::Scroll { at: Instant::now() }).await;
        tokio::time::advance(Duration::from_millis(10)).await;

        let result = tm
            .handle_input(InputEvent::DragStart {
                window: WindowId(1),
                touch_started_at: Instant::now(),
            })
            .await;
        assert_eq!(result, Dispatch::Handled);

        tm.handle_input(InputEvent::Drop {
            window: WindowId(1),
            will_kill: false,
        })
        .await;

        assert_eq!(
            desktop.calls(),
            vec![Call::ScrollEnabled(false), Call::ScrollEnabled(true)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_kill_drop_waits_for_settle_bound() {
        let (desktop, tm) = shown(&["A", "B"]).await;
        desktop.set_drop_ack(AckPolicy::Never);
        tm.handle_input(InputEvent::DragStart {
            window: WindowId(1),
            touch_started_at: Instant::now(),
        })
        .await;

        let start = Instant::now();
        tm.handle_input(InputEvent::Drop {
            window: WindowId(1),
            will_kill: true,
        })
        .await;

        assert!(start.elapsed() >= Duration::from_millis(400));
        assert!(desktop.calls().contains(&Call::Kill(WindowId(1))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_of_vanished_card_restores_scrolling() {
        let (desktop, tm) = shown(&["A", "B"]).await;
        tm.handle_input(InputEvent::DragStart {
            window: WindowId(1),
            touch_started_at: Instant::now(),
        })
        .await;
        desktop.remove_window(WindowId(1));
        tm.synchronize();

        tm.handle_input(InputEvent::Drop {
            window: WindowId(1),
            will_kill: true,
        })
        .await;

        let calls = desktop.calls();
        assert!(calls.contains(&Call::ScrollEnabled(true)));
        assert!(!calls.contains(&Call::Kill(WindowId(1))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wheel_down_kills_current_card() {
        let (desktop, tm) = shown(&["A", "B"]).await;
        tm.pan_to_app(Some(WindowId(1)), true).await;

        let result = tm.handle_input(InputEvent::Wheel(WheelDirection::Down)).await;

        assert_eq!(result, Dispatch::Handled);
        assert!(desktop.calls().contains(&Call::Kill(WindowId(1))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wheel_down_respects_killable() {
        let mut scenario = Scenario::stack(&["A", "B"]);
        scenario.windows[1].killable = false;
        let (desktop, tm, _rx) = harness(scenario);
        tm.show(ShowOptions::default()).await;

        let result = tm.handle_input(InputEvent::Wheel(WheelDirection::Down)).await;

        assert_eq!(result, Dispatch::Ignored);
        assert!(!desktop.calls().iter().any(|c| matches!(c, Call::Kill(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wheel_pans_within_bounds() {
        let (_desktop, tm) = shown(&["A", "B", "C"]).await;

        assert_eq!(tm.resolve(&InputEvent::Wheel(WheelDirection::Right)), Action::Ignore);
        assert_eq!(tm.resolve(&InputEvent::Wheel(WheelDirection::Up)), Action::Ignore);

        tm.handle_input(InputEvent::Wheel(WheelDirection::Left)).await;
        assert_eq!(tm.current_index(), Some(1));
        tm.handle_input(InputEvent::Wheel(WheelDirection::Left)).await;
        assert_eq!(tm.current_index(), Some(0));

        assert_eq!(tm.resolve(&InputEvent::Wheel(WheelDirection::Left)), Action::Ignore);
        assert_eq!(
            tm.resolve(&InputEvent::Wheel(WheelDirection::Right)),
            Action::Pan(1)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_wheel_left_walks_a_long_strip() {
        let names = ["A", "B", "C", "D", "E", "F", "G", "H", "I"];
        let (desktop, tm) = shown(&names).await;
        assert_eq!(tm.centred_index(), Some(8));

        for expected in (4..8).rev() {
            assert_eq!(
                tm.handle_input(InputEvent::Wheel(WheelDirection::Left)).await,
                Dispatch::Handled
            );
            assert_eq!(tm.centred_index(), Some(expected));
        }

        let scrolls: Vec<_> = desktop
            .calls()
            .into_iter()
            .filter(|c| matches!(c, Call::ScrollTo(..)))
            .collect();
        assert_eq!(
            scrolls,
            vec![
                Call::ScrollTo(1295.0, true),
                Call::ScrollTo(1110.0, true),
                Call::ScrollTo(925.0, true),
                Call::ScrollTo(740.0, true),
            ]
        );

        for expected in 5..9 {
            tm.handle_input(InputEvent::Wheel(WheelDirection::Right)).await;
            assert_eq!(tm.centred_index(), Some(expected));
        }
        assert_eq!(tm.resolve(&InputEvent::Wheel(WheelDirection::Right)), Action::Ignore);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hierarchy_requests_consumed_only_on_change() {
        let (desktop, tm, _rx) = harness(Scenario::stack(&["A"]));
        let hold = InputEvent::Hierarchy(HierarchyRequest::HoldHome);
        let home = InputEvent::Hierarchy(HierarchyRequest::Home);

        assert_eq!(tm.handle_input(home).await, Dispatch::PassedThrough);
        assert_eq!(tm.handle_input(hold).await, Dispatch::Consumed);
        assert!(tm.is_shown());
        assert_eq!(tm.handle_input(hold).await, Dispatch::PassedThrough);
        assert_eq!(tm.handle_input(home).await, Dispatch::Consumed);
        assert_eq!(tm.visibility(), Visibility::Hidden);
        assert!(
            desktop
                .calls()
                .contains(&Call::Open(WindowId(0), "home-from-cardview".into()))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_attention_hides_onto_active_window() {
        let (desktop, tm) = shown(&["A", "B"]).await;

        let result = tm
            .handle_input(InputEvent::Hierarchy(HierarchyRequest::AttentionOpened))
            .await;

        assert_eq!(result, Dispatch::Consumed);
        assert!(desktop.calls().contains(&Call::Open(WindowId(2), "from-cardview".into())));
    }
}
