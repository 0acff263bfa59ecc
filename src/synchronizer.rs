//! Mirrors the external window stack into the local card collection.

use crate::card::{Card, CardFactory};
use crate::stack::StackFilter;
use crate::window::{WindowId, WindowRef};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// One window's card.
pub struct CardRecord {
    pub window: WindowRef,
    pub card: Box<dyn Card>,
}

/// Windows whose cards were created or destroyed by a reconciliation.
///
/// The caller notifies the windows once it has released the collection, so
/// a window reacting to the hook cannot re-enter a pass in progress.
#[derive(Default)]
pub struct SyncReport {
    pub added: Vec<WindowRef>,
    pub removed: Vec<CardRecord>,
}

impl SyncReport {
    pub fn changed(&self) -> bool {
        !self.added.is_empty() || !self.removed.is_empty()
    }
}

/// Cards keyed by window id, plus the filtered stack that orders them.
#[derive(Default)]
pub struct CardCollection {
    stack: Vec<WindowRef>,
    records: HashMap<WindowId, CardRecord>,
}

impl CardCollection {
    /// The filtered working copy of the stack, in strip order.
    pub fn stack(&self) -> &[WindowRef] {
        &self.stack
    }

    pub fn len(&self) -> usize {
        self.stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    pub fn contains(&self, id: WindowId) -> bool {
        self.records.contains_key(&id)
    }

    pub fn get(&self, id: WindowId) -> Option<&CardRecord> {
        self.records.get(&id)
    }

    pub fn position(&self, id: WindowId) -> Option<usize> {
        self.stack.iter().position(|w| w.id() == id)
    }

    pub fn window_at(&self, index: usize) -> Option<&WindowRef> {
        self.stack.get(index)
    }

    pub fn ids(&self) -> Vec<WindowId> {
        self.stack.iter().map(|w| w.id()).collect()
    }

    /// Records in strip order.
    pub fn records_in_order(&self) -> impl Iterator<Item = &CardRecord> {
        self.stack.iter().filter_map(|w| self.records.get(&w.id()))
    }

    /// Make the collection match `snapshot` after filtering.
    ///
    /// Records for windows no longer present (or filtered out) are removed,
    /// records for new windows are created. Running it again with the same
    /// snapshot changes nothing.
    pub fn reconcile(
        &mut self,
        snapshot: Vec<WindowRef>,
        filter: &StackFilter,
        factory: &dyn CardFactory,
        screenshots_disabled: bool,
    ) -> SyncReport {
        let stack = filter.apply(&snapshot);
        let wanted: HashSet<WindowId> = stack.iter().map(|w| w.id()).collect();
        let mut report = SyncReport::default();

        // 1. Drop records that fell out of the stack
        let stale: Vec<WindowId> = self
            .records
            .keys()
            .filter(|id| !wanted.contains(id))
            .copied()
            .collect();
        for id in stale {
            if let Some(record) = self.records.remove(&id) {
                report.removed.push(record);
            }
        }

        // 2. Create records for windows we have not seen yet
        for window in &stack {
            let id = window.id();
            if self.records.contains_key(&id) {
                continue;
            }
            let card = factory.create(window.clone(), screenshots_disabled);
            self.records.insert(
                id,
                CardRecord {
                    window: window.clone(),
                    card,
                },
            );
            report.added.push(window.clone());
        }

        self.stack = stack;
        debug!(
            "Reconciled {} cards (+{} -{})",
            self.stack.len(),
            report.added.len(),
            report.removed.len()
        );

        report
    }

    /// Remove every record, in strip order.
    pub fn teardown(&mut self) -> Vec<CardRecord> {
        let stack = std::mem::take(&mut self.stack);
        let mut records: Vec<CardRecord> = stack
            .iter()
            .filter_map(|w| self.records.remove(&w.id()))
            .collect();
        // Anything left would be a record without a stack entry
        records.extend(self.records.drain().map(|(_, r)| r));
        records
    }
}
