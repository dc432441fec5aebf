//! Mutation watcher: turns result-list changes into reconcile triggers.

use futures::channel::mpsc::UnboundedSender;
use serde_json::json;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use super::Trigger;
use crate::dom::{MutationCallback, MutationObserverHandle, ObserveMutations, Selector};
use crate::errors::DomError;
use crate::events::{self, EventSink};
use crate::runtime::{poll_until, Clock};

/// Watches a provider's result root and sends [`Trigger::Mutation`] on
/// child-list changes.
///
/// Mutations caused while a [`Suspension`] is held are not forwarded, so the
/// reconciler's own writes never schedule another pass.
pub struct MutationWatcher<D: ObserveMutations> {
    suspended: Rc<Cell<usize>>,
    observer: RefCell<Option<D::Observer>>,
    triggers: UnboundedSender<Trigger>,
    events: Arc<dyn EventSink>,
}

impl<D: ObserveMutations> std::fmt::Debug for MutationWatcher<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MutationWatcher")
            .field("suspended", &self.suspended.get())
            .field("attached", &self.is_attached())
            .finish_non_exhaustive()
    }
}

impl<D: ObserveMutations> MutationWatcher<D> {
    /// Creates a detached watcher.
    pub fn new(triggers: UnboundedSender<Trigger>, events: Arc<dyn EventSink>) -> Self {
        Self {
            suspended: Rc::new(Cell::new(0)),
            observer: RefCell::new(None),
            triggers,
            events,
        }
    }

    /// Whether an observer is installed.
    pub fn is_attached(&self) -> bool {
        self.observer.borrow().is_some()
    }

    /// Whether a [`Suspension`] is held.
    pub fn is_suspended(&self) -> bool {
        self.suspended.get() > 0
    }

    /// Waits for `root_selector` to match, then observes it.
    ///
    /// Polls every `interval` without limit.
    pub async fn attach<C>(
        &self,
        dom: &D,
        clock: &C,
        root_selector: &Selector,
        interval: Duration,
    ) -> Result<(), DomError>
    where
        C: Clock + ?Sized,
    {
        let root = poll_until(clock, interval, || dom.query(&dom.root(), root_selector)).await;
        self.attach_to(dom, &root)
    }

    /// Observes `root`, replacing any previous observer.
    pub fn attach_to(&self, dom: &D, root: &D::Node) -> Result<(), DomError> {
        let suspended = Rc::clone(&self.suspended);
        let triggers = self.triggers.clone();
        let callback: MutationCallback = Rc::new(move || {
            if suspended.get() == 0 {
                // A closed channel means the script shut down.
                let _ = triggers.unbounded_send(Trigger::Mutation);
            }
        });
        let observer = dom.observe(root, callback)?;
        if let Some(previous) = self.observer.replace(Some(observer)) {
            previous.disconnect();
        }
        info!(root = ?root, "Mutation watcher attached");
        self.events.emit(events::WATCHER_ATTACHED, Some(json!({ "root": format!("{root:?}") })));
        Ok(())
    }

    /// Stops observing.
    pub fn detach(&self) {
        let observer = self.observer.borrow_mut().take();
        if let Some(observer) = observer {
            observer.disconnect();
            debug!("Mutation watcher detached");
            self.events.emit(events::WATCHER_DETACHED, None);
        }
    }

    /// Stops forwarding mutations until the returned guard is dropped.
    ///
    /// Guards nest. When the last one drops, records queued by the observer
    /// in the meantime are discarded.
    #[must_use = "mutations are forwarded again as soon as the guard drops"]
    pub fn suspend(&self) -> Suspension<'_, D> {
        self.suspended.set(self.suspended.get() + 1);
        Suspension { watcher: self }
    }
}

/// Guard returned by [`MutationWatcher::suspend`].
pub struct Suspension<'a, D: ObserveMutations> {
    watcher: &'a MutationWatcher<D>,
}

impl<D: ObserveMutations> Drop for Suspension<'_, D> {
    fn drop(&mut self) {
        let depth = self.watcher.suspended.get().saturating_sub(1);
        self.watcher.suspended.set(depth);
        if depth == 0 {
            if let Some(observer) = self.watcher.observer.borrow().as_ref() {
                observer.discard_pending();
            }
        }
    }
}
