//! The per-page content-script driver.

use futures::channel::mpsc::{self, UnboundedReceiver, UnboundedSender};
use futures::future::{select, Either};
use futures::StreamExt;
use serde::Serialize;
use serde_json::json;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{MutationWatcher, ReconcileReport, Reconciler, ResultState, Trigger};
use crate::config::ContentScriptConfig;
use crate::dom::ObserveMutations;
use crate::errors::Result;
use crate::events::{self, EventSink, NoOpEventSink};
use crate::i18n::{Labels, Localizer};
use crate::provider::ProviderDescriptor;
use crate::runtime::{poll_until, Clock};
use crate::settings::{add_hidden_site, load_hidden_sites, SettingsStore};

/// Where the driver is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcilerState {
    /// No pass in progress.
    Idle,
    /// A pass was triggered; polling until the provider finds results.
    WaitingForResults,
    /// A pass is writing to the page.
    Reconciling,
}

/// Builder for [`ContentScript`].
pub struct ContentScriptBuilder<D, S, C> {
    dom: Rc<D>,
    store: Rc<S>,
    clock: C,
    provider: Arc<ProviderDescriptor>,
    config: ContentScriptConfig,
    labels: Labels,
    events: Arc<dyn EventSink>,
}

impl<D, S, C> ContentScriptBuilder<D, S, C>
where
    D: ObserveMutations,
    S: SettingsStore,
    C: Clock,
{
    /// Sets the configuration.
    #[must_use]
    pub fn with_config(mut self, config: ContentScriptConfig) -> Self {
        self.config = config;
        self
    }

    /// Resolves page labels through `localizer`.
    #[must_use]
    pub fn with_localizer(mut self, localizer: &dyn Localizer) -> Self {
        self.labels = Labels::resolve(localizer);
        self
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Builds the driver. Nothing happens until [`ContentScript::start`].
    ///
    /// Fails when the configuration does not validate.
    pub fn build(self) -> Result<ContentScript<D, S, C>> {
        self.config.validate()?;
        let (triggers, receiver) = mpsc::unbounded();
        let reconciler = Reconciler::new(
            self.provider,
            self.config.class_names.clone(),
            self.labels,
            Arc::clone(&self.events),
        )?;
        Ok(ContentScript {
            watcher: MutationWatcher::new(triggers.clone(), Arc::clone(&self.events)),
            dom: self.dom,
            store: self.store,
            clock: self.clock,
            config: self.config,
            reconciler,
            state: Cell::new(ReconcilerState::Idle),
            passes: Cell::new(0),
            started: Cell::new(false),
            triggers,
            receiver: RefCell::new(Some(receiver)),
            events: self.events,
        })
    }
}

/// Drives reconciliation for one page.
///
/// Triggers (page load, settings change, result-list mutation) are queued on
/// a channel and processed one pass at a time by [`run`](Self::run); triggers
/// that arrive while a pass is waiting or running collapse into a single
/// follow-up pass.
pub struct ContentScript<D: ObserveMutations, S, C> {
    dom: Rc<D>,
    store: Rc<S>,
    clock: C,
    config: ContentScriptConfig,
    reconciler: Reconciler,
    watcher: MutationWatcher<D>,
    state: Cell<ReconcilerState>,
    passes: Cell<u64>,
    started: Cell<bool>,
    triggers: UnboundedSender<Trigger>,
    receiver: RefCell<Option<UnboundedReceiver<Trigger>>>,
    events: Arc<dyn EventSink>,
}

impl<D: ObserveMutations, S, C> std::fmt::Debug for ContentScript<D, S, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentScript")
            .field("provider", &self.reconciler.provider().name)
            .field("state", &self.state.get())
            .field("passes", &self.passes.get())
            .field("watcher", &self.watcher)
            .finish_non_exhaustive()
    }
}

impl<D, S, C> ContentScript<D, S, C>
where
    D: ObserveMutations,
    S: SettingsStore,
    C: Clock,
{
    /// Starts building a driver for `provider` on `dom`.
    pub fn builder(
        dom: Rc<D>,
        store: Rc<S>,
        clock: C,
        provider: Arc<ProviderDescriptor>,
    ) -> ContentScriptBuilder<D, S, C> {
        ContentScriptBuilder {
            dom,
            store,
            clock,
            provider,
            config: ContentScriptConfig::default(),
            labels: Labels::default(),
            events: Arc::new(NoOpEventSink),
        }
    }

    /// A driver with default configuration, English labels and no events.
    pub fn new(dom: Rc<D>, store: Rc<S>, clock: C, provider: Arc<ProviderDescriptor>) -> Result<Self> {
        Self::builder(dom, store, clock, provider).build()
    }

    /// The selected provider.
    pub fn provider(&self) -> &ProviderDescriptor {
        self.reconciler.provider()
    }

    /// The reconciler.
    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    /// The mutation watcher.
    pub fn watcher(&self) -> &MutationWatcher<D> {
        &self.watcher
    }

    /// The document.
    pub fn dom(&self) -> &D {
        &self.dom
    }

    /// The configuration.
    pub fn config(&self) -> &ContentScriptConfig {
        &self.config
    }

    /// Current state.
    pub fn state(&self) -> ReconcilerState {
        self.state.get()
    }

    /// Passes completed so far.
    pub fn pass_count(&self) -> u64 {
        self.passes.get()
    }

    /// Registers the settings listener and queues the page-load trigger.
    ///
    /// Calling it again has no effect.
    pub fn start(&self) {
        if self.started.replace(true) {
            return;
        }
        let provider = self.reconciler.provider();
        info!(provider = %provider.name, supported = provider.is_supported(), "Content script started");
        self.events.emit(
            events::PROVIDER_SELECTED,
            Some(json!({ "name": provider.name, "kind": provider.kind })),
        );

        let key = self.config.storage_key.clone();
        let triggers = self.triggers.clone();
        self.store.on_change(Box::new(move |change| {
            if change.key == key {
                let _ = triggers.unbounded_send(Trigger::SettingsChanged);
            }
        }));
        self.send(Trigger::PageLoad);
    }

    /// Queues a trigger.
    pub fn send(&self, trigger: Trigger) {
        if self.triggers.unbounded_send(trigger).is_err() {
            debug!(?trigger, "Trigger dropped after shutdown");
        }
    }

    /// Processes triggers and watches the result list until
    /// [`shutdown`](Self::shutdown).
    ///
    /// Only the first call does anything.
    pub async fn run(&self) {
        let Some(receiver) = self.receiver.borrow_mut().take() else {
            warn!("Content script is already running");
            return;
        };
        let triggers = self.process(receiver);
        let watch = self.watch();
        futures::pin_mut!(triggers, watch);
        if let Either::Left(((), triggers)) = select(watch, triggers).await {
            triggers.await;
        }
        self.watcher.detach();
    }

    /// Closes the trigger channel and stops watching.
    ///
    /// Queued triggers are still processed, but a pass waiting for results
    /// gives up at its next poll. [`run`](Self::run) returns once the queue
    /// is drained.
    pub fn shutdown(&self) {
        self.triggers.close_channel();
        self.watcher.detach();
    }

    /// Runs one pass: wait for results, read the hidden-site list, reconcile.
    ///
    /// Returns `None` when the list could not be read, or when the driver was
    /// shut down before any results appeared. The page is left untouched.
    pub async fn handle(&self, trigger: Trigger) -> Option<ReconcileReport> {
        let provider = self.reconciler.provider();
        self.state.set(ReconcilerState::WaitingForResults);
        self.events.emit(events::RECONCILE_WAITING, Some(json!({ "trigger": trigger })));
        let ready = poll_until(&self.clock, self.config.poll_interval(), || {
            if !provider.all_results(&*self.dom).is_empty() {
                return Some(true);
            }
            self.triggers.is_closed().then_some(false)
        })
        .await;
        if !ready {
            debug!(?trigger, "Stopped waiting for results after shutdown");
            self.state.set(ReconcilerState::Idle);
            return None;
        }

        let sites = match load_hidden_sites(&*self.store, &self.config.storage_key).await {
            Ok(sites) => sites,
            Err(e) => {
                warn!(error = %e, ?trigger, "Could not read hidden sites; page left unchanged");
                self.events.emit(
                    events::SETTINGS_READ_FAILED,
                    Some(json!({ "key": e.key, "error": e.message })),
                );
                self.state.set(ReconcilerState::Idle);
                return None;
            }
        };

        self.state.set(ReconcilerState::Reconciling);
        let report = {
            let _suspension = self.watcher.suspend();
            self.reconciler.reconcile(&*self.dom, &sites)
        };
        self.passes.set(self.passes.get() + 1);
        self.state.set(ReconcilerState::Idle);

        debug!(?trigger, hidden_sites = sites.len(), ?report, "Reconciled page");
        self.events.emit(
            events::RECONCILE_COMPLETED,
            Some(json!({ "trigger": trigger, "report": report })),
        );
        Some(report)
    }

    /// Reveals the hidden result whose marker contains `target`.
    ///
    /// Returns `false` when `target` is not inside a marker.
    pub fn reveal(&self, target: &D::Node) -> bool {
        let Some(marker) = self.reconciler.marker_at(&*self.dom, target) else {
            return false;
        };
        let _suspension = self.watcher.suspend();
        self.reconciler.reveal(&*self.dom, &marker).is_some()
    }

    /// Adds the host of the result whose hide control contains `target` to
    /// the hidden-site list.
    ///
    /// The resulting settings change triggers the pass that hides it. A
    /// result the user revealed earlier is hidden again right away, since its
    /// host may already be listed and then no change fires. Returns the
    /// added host, or `None` when nothing was added.
    pub async fn hide_host_of(&self, target: &D::Node) -> Result<Option<String>> {
        let dom = &*self.dom;
        let Some(control) = self.reconciler.control_at(dom, target) else {
            return Ok(None);
        };
        let Some(result) = self.reconciler.provider().result_containing(dom, &control) else {
            return Ok(None);
        };
        let Some(host) = self.reconciler.provider().result_host(dom, &result) else {
            return Ok(None);
        };
        let added = add_hidden_site(&*self.store, &self.config.storage_key, &host).await?;
        if let Some(ref host) = added {
            info!(host = %host, "Added hidden site");
        }
        if self.reconciler.state(dom, &result) == Some(ResultState::Unhidden) {
            let _suspension = self.watcher.suspend();
            self.reconciler.rehide(dom, &result, &host)?;
        }
        Ok(added)
    }

    async fn process(&self, mut receiver: UnboundedReceiver<Trigger>) {
        while let Some(trigger) = receiver.next().await {
            let mut coalesced = 0usize;
            while let Ok(Some(_)) = receiver.try_next() {
                coalesced += 1;
            }
            if coalesced > 0 {
                debug!(?trigger, coalesced, "Coalesced queued triggers");
            }
            self.handle(trigger).await;
        }
        debug!("Trigger channel closed");
    }

    async fn watch(&self) {
        let Some(root) = self.reconciler.provider().watch_root.as_ref() else {
            return;
        };
        let interval = self.config.watch_poll_interval();
        if let Err(e) = self.watcher.attach(&*self.dom, &self.clock, root, interval).await {
            warn!(error = %e, root = %root, "Could not observe result list");
        }
    }
}
