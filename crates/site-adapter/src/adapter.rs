//! The site adapter: lifecycle, background tasks and the operations the host calls.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::json;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use sitehook_core_types::{InstanceId, NodeId};
use sitehook_event_bus::InMemoryBus;

use crate::config::AdapterConfig;
use crate::errors::{AdapterError, AdapterResult};
use crate::events::{AdapterEvents, HostBus, HostEvent, TOPIC_TOOL_COMPLETED};
use crate::insert;
use crate::metrics;
use crate::model::{AdapterState, InsertReport, InsertionPoint, MountFailure, MountStatus, SubmitReport};
use crate::mount::{self, InjectOutcome};
use crate::poll::{poll_until, Clock, PollOutcome, TokioClock};
use crate::ports::{DomPort, PopoverRenderer, SidebarSlot};
use crate::store::PreferenceStore;
use crate::submit;
use crate::toggle::ToggleStateManager;

const DEFAULT_BUS_CAPACITY: usize = 64;

/// Hostname of `url`, if it parses as an absolute URL with a host.
pub fn hostname_of(url: &str) -> Option<String> {
    url::Url::parse(url)
        .ok()
        .and_then(|parsed| parsed.host_str().map(str::to_string))
}

pub struct SiteAdapterBuilder {
    config: AdapterConfig,
    instance: Option<InstanceId>,
    dom: Option<Arc<dyn DomPort>>,
    store: Option<Arc<dyn PreferenceStore>>,
    renderer: Option<Arc<dyn PopoverRenderer>>,
    bus: Option<HostBus>,
    clock: Option<Arc<dyn Clock>>,
    sidebar: SidebarSlot,
}

impl SiteAdapterBuilder {
    pub fn new(config: AdapterConfig) -> Self {
        Self {
            config,
            instance: None,
            dom: None,
            store: None,
            renderer: None,
            bus: None,
            clock: None,
            sidebar: SidebarSlot::new(),
        }
    }

    pub fn with_dom(mut self, port: Arc<dyn DomPort>) -> Self {
        self.dom = Some(port);
        self
    }

    pub fn with_store(mut self, store: Arc<dyn PreferenceStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn PopoverRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub fn with_bus(mut self, bus: HostBus) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn with_sidebar(mut self, sidebar: SidebarSlot) -> Self {
        self.sidebar = sidebar;
        self
    }

    pub fn with_instance(mut self, instance: InstanceId) -> Self {
        self.instance = Some(instance);
        self
    }

    pub fn build(self) -> AdapterResult<SiteAdapter> {
        self.config.validate().map_err(AdapterError::Config)?;
        let dom = self
            .dom
            .ok_or_else(|| AdapterError::Config("dom port required".into()))?;
        let store = self
            .store
            .ok_or_else(|| AdapterError::Config("preference store required".into()))?;
        let renderer = self
            .renderer
            .ok_or_else(|| AdapterError::Config("popover renderer required".into()))?;
        let bus: HostBus = match self.bus {
            Some(bus) => bus,
            None => InMemoryBus::<HostEvent>::new(DEFAULT_BUS_CAPACITY),
        };
        let clock: Arc<dyn Clock> = match self.clock {
            Some(clock) => clock,
            None => Arc::new(TokioClock),
        };

        let toggle = Arc::new(ToggleStateManager::new(
            store,
            dom.clone(),
            self.sidebar,
            self.config.popover.container_id.clone(),
        ));
        let events = AdapterEvents::new(bus, clock.clone(), self.config.name.clone());

        Ok(SiteAdapter {
            inner: Arc::new(Inner {
                instance: self.instance.unwrap_or_default(),
                config: self.config,
                dom,
                renderer,
                events,
                clock,
                toggle,
                runtime: Mutex::new(Runtime::default()),
            }),
        })
    }
}

/// Adapter for one chat site. Cheap to clone; clones share state and tasks.
#[derive(Clone)]
pub struct SiteAdapter {
    inner: Arc<Inner>,
}

struct Inner {
    config: AdapterConfig,
    instance: InstanceId,
    dom: Arc<dyn DomPort>,
    renderer: Arc<dyn PopoverRenderer>,
    events: AdapterEvents,
    clock: Arc<dyn Clock>,
    toggle: Arc<ToggleStateManager>,
    runtime: Mutex<Runtime>,
}

#[derive(Default)]
struct Runtime {
    state: AdapterState,
    last_url: Option<String>,
    mount_status: MountStatus,
    /// State to restore when the host becomes supported again.
    disabled_from: Option<AdapterState>,
    url_watcher: Option<JoinHandle<()>>,
    bus_listener: Option<JoinHandle<()>>,
    observer: Option<JoinHandle<()>>,
    mount_task: Option<JoinHandle<()>>,
    settle_tasks: Vec<JoinHandle<()>>,
}

impl Runtime {
    fn mount_in_flight(&self) -> bool {
        self.mount_task
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    fn abort_ui_tasks(&mut self) {
        if let Some(observer) = self.observer.take() {
            observer.abort();
        }
        if let Some(task) = self.mount_task.take() {
            task.abort();
        }
        for task in self.settle_tasks.drain(..) {
            task.abort();
        }
    }

    fn abort_watchers(&mut self) {
        if let Some(watcher) = self.url_watcher.take() {
            watcher.abort();
        }
        if let Some(listener) = self.bus_listener.take() {
            listener.abort();
        }
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        self.abort_ui_tasks();
        self.abort_watchers();
    }
}

impl SiteAdapter {
    pub fn builder(config: AdapterConfig) -> SiteAdapterBuilder {
        SiteAdapterBuilder::new(config)
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.inner.config
    }

    pub fn instance_id(&self) -> &InstanceId {
        &self.inner.instance
    }

    pub fn state(&self) -> AdapterState {
        self.inner.state()
    }

    pub fn mount_status(&self) -> MountStatus {
        self.inner.runtime.lock().mount_status.clone()
    }

    pub fn last_url(&self) -> Option<String> {
        self.inner.runtime.lock().last_url.clone()
    }

    /// Settings bridge shared with the rendered popover.
    pub fn toggle(&self) -> Arc<ToggleStateManager> {
        self.inner.toggle.clone()
    }

    pub fn bus(&self) -> HostBus {
        self.inner.events.bus().clone()
    }

    pub async fn initialize(&self) -> AdapterResult<()> {
        let inner = &self.inner;
        {
            let mut runtime = inner.runtime.lock();
            if runtime.state != AdapterState::Uninitialized {
                warn!(
                    plugin = %inner.config.name,
                    state = %runtime.state,
                    "initialize ignored; adapter already initialized"
                );
                return Ok(());
            }
            runtime.state = AdapterState::Initializing;
        }

        let url = match inner.dom.current_url().await {
            Ok(url) => url,
            Err(err) => {
                inner.set_state(AdapterState::Uninitialized);
                return Err(err.into());
            }
        };
        {
            let mut runtime = inner.runtime.lock();
            runtime.last_url = Some(url.clone());
            runtime.state = AdapterState::Inactive;
        }
        inner.start_watchers();

        info!(
            plugin = %inner.config.name,
            instance = %inner.instance,
            url = %url,
            "adapter initialized"
        );
        Ok(())
    }

    pub async fn activate(&self) -> AdapterResult<()> {
        let inner = &self.inner;
        match inner.state() {
            AdapterState::Active => {
                warn!(plugin = %inner.config.name, "activate ignored; adapter already active");
                return Ok(());
            }
            AdapterState::Uninitialized => self.initialize().await?,
            AdapterState::Initializing => {
                return Err(AdapterError::Lifecycle(
                    "activate called while initialization is in progress".into(),
                ))
            }
            AdapterState::Disabled => {
                let site = inner.current_site().await;
                if !inner.config.site.supports_host(&site) {
                    return Err(AdapterError::UnsupportedHost(site));
                }
                inner.runtime.lock().disabled_from = None;
                inner.start_watchers();
            }
            AdapterState::Inactive => {}
        }

        {
            let mut runtime = inner.runtime.lock();
            if runtime.state == AdapterState::Active {
                warn!(plugin = %inner.config.name, "activate ignored; adapter already active");
                return Ok(());
            }
            runtime.state = AdapterState::Active;
        }
        inner.start_observer();
        inner.schedule_mount();

        let site = inner.current_site().await;
        inner.events.emit_activated(&site).await;
        info!(
            plugin = %inner.config.name,
            instance = %inner.instance,
            site = %site,
            "adapter activated"
        );
        Ok(())
    }

    pub async fn deactivate(&self) -> AdapterResult<()> {
        let inner = &self.inner;
        {
            let mut runtime = inner.runtime.lock();
            match runtime.state {
                AdapterState::Active => runtime.state = AdapterState::Inactive,
                AdapterState::Inactive => {
                    warn!(plugin = %inner.config.name, "deactivate ignored; adapter already inactive");
                    return Ok(());
                }
                state => {
                    warn!(plugin = %inner.config.name, state = %state, "deactivate ignored; adapter not active");
                    return Ok(());
                }
            }
        }
        inner.teardown_ui().await;

        let site = inner.current_site().await;
        inner.events.emit_deactivated(&site).await;
        info!(plugin = %inner.config.name, instance = %inner.instance, "adapter deactivated");
        Ok(())
    }

    /// Stop every background task and remove the popover. The adapter can be
    /// initialized again afterwards.
    pub async fn cleanup(&self) -> AdapterResult<()> {
        let inner = &self.inner;
        let previous = {
            let mut runtime = inner.runtime.lock();
            if runtime.state == AdapterState::Uninitialized {
                warn!(plugin = %inner.config.name, "cleanup ignored; adapter not initialized");
                return Ok(());
            }
            let previous = runtime.state;
            runtime.state = AdapterState::Uninitialized;
            runtime.disabled_from = None;
            runtime.abort_watchers();
            previous
        };
        inner.teardown_ui().await;
        inner.runtime.lock().last_url = None;

        if previous == AdapterState::Active {
            let site = inner.current_site().await;
            inner.events.emit_deactivated(&site).await;
        }
        info!(plugin = %inner.config.name, instance = %inner.instance, "adapter cleaned up");
        Ok(())
    }

    #[instrument(skip_all, fields(plugin = %self.inner.config.name, instance = %self.inner.instance))]
    pub async fn insert_text(&self, text: &str, target: Option<NodeId>) -> bool {
        let result = self.try_insert_text(text, target).await;
        let parameters = json!({ "text": text, "target": target });
        self.inner.report("insertText", parameters, &result).await
    }

    pub async fn try_insert_text(
        &self,
        text: &str,
        target: Option<NodeId>,
    ) -> AdapterResult<InsertReport> {
        insert::insert_text(
            self.inner.dom.as_ref(),
            &self.inner.config.site.chat_input_selectors,
            text,
            target,
        )
        .await
    }

    #[instrument(skip_all, fields(plugin = %self.inner.config.name, instance = %self.inner.instance))]
    pub async fn submit_form(&self) -> bool {
        let result = self.try_submit_form().await;
        self.inner.report("submitForm", json!({}), &result).await
    }

    pub async fn try_submit_form(&self) -> AdapterResult<SubmitReport> {
        let site = &self.inner.config.site;
        submit::submit_form(
            self.inner.dom.as_ref(),
            &site.submit_button_selectors,
            &site.chat_input_selectors,
        )
        .await
    }

    /// Whether the page currently loaded is on a supported host.
    pub async fn is_supported(&self) -> bool {
        self.inner.is_supported().await
    }

    /// React to an in-app URL change (normally detected by the URL watcher).
    pub async fn on_page_changed(&self, url: &str) {
        self.inner.on_page_changed(url).await;
    }

    /// React to the host runtime moving the tab to another host.
    ///
    /// An unsupported host disables the adapter; returning to a supported
    /// host restores the state it had before, remounting if it was active.
    pub async fn on_host_changed(&self, host: &str) {
        let inner = &self.inner;
        if !inner.config.site.supports_host(host) {
            {
                let mut runtime = inner.runtime.lock();
                if runtime.state != AdapterState::Disabled {
                    runtime.disabled_from = Some(runtime.state);
                    runtime.state = AdapterState::Disabled;
                }
            }
            inner.teardown_ui().await;
            inner.events.emit_deactivated(host).await;
            info!(plugin = %inner.config.name, host = %host, "host not supported; adapter disabled");
            return;
        }

        let restored = {
            let mut runtime = inner.runtime.lock();
            if runtime.state == AdapterState::Disabled {
                let previous = runtime.disabled_from.take().unwrap_or(AdapterState::Inactive);
                runtime.state = previous;
                Some(previous)
            } else {
                None
            }
        };
        match (restored, inner.state()) {
            (Some(AdapterState::Active), _) => {
                inner.start_observer();
                inner.schedule_mount();
                inner.events.emit_activated(host).await;
                info!(plugin = %inner.config.name, host = %host, "host supported again; adapter reactivated");
            }
            (Some(state), _) => {
                debug!(host = %host, state = %state, "host supported again; adapter re-enabled");
            }
            (None, AdapterState::Active) => {
                inner.schedule_mount();
            }
            (None, state) => {
                debug!(host = %host, state = %state, "host changed while inactive; no remount");
            }
        }
    }

    /// Run one full mount sequence (page-ready wait, then injection retries)
    /// and return the resulting status.
    pub async fn setup_ui_integration(&self) -> AdapterResult<MountStatus> {
        self.inner.run_mount().await
    }

    /// Start a background mount unless one is already running.
    pub fn schedule_ui_integration(&self) -> bool {
        self.inner.schedule_mount()
    }

    /// Insertion point for the popover on the page as it is now.
    pub async fn find_insertion_point(&self) -> AdapterResult<Option<InsertionPoint>> {
        mount::find_insertion_point(self.inner.dom.as_ref(), &self.inner.config.site).await
    }
}

impl Inner {
    fn state(&self) -> AdapterState {
        self.runtime.lock().state
    }

    fn set_state(&self, state: AdapterState) {
        self.runtime.lock().state = state;
    }

    fn set_mount_status(&self, status: MountStatus) -> MountStatus {
        self.runtime.lock().mount_status = status.clone();
        status
    }

    async fn current_site(&self) -> String {
        match self.dom.current_url().await {
            Ok(url) => hostname_of(&url).unwrap_or_else(|| self.config.site.domain.clone()),
            Err(err) => {
                debug!(error = %err, "current url unavailable");
                self.config.site.domain.clone()
            }
        }
    }

    async fn is_supported(&self) -> bool {
        match self.dom.current_url().await {
            Ok(url) => hostname_of(&url)
                .map(|host| self.config.site.supports_host(&host))
                .unwrap_or(false),
            Err(err) => {
                debug!(error = %err, "current url unavailable");
                false
            }
        }
    }

    async fn report<T: Serialize>(
        &self,
        tool: &str,
        parameters: serde_json::Value,
        result: &AdapterResult<T>,
    ) -> bool {
        match result {
            Ok(value) => {
                metrics::record_operation(&self.config.name, tool, true);
                let value = serde_json::to_value(value).unwrap_or(serde_json::Value::Null);
                debug!(tool, result = %value, "operation completed");
                self.events.emit_completed(tool, parameters, value).await;
                true
            }
            Err(err) => {
                metrics::record_operation(&self.config.name, tool, false);
                warn!(tool, error = %err, "operation failed");
                self.events.emit_failed(tool, err).await;
                false
            }
        }
    }

    fn start_watchers(self: &Arc<Self>) {
        self.start_url_watcher();
        self.start_bus_listener();
    }

    fn start_url_watcher(self: &Arc<Self>) {
        let mut runtime = self.runtime.lock();
        if runtime.url_watcher.is_some() {
            return;
        }
        let weak = Arc::downgrade(self);
        let clock = self.clock.clone();
        let interval = self.config.timings.url_poll_interval();
        runtime.url_watcher = Some(tokio::spawn(async move {
            loop {
                clock.sleep(interval).await;
                let Some(inner) = weak.upgrade() else { break };
                inner.check_url().await;
            }
        }));
    }

    async fn check_url(self: &Arc<Self>) {
        let url = match self.dom.current_url().await {
            Ok(url) => url,
            Err(err) => {
                debug!(error = %err, "url poll failed");
                return;
            }
        };
        let changed = self.runtime.lock().last_url.as_deref() != Some(url.as_str());
        if changed {
            self.on_page_changed(&url).await;
        }
    }

    fn start_bus_listener(self: &Arc<Self>) {
        let mut runtime = self.runtime.lock();
        if runtime.bus_listener.is_some() {
            return;
        }
        let mut subscription = self.events.bus().subscribe_topics(&[TOPIC_TOOL_COMPLETED]);
        let weak = Arc::downgrade(self);
        runtime.bus_listener = Some(tokio::spawn(async move {
            while let Some(event) = subscription.recv().await {
                let Some(inner) = weak.upgrade() else { break };
                inner.on_tool_completed(&event).await;
            }
        }));
    }

    async fn on_tool_completed(&self, event: &HostEvent) {
        if self.state() != AdapterState::Active || !self.is_supported().await {
            return;
        }
        if let HostEvent::ToolCompleted(payload) = event {
            debug!(
                plugin = %self.config.name,
                tool = %payload.tool_name,
                from = %payload.plugin_name,
                "tool execution completed"
            );
        }
    }

    fn start_observer(self: &Arc<Self>) -> bool {
        let mut runtime = self.runtime.lock();
        if runtime.observer.is_some() {
            return false;
        }
        let mut mutations = self.dom.observe_mutations();
        let weak = Arc::downgrade(self);
        runtime.observer = Some(tokio::spawn(async move {
            loop {
                match mutations.recv().await {
                    Ok(_) | Err(RecvError::Lagged(_)) => {}
                    Err(RecvError::Closed) => break,
                }
                let Some(inner) = weak.upgrade() else { break };
                inner.on_mutation().await;
            }
        }));
        true
    }

    async fn on_mutation(self: &Arc<Self>) {
        {
            let runtime = self.runtime.lock();
            if runtime.state != AdapterState::Active || runtime.mount_in_flight() {
                return;
            }
        }
        match self.dom.element_by_id(&self.config.popover.container_id).await {
            Ok(None) => {}
            Ok(Some(_)) => return,
            Err(err) => {
                debug!(error = %err, "container lookup failed");
                return;
            }
        }
        match mount::find_insertion_point(self.dom.as_ref(), &self.config.site).await {
            Ok(Some(_)) => {
                debug!(plugin = %self.config.name, "popover container missing; remounting");
                self.schedule_mount();
            }
            Ok(None) => {}
            Err(err) => debug!(error = %err, "insertion point lookup failed"),
        }
    }

    fn schedule_mount(self: &Arc<Self>) -> bool {
        let mut runtime = self.runtime.lock();
        if runtime.mount_in_flight() {
            debug!("popover mount already in flight");
            return false;
        }
        let weak = Arc::downgrade(self);
        runtime.mount_task = Some(tokio::spawn(async move {
            let Some(inner) = weak.upgrade() else { return };
            if let Err(err) = inner.run_mount().await {
                debug!(error = %err, "popover mount failed");
            }
        }));
        true
    }

    fn schedule_settle_remount(self: &Arc<Self>) {
        let weak: Weak<Inner> = Arc::downgrade(self);
        let clock = self.clock.clone();
        let settle = self.config.timings.navigation_settle();
        let task = tokio::spawn(async move {
            clock.sleep(settle).await;
            let Some(inner) = weak.upgrade() else { return };
            if inner.state() == AdapterState::Active {
                inner.schedule_mount();
            }
        });
        let mut runtime = self.runtime.lock();
        runtime.settle_tasks.retain(|task| !task.is_finished());
        runtime.settle_tasks.push(task);
    }

    async fn on_page_changed(self: &Arc<Self>, url: &str) {
        self.runtime.lock().last_url = Some(url.to_string());
        let hostname = hostname_of(url).unwrap_or_default();
        let supported = self.config.site.supports_host(&hostname);
        info!(plugin = %self.config.name, url = %url, supported, "page changed");
        if supported {
            self.schedule_settle_remount();
        }
        self.events.emit_site_changed(url, &hostname, supported).await;
    }

    async fn run_mount(&self) -> AdapterResult<MountStatus> {
        let popover = &self.config.popover;
        if let Some(existing) = self.dom.element_by_id(&popover.container_id).await? {
            metrics::record_mount("already_present");
            return Ok(self.set_mount_status(MountStatus::Mounted {
                container: existing,
            }));
        }

        self.set_mount_status(MountStatus::WaitingForPage);
        let ready = mount::wait_for_page_ready(
            self.dom.as_ref(),
            &self.config.site,
            self.clock.as_ref(),
            &self.config.timings.page_ready,
        )
        .await;
        let attempts = ready.attempts();
        if ready.into_value().is_none() {
            debug!(attempts, "no insertion point appeared; popover mount abandoned");
            metrics::record_mount("abandoned");
            return Ok(self.set_mount_status(MountStatus::Abandoned {
                reason: MountFailure::PageNotReady,
            }));
        }
        debug!(attempts, "insertion point available");

        let outcome = poll_until(
            self.clock.as_ref(),
            &self.config.timings.inject,
            |attempt| async move {
                self.set_mount_status(MountStatus::Mounting { attempt });
                let injected = mount::try_inject(
                    self.dom.as_ref(),
                    self.renderer.as_ref(),
                    &self.toggle,
                    &self.config.site,
                    popover,
                )
                .await;
                match injected {
                    Ok(InjectOutcome::Mounted(container)) => {
                        metrics::record_mount("mounted");
                        info!(plugin = %self.config.name, container = %container, attempt, "popover mounted");
                        Some(container)
                    }
                    Ok(InjectOutcome::AlreadyPresent(container)) => {
                        metrics::record_mount("already_present");
                        Some(container)
                    }
                    Ok(InjectOutcome::NoInsertionPoint) => {
                        metrics::record_mount("retry");
                        None
                    }
                    Err(err) => {
                        debug!(attempt, error = %err, "popover injection failed");
                        metrics::record_mount("retry");
                        None
                    }
                }
            },
        )
        .await;

        let status = match outcome {
            PollOutcome::Ready { value, .. } => MountStatus::Mounted { container: value },
            PollOutcome::Exhausted { attempts } => {
                debug!(attempts, "popover injection retries exhausted");
                metrics::record_mount("abandoned");
                MountStatus::Abandoned {
                    reason: MountFailure::InjectionExhausted,
                }
            }
        };
        Ok(self.set_mount_status(status))
    }

    async fn teardown_ui(&self) {
        self.runtime.lock().abort_ui_tasks();
        let removed = mount::unmount_popover(
            self.dom.as_ref(),
            self.renderer.as_ref(),
            &self.config.popover,
        )
        .await;
        let status = match removed {
            Ok(Some(_)) => MountStatus::Unmounted,
            Ok(None) => MountStatus::Idle,
            Err(err) => {
                debug!(error = %err, "popover teardown failed");
                MountStatus::Idle
            }
        };
        self.set_mount_status(status);
    }
}
