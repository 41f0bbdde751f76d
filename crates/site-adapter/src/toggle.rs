//! Settings bridge between the host preference store and the mounted popover.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::TOGGLE_STATE_EVENT;
use crate::errors::{AdapterError, AdapterResult};
use crate::model::ToggleState;
use crate::ports::{DomEvent, DomPort, SidebarSlot};
use crate::store::{PreferenceStore, PreferencesPatch, StoreCapabilities};

const WRITE_REASON: &str = "mcp-popover-toggle";

/// Which store write carried an MCP toggle.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum McpWritePath {
    SetMcpEnabled,
    SidebarVisibility,
    Unavailable,
}

pub struct ToggleStateManager {
    store: Arc<dyn PreferenceStore>,
    dom: Arc<dyn DomPort>,
    sidebar: SidebarSlot,
    container_id: String,
}

impl ToggleStateManager {
    pub fn new(
        store: Arc<dyn PreferenceStore>,
        dom: Arc<dyn DomPort>,
        sidebar: SidebarSlot,
        container_id: impl Into<String>,
    ) -> Self {
        Self {
            store,
            dom,
            sidebar,
            container_id: container_id.into(),
        }
    }

    /// Current settings, read fresh from the store. Unreadable stores yield all-false.
    pub fn get_state(&self) -> ToggleState {
        match self.read_state() {
            Ok(state) => state,
            Err(err) => {
                debug!(error = %err, "toggle state unavailable; using defaults");
                ToggleState::default()
            }
        }
    }

    fn read_state(&self) -> AdapterResult<ToggleState> {
        let mcp_enabled = self
            .store
            .mcp_enabled()
            .map_err(|err| AdapterError::Store(err.to_string()))?;
        let auto_submit = self
            .store
            .preferences()
            .map_err(|err| AdapterError::Store(err.to_string()))?
            .auto_submit;
        Ok(ToggleState {
            mcp_enabled,
            auto_insert: auto_submit,
            auto_submit,
            auto_execute: false,
        })
    }

    pub async fn set_mcp_enabled(&self, enabled: bool) -> AdapterResult<McpWritePath> {
        let caps = self.store.capabilities();
        let path = if caps.contains(StoreCapabilities::SET_MCP_ENABLED) {
            self.store
                .set_mcp_enabled(enabled, WRITE_REASON)
                .map_err(|err| AdapterError::Store(err.to_string()))?;
            McpWritePath::SetMcpEnabled
        } else if caps.contains(StoreCapabilities::SET_SIDEBAR_VISIBILITY) {
            self.store
                .set_sidebar_visibility(enabled, WRITE_REASON)
                .map_err(|err| AdapterError::Store(err.to_string()))?;
            McpWritePath::SidebarVisibility
        } else {
            debug!("store offers no way to persist the MCP toggle");
            McpWritePath::Unavailable
        };

        if let Some(sidebar) = self.sidebar.get() {
            let outcome = if enabled {
                sidebar.show().await
            } else {
                sidebar.hide().await
            };
            if let Err(err) = outcome {
                debug!(enabled, error = %err, "sidebar manager toggle failed");
            }
        }

        self.refresh().await;
        Ok(path)
    }

    // TODO: split once auto-insert gets its own preference field; both setters
    // currently drive `preferences.auto_submit`.
    pub async fn set_auto_insert(&self, enabled: bool) -> AdapterResult<()> {
        self.write_auto_submit(enabled)?;
        self.refresh().await;
        Ok(())
    }

    pub async fn set_auto_submit(&self, enabled: bool) -> AdapterResult<()> {
        self.write_auto_submit(enabled)?;
        self.refresh().await;
        Ok(())
    }

    /// Auto-execution has no backing preference; only the popover is refreshed.
    pub async fn set_auto_execute(&self, enabled: bool) -> AdapterResult<()> {
        debug!(enabled, "auto-execute toggled");
        self.refresh().await;
        Ok(())
    }

    fn write_auto_submit(&self, enabled: bool) -> AdapterResult<()> {
        if !self
            .store
            .capabilities()
            .contains(StoreCapabilities::UPDATE_PREFERENCES)
        {
            debug!("store does not accept preference updates");
            return Ok(());
        }
        self.store
            .update_preferences(PreferencesPatch {
                auto_submit: Some(enabled),
            })
            .map_err(|err| AdapterError::Store(err.to_string()))
    }

    /// Push the current state to the mounted popover as `mcp:update-toggle-state`.
    ///
    /// Returns `false` when no popover container is mounted.
    pub async fn update_ui(&self) -> AdapterResult<bool> {
        let Some(container) = self.dom.element_by_id(&self.container_id).await? else {
            return Ok(false);
        };
        let detail = serde_json::json!({ "toggleState": self.get_state() });
        self.dom
            .dispatch(
                container,
                DomEvent::Custom {
                    name: TOGGLE_STATE_EVENT.to_string(),
                    detail,
                },
            )
            .await?;
        Ok(true)
    }

    async fn refresh(&self) {
        if let Err(err) = self.update_ui().await {
            warn!(error = %err, "failed to refresh popover toggle state");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{ElementSpec, MemoryDom};
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use sitehook_core_types::SiteError;

    #[derive(Default)]
    struct RecordingSidebar {
        calls: Mutex<Vec<&'static str>>,
    }

    #[async_trait]
    impl crate::ports::SidebarManager for RecordingSidebar {
        async fn show(&self) -> Result<(), SiteError> {
            self.calls.lock().push("show");
            Ok(())
        }

        async fn hide(&self) -> Result<(), SiteError> {
            self.calls.lock().push("hide");
            Err(SiteError::new("sidebar gone"))
        }
    }

    fn manager(store: Arc<MemoryStore>, dom: Arc<MemoryDom>, sidebar: SidebarSlot) -> ToggleStateManager {
        ToggleStateManager::new(store, dom, sidebar, "mcp-popover-container")
    }

    #[test]
    fn state_mirrors_store_and_defaults_on_failure() {
        let store = Arc::new(MemoryStore::default().with_values(true, true));
        let dom = Arc::new(MemoryDom::new("https://chat.mistral.ai/chat"));
        let toggle = manager(store.clone(), dom, SidebarSlot::new());

        let state = toggle.get_state();
        assert!(state.mcp_enabled && state.auto_insert && state.auto_submit);
        assert!(!state.auto_execute);

        store.fail_reads(true);
        assert_eq!(toggle.get_state(), ToggleState::default());
    }

    #[tokio::test]
    async fn mcp_toggle_prefers_direct_setter_then_sidebar_visibility() {
        let dom = Arc::new(MemoryDom::new("https://chat.mistral.ai/chat"));

        let full = Arc::new(MemoryStore::default());
        let path = manager(full.clone(), dom.clone(), SidebarSlot::new())
            .set_mcp_enabled(true)
            .await
            .unwrap();
        assert_eq!(path, McpWritePath::SetMcpEnabled);
        assert!(full.mcp_enabled().unwrap());

        let legacy = Arc::new(MemoryStore::new(StoreCapabilities::SET_SIDEBAR_VISIBILITY));
        let path = manager(legacy.clone(), dom.clone(), SidebarSlot::new())
            .set_mcp_enabled(true)
            .await
            .unwrap();
        assert_eq!(path, McpWritePath::SidebarVisibility);
        assert!(legacy.sidebar_visible());

        let bare = Arc::new(MemoryStore::new(StoreCapabilities::empty()));
        let path = manager(bare.clone(), dom, SidebarSlot::new())
            .set_mcp_enabled(true)
            .await
            .unwrap();
        assert_eq!(path, McpWritePath::Unavailable);
        assert!(bare.writes().is_empty());
    }

    #[tokio::test]
    async fn sidebar_failures_do_not_fail_the_toggle() {
        let dom = Arc::new(MemoryDom::new("https://chat.mistral.ai/chat"));
        let store = Arc::new(MemoryStore::default());
        let slot = SidebarSlot::new();
        let sidebar = Arc::new(RecordingSidebar::default());
        slot.register(sidebar.clone());
        let toggle = manager(store, dom, slot);

        toggle.set_mcp_enabled(true).await.unwrap();
        toggle.set_mcp_enabled(false).await.unwrap();
        assert_eq!(*sidebar.calls.lock(), vec!["show", "hide"]);
    }

    #[tokio::test]
    async fn auto_insert_and_auto_submit_share_one_preference() {
        let dom = Arc::new(MemoryDom::new("https://chat.mistral.ai/chat"));
        let store = Arc::new(MemoryStore::default());
        let toggle = manager(store.clone(), dom, SidebarSlot::new());

        toggle.set_auto_insert(true).await.unwrap();
        assert!(store.preferences().unwrap().auto_submit);
        toggle.set_auto_submit(false).await.unwrap();
        let state = toggle.get_state();
        assert!(!state.auto_insert && !state.auto_submit);

        toggle.set_auto_execute(true).await.unwrap();
        assert!(!toggle.get_state().auto_execute);
        assert_eq!(store.writes().len(), 2);
    }

    #[tokio::test]
    async fn update_ui_targets_the_mounted_container_only() {
        let dom = Arc::new(MemoryDom::new("https://chat.mistral.ai/chat"));
        let store = Arc::new(MemoryStore::default().with_values(true, false));
        let toggle = manager(store, dom.clone(), SidebarSlot::new());

        assert!(!toggle.update_ui().await.unwrap());

        let container = dom
            .append_spec(dom.body_id(), &ElementSpec::new("div").id("mcp-popover-container"))
            .unwrap();
        assert!(toggle.update_ui().await.unwrap());

        let events = dom.dispatched_to(container);
        assert_eq!(events.len(), 1);
        match &events[0] {
            DomEvent::Custom { name, detail } => {
                assert_eq!(name, TOGGLE_STATE_EVENT);
                assert_eq!(detail["toggleState"]["mcpEnabled"], true);
                assert_eq!(detail["toggleState"]["autoSubmit"], false);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }
}
