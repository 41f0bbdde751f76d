use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use sitehook_core_types::{NodeId, Rect, SiteError};

use crate::config::PopoverConfig;
use crate::model::ElementContent;
use crate::toggle::ToggleStateManager;

/// Synthetic events the adapter dispatches into the page.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomEvent {
    /// `InputEvent('input', { inputType, data })`.
    Input { input_type: String, data: String },
    /// `Event('change')`.
    Change,
    Key {
        phase: KeyPhase,
        key: String,
        code: String,
        key_code: u32,
    },
    /// `CustomEvent(name, { detail })`.
    Custom {
        name: String,
        detail: serde_json::Value,
    },
}

impl DomEvent {
    pub fn insert_text(data: impl Into<String>) -> Self {
        DomEvent::Input {
            input_type: "insertText".into(),
            data: data.into(),
        }
    }

    pub fn enter(phase: KeyPhase) -> Self {
        DomEvent::Key {
            phase,
            key: "Enter".into(),
            code: "Enter".into(),
            key_code: 13,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyPhase {
    Keydown,
    Keypress,
    Keyup,
}

/// childList change observed below the document body.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DomMutation {
    pub target: NodeId,
    pub added: Vec<NodeId>,
    pub removed: Vec<NodeId>,
}

/// Live page access. Implementations run against a real page (CDP, content script)
/// or against [`crate::dom::MemoryDom`].
#[async_trait]
pub trait DomPort: Send + Sync {
    async fn current_url(&self) -> Result<String, SiteError>;
    async fn body(&self) -> Result<NodeId, SiteError>;
    /// First match in document order below `scope` (the whole document when `None`).
    async fn query_selector(
        &self,
        scope: Option<NodeId>,
        selector: &str,
    ) -> Result<Option<NodeId>, SiteError>;
    async fn query_selector_all(
        &self,
        scope: Option<NodeId>,
        selector: &str,
    ) -> Result<Vec<NodeId>, SiteError>;
    async fn element_by_id(&self, id: &str) -> Result<Option<NodeId>, SiteError>;
    async fn closest(&self, node: NodeId, selector: &str) -> Result<Option<NodeId>, SiteError>;
    async fn parent(&self, node: NodeId) -> Result<Option<NodeId>, SiteError>;
    async fn attribute(&self, node: NodeId, name: &str) -> Result<Option<String>, SiteError>;
    async fn bounding_box(&self, node: NodeId) -> Result<Rect, SiteError>;
    async fn content(&self, node: NodeId) -> Result<ElementContent, SiteError>;
    async fn focus(&self, node: NodeId) -> Result<(), SiteError>;
    async fn select_all(&self, node: NodeId) -> Result<(), SiteError>;
    async fn click(&self, node: NodeId) -> Result<(), SiteError>;
    async fn dispatch(&self, node: NodeId, event: DomEvent) -> Result<(), SiteError>;
    async fn create_element(
        &self,
        tag: &str,
        id: Option<&str>,
        style: Option<&str>,
    ) -> Result<NodeId, SiteError>;
    async fn insert_after(&self, reference: NodeId, node: NodeId) -> Result<(), SiteError>;
    async fn append_child(&self, parent: NodeId, node: NodeId) -> Result<(), SiteError>;
    async fn remove(&self, node: NodeId) -> Result<(), SiteError>;
    /// Subscribe to childList mutations on the body subtree.
    fn observe_mutations(&self) -> broadcast::Receiver<DomMutation>;
}

/// Rendering framework that draws the popover into its container.
#[async_trait]
pub trait PopoverRenderer: Send + Sync {
    async fn render(
        &self,
        container: NodeId,
        bridge: Arc<ToggleStateManager>,
        config: &PopoverConfig,
    ) -> Result<(), SiteError>;
    async fn unmount(&self, container: NodeId) -> Result<(), SiteError>;
}

/// Host sidebar that follows the MCP enabled switch.
#[async_trait]
pub trait SidebarManager: Send + Sync {
    async fn show(&self) -> Result<(), SiteError>;
    async fn hide(&self) -> Result<(), SiteError>;
}

/// Registration point for the sidebar manager, which the host may install late.
#[derive(Clone, Default)]
pub struct SidebarSlot {
    inner: Arc<RwLock<Option<Arc<dyn SidebarManager>>>>,
}

impl SidebarSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, manager: Arc<dyn SidebarManager>) {
        *self.inner.write() = Some(manager);
    }

    pub fn get(&self) -> Option<Arc<dyn SidebarManager>> {
        self.inner.read().clone()
    }
}
