//! Popover renderer that records what it was asked to draw.
//!
//! Used by the CLI simulator and tests in place of a real UI framework.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;

use sitehook_core_types::{NodeId, SiteError};

use crate::config::PopoverConfig;
use crate::model::ToggleState;
use crate::ports::PopoverRenderer;
use crate::toggle::ToggleStateManager;

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RenderRecord {
    pub container: NodeId,
    pub initial_state: ToggleState,
    pub button_class: String,
}

#[derive(Default)]
struct RendererState {
    renders: Vec<RenderRecord>,
    unmounts: Vec<NodeId>,
    failures_left: u32,
    bridges: Vec<Arc<ToggleStateManager>>,
}

#[derive(Default)]
pub struct RecordingRenderer {
    state: Mutex<RendererState>,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `times` render calls.
    pub fn fail_times(&self, times: u32) {
        self.state.lock().failures_left = times;
    }

    pub fn renders(&self) -> Vec<RenderRecord> {
        self.state.lock().renders.clone()
    }

    pub fn unmounts(&self) -> Vec<NodeId> {
        self.state.lock().unmounts.clone()
    }

    /// Bridge handed to the most recent successful render.
    pub fn last_bridge(&self) -> Option<Arc<ToggleStateManager>> {
        self.state.lock().bridges.last().cloned()
    }
}

#[async_trait]
impl PopoverRenderer for RecordingRenderer {
    async fn render(
        &self,
        container: NodeId,
        bridge: Arc<ToggleStateManager>,
        config: &PopoverConfig,
    ) -> Result<(), SiteError> {
        let initial_state = bridge.get_state();
        let mut state = self.state.lock();
        if state.failures_left > 0 {
            state.failures_left -= 1;
            return Err(SiteError::new("renderer not ready"));
        }
        debug!(container = %container, "popover rendered");
        state.renders.push(RenderRecord {
            container,
            initial_state,
            button_class: config.classes.button.clone(),
        });
        state.bridges.push(bridge);
        Ok(())
    }

    async fn unmount(&self, container: NodeId) -> Result<(), SiteError> {
        self.state.lock().unmounts.push(container);
        Ok(())
    }
}
