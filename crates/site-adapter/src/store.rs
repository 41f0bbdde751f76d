//! Host preference store port and an in-memory implementation.

use bitflags::bitflags;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use sitehook_core_types::SiteError;

bitflags! {
    /// Optional write operations a store declares it supports.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct StoreCapabilities: u8 {
        const SET_MCP_ENABLED = 0b0001;
        const SET_SIDEBAR_VISIBILITY = 0b0010;
        const UPDATE_PREFERENCES = 0b0100;
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UiPreferences {
    pub auto_submit: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PreferencesPatch {
    pub auto_submit: Option<bool>,
}

/// Read/write surface of the host UI store.
///
/// Only the read side is mandatory. Writers are used when [`capabilities`]
/// lists them; the defaults report the operation as unsupported.
///
/// [`capabilities`]: PreferenceStore::capabilities
pub trait PreferenceStore: Send + Sync {
    fn capabilities(&self) -> StoreCapabilities;
    fn mcp_enabled(&self) -> Result<bool, SiteError>;
    fn preferences(&self) -> Result<UiPreferences, SiteError>;

    fn set_mcp_enabled(&self, _enabled: bool, _reason: &str) -> Result<(), SiteError> {
        Err(SiteError::new("set_mcp_enabled not supported"))
    }

    fn set_sidebar_visibility(&self, _visible: bool, _reason: &str) -> Result<(), SiteError> {
        Err(SiteError::new("set_sidebar_visibility not supported"))
    }

    fn update_preferences(&self, _patch: PreferencesPatch) -> Result<(), SiteError> {
        Err(SiteError::new("update_preferences not supported"))
    }
}

#[derive(Clone, Debug, Default)]
struct MemoryStoreState {
    mcp_enabled: bool,
    sidebar_visible: bool,
    preferences: UiPreferences,
    writes: Vec<String>,
    failing_reads: bool,
}

/// Store kept in process memory; capabilities are chosen at construction.
#[derive(Debug)]
pub struct MemoryStore {
    capabilities: StoreCapabilities,
    state: Mutex<MemoryStoreState>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(StoreCapabilities::all())
    }
}

impl MemoryStore {
    pub fn new(capabilities: StoreCapabilities) -> Self {
        Self {
            capabilities,
            state: Mutex::new(MemoryStoreState::default()),
        }
    }

    pub fn with_values(self, mcp_enabled: bool, auto_submit: bool) -> Self {
        {
            let mut state = self.state.lock();
            state.mcp_enabled = mcp_enabled;
            state.preferences.auto_submit = auto_submit;
        }
        self
    }

    /// Make every read fail, as a store that is not hydrated yet would.
    pub fn fail_reads(&self, failing: bool) {
        self.state.lock().failing_reads = failing;
    }

    pub fn sidebar_visible(&self) -> bool {
        self.state.lock().sidebar_visible
    }

    /// Names of the write operations performed, oldest first.
    pub fn writes(&self) -> Vec<String> {
        self.state.lock().writes.clone()
    }

    fn ensure_readable(state: &MemoryStoreState) -> Result<(), SiteError> {
        if state.failing_reads {
            return Err(SiteError::new("store not ready"));
        }
        Ok(())
    }
}

impl PreferenceStore for MemoryStore {
    fn capabilities(&self) -> StoreCapabilities {
        self.capabilities
    }

    fn mcp_enabled(&self) -> Result<bool, SiteError> {
        let state = self.state.lock();
        Self::ensure_readable(&state)?;
        Ok(state.mcp_enabled)
    }

    fn preferences(&self) -> Result<UiPreferences, SiteError> {
        let state = self.state.lock();
        Self::ensure_readable(&state)?;
        Ok(state.preferences.clone())
    }

    fn set_mcp_enabled(&self, enabled: bool, reason: &str) -> Result<(), SiteError> {
        if !self.capabilities.contains(StoreCapabilities::SET_MCP_ENABLED) {
            return Err(SiteError::new("set_mcp_enabled not supported"));
        }
        let mut state = self.state.lock();
        state.mcp_enabled = enabled;
        state.writes.push(format!("set_mcp_enabled({enabled}, {reason})"));
        Ok(())
    }

    fn set_sidebar_visibility(&self, visible: bool, reason: &str) -> Result<(), SiteError> {
        if !self
            .capabilities
            .contains(StoreCapabilities::SET_SIDEBAR_VISIBILITY)
        {
            return Err(SiteError::new("set_sidebar_visibility not supported"));
        }
        let mut state = self.state.lock();
        state.sidebar_visible = visible;
        state.mcp_enabled = visible;
        state
            .writes
            .push(format!("set_sidebar_visibility({visible}, {reason})"));
        Ok(())
    }

    fn update_preferences(&self, patch: PreferencesPatch) -> Result<(), SiteError> {
        if !self
            .capabilities
            .contains(StoreCapabilities::UPDATE_PREFERENCES)
        {
            return Err(SiteError::new("update_preferences not supported"));
        }
        let mut state = self.state.lock();
        if let Some(auto_submit) = patch.auto_submit {
            state.preferences.auto_submit = auto_submit;
        }
        state.writes.push(format!("update_preferences({patch:?})"));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn undeclared_writers_are_rejected() {
        let store = MemoryStore::new(StoreCapabilities::SET_SIDEBAR_VISIBILITY);
        assert!(store.set_mcp_enabled(true, "test").is_err());
        store.set_sidebar_visibility(true, "test").unwrap();
        assert!(store.mcp_enabled().unwrap());
        assert!(store.sidebar_visible());
    }

    #[test]
    fn failing_reads_surface_errors() {
        let store = MemoryStore::default().with_values(true, true);
        store.fail_reads(true);
        assert!(store.mcp_enabled().is_err());
        assert!(store.preferences().is_err());
    }
}
