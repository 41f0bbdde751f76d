use std::fmt;

use serde::{Deserialize, Serialize};
use sitehook_core_types::NodeId;

/// Lifecycle state driven by the host plugin contract.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterState {
    Uninitialized,
    Initializing,
    Active,
    Inactive,
    Disabled,
}

impl Default for AdapterState {
    fn default() -> Self {
        AdapterState::Uninitialized
    }
}

impl fmt::Display for AdapterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AdapterState::Uninitialized => "uninitialized",
            AdapterState::Initializing => "initializing",
            AdapterState::Active => "active",
            AdapterState::Inactive => "inactive",
            AdapterState::Disabled => "disabled",
        };
        f.write_str(label)
    }
}

/// Capability tags advertised to the host orchestrator.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AdapterCapability {
    TextInsertion,
    FormSubmission,
    DomManipulation,
    UrlNavigation,
}

impl AdapterCapability {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdapterCapability::TextInsertion => "text-insertion",
            AdapterCapability::FormSubmission => "form-submission",
            AdapterCapability::DomManipulation => "dom-manipulation",
            AdapterCapability::UrlNavigation => "url-navigation",
        }
    }
}

/// Settings bundle surfaced to the popover.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleState {
    pub mcp_enabled: bool,
    pub auto_insert: bool,
    pub auto_submit: bool,
    pub auto_execute: bool,
}

/// Where the popover container goes: inside `container`, right after `anchor` when present.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct InsertionPoint {
    pub container: NodeId,
    pub anchor: Option<NodeId>,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MountStatus {
    Idle,
    WaitingForPage,
    Mounting { attempt: u32 },
    Mounted { container: NodeId },
    Abandoned { reason: MountFailure },
    Unmounted,
}

impl Default for MountStatus {
    fn default() -> Self {
        MountStatus::Idle
    }
}

impl MountStatus {
    pub fn is_mounted(&self) -> bool {
        matches!(self, MountStatus::Mounted { .. })
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MountFailure {
    /// No insertion point appeared while waiting for the page.
    PageNotReady,
    /// Every injection attempt failed.
    InjectionExhausted,
}

/// Current content of an editable element.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ElementContent {
    /// Form field exposing `.value`.
    Value(String),
    /// Rich-text / contenteditable exposing `.textContent`.
    Text(String),
}

impl ElementContent {
    pub fn as_str(&self) -> &str {
        match self {
            ElementContent::Value(v) | ElementContent::Text(v) => v,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum SubmitMethod {
    #[serde(rename = "button.click")]
    ButtonClick,
    #[serde(rename = "enterKey")]
    EnterKey,
}

impl SubmitMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmitMethod::ButtonClick => "button.click",
            SubmitMethod::EnterKey => "enterKey",
        }
    }
}

pub const INSERT_METHOD: &str = "insertText";

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertReport {
    pub target: NodeId,
    pub original_length: usize,
    pub new_length: usize,
    pub method: String,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct SubmitReport {
    pub method: SubmitMethod,
    pub target: NodeId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggle_state_serializes_camel_case() {
        let state = ToggleState {
            mcp_enabled: true,
            auto_insert: false,
            auto_submit: true,
            auto_execute: false,
        };
        let json = serde_json::to_value(state).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "mcpEnabled": true,
                "autoInsert": false,
                "autoSubmit": true,
                "autoExecute": false
            })
        );
    }

    #[test]
    fn submit_method_tags() {
        assert_eq!(SubmitMethod::ButtonClick.as_str(), "button.click");
        assert_eq!(
            serde_json::to_value(SubmitMethod::EnterKey).unwrap(),
            serde_json::json!("enterKey")
        );
    }
}
