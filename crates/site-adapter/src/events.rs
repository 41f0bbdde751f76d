use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use sitehook_event_bus::{Event, EventBus};

use crate::errors::{AdapterError, FailureKind};
use crate::poll::Clock;

pub const TOPIC_ADAPTER_ACTIVATED: &str = "adapter:activated";
pub const TOPIC_ADAPTER_DEACTIVATED: &str = "adapter:deactivated";
pub const TOPIC_SITE_CHANGED: &str = "app:site-changed";
pub const TOPIC_TOOL_COMPLETED: &str = "tool:execution-completed";
pub const TOPIC_TOOL_FAILED: &str = "tool:execution-failed";

/// Events exchanged with the host over the bus.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "topic", content = "payload")]
pub enum HostEvent {
    #[serde(rename = "adapter:activated")]
    AdapterActivated(LifecyclePayload),
    #[serde(rename = "adapter:deactivated")]
    AdapterDeactivated(LifecyclePayload),
    #[serde(rename = "app:site-changed")]
    SiteChanged(SiteChangedPayload),
    #[serde(rename = "tool:execution-completed")]
    ToolCompleted(ToolCompletedPayload),
    #[serde(rename = "tool:execution-failed")]
    ToolFailed(ToolFailedPayload),
}

impl Event for HostEvent {
    fn topic(&self) -> &str {
        match self {
            HostEvent::AdapterActivated(_) => TOPIC_ADAPTER_ACTIVATED,
            HostEvent::AdapterDeactivated(_) => TOPIC_ADAPTER_DEACTIVATED,
            HostEvent::SiteChanged(_) => TOPIC_SITE_CHANGED,
            HostEvent::ToolCompleted(_) => TOPIC_TOOL_COMPLETED,
            HostEvent::ToolFailed(_) => TOPIC_TOOL_FAILED,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LifecyclePayload {
    pub plugin_name: String,
    pub site_id: String,
    pub timestamp: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteChangedPayload {
    pub site: String,
    pub hostname: String,
    pub supported: bool,
    pub timestamp: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCompletedPayload {
    pub plugin_name: String,
    pub tool_name: String,
    pub parameters: serde_json::Value,
    pub result: serde_json::Value,
    pub timestamp: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolFailedPayload {
    pub plugin_name: String,
    pub tool_name: String,
    pub kind: FailureKind,
    pub error: String,
    pub timestamp: i64,
}

pub type HostBus = Arc<dyn EventBus<HostEvent>>;

/// Publishes the adapter's notifications. Delivery problems are logged, never returned.
#[derive(Clone)]
pub struct AdapterEvents {
    bus: HostBus,
    clock: Arc<dyn Clock>,
    plugin_name: String,
}

impl AdapterEvents {
    pub fn new(bus: HostBus, clock: Arc<dyn Clock>, plugin_name: impl Into<String>) -> Self {
        Self {
            bus,
            clock,
            plugin_name: plugin_name.into(),
        }
    }

    pub fn bus(&self) -> &HostBus {
        &self.bus
    }

    async fn publish(&self, event: HostEvent) {
        let topic = event.topic().to_string();
        if let Err(err) = self.bus.publish(event).await {
            debug!(topic = %topic, error = %err, "event delivery failed");
        }
    }

    fn lifecycle(&self, site_id: &str) -> LifecyclePayload {
        LifecyclePayload {
            plugin_name: self.plugin_name.clone(),
            site_id: site_id.to_string(),
            timestamp: self.clock.now_millis(),
        }
    }

    pub async fn emit_activated(&self, site_id: &str) {
        self.publish(HostEvent::AdapterActivated(self.lifecycle(site_id)))
            .await;
    }

    pub async fn emit_deactivated(&self, site_id: &str) {
        self.publish(HostEvent::AdapterDeactivated(self.lifecycle(site_id)))
            .await;
    }

    pub async fn emit_site_changed(&self, url: &str, hostname: &str, supported: bool) {
        self.publish(HostEvent::SiteChanged(SiteChangedPayload {
            site: url.to_string(),
            hostname: hostname.to_string(),
            supported,
            timestamp: self.clock.now_millis(),
        }))
        .await;
    }

    pub async fn emit_completed(
        &self,
        tool: &str,
        parameters: serde_json::Value,
        result: serde_json::Value,
    ) {
        self.publish(HostEvent::ToolCompleted(ToolCompletedPayload {
            plugin_name: self.plugin_name.clone(),
            tool_name: tool.to_string(),
            parameters,
            result,
            timestamp: self.clock.now_millis(),
        }))
        .await;
    }

    pub async fn emit_failed(&self, tool: &str, err: &AdapterError) {
        self.publish(HostEvent::ToolFailed(ToolFailedPayload {
            plugin_name: self.plugin_name.clone(),
            tool_name: tool.to_string(),
            kind: err.failure_kind(),
            error: err.to_string(),
            timestamp: self.clock.now_millis(),
        }))
        .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_under_their_topic() {
        let event = HostEvent::AdapterActivated(LifecyclePayload {
            plugin_name: "mistral-adapter".into(),
            site_id: "chat.mistral.ai".into(),
            timestamp: 1,
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["topic"], "adapter:activated");
        assert_eq!(json["payload"]["pluginName"], "mistral-adapter");
        assert_eq!(event.topic(), TOPIC_ADAPTER_ACTIVATED);
    }
}
