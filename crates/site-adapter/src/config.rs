//! Adapter configuration: site profile, timings and popover presentation.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::dom::SelectorList;
use crate::poll::PollPolicy;

pub const POPOVER_CONTAINER_ID: &str = "mcp-popover-container";
pub const TOGGLE_STATE_EVENT: &str = "mcp:update-toggle-state";

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AdapterConfig {
    pub name: String,
    pub version: String,
    pub site: SiteProfile,
    pub timings: AdapterTimings,
    pub popover: PopoverConfig,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            name: "mistral-adapter".into(),
            version: "1.0.0".into(),
            site: SiteProfile::default(),
            timings: AdapterTimings::default(),
            popover: PopoverConfig::default(),
        }
    }
}

impl AdapterConfig {
    /// Reject configurations the adapter cannot work with.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("adapter name must not be empty".into());
        }
        if self.site.domain.trim().is_empty() {
            return Err("site.domain must not be empty".into());
        }
        if self.site.chat_input_selectors.is_empty() {
            return Err("site.chat_input_selectors must list at least one selector".into());
        }
        for selector in self
            .site
            .chat_input_selectors
            .iter()
            .chain(self.site.submit_button_selectors.iter())
        {
            SelectorList::parse(selector).map_err(|err| err.to_string())?;
        }
        if self.popover.container_id.trim().is_empty() {
            return Err("popover.container_id must not be empty".into());
        }
        if self.timings.url_poll_interval_ms == 0 {
            return Err("timings.url_poll_interval_ms must be positive".into());
        }
        for (label, policy) in [
            ("page_ready", &self.timings.page_ready),
            ("inject", &self.timings.inject),
        ] {
            if policy.max_attempts == 0 {
                return Err(format!("timings.{label}.max_attempts must be positive"));
            }
        }
        Ok(())
    }
}

/// Everything that is specific to the chat site being adapted.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteProfile {
    /// Substring a hostname must contain for the adapter to consider it supported.
    pub domain: String,
    pub hostnames: Vec<String>,
    /// Chat input candidates, most specific first.
    pub chat_input_selectors: Vec<String>,
    /// Submit control candidates, most specific first.
    pub submit_button_selectors: Vec<String>,
}

impl Default for SiteProfile {
    fn default() -> Self {
        Self {
            domain: "chat.mistral.ai".into(),
            hostnames: vec!["chat.mistral.ai".into()],
            chat_input_selectors: vec![
                "textarea[placeholder*=\"Ask\"]".into(),
                "div.ProseMirror[contenteditable=\"true\"]".into(),
                "div[contenteditable=\"true\"]".into(),
                "textarea".into(),
            ],
            submit_button_selectors: vec![
                "button[aria-label=\"Send question\"]".into(),
                "button[aria-label*=\"Send\"]".into(),
                "form button[type=\"submit\"]".into(),
                "button[type=\"submit\"]".into(),
            ],
        }
    }
}

impl SiteProfile {
    pub fn supports_host(&self, hostname: &str) -> bool {
        !self.domain.is_empty() && hostname.contains(self.domain.as_str())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AdapterTimings {
    pub url_poll_interval_ms: u64,
    pub page_ready: PollPolicy,
    pub inject: PollPolicy,
    pub navigation_settle_ms: u64,
}

impl Default for AdapterTimings {
    fn default() -> Self {
        Self {
            url_poll_interval_ms: 1000,
            page_ready: PollPolicy::new(100, 500, 5),
            inject: PollPolicy::new(0, 1000, 5),
            navigation_settle_ms: 800,
        }
    }
}

impl AdapterTimings {
    pub fn url_poll_interval(&self) -> Duration {
        Duration::from_millis(self.url_poll_interval_ms)
    }

    pub fn navigation_settle(&self) -> Duration {
        Duration::from_millis(self.navigation_settle_ms)
    }
}

/// Static presentation handed to the popover renderer.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PopoverConfig {
    pub container_id: String,
    pub container_style: String,
    pub classes: PopoverClasses,
}

impl Default for PopoverConfig {
    fn default() -> Self {
        Self {
            container_id: POPOVER_CONTAINER_ID.into(),
            container_style: "display: inline-flex; align-items: center; margin: 0 4px;".into(),
            classes: PopoverClasses::default(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PopoverClasses {
    pub button: String,
    pub content: String,
    pub toggle: String,
}

impl Default for PopoverClasses {
    fn default() -> Self {
        Self {
            button: "mcp-popover-button".into(),
            content: "mcp-popover-content".into(),
            toggle: "mcp-popover-toggle".into(),
        }
    }
}
