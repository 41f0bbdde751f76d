#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use site_adapter::dom::{ElementSpec, MemoryDom, PageFixture};
use site_adapter::render::RecordingRenderer;
use site_adapter::store::MemoryStore;
use site_adapter::{AdapterConfig, HostEvent, SiteAdapter};
use sitehook_core_types::NodeId;
use sitehook_event_bus::{EventBus, InMemoryBus};
use tokio::sync::broadcast;

pub const CHAT_URL: &str = "https://chat.mistral.ai/chat";
pub const CONTAINER_SELECTOR: &str = "#mcp-popover-container";

pub struct Harness {
    pub adapter: SiteAdapter,
    pub dom: Arc<MemoryDom>,
    pub store: Arc<MemoryStore>,
    pub renderer: Arc<RecordingRenderer>,
    pub bus: Arc<InMemoryBus<HostEvent>>,
    pub events: broadcast::Receiver<HostEvent>,
}

impl Harness {
    pub fn new(fixture: PageFixture) -> Self {
        let dom = Arc::new(MemoryDom::from_fixture(&fixture));
        let store = Arc::new(MemoryStore::default());
        let renderer = Arc::new(RecordingRenderer::new());
        let bus = InMemoryBus::<HostEvent>::new(64);
        let events = bus.subscribe();
        let adapter = SiteAdapter::builder(AdapterConfig::default())
            .with_dom(dom.clone())
            .with_store(store.clone())
            .with_renderer(renderer.clone())
            .with_bus(bus.clone())
            .build()
            .expect("adapter builds");
        Self {
            adapter,
            dom,
            store,
            renderer,
            bus,
            events,
        }
    }

    /// Events published since the last call.
    pub fn drain(&mut self) -> Vec<HostEvent> {
        let mut out = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            out.push(event);
        }
        out
    }

    pub fn container(&self) -> Option<NodeId> {
        self.dom.find_first(CONTAINER_SELECTOR)
    }
}

/// Composer as the chat page renders it: a form holding the prompt textarea,
/// an attachment button and the send button.
pub fn chat_page() -> PageFixture {
    PageFixture {
        url: CHAT_URL.into(),
        body: vec![ElementSpec::new("main").child(
            ElementSpec::new("form")
                .class("composer")
                .child(
                    ElementSpec::new("textarea")
                        .id("prompt")
                        .attr("placeholder", "Ask le Chat"),
                )
                .child(
                    ElementSpec::new("button")
                        .id("attach")
                        .attr("type", "button"),
                )
                .child(
                    ElementSpec::new("button")
                        .id("send")
                        .attr("type", "submit")
                        .attr("aria-label", "Send question"),
                ),
        )],
    }
}

pub fn page(url: &str, body: Vec<ElementSpec>) -> PageFixture {
    PageFixture {
        url: url.into(),
        body,
    }
}

pub async fn advance(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}
