use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::Args;
use serde::Serialize;
use site_adapter::dom::{MemoryDom, PageFixture};
use site_adapter::render::RecordingRenderer;
use site_adapter::{
    find_first_match, poll_until, AdapterState, HostEvent, MountStatus, PollPolicy, SiteAdapter,
    TokioClock, ToggleState,
};
use sitehook_event_bus::{EventBus, InMemoryBus};
use tokio::fs;
use tracing::{debug, info};

use crate::cli::context::CliContext;

const STATUS_POLL_MS: u64 = 50;

#[derive(Args, Clone, Debug)]
pub struct SimulateArgs {
    /// YAML page fixture to load into the in-memory DOM
    pub fixture: PathBuf,

    /// Text to insert into the chat input
    #[arg(long)]
    pub insert: Option<String>,

    /// Submit the chat form after the insertion
    #[arg(long)]
    pub submit: bool,

    /// Turn MCP on through the popover settings bridge
    #[arg(long)]
    pub enable_mcp: bool,
}

#[derive(Debug, Serialize)]
pub struct SimulationReport {
    pub state: AdapterState,
    pub mount_status: MountStatus,
    pub toggle_state: ToggleState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insert: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submit: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_content: Option<String>,
    pub events: Vec<HostEvent>,
}

pub async fn cmd_simulate(args: SimulateArgs, ctx: &CliContext) -> Result<()> {
    let report = run_simulation(&args, ctx).await?;

    if let Some(rendered) = ctx.output().render(&report)? {
        println!("{rendered}");
        return Ok(());
    }

    println!("Simulation of {}", args.fixture.display());
    println!("- State: {}", report.state);
    println!("- Mount: {:?}", report.mount_status);
    println!(
        "- Toggles: mcp={} auto_insert={} auto_submit={}",
        report.toggle_state.mcp_enabled,
        report.toggle_state.auto_insert,
        report.toggle_state.auto_submit
    );
    if let Some(ok) = report.insert {
        println!("- Insert: {}", if ok { "ok" } else { "failed" });
    }
    if let Some(ok) = report.submit {
        println!("- Submit: {}", if ok { "ok" } else { "failed" });
    }
    if let Some(content) = &report.input_content {
        println!("- Input content: {content:?}");
    }
    println!("- Events: {}", report.events.len());
    for event in &report.events {
        println!("  - {}", sitehook_event_bus::Event::topic(event));
    }
    Ok(())
}

async fn run_simulation(args: &SimulateArgs, ctx: &CliContext) -> Result<SimulationReport> {
    let config = ctx.config();
    let raw = fs::read_to_string(&args.fixture)
        .await
        .with_context(|| format!("reading {}", args.fixture.display()))?;
    let fixture: PageFixture = serde_yaml::from_str(&raw)
        .with_context(|| format!("parsing {}", args.fixture.display()))?;

    let dom = Arc::new(MemoryDom::from_fixture(&fixture));
    let bus = InMemoryBus::<HostEvent>::new(config.bus_capacity);
    let mut events = bus.subscribe();
    let adapter = SiteAdapter::builder(config.adapter.clone())
        .with_dom(dom.clone())
        .with_store(Arc::new(config.store.build()))
        .with_renderer(Arc::new(RecordingRenderer::new()))
        .with_bus(bus.clone())
        .build()?;

    info!(url = %fixture.url, "activating adapter");
    adapter.activate().await?;

    let mount_status = wait_for_mount(&adapter, ctx).await;
    debug!(status = ?mount_status, "mount settled");

    if args.enable_mcp {
        let path = adapter.toggle().set_mcp_enabled(true).await?;
        debug!(?path, "mcp enabled");
    }

    let insert = match &args.insert {
        Some(text) => Some(adapter.insert_text(text, None).await),
        None => None,
    };
    let submit = if args.submit {
        Some(adapter.submit_form().await)
    } else {
        None
    };

    let input_content =
        match find_first_match(dom.as_ref(), &config.adapter.site.chat_input_selectors).await {
            Ok(Some(node)) => dom.content_of(node),
            Ok(None) => None,
            Err(err) => return Err(anyhow!("locating chat input: {err}")),
        };

    let state = adapter.state();
    let toggle_state = adapter.toggle().get_state();
    adapter.cleanup().await?;

    let mut collected = Vec::new();
    while let Ok(event) = events.try_recv() {
        collected.push(event);
    }

    Ok(SimulationReport {
        state,
        mount_status,
        toggle_state,
        insert,
        submit,
        input_content,
        events: collected,
    })
}

/// Poll until the background mount either lands or gives up.
async fn wait_for_mount(adapter: &SiteAdapter, ctx: &CliContext) -> MountStatus {
    let timings = &ctx.config().adapter.timings;
    let budget = timings.page_ready.worst_case() + timings.inject.worst_case();
    let attempts = (budget.as_millis() as u64 / STATUS_POLL_MS) as u32 + 20;
    let policy = PollPolicy::new(0, STATUS_POLL_MS, attempts);
    let outcome = poll_until(&TokioClock, &policy, |_| async move {
        let status = adapter.mount_status();
        match status {
            MountStatus::Mounted { .. } | MountStatus::Abandoned { .. } => Some(status),
            _ => None,
        }
    })
    .await;
    outcome.into_value().unwrap_or_else(|| adapter.mount_status())
}
