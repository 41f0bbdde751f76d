//! Site adapter for a single chat web page.
//!
//! The adapter mounts a companion popover next to the page's chat composer,
//! inserts text into the chat input, and submits it. The page, the host's
//! preference store, the popover renderer and the optional sidebar are all
//! reached through the ports in [`ports`] and [`store`]; [`dom::MemoryDom`],
//! [`store::MemoryStore`] and [`render::RecordingRenderer`] implement them in
//! memory.

pub mod adapter;
pub mod config;
pub mod dom;
pub mod errors;
pub mod events;
pub mod metrics;
pub mod model;
pub mod mount;
pub mod plugin;
pub mod poll;
pub mod ports;
pub mod render;
pub mod store;
pub mod toggle;

mod insert;
mod submit;

pub use adapter::{hostname_of, SiteAdapter, SiteAdapterBuilder};
pub use config::{AdapterConfig, AdapterTimings, PopoverConfig, SiteProfile};
pub use errors::{AdapterError, AdapterResult, FailureKind};
pub use events::{HostBus, HostEvent};
pub use insert::{combine_content, find_first_match};
pub use model::{
    AdapterCapability, AdapterState, InsertReport, InsertionPoint, MountFailure, MountStatus,
    SubmitMethod, SubmitReport, ToggleState,
};
pub use plugin::AdapterPlugin;
pub use poll::{poll_until, Clock, PollOutcome, PollPolicy, TokioClock};
pub use toggle::{McpWritePath, ToggleStateManager};
