//! In-memory page model and the selector engine it uses.

pub mod fixture;
pub mod memory;
pub mod selector;

pub use fixture::{ElementSpec, PageFixture};
pub use memory::{DispatchRecord, MemoryDom};
pub use selector::SelectorList;
