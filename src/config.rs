//! CLI configuration, loaded from YAML.

use serde::{Deserialize, Serialize};
use site_adapter::store::MemoryStore;
use site_adapter::AdapterConfig;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Adapter settings: site profile, timings, popover presentation.
    pub adapter: AdapterConfig,
    /// Capacity of the in-process event bus.
    pub bus_capacity: usize,
    /// Initial preference values for the in-memory store used by `simulate`.
    pub store: StoreSeed,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            adapter: AdapterConfig::default(),
            bus_capacity: 64,
            store: StoreSeed::default(),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), String> {
        self.adapter.validate()?;
        if self.bus_capacity == 0 {
            return Err("bus_capacity must be positive".into());
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSeed {
    pub mcp_enabled: bool,
    pub auto_submit: bool,
}

impl StoreSeed {
    pub fn build(&self) -> MemoryStore {
        MemoryStore::default().with_values(self.mcp_enabled, self.auto_submit)
    }
}
