// Lifetime stats blob: the persisted and externally reported shape of a device's counters.
// {"interfaces":[{"name":"eth0","counters":{"rx_bytes":150}}]}

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifetimeStats {
    pub interfaces: Vec<InterfaceCounters>,
}

/// Counters for one interface, in first-seen order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceCounters {
    pub name: String,
    pub counters: IndexMap<String, u64>,
}

impl LifetimeStats {
    pub fn interface(&self, name: &str) -> Option<&InterfaceCounters> {
        self.interfaces.iter().find(|i| i.name == name)
    }
}
