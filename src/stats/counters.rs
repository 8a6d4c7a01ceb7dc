// Per-interface counter table. Both levels keep first-seen insertion order so the serialized
// blob is deterministic.

use indexmap::IndexMap;

use crate::models::{InterfaceCounters, LifetimeStats};

/// Which sub-object of an interface entry the values came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterKind {
    Counters,
    Deltas,
}

impl CounterKind {
    /// Folds a reported value into an existing accumulator.
    ///
    /// Devices do not say whether `counters` are absolute or incremental, so both kinds are
    /// added. If `counters` turns out to be absolute, this is where it would replace instead.
    pub fn merge(self, accumulated: u64, reported: u64) -> u64 {
        match self {
            CounterKind::Counters | CounterKind::Deltas => accumulated.saturating_add(reported),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CounterTable {
    interfaces: IndexMap<String, IndexMap<String, u64>>,
}

impl CounterTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counter map for `interface`, created empty on first use.
    pub(crate) fn interface_mut(&mut self, interface: &str) -> &mut IndexMap<String, u64> {
        self.interfaces.entry(interface.to_string()).or_default()
    }

    pub fn interface(&self, interface: &str) -> Option<&IndexMap<String, u64>> {
        self.interfaces.get(interface)
    }

    pub fn get(&self, interface: &str, counter: &str) -> Option<u64> {
        self.interfaces.get(interface)?.get(counter).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &IndexMap<String, u64>)> {
        self.interfaces.iter()
    }

    pub fn len(&self) -> usize {
        self.interfaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interfaces.is_empty()
    }

    pub fn clear(&mut self) {
        self.interfaces.clear();
    }

    pub fn to_lifetime_stats(&self) -> LifetimeStats {
        LifetimeStats {
            interfaces: self
                .interfaces
                .iter()
                .map(|(name, counters)| InterfaceCounters {
                    name: name.clone(),
                    counters: counters.clone(),
                })
                .collect(),
        }
    }
}

/// Sets a new counter to `reported`, otherwise merges it per `kind`.
pub(crate) fn merge_counter(
    counters: &mut IndexMap<String, u64>,
    counter: &str,
    kind: CounterKind,
    reported: u64,
) {
    match counters.get_mut(counter) {
        Some(accumulated) => *accumulated = kind.merge(*accumulated, reported),
        None => {
            counters.insert(counter.to_string(), reported);
        }
    }
}
