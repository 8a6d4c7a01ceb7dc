// Per-device lifetime stats: merges state reports into cumulative interface counters and
// writes them back to the store every few updates.
//
// A processor belongs to exactly one device session and is not synchronized; the session task
// serializes every call.

mod associations;
mod counters;
mod fields;

pub use associations::get_associations;
pub use counters::{CounterKind, CounterTable};

use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::error::StatsError;
use crate::models::{ConnectionContext, LifetimeStats};
use crate::store::StatsStore;
use counters::merge_counter;
use fields::{key_string, unsigned};

/// Updates allowed between writes; the next update after this many saves synchronously.
pub const DEFAULT_FLUSH_THRESHOLD: u64 = 10;

pub struct StatsProcessor {
    serial_number: String,
    counters: CounterTable,
    dirty_count: u64,
    flush_threshold: u64,
    store: Arc<dyn StatsStore>,
    connection: Option<Arc<ConnectionContext>>,
}

impl StatsProcessor {
    pub fn new(store: Arc<dyn StatsStore>) -> Self {
        Self {
            serial_number: String::new(),
            counters: CounterTable::new(),
            dirty_count: 0,
            flush_threshold: DEFAULT_FLUSH_THRESHOLD,
            store,
            connection: None,
        }
    }

    pub fn with_flush_threshold(mut self, flush_threshold: u64) -> Self {
        self.flush_threshold = flush_threshold;
        self
    }

    /// Attach a live connection record; each accepted report refreshes its association counts.
    pub fn with_connection(mut self, connection: Arc<ConnectionContext>) -> Self {
        self.connection = Some(connection);
        self
    }

    pub fn serial_number(&self) -> &str {
        &self.serial_number
    }

    /// Updates since the last save attempt.
    pub fn dirty_count(&self) -> u64 {
        self.dirty_count
    }

    pub fn counters(&self) -> &CounterTable {
        &self.counters
    }

    /// Resets the processor for `serial_number` and replays any stored lifetime stats.
    ///
    /// Returns true only when a stored blob was found and replayed cleanly. A missing blob or a
    /// failed store read both start the device from empty counters.
    pub async fn initialize(&mut self, serial_number: &str) -> bool {
        self.serial_number = serial_number.to_string();
        self.dirty_count = 0;
        self.counters.clear();

        if serial_number.is_empty() {
            tracing::warn!("initialize called with an empty serial number");
            return false;
        }

        let blob = match self.store.get(serial_number).await {
            Ok(Some(blob)) => blob,
            Ok(None) => {
                tracing::debug!(serial = %serial_number, "no stored lifetime stats");
                return false;
            }
            Err(e) => {
                tracing::warn!(
                    serial = %serial_number,
                    error = %e,
                    operation = "load_lifetime_stats",
                    "lifetime stats load failed; starting empty"
                );
                return false;
            }
        };

        match self.add_str(&blob).await {
            Ok(()) => {
                tracing::debug!(
                    serial = %serial_number,
                    interfaces = self.counters.len(),
                    "lifetime stats restored"
                );
                true
            }
            Err(e) => {
                tracing::warn!(serial = %serial_number, error = %e, "stored lifetime stats unreadable");
                false
            }
        }
    }

    /// Parses a raw state report and merges it. Unparseable text leaves all state untouched.
    pub async fn add_str(&mut self, text: &str) -> Result<(), StatsError> {
        let report: Value = match serde_json::from_str(text) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(serial = %self.serial_number, error = %e, "state report is not valid JSON");
                return Err(e.into());
            }
        };
        self.add(&report).await
    }

    /// Merges a state report into the lifetime counters.
    ///
    /// Interface entries are applied in order. If one is malformed the call fails, but entries
    /// before it stay merged.
    pub async fn add(&mut self, report: &Value) -> Result<(), StatsError> {
        self.dirty_count += 1;

        let Some(interfaces) = report.get("interfaces").and_then(Value::as_array) else {
            tracing::info!(serial = %self.serial_number, "state report is missing interfaces");
            return Err(StatsError::MissingInterfaces);
        };

        if let Err(e) = self.merge_interfaces(interfaces) {
            tracing::warn!(serial = %self.serial_number, error = %e, "state report rejected");
            return Err(e);
        }

        if let Some(connection) = &self.connection {
            let associations = get_associations(report).unwrap_or_default();
            connection.set_associations(associations);
        }

        if self.dirty_count > self.flush_threshold
            && let Err(e) = self.save().await
        {
            tracing::warn!(
                serial = %self.serial_number,
                error = %e,
                operation = "save_lifetime_stats",
                "periodic lifetime stats save failed; will retry"
            );
        }
        Ok(())
    }

    fn merge_interfaces(&mut self, interfaces: &[Value]) -> Result<(), StatsError> {
        for (index, entry) in interfaces.iter().enumerate() {
            let invalid = |reason: &'static str| StatsError::InvalidInterface { index, reason };

            let Some(entry) = entry.as_object() else {
                return Err(invalid("not an object"));
            };
            let Some(name) = entry.get("name").and_then(key_string) else {
                return Err(invalid("missing name"));
            };
            let (kind, values) = match (entry.get("counters"), entry.get("deltas")) {
                (Some(values), _) => (CounterKind::Counters, values),
                (None, Some(values)) => (CounterKind::Deltas, values),
                (None, None) => return Err(invalid("missing counters and deltas")),
            };
            let Some(values) = values.as_object() else {
                return Err(invalid(match kind {
                    CounterKind::Counters => "counters is not an object",
                    CounterKind::Deltas => "deltas is not an object",
                }));
            };

            let counters = self.counters.interface_mut(&name);
            for (counter, value) in values {
                let Some(value) = unsigned(value) else {
                    return Err(StatsError::InvalidCounter {
                        interface: name,
                        counter: counter.clone(),
                    });
                };
                merge_counter(counters, counter, kind, value);
            }
        }
        Ok(())
    }

    /// Writes the current counters to the store.
    ///
    /// The dirty count resets even when the write fails; counters stay in memory and go out
    /// with the next save.
    pub async fn save(&mut self) -> Result<(), StatsError> {
        self.dirty_count = 0;
        if self.serial_number.is_empty() {
            return Err(StatsError::NotInitialized);
        }
        let blob = self.to_json_string();
        self.store
            .set(&self.serial_number, &blob)
            .await
            .map_err(StatsError::Store)?;
        tracing::debug!(
            serial = %self.serial_number,
            interfaces = self.counters.len(),
            operation = "save_lifetime_stats",
            "lifetime stats saved"
        );
        Ok(())
    }

    pub fn lifetime_stats(&self) -> LifetimeStats {
        self.counters.to_lifetime_stats()
    }

    /// Lifetime stats as a JSON object, in the same shape as the stored blob.
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self.lifetime_stats())
            .unwrap_or_else(|_| serde_json::json!({ "interfaces": [] }))
    }

    /// Compact JSON text of [`Self::to_json`]; empty on serialization failure.
    pub fn to_json_string(&self) -> String {
        serde_json::to_string(&self.lifetime_stats()).unwrap_or_default()
    }

    /// Diagnostic dump to stdout.
    pub fn print(&self) {
        print!("{self}");
    }
}

impl fmt::Display for StatsProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (interface, counters) in self.counters.iter() {
            writeln!(f, "Interface: {interface}")?;
            for (name, value) in counters {
                writeln!(f, "     {name}: {value}")?;
            }
        }
        Ok(())
    }
}
