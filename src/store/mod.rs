// Persistent store for lifetime stats blobs, keyed by device serial number.
// The engine only needs get/set; SQLite backs the gateway, memory backs tests and tooling.

mod memory;
mod sqlite;

pub use memory::MemoryStatsStore;
pub use sqlite::SqliteStatsStore;

use async_trait::async_trait;

#[async_trait]
pub trait StatsStore: Send + Sync {
    /// Returns the stored blob, or `None` if the device has no lifetime stats yet.
    async fn get(&self, serial_number: &str) -> anyhow::Result<Option<String>>;

    /// Replaces the stored blob for the device.
    async fn set(&self, serial_number: &str, blob: &str) -> anyhow::Result<()>;
}
