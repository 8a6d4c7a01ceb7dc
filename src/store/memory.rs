// In-process store. Nothing survives a restart.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use super::StatsStore;

#[derive(Debug, Default)]
pub struct MemoryStatsStore {
    blobs: Mutex<HashMap<String, String>>,
    writes: AtomicU64,
}

impl MemoryStatsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful `set` calls since creation.
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl StatsStore for MemoryStatsStore {
    async fn get(&self, serial_number: &str) -> anyhow::Result<Option<String>> {
        let blobs = self
            .blobs
            .lock()
            .map_err(|e| anyhow::anyhow!("memory store lock poisoned: {}", e))?;
        Ok(blobs.get(serial_number).cloned())
    }

    async fn set(&self, serial_number: &str, blob: &str) -> anyhow::Result<()> {
        let mut blobs = self
            .blobs
            .lock()
            .map_err(|e| anyhow::anyhow!("memory store lock poisoned: {}", e))?;
        blobs.insert(serial_number.to_string(), blob.to_string());
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
