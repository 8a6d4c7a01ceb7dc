// Shared test helpers
#![allow(dead_code)]

use async_trait::async_trait;
use fleetgw::store::{MemoryStatsStore, StatsStore};
use serde_json::{Value, json};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::time::Duration;

/// `{"interfaces":[{"name":<interface>,"counters":{<counter>:<value>}}]}`
pub fn counters_report(interface: &str, counter: &str, value: u64) -> Value {
    json!({
        "interfaces": [
            { "name": interface, "counters": { counter: value } }
        ]
    })
}

/// One radio on `channel` and one SSID on that radio with `clients` associations.
pub fn wifi_report(phy: &str, channel: Value, clients: usize) -> Value {
    let associations: Vec<Value> = (0..clients)
        .map(|i| json!({ "station": format!("00:11:22:33:44:{:02x}", i) }))
        .collect();
    json!({
        "radios": [ { "phy": phy, "channel": channel } ],
        "interfaces": [
            {
                "name": "up0v0",
                "counters": { "rx_bytes": 10 },
                "ssids": [ { "phy": phy, "ssid": "fleet", "associations": associations } ]
            }
        ]
    })
}

/// Memory store whose reads and writes can be made to fail.
#[derive(Default)]
pub struct FlakyStore {
    pub inner: MemoryStatsStore,
    pub fail_reads: AtomicBool,
    pub fail_writes: AtomicBool,
    pub failed_writes: AtomicU64,
}

impl FlakyStore {
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::Relaxed);
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::Relaxed);
    }
}

#[async_trait]
impl StatsStore for FlakyStore {
    async fn get(&self, serial_number: &str) -> anyhow::Result<Option<String>> {
        if self.fail_reads.load(Ordering::Relaxed) {
            anyhow::bail!("read unavailable");
        }
        self.inner.get(serial_number).await
    }

    async fn set(&self, serial_number: &str, blob: &str) -> anyhow::Result<()> {
        if self.fail_writes.load(Ordering::Relaxed) {
            self.failed_writes.fetch_add(1, Ordering::Relaxed);
            anyhow::bail!("write unavailable");
        }
        self.inner.set(serial_number, blob).await
    }
}

/// Memory store whose writes take `delay` to land.
pub struct SlowStore {
    pub inner: MemoryStatsStore,
    delay: Duration,
}

impl SlowStore {
    pub fn new(delay: Duration) -> Self {
        Self {
            inner: MemoryStatsStore::new(),
            delay,
        }
    }
}

#[async_trait]
impl StatsStore for SlowStore {
    async fn get(&self, serial_number: &str) -> anyhow::Result<Option<String>> {
        self.inner.get(serial_number).await
    }

    async fn set(&self, serial_number: &str, blob: &str) -> anyhow::Result<()> {
        tokio::time::sleep(self.delay).await;
        self.inner.set(serial_number, blob).await
    }
}
