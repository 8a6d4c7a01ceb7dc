// Live connection record shared between a device session and dashboard readers.

use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use super::Associations;

/// Written by the owning session, read concurrently by HTTP handlers.
#[derive(Debug)]
pub struct ConnectionContext {
    serial_number: String,
    connected: AtomicBool,
    message_count: AtomicU64,
    associations_2g: AtomicU64,
    associations_5g: AtomicU64,
    last_contact: Mutex<Option<chrono::DateTime<chrono::Utc>>>,
}

/// Point-in-time view of a [`ConnectionContext`]; serializes to camelCase JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStatus {
    pub serial_number: String,
    pub connected: bool,
    pub message_count: u64,
    pub associations_2g: u64,
    pub associations_5g: u64,
    pub last_contact: Option<chrono::DateTime<chrono::Utc>>,
}

impl ConnectionContext {
    pub fn new(serial_number: impl Into<String>) -> Self {
        Self {
            serial_number: serial_number.into(),
            connected: AtomicBool::new(true),
            message_count: AtomicU64::new(0),
            associations_2g: AtomicU64::new(0),
            associations_5g: AtomicU64::new(0),
            last_contact: Mutex::new(None),
        }
    }

    pub fn serial_number(&self) -> &str {
        &self.serial_number
    }

    /// Overwrites both association counts with the latest report's values.
    pub fn set_associations(&self, associations: Associations) {
        self.associations_2g
            .store(associations.band_2g, Ordering::Relaxed);
        self.associations_5g
            .store(associations.band_5g, Ordering::Relaxed);
    }

    pub fn associations(&self) -> Associations {
        Associations {
            band_2g: self.associations_2g.load(Ordering::Relaxed),
            band_5g: self.associations_5g.load(Ordering::Relaxed),
        }
    }

    /// Records one inbound message from the device.
    pub fn touch(&self) {
        self.message_count.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut last) = self.last_contact.lock() {
            *last = Some(chrono::Utc::now());
        }
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::Relaxed);
    }

    pub fn status(&self) -> ConnectionStatus {
        let associations = self.associations();
        ConnectionStatus {
            serial_number: self.serial_number.clone(),
            connected: self.connected.load(Ordering::Relaxed),
            message_count: self.message_count.load(Ordering::Relaxed),
            associations_2g: associations.band_2g,
            associations_5g: associations.band_5g,
            last_contact: self.last_contact.lock().ok().and_then(|l| *l),
        }
    }
}
