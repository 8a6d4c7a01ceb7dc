// Live device sessions by serial number. Holds weak senders only, so a session ends as soon as
// its ingress drops the handle. An entry stays until the session has made its final save.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::watch;

use crate::models::{ConnectionContext, ConnectionStatus};
use crate::session::{SessionHandle, WeakSessionHandle};

struct SessionEntry {
    handle: WeakSessionHandle,
    /// Closes when the session task has finished (final save done or abandoned).
    finished: watch::Receiver<()>,
}

/// Outcome of registering a new session.
pub(crate) enum Admission {
    /// The device already has a session accepting reports.
    Refused,
    /// `previous` is set when an earlier session for the device is still draining; the new
    /// session must wait for it to close before loading stored stats.
    Admitted {
        previous: Option<watch::Receiver<()>>,
    },
}

#[derive(Default)]
pub struct DeviceRegistry {
    sessions: RwLock<HashMap<String, SessionEntry>>,
    reports_total: AtomicU64,
    reports_rejected_total: AtomicU64,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a session unless one that still accepts reports exists for the serial number.
    pub(crate) fn try_register(
        &self,
        handle: &SessionHandle,
        finished: watch::Receiver<()>,
    ) -> Admission {
        let Ok(mut sessions) = self.sessions.write() else {
            return Admission::Refused;
        };
        let previous = match sessions.get(handle.serial_number()) {
            Some(existing) if existing.handle.upgrade().is_some() => return Admission::Refused,
            Some(existing) => Some(existing.finished.clone()),
            None => None,
        };
        sessions.insert(
            handle.serial_number().to_string(),
            SessionEntry {
                handle: handle.downgrade(),
                finished,
            },
        );
        Admission::Admitted { previous }
    }

    /// Removes the entry for `context`'s device if it still belongs to that session.
    pub(crate) fn unregister(&self, context: &Arc<ConnectionContext>) {
        if let Ok(mut sessions) = self.sessions.write()
            && sessions
                .get(context.serial_number())
                .is_some_and(|existing| Arc::ptr_eq(existing.handle.context(), context))
        {
            sessions.remove(context.serial_number());
        }
    }

    pub fn get(&self, serial_number: &str) -> Option<SessionHandle> {
        self.sessions
            .read()
            .ok()?
            .get(serial_number)
            .and_then(|entry| entry.handle.upgrade())
    }

    pub fn contains(&self, serial_number: &str) -> bool {
        self.get(serial_number).is_some()
    }

    pub fn connection_count(&self) -> usize {
        self.sessions.read().map(|s| s.len()).unwrap_or(0)
    }

    /// Status of every registered device, sorted by serial number.
    pub fn statuses(&self) -> Vec<ConnectionStatus> {
        let mut out: Vec<ConnectionStatus> = match self.sessions.read() {
            Ok(sessions) => sessions
                .values()
                .map(|entry| entry.handle.context().status())
                .collect(),
            Err(_) => Vec::new(),
        };
        out.sort_by(|a, b| a.serial_number.cmp(&b.serial_number));
        out
    }

    /// Asks every live session to write its lifetime stats and waits for draining sessions to
    /// finish their final save. Returns how many live-session saves succeeded.
    pub async fn save_all(&self) -> usize {
        let (handles, draining) = {
            let Ok(sessions) = self.sessions.read() else {
                return 0;
            };
            let mut handles = Vec::new();
            let mut draining = Vec::new();
            for entry in sessions.values() {
                match entry.handle.upgrade() {
                    Some(handle) => handles.push(handle),
                    None => draining.push(entry.finished.clone()),
                }
            }
            (handles, draining)
        };
        let mut saved = 0;
        for handle in handles {
            match handle.save().await {
                Ok(()) => saved += 1,
                Err(e) => tracing::warn!(
                    serial = %handle.serial_number(),
                    error = %e,
                    operation = "save_all",
                    "lifetime stats save failed"
                ),
            }
        }
        for mut finished in draining {
            // Never sent on; resolves when the session task drops its sender.
            let _ = finished.changed().await;
        }
        saved
    }

    pub(crate) fn record_report(&self, accepted: bool) {
        self.reports_total.fetch_add(1, Ordering::Relaxed);
        if !accepted {
            self.reports_rejected_total.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn reports_total(&self) -> u64 {
        self.reports_total.load(Ordering::Relaxed)
    }

    pub fn reports_rejected_total(&self) -> u64 {
        self.reports_rejected_total.load(Ordering::Relaxed)
    }
}
