// Device session task: the single owner of a device's StatsProcessor.
// Ingress sends raw reports over a channel; the task merges them in arrival order, saves on a
// timer when there are unsaved updates, and saves once more when the last handle is dropped.
// A reconnecting device's new session loads stored stats only after the old one has finished.

use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{Duration, Instant, interval_at};
use tracing::Instrument;

use crate::error::StatsError;
use crate::models::{ConnectionContext, LifetimeStats};
use crate::registry::{Admission, DeviceRegistry};
use crate::stats::StatsProcessor;
use crate::store::StatsStore;

/// Session timing and buffering.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub flush_threshold: u64,
    pub save_interval_secs: u64,
    pub channel_capacity: usize,
}

enum SessionCommand {
    Report(String),
    Save(oneshot::Sender<Result<(), StatsError>>),
    Snapshot(oneshot::Sender<LifetimeStats>),
}

/// Ordering between consecutive sessions of one device.
struct Handover {
    previous: Option<watch::Receiver<()>>,
    /// Dropped when the session task ends; waiters see the channel close.
    _finished: watch::Sender<()>,
}

/// Sender side of a device session. The session ends when every handle is dropped.
#[derive(Clone)]
pub struct SessionHandle {
    serial_number: Arc<str>,
    tx: mpsc::Sender<SessionCommand>,
    context: Arc<ConnectionContext>,
}

/// Registry-side reference that does not keep the session alive.
#[derive(Clone)]
pub(crate) struct WeakSessionHandle {
    serial_number: Arc<str>,
    tx: mpsc::WeakSender<SessionCommand>,
    context: Arc<ConnectionContext>,
}

impl SessionHandle {
    pub fn serial_number(&self) -> &str {
        &self.serial_number
    }

    pub fn context(&self) -> &Arc<ConnectionContext> {
        &self.context
    }

    /// Queues a raw state report. Returns false once the session has ended.
    pub async fn report(&self, text: String) -> bool {
        self.tx.send(SessionCommand::Report(text)).await.is_ok()
    }

    /// Saves the device's lifetime stats now, after any reports already queued.
    pub async fn save(&self) -> Result<(), StatsError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(SessionCommand::Save(reply_tx))
            .await
            .map_err(|_| StatsError::SessionClosed)?;
        reply_rx.await.map_err(|_| StatsError::SessionClosed)?
    }

    /// Current lifetime counters, after any reports already queued.
    pub async fn snapshot(&self) -> Option<LifetimeStats> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx.send(SessionCommand::Snapshot(reply_tx)).await.ok()?;
        reply_rx.await.ok()
    }

    pub(crate) fn downgrade(&self) -> WeakSessionHandle {
        WeakSessionHandle {
            serial_number: self.serial_number.clone(),
            tx: self.tx.downgrade(),
            context: self.context.clone(),
        }
    }
}

impl WeakSessionHandle {
    pub(crate) fn upgrade(&self) -> Option<SessionHandle> {
        Some(SessionHandle {
            serial_number: self.serial_number.clone(),
            tx: self.tx.upgrade()?,
            context: self.context.clone(),
        })
    }

    pub(crate) fn context(&self) -> &Arc<ConnectionContext> {
        &self.context
    }
}

/// Starts a session for `serial_number` and registers it.
///
/// Returns `None` when the device already has a session accepting reports; the caller should
/// refuse the second connection rather than run two processors against one stored blob. A
/// session whose handles are gone but which has not made its final save yet does not block a
/// reconnect: the new session waits for it before loading stored stats.
pub fn spawn(
    serial_number: &str,
    store: Arc<dyn StatsStore>,
    registry: Arc<DeviceRegistry>,
    config: SessionConfig,
) -> Option<(SessionHandle, tokio::task::JoinHandle<()>)> {
    let (tx, rx) = mpsc::channel(config.channel_capacity);
    let context = Arc::new(ConnectionContext::new(serial_number));
    let handle = SessionHandle {
        serial_number: Arc::from(serial_number),
        tx,
        context: context.clone(),
    };
    let (finished_tx, finished_rx) = watch::channel(());
    let previous = match registry.try_register(&handle, finished_rx) {
        Admission::Refused => {
            tracing::info!(serial = %serial_number, "device already has a live session");
            return None;
        }
        Admission::Admitted { previous } => previous,
    };
    let handover = Handover {
        previous,
        _finished: finished_tx,
    };

    let processor = StatsProcessor::new(store)
        .with_flush_threshold(config.flush_threshold)
        .with_connection(context.clone());
    let save_interval = Duration::from_secs(config.save_interval_secs);
    let session_span = tracing::span!(tracing::Level::DEBUG, "session", serial = %serial_number);
    let join = tokio::spawn(
        run(
            processor,
            serial_number.to_string(),
            rx,
            registry,
            context,
            save_interval,
            handover,
        )
        .instrument(session_span),
    );
    Some((handle, join))
}

async fn run(
    mut processor: StatsProcessor,
    serial_number: String,
    mut rx: mpsc::Receiver<SessionCommand>,
    registry: Arc<DeviceRegistry>,
    context: Arc<ConnectionContext>,
    save_interval: Duration,
    mut handover: Handover,
) {
    if let Some(previous) = handover.previous.as_mut() {
        tracing::debug!(serial = %serial_number, "waiting for previous session to finish");
        // Never sent on; resolves when the previous session task drops its sender.
        let _ = previous.changed().await;
    }
    let restored = processor.initialize(&serial_number).await;
    tracing::info!(serial = %serial_number, restored, "device session started");

    let mut save_tick = interval_at(Instant::now() + save_interval, save_interval);
    save_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            command = rx.recv() => {
                match command {
                    Some(SessionCommand::Report(text)) => {
                        context.touch();
                        let accepted = processor.add_str(&text).await.is_ok();
                        registry.record_report(accepted);
                    }
                    Some(SessionCommand::Save(reply)) => {
                        let _ = reply.send(processor.save().await);
                    }
                    Some(SessionCommand::Snapshot(reply)) => {
                        let _ = reply.send(processor.lifetime_stats());
                    }
                    None => break,
                }
            }
            _ = save_tick.tick() => {
                if processor.dirty_count() > 0
                    && let Err(e) = processor.save().await
                {
                    tracing::warn!(serial = %serial_number, error = %e, "interval save failed");
                }
            }
        }
    }

    if processor.dirty_count() > 0
        && let Err(e) = processor.save().await
    {
        tracing::warn!(serial = %serial_number, error = %e, "final save failed");
    }
    context.set_connected(false);
    registry.unregister(&context);
    tracing::info!(serial = %serial_number, "device session ended");
    drop(handover);
}
