//! Live usage-stats broadcast hub.
//!
//! One task owns the set of connected listeners. Everything else talks to it
//! through [`StatsHub`], which only sends commands; the listener set is never
//! shared. The loop pushes a counter snapshot to a listener as soon as it
//! registers, and to every listener on each tick. A listener whose send fails
//! or stalls is closed and dropped in the same pass.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, MissedTickBehavior};
use uuid::Uuid;

use crate::stats::{UsageCounter, UsageCounters};

/// How often every listener gets a fresh snapshot.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(2);

/// A send that takes longer than this counts as a failed send.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(5);

pub type ListenerId = Uuid;

/// A connected client that can receive text frames.
#[async_trait]
pub trait Listener: Send {
    async fn send(&mut self, text: String) -> anyhow::Result<()>;

    /// Best effort; errors are ignored.
    async fn close(&mut self);
}

/// Messages pushed to listeners.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum HubMessage {
    Stats(UsageCounters),
}

#[derive(Debug, Clone)]
pub struct HubConfig {
    pub tick_interval: Duration,
    pub send_timeout: Duration,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            tick_interval: DEFAULT_TICK_INTERVAL,
            send_timeout: DEFAULT_SEND_TIMEOUT,
        }
    }
}

#[derive(Debug, Error)]
#[error("stats hub is no longer running")]
pub struct HubClosed;

enum HubCommand {
    Register {
        id: ListenerId,
        listener: Box<dyn Listener>,
    },
    Unregister(ListenerId),
    ListenerCount {
        respond: oneshot::Sender<usize>,
    },
}

/// Handle to the hub loop. Cheap to clone; the loop stops once every handle
/// has been dropped.
#[derive(Clone)]
pub struct StatsHub {
    cmd_tx: mpsc::UnboundedSender<HubCommand>,
}

impl StatsHub {
    /// Spawn the hub loop on the current runtime.
    pub fn spawn(counter: Arc<UsageCounter>, config: HubConfig) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let state = HubState {
            listeners: HashMap::new(),
            counter,
            send_timeout: config.send_timeout,
        };
        tokio::spawn(run(state, cmd_rx, config.tick_interval));
        Self { cmd_tx }
    }

    /// Hand a freshly upgraded connection to the loop.
    pub fn register(&self, id: ListenerId, listener: Box<dyn Listener>) -> Result<(), HubClosed> {
        self.cmd_tx
            .send(HubCommand::Register { id, listener })
            .map_err(|_| HubClosed)
    }

    /// Drop a listener. Unknown ids are ignored.
    pub fn unregister(&self, id: ListenerId) -> Result<(), HubClosed> {
        self.cmd_tx
            .send(HubCommand::Unregister(id))
            .map_err(|_| HubClosed)
    }

    pub async fn listener_count(&self) -> Result<usize, HubClosed> {
        let (respond, rx) = oneshot::channel();
        self.cmd_tx
            .send(HubCommand::ListenerCount { respond })
            .map_err(|_| HubClosed)?;
        rx.await.map_err(|_| HubClosed)
    }
}

/// State owned by the loop task.
struct HubState {
    listeners: HashMap<ListenerId, Box<dyn Listener>>,
    counter: Arc<UsageCounter>,
    send_timeout: Duration,
}

impl HubState {
    fn snapshot_message(&self) -> Option<String> {
        let message = HubMessage::Stats(self.counter.snapshot());
        match serde_json::to_string(&message) {
            Ok(text) => Some(text),
            Err(e) => {
                tracing::error!("Failed to serialize stats snapshot: {}", e);
                None
            }
        }
    }

    async fn register(&mut self, id: ListenerId, listener: Box<dyn Listener>) {
        if let Some(mut previous) = self.listeners.insert(id, listener) {
            tracing::warn!(listener = %id, "Listener id reused, closing previous connection");
            previous.close().await;
        }
        tracing::debug!(listener = %id, total = self.listeners.len(), "Listener registered");

        let Some(text) = self.snapshot_message() else {
            return;
        };
        let delivered = match self.listeners.get_mut(&id) {
            Some(listener) => send_with_timeout(listener.as_mut(), text, self.send_timeout).await,
            None => return,
        };
        if !delivered {
            self.remove(id).await;
        }
    }

    /// Remove and close a listener if present.
    async fn remove(&mut self, id: ListenerId) {
        if let Some(mut listener) = self.listeners.remove(&id) {
            listener.close().await;
            tracing::debug!(listener = %id, total = self.listeners.len(), "Listener removed");
        }
    }

    async fn broadcast(&mut self) {
        if self.listeners.is_empty() {
            return;
        }
        let Some(text) = self.snapshot_message() else {
            return;
        };

        let timeout = self.send_timeout;
        let sends = self.listeners.iter_mut().map(|(id, listener)| {
            let text = text.clone();
            async move { (*id, send_with_timeout(listener.as_mut(), text, timeout).await) }
        });
        let failed: Vec<ListenerId> = futures::future::join_all(sends)
            .await
            .into_iter()
            .filter_map(|(id, delivered)| (!delivered).then_some(id))
            .collect();

        for id in failed {
            self.remove(id).await;
        }
    }

    async fn close_all(&mut self) {
        for (_, mut listener) in self.listeners.drain() {
            listener.close().await;
        }
    }
}

async fn send_with_timeout(listener: &mut dyn Listener, text: String, timeout: Duration) -> bool {
    match tokio::time::timeout(timeout, listener.send(text)).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            tracing::debug!("Listener send failed: {}", e);
            false
        }
        Err(_) => {
            tracing::debug!("Listener send timed out after {:?}", timeout);
            false
        }
    }
}

async fn run(mut state: HubState, mut cmd_rx: mpsc::UnboundedReceiver<HubCommand>, period: Duration) {
    // First tick one full period after start; registrations get their own
    // immediate snapshot.
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::info!(interval = ?period, "Stats hub started");

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => match cmd {
                Some(HubCommand::Register { id, listener }) => state.register(id, listener).await,
                Some(HubCommand::Unregister(id)) => state.remove(id).await,
                Some(HubCommand::ListenerCount { respond }) => {
                    let _ = respond.send(state.listeners.len());
                }
                None => break,
            },
            _ = ticker.tick() => state.broadcast().await,
        }
    }

    state.close_all().await;
    tracing::info!("Stats hub stopped");
}
