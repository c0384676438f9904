// Registry of open push channels.
//
// Each channel is a bounded queue drained by the transport task serving that
// client. Delivery never waits: a full queue drops the frame, a closed queue
// unregisters the channel.

use super::notification_models::{Frame, RecipientScope, Viewer};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;

pub type ChannelId = u64;

struct ChannelEntry {
    viewer: Viewer,
    sender: mpsc::Sender<Frame>,
}

pub struct ChannelRegistry {
    channels: DashMap<ChannelId, ChannelEntry>,
    next_id: AtomicU64,
    buffer: usize,
}

impl ChannelRegistry {
    pub fn new(buffer: usize) -> Self {
        Self {
            channels: DashMap::new(),
            next_id: AtomicU64::new(1),
            buffer: buffer.max(1),
        }
    }

    /// Register a channel for `viewer` and hand back the receiving end.
    pub fn open(&self, viewer: Viewer) -> (ChannelId, mpsc::Receiver<Frame>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::channel(self.buffer);

        tracing::info!(
            channel_id = id,
            user_id = viewer.user_id,
            role = %viewer.role,
            "Channel opened"
        );
        self.channels.insert(id, ChannelEntry { viewer, sender });
        (id, receiver)
    }

    pub fn close(&self, id: ChannelId) -> bool {
        let removed = self.channels.remove(&id).is_some();
        if removed {
            tracing::info!(channel_id = id, "Channel closed");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Push `frame` to every open channel whose viewer matches `scope`.
    /// Returns how many channels accepted it.
    pub fn fan_out(&self, scope: &RecipientScope, frame: &Frame) -> usize {
        self.deliver(frame, |viewer| viewer.matches(scope))
    }

    /// Liveness frame for every channel.
    pub fn heartbeat(&self) -> usize {
        self.deliver(&Frame::Heartbeat, |_| true)
    }

    fn deliver(&self, frame: &Frame, wants: impl Fn(&Viewer) -> bool) -> usize {
        let mut delivered = 0;
        let mut gone = Vec::new();

        for entry in self.channels.iter() {
            if !wants(&entry.viewer) {
                continue;
            }
            match entry.sender.try_send(frame.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(channel_id = *entry.key(), "Channel is lagging, frame dropped");
                }
                Err(TrySendError::Closed(_)) => gone.push(*entry.key()),
            }
        }

        // Removing while iterating would deadlock the shard
        for id in gone {
            self.close(id);
        }
        delivered
    }
}

const MIN_HEARTBEAT: Duration = Duration::from_secs(1);

/// Send a heartbeat to every channel on a fixed interval (never faster than
/// once a second).
pub fn spawn_heartbeat(channels: Arc<ChannelRegistry>, every: Duration) -> JoinHandle<()> {
    let every = every.max(MIN_HEARTBEAT);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // The first tick completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if channels.is_empty() {
                continue;
            }
            let reached = channels.heartbeat();
            tracing::debug!(reached, open = channels.len(), "Heartbeat sent");
        }
    })
}
