// Client-side notification state.
//
// `NotificationInbox` is the plain local list + unread counter.
// `NotificationCenter` owns one, applies subscriber events to it, and keeps it
// honest against the server: read flips are optimistic, and a failed
// confirmation triggers a re-fetch of the authoritative state.

use super::notification_models::Notification;
use super::stream_subscriber::SubscriberEvent;
use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum ApiClientError {
    #[error("Not authorized")]
    Unauthorized,

    #[error("Too many requests")]
    TooManyRequests,

    #[error("Not found")]
    NotFound,

    #[error("HTTP {0}: {1}")]
    Status(u16, String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Decode error: {0}")]
    Decode(String),
}

// ============================================================================
// PORTS
// ============================================================================

/// Request/response calls the client makes against the notification endpoints.
#[async_trait]
pub trait NotificationApi: Send + Sync {
    async fn list(&self, limit: u32) -> Result<Vec<Notification>, ApiClientError>;
    async fn unread_count(&self) -> Result<u64, ApiClientError>;
    async fn mark_read(&self, id: i64) -> Result<(), ApiClientError>;
    async fn mark_all_read(&self) -> Result<u64, ApiClientError>;
}

/// Local system alert (desktop notification, terminal bell, ...).
pub trait AlertSink: Send + Sync {
    fn alert(&self, notification: &Notification);
}

// ============================================================================
// LOCAL STATE
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotificationInbox {
    notifications: Vec<Notification>,
    unread: u64,
}

impl NotificationInbox {
    pub fn notifications(&self) -> &[Notification] {
        &self.notifications
    }

    pub fn unread_count(&self) -> u64 {
        self.unread
    }

    /// Prepend a pushed notification. Redelivered ids are ignored so
    /// at-least-once delivery never double counts.
    pub fn receive(&mut self, notification: Notification) -> bool {
        if self.notifications.iter().any(|n| n.id == notification.id) {
            return false;
        }
        if !notification.is_read {
            self.unread += 1;
        }
        self.notifications.insert(0, notification);
        true
    }

    /// Flip one item to read. Returns true if anything changed.
    pub fn mark_read(&mut self, id: i64) -> bool {
        match self.notifications.iter_mut().find(|n| n.id == id) {
            Some(n) if !n.is_read => {
                n.is_read = true;
                self.unread = self.unread.saturating_sub(1);
                true
            }
            _ => false,
        }
    }

    /// Flip everything to read. Returns how many items changed.
    pub fn mark_all_read(&mut self) -> u64 {
        let mut changed = 0;
        for n in self.notifications.iter_mut().filter(|n| !n.is_read) {
            n.is_read = true;
            changed += 1;
        }
        self.unread = 0;
        changed
    }

    /// Keep only the newest `max` items. The unread counter is the server's
    /// total and still covers items dropped here.
    pub fn truncate(&mut self, max: usize) {
        self.notifications.truncate(max);
    }

    /// Swap in authoritative state from the server.
    pub fn replace(&mut self, notifications: Vec<Notification>, unread: u64) {
        self.notifications = notifications;
        self.unread = unread;
    }
}

// ============================================================================
// NOTIFICATION CENTER
// ============================================================================

pub struct NotificationCenter<A: NotificationApi> {
    api: A,
    inbox: Mutex<NotificationInbox>,
    alerts: Option<Box<dyn AlertSink>>,
    fetch_limit: u32,
}

impl<A: NotificationApi> NotificationCenter<A> {
    /// `fetch_limit` bounds both the refresh request and the local list.
    pub fn new(api: A, fetch_limit: u32) -> Self {
        Self {
            api,
            inbox: Mutex::new(NotificationInbox::default()),
            alerts: None,
            fetch_limit,
        }
    }

    /// Raise local alerts for pushed notifications. Only call this once the
    /// user has granted permission.
    pub fn with_alerts(mut self, sink: Box<dyn AlertSink>) -> Self {
        self.alerts = Some(sink);
        self
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub async fn snapshot(&self) -> NotificationInbox {
        self.inbox.lock().await.clone()
    }

    pub async fn unread_count(&self) -> u64 {
        self.inbox.lock().await.unread_count()
    }

    /// Load the authoritative list and unread count from the server.
    pub async fn refresh(&self) -> Result<(), ApiClientError> {
        let notifications = self.api.list(self.fetch_limit).await?;
        let unread = self.api.unread_count().await?;
        self.inbox.lock().await.replace(notifications, unread);
        Ok(())
    }

    /// Fold one subscriber event into local state.
    pub async fn apply(&self, event: &SubscriberEvent) {
        let SubscriberEvent::Notification(notification) = event else {
            return;
        };

        let added = {
            let mut inbox = self.inbox.lock().await;
            let added = inbox.receive(notification.clone());
            inbox.truncate(self.fetch_limit as usize);
            added
        };
        if added {
            if let Some(sink) = &self.alerts {
                sink.alert(notification);
            }
        }
    }

    /// Optimistically mark one item read, then confirm with the server.
    pub async fn mark_as_read(&self, id: i64) -> Result<(), ApiClientError> {
        self.inbox.lock().await.mark_read(id);

        if let Err(e) = self.api.mark_read(id).await {
            tracing::warn!(notification_id = id, error = %e, "Mark read not confirmed, re-fetching");
            self.resync().await;
            return Err(e);
        }
        Ok(())
    }

    /// Optimistically mark everything read, then confirm with the server.
    pub async fn mark_all_as_read(&self) -> Result<(), ApiClientError> {
        self.inbox.lock().await.mark_all_read();

        if let Err(e) = self.api.mark_all_read().await {
            tracing::warn!(error = %e, "Mark all read not confirmed, re-fetching");
            self.resync().await;
            return Err(e);
        }
        Ok(())
    }

    async fn resync(&self) {
        if let Err(e) = self.refresh().await {
            tracing::warn!(error = %e, "Re-fetch failed, keeping local state");
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
