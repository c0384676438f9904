// In-memory NotificationStore, used by the dispatcher and web tests.

use crate::core::notifications::{
    NewNotification, Notification, NotificationError, NotificationStore, Viewer,
};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicI64, Ordering};

pub struct InMemoryNotificationStore {
    rows: DashMap<i64, Notification>,
    next_id: AtomicI64,
}

impl InMemoryNotificationStore {
    pub fn new() -> Self {
        Self {
            rows: DashMap::new(),
            next_id: AtomicI64::new(1),
        }
    }
}

impl Default for InMemoryNotificationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NotificationStore for InMemoryNotificationStore {
    async fn insert(
        &self,
        notification: NewNotification,
    ) -> Result<Notification, NotificationError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let stored = Notification {
            id,
            recipient: notification.recipient,
            kind: notification.kind,
            title: notification.title,
            message: notification.message,
            payload: notification.payload,
            is_read: false,
            created_at: notification.created_at,
        };
        self.rows.insert(id, stored.clone());
        Ok(stored)
    }

    async fn list_for(
        &self,
        viewer: &Viewer,
        limit: u32,
    ) -> Result<Vec<Notification>, NotificationError> {
        let mut visible: Vec<Notification> = self
            .rows
            .iter()
            .filter(|entry| viewer.matches(&entry.recipient))
            .map(|entry| entry.value().clone())
            .collect();
        visible.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        visible.truncate(limit as usize);
        Ok(visible)
    }

    async fn unread_count(&self, viewer: &Viewer) -> Result<u64, NotificationError> {
        Ok(self
            .rows
            .iter()
            .filter(|entry| !entry.is_read && viewer.matches(&entry.recipient))
            .count() as u64)
    }

    async fn mark_read(&self, viewer: &Viewer, id: i64) -> Result<bool, NotificationError> {
        match self.rows.get_mut(&id) {
            Some(mut entry) if viewer.matches(&entry.recipient) => {
                entry.is_read = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn mark_all_read(&self, viewer: &Viewer) -> Result<u64, NotificationError> {
        let mut changed = 0;
        for mut entry in self.rows.iter_mut() {
            if !entry.is_read && viewer.matches(&entry.recipient) {
                entry.is_read = true;
                changed += 1;
            }
        }
        Ok(changed)
    }
}
