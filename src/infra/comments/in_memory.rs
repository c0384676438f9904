// In-memory CommentStore, used by the service tests.

use crate::core::comments::{
    Comment, CommentError, CommentStatus, CommentStore, NewComment, RecordNotification,
};
use crate::core::notifications::{Notification, NotificationStore};
use crate::infra::notifications::InMemoryNotificationStore;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

pub struct InMemoryCommentStore {
    rows: DashMap<i64, Comment>,
    next_id: AtomicI64,
    notifications: Arc<dyn NotificationStore>,
}

impl InMemoryCommentStore {
    pub fn new() -> Self {
        Self::with_notifications(Arc::new(InMemoryNotificationStore::new()))
    }

    /// Record notifications in `notifications` instead of a private store.
    pub fn with_notifications(notifications: Arc<dyn NotificationStore>) -> Self {
        Self {
            rows: DashMap::new(),
            next_id: AtomicI64::new(1),
            notifications,
        }
    }

    fn collect(&self, keep: impl Fn(&Comment) -> bool) -> Vec<Comment> {
        self.rows
            .iter()
            .filter(|entry| keep(entry.value()))
            .map(|entry| entry.value().clone())
            .collect()
    }

    // The comment change is only applied once its notification is stored
    async fn record(
        &self,
        comment: &Comment,
        record: RecordNotification<'_>,
    ) -> Result<Notification, CommentError> {
        self.notifications
            .insert(record(comment))
            .await
            .map_err(|e| CommentError::StorageError(e.to_string()))
    }
}

impl Default for InMemoryCommentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CommentStore for InMemoryCommentStore {
    async fn insert(
        &self,
        comment: NewComment,
        record: RecordNotification<'_>,
    ) -> Result<(Comment, Notification), CommentError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let stored = Comment {
            id,
            article_id: comment.article_id,
            content: comment.content,
            submitter: comment.submitter,
            status: comment.status,
            moderation_reason: comment.moderation_reason,
            flagged_words: comment.flagged_words,
            created_at: comment.created_at,
        };
        let notification = self.record(&stored, record).await?;
        self.rows.insert(id, stored.clone());
        Ok((stored, notification))
    }

    async fn get(&self, id: i64) -> Result<Option<Comment>, CommentError> {
        Ok(self.rows.get(&id).map(|entry| entry.value().clone()))
    }

    async fn update_status(
        &self,
        id: i64,
        status: CommentStatus,
        record: RecordNotification<'_>,
    ) -> Result<Option<(Comment, Notification)>, CommentError> {
        let Some(mut updated) = self.get(id).await? else {
            return Ok(None);
        };
        updated.status = status;

        let notification = self.record(&updated, record).await?;
        self.rows.insert(id, updated.clone());
        Ok(Some((updated, notification)))
    }

    async fn list_approved(
        &self,
        article_id: i64,
        offset: u64,
        limit: u32,
    ) -> Result<Vec<Comment>, CommentError> {
        let mut approved =
            self.collect(|c| c.article_id == article_id && c.status.is_public());
        // Ids break ties between rows written in the same instant
        approved.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        Ok(approved
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn count_approved(&self, article_id: i64) -> Result<u64, CommentError> {
        Ok(self
            .rows
            .iter()
            .filter(|e| e.article_id == article_id && e.status.is_public())
            .count() as u64)
    }

    async fn list_pending(&self, limit: u32) -> Result<Vec<Comment>, CommentError> {
        let mut pending = self.collect(|c| c.status == CommentStatus::Pending);
        pending.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        pending.truncate(limit as usize);
        Ok(pending)
    }
}
