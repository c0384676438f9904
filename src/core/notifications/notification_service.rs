// Notification dispatcher - turns domain events into notifications, pushes
// stored ones to every matching open channel, and serves the inbox.
//
// Delivery is at-least-once for channels open at publish time. Anyone offline
// catches up through the pull-based listing, never through channel replay.

use super::channel_registry::ChannelRegistry;
use super::notification_models::{
    Frame, NewNotification, Notification, RecipientScope, Viewer, KIND_COMMENT_FLAGGED,
    KIND_COMMENT_POSTED, KIND_COMMENT_STATUS,
};
use crate::core::comments::{CommentStatus, DomainEvent, EventPublisher};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;

pub const DEFAULT_LIST_LIMIT: u32 = 20;
pub const MAX_LIST_LIMIT: u32 = 100;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("Notification {0} not found")]
    NotFound(i64),

    #[error("Storage error: {0}")]
    StorageError(String),
}

// ============================================================================
// STORAGE TRAIT (PORT)
// ============================================================================

#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn insert(&self, notification: NewNotification)
        -> Result<Notification, NotificationError>;

    /// Notifications visible to `viewer`, newest first.
    async fn list_for(
        &self,
        viewer: &Viewer,
        limit: u32,
    ) -> Result<Vec<Notification>, NotificationError>;

    async fn unread_count(&self, viewer: &Viewer) -> Result<u64, NotificationError>;

    /// Flip one row to read. Returns false when the row doesn't exist or isn't
    /// visible to `viewer`; true otherwise, including when it was already read.
    async fn mark_read(&self, viewer: &Viewer, id: i64) -> Result<bool, NotificationError>;

    /// Flip every unread row visible to `viewer`. Returns how many changed.
    async fn mark_all_read(&self, viewer: &Viewer) -> Result<u64, NotificationError>;
}

// ============================================================================
// CORE SERVICE
// ============================================================================

pub struct NotificationDispatcher<S: NotificationStore> {
    store: S,
    channels: Arc<ChannelRegistry>,
    staff_role: String,
}

impl<S: NotificationStore> NotificationDispatcher<S> {
    pub fn new(store: S, channels: Arc<ChannelRegistry>, staff_role: impl Into<String>) -> Self {
        Self {
            store,
            channels,
            staff_role: staff_role.into(),
        }
    }

    pub fn channels(&self) -> &Arc<ChannelRegistry> {
        &self.channels
    }

    pub async fn list(
        &self,
        viewer: &Viewer,
        limit: Option<u32>,
    ) -> Result<Vec<Notification>, NotificationError> {
        let limit = limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT);
        self.store.list_for(viewer, limit).await
    }

    pub async fn unread_count(&self, viewer: &Viewer) -> Result<u64, NotificationError> {
        self.store.unread_count(viewer).await
    }

    pub async fn mark_read(&self, viewer: &Viewer, id: i64) -> Result<(), NotificationError> {
        if self.store.mark_read(viewer, id).await? {
            Ok(())
        } else {
            Err(NotificationError::NotFound(id))
        }
    }

    pub async fn mark_all_read(&self, viewer: &Viewer) -> Result<u64, NotificationError> {
        let updated = self.store.mark_all_read(viewer).await?;
        tracing::debug!(user_id = viewer.user_id, updated, "Marked all notifications read");
        Ok(updated)
    }
}

// Comment writes store the notification row themselves, in their own
// transaction. The dispatcher only builds the row and delivers it afterwards.
impl<S: NotificationStore> EventPublisher for NotificationDispatcher<S> {
    fn notification_for(&self, event: &DomainEvent) -> NewNotification {
        notification_for(event, &self.staff_role)
    }

    fn announce(&self, notification: &Notification) {
        let frame = Frame::Notification {
            notification: notification.clone(),
        };
        let delivered = self.channels.fan_out(&notification.recipient, &frame);

        tracing::info!(
            notification_id = notification.id,
            kind = %notification.kind,
            scope = notification.recipient.kind(),
            delivered,
            "Notification published"
        );
    }
}

/// Map a domain event to the notification it produces.
pub fn notification_for(event: &DomainEvent, staff_role: &str) -> NewNotification {
    let comment = event.comment();
    let payload = json!({
        "commentId": comment.id,
        "articleId": comment.article_id,
        "status": comment.status,
        "flaggedWords": comment.flagged_words,
        "moderationReason": comment.moderation_reason,
    });
    let staff = RecipientScope::Role {
        role: staff_role.to_string(),
    };

    let (recipient, kind, title, message) = match event {
        DomainEvent::CommentSubmitted { .. } if event.is_flagged() => (
            staff,
            KIND_COMMENT_FLAGGED,
            "Comment awaiting review".to_string(),
            format!(
                "Comment #{} on article #{} was held: {}",
                comment.id,
                comment.article_id,
                comment
                    .moderation_reason
                    .as_deref()
                    .unwrap_or("flagged by moderation")
            ),
        ),
        DomainEvent::CommentSubmitted { .. } => (
            staff,
            KIND_COMMENT_POSTED,
            "New comment".to_string(),
            format!(
                "Comment #{} was published on article #{}",
                comment.id, comment.article_id
            ),
        ),
        DomainEvent::CommentStatusChanged { previous, .. } => {
            let recipient = match comment.submitter.author_id() {
                Some(user_id) => RecipientScope::User { user_id },
                None => staff,
            };
            let verb = match comment.status {
                CommentStatus::Approved => "approved",
                CommentStatus::Rejected => "rejected",
                CommentStatus::Pending => "returned to review",
            };
            (
                recipient,
                KIND_COMMENT_STATUS,
                format!("Comment {verb}"),
                format!(
                    "Comment #{} on article #{} moved from {} to {}",
                    comment.id, comment.article_id, previous, comment.status
                ),
            )
        }
    };

    NewNotification {
        recipient,
        kind: kind.to_string(),
        title,
        message,
        payload,
        created_at: Utc::now(),
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::comments::{Comment, Submitter};
    use crate::infra::notifications::InMemoryNotificationStore;

    fn comment(status: CommentStatus, submitter: Submitter) -> Comment {
        Comment {
            id: 10,
            article_id: 3,
            content: "text".into(),
            submitter,
            status,
            moderation_reason: Some("Spam detected".into()),
            flagged_words: vec![],
            created_at: Utc::now(),
        }
    }

    fn guest() -> Submitter {
        Submitter::Guest {
            name: "Ann".into(),
            email: "ann@example.com".into(),
        }
    }

    /// Store the event's notification, then deliver it, as a comment write does.
    async fn publish(
        dispatcher: &NotificationDispatcher<InMemoryNotificationStore>,
        event: DomainEvent,
    ) -> Notification {
        let built = EventPublisher::notification_for(dispatcher, &event);
        let stored = dispatcher.store.insert(built).await.unwrap();
        dispatcher.announce(&stored);
        stored
    }

    fn dispatcher() -> NotificationDispatcher<InMemoryNotificationStore> {
        NotificationDispatcher::new(
            InMemoryNotificationStore::new(),
            Arc::new(ChannelRegistry::new(16)),
            "moderator",
        )
    }

    #[test]
    fn test_flagged_submission_goes_to_staff() {
        let event = DomainEvent::CommentSubmitted {
            comment: comment(CommentStatus::Pending, guest()),
        };
        let n = notification_for(&event, "moderator");
        assert_eq!(
            n.recipient,
            RecipientScope::Role {
                role: "moderator".into()
            }
        );
        assert_eq!(n.kind, KIND_COMMENT_FLAGGED);
        assert_eq!(n.payload["commentId"], 10);
        assert_eq!(n.payload["status"], "PENDING");
        assert!(n.message.contains("Spam detected"));
    }

    #[test]
    fn test_clean_submission_kind() {
        let event = DomainEvent::CommentSubmitted {
            comment: comment(CommentStatus::Approved, guest()),
        };
        assert_eq!(notification_for(&event, "moderator").kind, KIND_COMMENT_POSTED);
    }

    #[test]
    fn test_status_change_goes_to_author_when_known() {
        let event = DomainEvent::CommentStatusChanged {
            comment: comment(CommentStatus::Rejected, Submitter::Author { author_id: 77 }),
            previous: CommentStatus::Pending,
            moderator_id: 1,
        };
        let n = notification_for(&event, "moderator");
        assert_eq!(n.recipient, RecipientScope::User { user_id: 77 });
        assert_eq!(n.title, "Comment rejected");
        assert_eq!(n.kind, KIND_COMMENT_STATUS);
    }

    #[tokio::test]
    async fn test_publish_reaches_only_matching_channels() {
        let dispatcher = dispatcher();
        let (_, mut moderator) = dispatcher.channels().open(Viewer::new(1, "moderator"));
        let (_, mut other) = dispatcher.channels().open(Viewer::new(2, "editor"));

        let event = DomainEvent::CommentSubmitted {
            comment: comment(CommentStatus::Pending, guest()),
        };
        let stored = publish(&dispatcher, event).await;

        match moderator.recv().await {
            Some(Frame::Notification { notification }) => assert_eq!(notification, stored),
            other => panic!("unexpected frame {other:?}"),
        }
        assert!(other.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_publish_persists_for_offline_viewers() {
        let dispatcher = dispatcher();
        let event = DomainEvent::CommentSubmitted {
            comment: comment(CommentStatus::Pending, guest()),
        };
        publish(&dispatcher, event).await;

        let viewer = Viewer::new(9, "moderator");
        let listed = dispatcher.list(&viewer, None).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(dispatcher.unread_count(&viewer).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_mark_read_is_idempotent_and_scoped() {
        let dispatcher = dispatcher();
        let event = DomainEvent::CommentSubmitted {
            comment: comment(CommentStatus::Pending, guest()),
        };
        let stored = publish(&dispatcher, event).await;

        let moderator = Viewer::new(1, "moderator");
        dispatcher.mark_read(&moderator, stored.id).await.unwrap();
        dispatcher.mark_read(&moderator, stored.id).await.unwrap();
        assert_eq!(dispatcher.unread_count(&moderator).await.unwrap(), 0);

        let outsider = Viewer::new(2, "editor");
        let err = dispatcher.mark_read(&outsider, stored.id).await.unwrap_err();
        assert!(matches!(err, NotificationError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_mark_all_read_counts_changes() {
        let dispatcher = dispatcher();
        for status in [CommentStatus::Pending, CommentStatus::Approved] {
            let event = DomainEvent::CommentSubmitted {
                comment: comment(status, guest()),
            };
            publish(&dispatcher, event).await;
        }

        let moderator = Viewer::new(1, "moderator");
        assert_eq!(dispatcher.mark_all_read(&moderator).await.unwrap(), 2);
        assert_eq!(dispatcher.mark_all_read(&moderator).await.unwrap(), 0);
        assert_eq!(dispatcher.unread_count(&moderator).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_announce_delivers_without_storing() {
        let dispatcher = dispatcher();
        let (_, mut moderator) = dispatcher.channels().open(Viewer::new(1, "moderator"));

        let event = DomainEvent::CommentSubmitted {
            comment: comment(CommentStatus::Pending, guest()),
        };
        let built = EventPublisher::notification_for(&dispatcher, &event);
        assert_eq!(built.kind, KIND_COMMENT_FLAGGED);

        let stored = Notification {
            id: 41,
            recipient: built.recipient,
            kind: built.kind,
            title: built.title,
            message: built.message,
            payload: built.payload,
            is_read: false,
            created_at: built.created_at,
        };
        dispatcher.announce(&stored);

        match moderator.recv().await {
            Some(Frame::Notification { notification }) => assert_eq!(notification.id, 41),
            other => panic!("unexpected frame {other:?}"),
        }
        // The row itself belongs to whoever stored it
        let listed = dispatcher.list(&Viewer::new(1, "moderator"), None).await.unwrap();
        assert!(listed.is_empty());
    }
}
