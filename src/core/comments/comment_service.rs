// Comment lifecycle service - validate, moderate, persist, announce.
//
// NO transport or database code here. Storage and event delivery are ports
// implemented in the infra layer (and by the notification dispatcher).

use super::comment_models::{
    Comment, CommentPage, CommentStatus, DomainEvent, FieldError, NewComment,
    SubmissionReceipt, SubmitCommentRequest,
};
use super::validation::validate_submission;
use crate::core::moderation::ModerationEngine;
use crate::core::notifications::{NewNotification, Notification};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum CommentError {
    #[error("Validation failed on {} field(s)", .0.len())]
    Validation(Vec<FieldError>),

    #[error("Comment {0} not found")]
    NotFound(i64),

    #[error("Storage error: {0}")]
    StorageError(String),
}

// ============================================================================
// PORTS
// ============================================================================

/// Builds the notification row for a comment once the comment has its id.
pub type RecordNotification<'a> = &'a (dyn Fn(&Comment) -> NewNotification + Send + Sync);

/// Persistence for comment rows.
///
/// Writes that change what readers or staff can see also write the
/// notification describing the change, in the same transaction. Either both
/// rows are stored or neither is.
#[async_trait]
pub trait CommentStore: Send + Sync {
    async fn insert(
        &self,
        comment: NewComment,
        record: RecordNotification<'_>,
    ) -> Result<(Comment, Notification), CommentError>;

    async fn get(&self, id: i64) -> Result<Option<Comment>, CommentError>;

    /// Set the status and return the updated row, or None if it doesn't exist.
    async fn update_status(
        &self,
        id: i64,
        status: CommentStatus,
        record: RecordNotification<'_>,
    ) -> Result<Option<(Comment, Notification)>, CommentError>;

    /// Approved comments for an article, newest first.
    async fn list_approved(
        &self,
        article_id: i64,
        offset: u64,
        limit: u32,
    ) -> Result<Vec<Comment>, CommentError>;

    async fn count_approved(&self, article_id: i64) -> Result<u64, CommentError>;

    /// Held comments across all articles, oldest first.
    async fn list_pending(&self, limit: u32) -> Result<Vec<Comment>, CommentError>;
}

/// Turns domain events into notifications and pushes them out once stored.
pub trait EventPublisher: Send + Sync {
    fn notification_for(&self, event: &DomainEvent) -> NewNotification;

    /// Deliver a committed notification to open channels. Never blocks.
    fn announce(&self, notification: &Notification);
}

// ============================================================================
// CORE SERVICE
// ============================================================================

pub struct CommentService<S: CommentStore, P: EventPublisher> {
    store: S,
    engine: Arc<ModerationEngine>,
    publisher: Arc<P>,
}

impl<S: CommentStore, P: EventPublisher> CommentService<S, P> {
    pub fn new(store: S, engine: Arc<ModerationEngine>, publisher: Arc<P>) -> Self {
        Self {
            store,
            engine,
            publisher,
        }
    }

    /// Accept a reader submission.
    ///
    /// Validation failures persist nothing. Otherwise the comment is stored as
    /// APPROVED or PENDING depending on the verdict, together with the
    /// `CommentSubmitted` notification. Channels hear about it only after both
    /// rows are committed.
    pub async fn submit(
        &self,
        request: SubmitCommentRequest,
    ) -> Result<SubmissionReceipt, CommentError> {
        let valid = validate_submission(&request).map_err(CommentError::Validation)?;

        let verdict = self
            .engine
            .moderate_comment(&valid.content, valid.submitter.display_name());
        let status = verdict.status();
        tracing::debug!(
            is_clean = verdict.is_clean,
            held = verdict.is_held(),
            flagged = verdict.flagged_words.len(),
            "Submission moderated"
        );

        let publisher = &self.publisher;
        let record = |comment: &Comment| {
            publisher.notification_for(&DomainEvent::CommentSubmitted {
                comment: comment.clone(),
            })
        };

        let (comment, notification) = self
            .store
            .insert(
                NewComment {
                    article_id: valid.article_id,
                    content: valid.content,
                    submitter: valid.submitter,
                    status,
                    moderation_reason: verdict.moderation_reason,
                    flagged_words: verdict.flagged_words,
                    created_at: Utc::now(),
                },
                &record,
            )
            .await?;

        tracing::info!(
            comment_id = comment.id,
            article_id = comment.article_id,
            status = %comment.status,
            "Comment stored"
        );
        self.publisher.announce(&notification);

        Ok(SubmissionReceipt::from(&comment))
    }

    /// Public listing: approved comments only, newest first. Lexicon terms are
    /// masked, which matters once a moderator approves a held comment.
    pub async fn list_approved(
        &self,
        article_id: i64,
        page: u32,
        per_page: u32,
    ) -> Result<CommentPage, CommentError> {
        let page = page.max(1);
        let per_page = per_page.clamp(1, MAX_PAGE_SIZE);
        let offset = u64::from(page - 1) * u64::from(per_page);

        let comments = self
            .store
            .list_approved(article_id, offset, per_page)
            .await?
            .into_iter()
            .map(|mut comment| {
                comment.content = self.engine.mask(&comment.content);
                comment
            })
            .collect();
        let total = self.store.count_approved(article_id).await?;

        Ok(CommentPage {
            comments,
            total,
            page,
            per_page,
        })
    }

    /// The moderation queue.
    pub async fn list_pending(&self, limit: u32) -> Result<Vec<Comment>, CommentError> {
        self.store.list_pending(limit.clamp(1, MAX_PAGE_SIZE)).await
    }

    /// Explicit moderator decision. This is the only way a comment becomes
    /// REJECTED, and the way a held comment becomes public.
    pub async fn set_status(
        &self,
        comment_id: i64,
        status: CommentStatus,
        moderator_id: i64,
    ) -> Result<Comment, CommentError> {
        let current = self
            .store
            .get(comment_id)
            .await?
            .ok_or(CommentError::NotFound(comment_id))?;

        if current.status == status {
            return Ok(current);
        }

        let previous = current.status;
        let publisher = &self.publisher;
        let record = |comment: &Comment| {
            publisher.notification_for(&DomainEvent::CommentStatusChanged {
                comment: comment.clone(),
                previous,
                moderator_id,
            })
        };

        let (updated, notification) = self
            .store
            .update_status(comment_id, status, &record)
            .await?
            .ok_or(CommentError::NotFound(comment_id))?;

        tracing::info!(
            comment_id,
            moderator_id,
            from = %previous,
            to = %status,
            "Comment status changed"
        );
        self.publisher.announce(&notification);

        Ok(updated)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::moderation::Lexicon;
    use crate::core::notifications::{
        notification_for, NotificationError, NotificationStore, Viewer,
    };
    use crate::infra::comments::InMemoryCommentStore;
    use crate::infra::notifications::InMemoryNotificationStore;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingPublisher {
        events: Mutex<Vec<DomainEvent>>,
        announced: Mutex<Vec<Notification>>,
    }

    impl EventPublisher for RecordingPublisher {
        fn notification_for(&self, event: &DomainEvent) -> NewNotification {
            self.events.lock().unwrap().push(event.clone());
            notification_for(event, "moderator")
        }

        fn announce(&self, notification: &Notification) {
            self.announced.lock().unwrap().push(notification.clone());
        }
    }

    /// Notification storage that can be switched into failing every write.
    #[derive(Default)]
    struct SwitchableNotifications {
        inner: InMemoryNotificationStore,
        broken: AtomicBool,
    }

    impl SwitchableNotifications {
        fn check(&self) -> Result<(), NotificationError> {
            if self.broken.load(Ordering::SeqCst) {
                return Err(NotificationError::StorageError("disk full".into()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl NotificationStore for SwitchableNotifications {
        async fn insert(
            &self,
            notification: NewNotification,
        ) -> Result<Notification, NotificationError> {
            self.check()?;
            self.inner.insert(notification).await
        }

        async fn list_for(
            &self,
            viewer: &Viewer,
            limit: u32,
        ) -> Result<Vec<Notification>, NotificationError> {
            self.inner.list_for(viewer, limit).await
        }

        async fn unread_count(&self, viewer: &Viewer) -> Result<u64, NotificationError> {
            self.inner.unread_count(viewer).await
        }

        async fn mark_read(&self, viewer: &Viewer, id: i64) -> Result<bool, NotificationError> {
            self.check()?;
            self.inner.mark_read(viewer, id).await
        }

        async fn mark_all_read(&self, viewer: &Viewer) -> Result<u64, NotificationError> {
            self.check()?;
            self.inner.mark_all_read(viewer).await
        }
    }

    fn engine() -> Arc<ModerationEngine> {
        Arc::new(ModerationEngine::new(Arc::new(Lexicon::new(["darn"]))))
    }

    fn service() -> (
        CommentService<InMemoryCommentStore, RecordingPublisher>,
        Arc<RecordingPublisher>,
    ) {
        let publisher = Arc::new(RecordingPublisher::default());
        let service = CommentService::new(
            InMemoryCommentStore::new(),
            engine(),
            Arc::clone(&publisher),
        );
        (service, publisher)
    }

    fn service_over(
        notifications: &Arc<SwitchableNotifications>,
    ) -> (
        CommentService<InMemoryCommentStore, RecordingPublisher>,
        Arc<RecordingPublisher>,
    ) {
        let publisher = Arc::new(RecordingPublisher::default());
        let store = InMemoryCommentStore::with_notifications(Arc::clone(notifications) as _);
        let service = CommentService::new(store, engine(), Arc::clone(&publisher));
        (service, publisher)
    }

    fn guest(article_id: i64, content: &str) -> SubmitCommentRequest {
        SubmitCommentRequest {
            article_id,
            content: content.to_string(),
            name: Some("Reader".into()),
            author_id: None,
            email: Some("reader@example.com".into()),
        }
    }

    #[tokio::test]
    async fn test_clean_submission_is_approved_and_listed() {
        let (service, publisher) = service();

        let receipt = service.submit(guest(1, "Lovely read")).await.unwrap();
        assert_eq!(receipt.status, CommentStatus::Approved);
        assert!(receipt.is_approved);
        assert_eq!(receipt.moderation_reason, None);

        let page = service.list_approved(1, 1, 20).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.comments[0].id, receipt.id);

        let events = publisher.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert!(!events[0].is_flagged());

        let announced = publisher.announced.lock().unwrap();
        assert_eq!(announced.len(), 1);
        assert_eq!(announced[0].payload["commentId"], receipt.id);
    }

    #[tokio::test]
    async fn test_profane_submission_is_held_not_rejected() {
        let (service, publisher) = service();

        let receipt = service.submit(guest(1, "darn this")).await.unwrap();
        assert_eq!(receipt.status, CommentStatus::Pending);
        assert!(!receipt.is_approved);
        assert!(receipt
            .moderation_reason
            .as_deref()
            .unwrap()
            .contains("Profanity detected"));

        let page = service.list_approved(1, 1, 20).await.unwrap();
        assert_eq!(page.total, 0);
        assert!(page.comments.is_empty());

        let pending = service.list_pending(10).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].flagged_words, vec!["darn"]);

        assert!(publisher.events.lock().unwrap()[0].is_flagged());
    }

    #[tokio::test]
    async fn test_invalid_submission_persists_and_emits_nothing() {
        let (service, publisher) = service();

        let mut request = guest(1, "");
        request.email = Some("nope".into());
        let err = service.submit(request).await.unwrap_err();

        match err {
            CommentError::Validation(fields) => {
                let names: Vec<_> = fields.iter().map(|f| f.field).collect();
                assert_eq!(names, vec!["content", "email"]);
            }
            other => panic!("expected validation error, got {other:?}"),
        }
        assert!(publisher.events.lock().unwrap().is_empty());
        assert!(publisher.announced.lock().unwrap().is_empty());
        assert!(service.list_pending(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_notification_write_keeps_comment_out() {
        let notifications = Arc::new(SwitchableNotifications::default());
        notifications.broken.store(true, Ordering::SeqCst);
        let (service, publisher) = service_over(&notifications);

        let err = service.submit(guest(1, "Lovely read")).await.unwrap_err();
        assert!(matches!(err, CommentError::StorageError(_)));

        let page = service.list_approved(1, 1, 20).await.unwrap();
        assert_eq!(page.total, 0);
        assert!(service.list_pending(10).await.unwrap().is_empty());
        assert!(publisher.announced.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_notification_write_keeps_old_status() {
        let notifications = Arc::new(SwitchableNotifications::default());
        let (service, publisher) = service_over(&notifications);
        let receipt = service.submit(guest(1, "darn good")).await.unwrap();

        notifications.broken.store(true, Ordering::SeqCst);
        let err = service
            .set_status(receipt.id, CommentStatus::Approved, 42)
            .await
            .unwrap_err();
        assert!(matches!(err, CommentError::StorageError(_)));

        assert_eq!(service.list_approved(1, 1, 20).await.unwrap().total, 0);
        let pending = service.list_pending(10).await.unwrap();
        assert_eq!(pending[0].id, receipt.id);
        assert_eq!(publisher.announced.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_repeat_submissions_are_not_deduplicated() {
        let (service, _) = service();
        service.submit(guest(1, "Same words")).await.unwrap();
        service.submit(guest(1, "Same words")).await.unwrap();
        assert_eq!(service.list_approved(1, 1, 20).await.unwrap().total, 2);
    }

    #[tokio::test]
    async fn test_listing_is_newest_first_and_paginated() {
        let (service, _) = service();
        for i in 0..5 {
            service
                .submit(guest(2, &format!("Comment number {i}")))
                .await
                .unwrap();
        }
        service.submit(guest(3, "Other article")).await.unwrap();

        let first = service.list_approved(2, 1, 2).await.unwrap();
        assert_eq!(first.total, 5);
        assert_eq!(first.comments.len(), 2);
        assert_eq!(first.comments[0].content, "Comment number 4");
        assert_eq!(first.comments[1].content, "Comment number 3");

        let last = service.list_approved(2, 3, 2).await.unwrap();
        assert_eq!(last.comments.len(), 1);
        assert_eq!(last.comments[0].content, "Comment number 0");
    }

    #[tokio::test]
    async fn test_moderator_approves_held_comment() {
        let (service, publisher) = service();
        let receipt = service.submit(guest(1, "darn good")).await.unwrap();

        let updated = service
            .set_status(receipt.id, CommentStatus::Approved, 42)
            .await
            .unwrap();
        assert_eq!(updated.status, CommentStatus::Approved);
        let page = service.list_approved(1, 1, 20).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.comments[0].content, "**** good");

        let events = publisher.events.lock().unwrap();
        assert!(matches!(
            &events[1],
            DomainEvent::CommentStatusChanged {
                previous: CommentStatus::Pending,
                moderator_id: 42,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_same_status_is_a_no_op() {
        let (service, publisher) = service();
        let receipt = service.submit(guest(1, "fine")).await.unwrap();

        service
            .set_status(receipt.id, CommentStatus::Approved, 1)
            .await
            .unwrap();
        assert_eq!(publisher.events.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_comment_status_change() {
        let (service, _) = service();
        let err = service
            .set_status(999, CommentStatus::Rejected, 1)
            .await
            .unwrap_err();
        assert!(matches!(err, CommentError::NotFound(999)));
    }
}
