use crate::core::comments::CommentService;
use crate::core::moderation::{Lexicon, ModerationEngine};
use crate::core::notifications::{ChannelRegistry, NotificationDispatcher, Viewer};
use crate::infra::comments::SqliteCommentStore;
use crate::infra::notifications::SqliteNotificationStore;
use crate::web::auth::JwtService;
use crate::web::error::ApiError;
use axum::http::HeaderMap;
use sqlx::SqlitePool;
use std::sync::Arc;

pub type Dispatcher = NotificationDispatcher<SqliteNotificationStore>;
pub type Comments = CommentService<SqliteCommentStore, Dispatcher>;

#[derive(Clone)]
pub struct AppState {
    pub comments: Arc<Comments>,
    pub notifications: Arc<Dispatcher>,
    pub jwt: Arc<JwtService>,
    pub staff_role: Arc<str>,
}

impl AppState {
    /// Wire stores, moderation and dispatch over one pool.
    pub async fn build(
        pool: SqlitePool,
        lexicon: Lexicon,
        jwt: JwtService,
        staff_role: &str,
        channel_buffer: usize,
    ) -> anyhow::Result<Self> {
        let comment_store = SqliteCommentStore::new(pool.clone());
        comment_store.migrate().await?;
        let notification_store = SqliteNotificationStore::new(pool);
        notification_store.migrate().await?;

        let channels = Arc::new(ChannelRegistry::new(channel_buffer));
        let notifications = Arc::new(NotificationDispatcher::new(
            notification_store,
            channels,
            staff_role,
        ));
        let engine = Arc::new(ModerationEngine::new(Arc::new(lexicon)));
        let comments = Arc::new(CommentService::new(
            comment_store,
            engine,
            Arc::clone(&notifications),
        ));

        Ok(Self {
            comments,
            notifications,
            jwt: Arc::new(jwt),
            staff_role: Arc::from(staff_role),
        })
    }

    pub fn channels(&self) -> &Arc<ChannelRegistry> {
        self.notifications.channels()
    }

    pub fn require_staff(&self, headers: &HeaderMap) -> Result<Viewer, ApiError> {
        let viewer = self.jwt.viewer(headers)?;
        if viewer.role != *self.staff_role {
            return Err(ApiError::forbidden("moderator role required"));
        }
        Ok(viewer)
    }
}
