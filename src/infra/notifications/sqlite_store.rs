// SQLite implementation of NotificationStore.
//
// The recipient scope is stored as a kind column plus the one field that kind
// uses, so visibility can be filtered in SQL.

use crate::core::notifications::{
    NewNotification, Notification, NotificationError, NotificationStore, RecipientScope, Viewer,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{Sqlite, SqlitePool, SqliteRow};
use sqlx::{Executor, Row};

const VISIBLE_TO: &str = "(recipient_kind = 'broadcast' \
     OR (recipient_kind = 'user' AND recipient_user = ?) \
     OR (recipient_kind = 'role' AND recipient_role = ?))";

pub struct SqliteNotificationStore {
    pool: SqlitePool,
}

impl SqliteNotificationStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS notifications (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                recipient_kind TEXT NOT NULL,
                recipient_user INTEGER,
                recipient_role TEXT,
                kind TEXT NOT NULL,
                title TEXT NOT NULL,
                message TEXT NOT NULL,
                payload TEXT NOT NULL DEFAULT 'null',
                is_read BOOLEAN NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

fn storage(e: impl ToString) -> NotificationError {
    NotificationError::StorageError(e.to_string())
}

fn notification_from_row(row: &SqliteRow) -> Result<Notification, NotificationError> {
    let kind: String = row.try_get("recipient_kind").map_err(storage)?;
    let recipient = match kind.as_str() {
        "user" => RecipientScope::User {
            user_id: row
                .try_get::<Option<i64>, _>("recipient_user")
                .map_err(storage)?
                .ok_or_else(|| storage("user notification without recipient_user"))?,
        },
        "role" => RecipientScope::Role {
            role: row
                .try_get::<Option<String>, _>("recipient_role")
                .map_err(storage)?
                .ok_or_else(|| storage("role notification without recipient_role"))?,
        },
        "broadcast" => RecipientScope::Broadcast,
        other => return Err(storage(format!("unknown recipient kind: {other}"))),
    };
    let payload: String = row.try_get("payload").map_err(storage)?;

    Ok(Notification {
        id: row.try_get("id").map_err(storage)?,
        recipient,
        kind: row.try_get("kind").map_err(storage)?,
        title: row.try_get("title").map_err(storage)?,
        message: row.try_get("message").map_err(storage)?,
        payload: serde_json::from_str(&payload).map_err(storage)?,
        is_read: row.try_get("is_read").map_err(storage)?,
        created_at: row
            .try_get::<DateTime<Utc>, _>("created_at")
            .map_err(storage)?,
    })
}

/// Insert one notification row through `executor`, which may be a pool or a
/// connection inside someone else's transaction.
pub(crate) async fn insert_notification<'e, E>(
    executor: E,
    notification: NewNotification,
) -> Result<Notification, NotificationError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let (recipient_user, recipient_role) = match &notification.recipient {
        RecipientScope::User { user_id } => (Some(*user_id), None),
        RecipientScope::Role { role } => (None, Some(role.as_str())),
        RecipientScope::Broadcast => (None, None),
    };
    let payload = serde_json::to_string(&notification.payload).map_err(storage)?;

    let result = sqlx::query(
        r#"
        INSERT INTO notifications (recipient_kind, recipient_user, recipient_role,
                                   kind, title, message, payload, is_read, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, 0, ?)
        "#,
    )
    .bind(notification.recipient.kind())
    .bind(recipient_user)
    .bind(recipient_role)
    .bind(&notification.kind)
    .bind(&notification.title)
    .bind(&notification.message)
    .bind(payload)
    .bind(notification.created_at)
    .execute(executor)
    .await
    .map_err(storage)?;

    Ok(Notification {
        id: result.last_insert_rowid(),
        recipient: notification.recipient,
        kind: notification.kind,
        title: notification.title,
        message: notification.message,
        payload: notification.payload,
        is_read: false,
        created_at: notification.created_at,
    })
}

#[async_trait]
impl NotificationStore for SqliteNotificationStore {
    async fn insert(
        &self,
        notification: NewNotification,
    ) -> Result<Notification, NotificationError> {
        insert_notification(&self.pool, notification).await
    }

    async fn list_for(
        &self,
        viewer: &Viewer,
        limit: u32,
    ) -> Result<Vec<Notification>, NotificationError> {
        let rows = sqlx::query(&format!(
            "SELECT * FROM notifications WHERE {VISIBLE_TO} \
             ORDER BY created_at DESC, id DESC LIMIT ?"
        ))
        .bind(viewer.user_id)
        .bind(&viewer.role)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        rows.iter().map(notification_from_row).collect()
    }

    async fn unread_count(&self, viewer: &Viewer) -> Result<u64, NotificationError> {
        let count: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM notifications WHERE is_read = 0 AND {VISIBLE_TO}"
        ))
        .bind(viewer.user_id)
        .bind(&viewer.role)
        .fetch_one(&self.pool)
        .await
        .map_err(storage)?;
        Ok(count as u64)
    }

    async fn mark_read(&self, viewer: &Viewer, id: i64) -> Result<bool, NotificationError> {
        // SQLite counts matched rows, so an already-read row still reports 1
        let result = sqlx::query(&format!(
            "UPDATE notifications SET is_read = 1 WHERE id = ? AND {VISIBLE_TO}"
        ))
        .bind(id)
        .bind(viewer.user_id)
        .bind(&viewer.role)
        .execute(&self.pool)
        .await
        .map_err(storage)?;
        Ok(result.rows_affected() > 0)
    }

    async fn mark_all_read(&self, viewer: &Viewer) -> Result<u64, NotificationError> {
        let result = sqlx::query(&format!(
            "UPDATE notifications SET is_read = 1 WHERE is_read = 0 AND {VISIBLE_TO}"
        ))
        .bind(viewer.user_id)
        .bind(&viewer.role)
        .execute(&self.pool)
        .await
        .map_err(storage)?;
        Ok(result.rows_affected())
    }
}
