// SQLite implementation of CommentStore.
//
// Submitter is spread over three nullable columns: guests fill guest_name and
// guest_email, authors fill author_id. Flagged words are a JSON array.
//
// Comment writes share a transaction with the notification row they produce,
// so the notifications table must live in the same database.

use crate::core::comments::{
    Comment, CommentError, CommentStatus, CommentStore, NewComment, RecordNotification, Submitter,
};
use crate::core::notifications::Notification;
use crate::infra::notifications::sqlite_store::insert_notification;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;

const COLUMNS: &str = "id, article_id, content, guest_name, guest_email, author_id, status, \
                       moderation_reason, flagged_words, created_at";

pub struct SqliteCommentStore {
    pool: SqlitePool,
}

impl SqliteCommentStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS comments (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                article_id INTEGER NOT NULL,
                content TEXT NOT NULL,
                guest_name TEXT,
                guest_email TEXT,
                author_id INTEGER,
                status TEXT NOT NULL,
                moderation_reason TEXT,
                flagged_words TEXT NOT NULL DEFAULT '[]',
                created_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_comments_article_status \
             ON comments (article_id, status, created_at)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn storage(e: impl ToString) -> CommentError {
    CommentError::StorageError(e.to_string())
}

fn comment_from_row(row: &SqliteRow) -> Result<Comment, CommentError> {
    let author_id: Option<i64> = row.try_get("author_id").map_err(storage)?;
    let submitter = match author_id {
        Some(author_id) => Submitter::Author { author_id },
        None => Submitter::Guest {
            name: row
                .try_get::<Option<String>, _>("guest_name")
                .map_err(storage)?
                .unwrap_or_default(),
            email: row
                .try_get::<Option<String>, _>("guest_email")
                .map_err(storage)?
                .unwrap_or_default(),
        },
    };

    let status: String = row.try_get("status").map_err(storage)?;
    let flagged: String = row.try_get("flagged_words").map_err(storage)?;

    Ok(Comment {
        id: row.try_get("id").map_err(storage)?,
        article_id: row.try_get("article_id").map_err(storage)?,
        content: row.try_get("content").map_err(storage)?,
        submitter,
        status: status.parse().map_err(storage)?,
        moderation_reason: row.try_get("moderation_reason").map_err(storage)?,
        flagged_words: serde_json::from_str(&flagged).map_err(storage)?,
        created_at: row
            .try_get::<DateTime<Utc>, _>("created_at")
            .map_err(storage)?,
    })
}

#[async_trait]
impl CommentStore for SqliteCommentStore {
    async fn insert(
        &self,
        comment: NewComment,
        record: RecordNotification<'_>,
    ) -> Result<(Comment, Notification), CommentError> {
        let (guest_name, guest_email, author_id) = match &comment.submitter {
            Submitter::Guest { name, email } => (Some(name.as_str()), Some(email.as_str()), None),
            Submitter::Author { author_id } => (None, None, Some(*author_id)),
        };
        let flagged = serde_json::to_string(&comment.flagged_words).map_err(storage)?;

        let mut tx = self.pool.begin().await.map_err(storage)?;

        let result = sqlx::query(
            r#"
            INSERT INTO comments (article_id, content, guest_name, guest_email, author_id,
                                  status, moderation_reason, flagged_words, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(comment.article_id)
        .bind(&comment.content)
        .bind(guest_name)
        .bind(guest_email)
        .bind(author_id)
        .bind(comment.status.as_str())
        .bind(&comment.moderation_reason)
        .bind(flagged)
        .bind(comment.created_at)
        .execute(&mut *tx)
        .await
        .map_err(storage)?;

        let stored = Comment {
            id: result.last_insert_rowid(),
            article_id: comment.article_id,
            content: comment.content,
            submitter: comment.submitter,
            status: comment.status,
            moderation_reason: comment.moderation_reason,
            flagged_words: comment.flagged_words,
            created_at: comment.created_at,
        };

        // Dropping the transaction on any error below rolls the comment back
        let notification = insert_notification(&mut *tx, record(&stored))
            .await
            .map_err(storage)?;
        tx.commit().await.map_err(storage)?;

        Ok((stored, notification))
    }

    async fn get(&self, id: i64) -> Result<Option<Comment>, CommentError> {
        let row = sqlx::query(&format!("SELECT {COLUMNS} FROM comments WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?;

        row.as_ref().map(comment_from_row).transpose()
    }

    async fn update_status(
        &self,
        id: i64,
        status: CommentStatus,
        record: RecordNotification<'_>,
    ) -> Result<Option<(Comment, Notification)>, CommentError> {
        let mut tx = self.pool.begin().await.map_err(storage)?;

        let result = sqlx::query("UPDATE comments SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(storage)?;
        if result.rows_affected() == 0 {
            return Ok(None);
        }

        let row = sqlx::query(&format!("SELECT {COLUMNS} FROM comments WHERE id = ?"))
            .bind(id)
            .fetch_one(&mut *tx)
            .await
            .map_err(storage)?;
        let updated = comment_from_row(&row)?;

        let notification = insert_notification(&mut *tx, record(&updated))
            .await
            .map_err(storage)?;
        tx.commit().await.map_err(storage)?;

        Ok(Some((updated, notification)))
    }

    async fn list_approved(
        &self,
        article_id: i64,
        offset: u64,
        limit: u32,
    ) -> Result<Vec<Comment>, CommentError> {
        let rows = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM comments WHERE article_id = ? AND status = ? \
             ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?"
        ))
        .bind(article_id)
        .bind(CommentStatus::Approved.as_str())
        .bind(i64::from(limit))
        .bind(offset as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        rows.iter().map(comment_from_row).collect()
    }

    async fn count_approved(&self, article_id: i64) -> Result<u64, CommentError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM comments WHERE article_id = ? AND status = ?")
                .bind(article_id)
                .bind(CommentStatus::Approved.as_str())
                .fetch_one(&self.pool)
                .await
                .map_err(storage)?;
        Ok(count as u64)
    }

    async fn list_pending(&self, limit: u32) -> Result<Vec<Comment>, CommentError> {
        let rows = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM comments WHERE status = ? \
             ORDER BY created_at ASC, id ASC LIMIT ?"
        ))
        .bind(CommentStatus::Pending.as_str())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        rows.iter().map(comment_from_row).collect()
    }
}
