// Comment endpoints: public submission and listing, plus the staff-only
// moderation queue.

use crate::core::comments::{
    Comment, CommentStatus, SubmissionReceipt, SubmitCommentRequest, Submitter, DEFAULT_PAGE_SIZE,
};
use crate::web::error::ApiError;
use crate::web::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, patch, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/comments", post(submit_comment))
        .route("/api/comments/pending", get(list_pending))
        .route("/api/comments/{id}/status", patch(set_status))
        .route("/api/articles/{id}/comments", get(list_comments))
}

/// Public view of an approved comment. Guest emails never leave the server.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PublicComment {
    id: i64,
    article_id: i64,
    content: String,
    author_name: Option<String>,
    author_id: Option<i64>,
    created_at: DateTime<Utc>,
}

impl From<Comment> for PublicComment {
    fn from(comment: Comment) -> Self {
        Self {
            id: comment.id,
            article_id: comment.article_id,
            author_name: comment.submitter.display_name().map(str::to_string),
            author_id: comment.submitter.author_id(),
            content: comment.content,
            created_at: comment.created_at,
        }
    }
}

/// Staff view, including moderation details and guest contact.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ModeratedComment {
    id: i64,
    article_id: i64,
    content: String,
    guest_name: Option<String>,
    guest_email: Option<String>,
    author_id: Option<i64>,
    status: CommentStatus,
    moderation_reason: Option<String>,
    flagged_words: Vec<String>,
    created_at: DateTime<Utc>,
}

impl From<Comment> for ModeratedComment {
    fn from(comment: Comment) -> Self {
        let (guest_name, guest_email, author_id) = match comment.submitter {
            Submitter::Guest { name, email } => (Some(name), Some(email), None),
            Submitter::Author { author_id } => (None, None, Some(author_id)),
        };
        Self {
            id: comment.id,
            article_id: comment.article_id,
            content: comment.content,
            guest_name,
            guest_email,
            author_id,
            status: comment.status,
            moderation_reason: comment.moderation_reason,
            flagged_words: comment.flagged_words,
            created_at: comment.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CommentPageBody {
    comments: Vec<PublicComment>,
    total: u64,
    page: u32,
    per_page: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageQuery {
    page: Option<u32>,
    per_page: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct LimitQuery {
    limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct StatusBody {
    status: CommentStatus,
}

async fn submit_comment(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<SubmitCommentRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<SubmissionReceipt>), ApiError> {
    let Json(request) = body?;

    // Attributed comments must come from the author they claim
    if let Some(author_id) = request.author_id {
        let viewer = state.jwt.viewer(&headers)?;
        if viewer.user_id != author_id {
            return Err(ApiError::forbidden("authorId does not match token"));
        }
    }

    let receipt = state.comments.submit(request).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

async fn list_comments(
    State(state): State<AppState>,
    Path(article_id): Path<i64>,
    Query(query): Query<PageQuery>,
) -> Result<Json<CommentPageBody>, ApiError> {
    let page = state
        .comments
        .list_approved(
            article_id,
            query.page.unwrap_or(1),
            query.per_page.unwrap_or(DEFAULT_PAGE_SIZE),
        )
        .await?;

    Ok(Json(CommentPageBody {
        comments: page.comments.into_iter().map(PublicComment::from).collect(),
        total: page.total,
        page: page.page,
        per_page: page.per_page,
    }))
}

async fn list_pending(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<ModeratedComment>>, ApiError> {
    state.require_staff(&headers)?;
    let pending = state
        .comments
        .list_pending(query.limit.unwrap_or(DEFAULT_PAGE_SIZE))
        .await?;
    Ok(Json(pending.into_iter().map(ModeratedComment::from).collect()))
}

async fn set_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(comment_id): Path<i64>,
    Json(body): Json<StatusBody>,
) -> Result<Json<ModeratedComment>, ApiError> {
    let moderator = state.require_staff(&headers)?;
    let updated = state
        .comments
        .set_status(comment_id, body.status, moderator.user_id)
        .await?;
    Ok(Json(ModeratedComment::from(updated)))
}
