// Notification endpoints: the pull-based inbox and the SSE push channel.

use crate::core::notifications::{ChannelId, ChannelRegistry, Frame, Notification};
use crate::web::error::ApiError;
use crate::web::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::sse::{Event, Sse},
    routing::{get, post},
    Json, Router,
};
use futures_util::stream::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_stream::wrappers::ReceiverStream;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/notifications", get(list_notifications))
        .route("/api/notifications/unread-count", get(unread_count))
        .route("/api/notifications/read-all", post(mark_all_read))
        .route("/api/notifications/{id}/read", post(mark_read))
        .route("/api/notifications/stream", get(stream))
}

#[derive(Debug, Deserialize)]
struct LimitQuery {
    limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct StreamQuery {
    token: Option<String>,
}

#[derive(Debug, Serialize)]
struct CountBody {
    count: u64,
}

#[derive(Debug, Serialize)]
struct UpdatedBody {
    updated: u64,
}

async fn list_notifications(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<Notification>>, ApiError> {
    let viewer = state.jwt.viewer(&headers)?;
    Ok(Json(state.notifications.list(&viewer, query.limit).await?))
}

async fn unread_count(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<CountBody>, ApiError> {
    let viewer = state.jwt.viewer(&headers)?;
    let count = state.notifications.unread_count(&viewer).await?;
    Ok(Json(CountBody { count }))
}

async fn mark_read(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let viewer = state.jwt.viewer(&headers)?;
    state.notifications.mark_read(&viewer, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn mark_all_read(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<UpdatedBody>, ApiError> {
    let viewer = state.jwt.viewer(&headers)?;
    let updated = state.notifications.mark_all_read(&viewer).await?;
    Ok(Json(UpdatedBody { updated }))
}

/// Unregisters the channel when the response body is dropped.
struct ChannelGuard {
    channels: Arc<ChannelRegistry>,
    id: ChannelId,
}

impl Drop for ChannelGuard {
    fn drop(&mut self) {
        self.channels.close(self.id);
    }
}

/// Push channel. The token is checked before anything is registered.
async fn stream(
    State(state): State<AppState>,
    Query(query): Query<StreamQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, serde_json::Error>>>, ApiError> {
    let token = query
        .token
        .ok_or_else(|| ApiError::unauthorized("missing token"))?;
    let viewer = state.jwt.verify(&token)?.viewer();

    let channels = Arc::clone(state.channels());
    let (id, receiver) = channels.open(viewer);
    let guard = ChannelGuard { channels, id };

    let events = ReceiverStream::new(receiver).map(move |frame: Frame| {
        let _held = &guard;
        frame.encode().map(|data| Event::default().data(data))
    });

    Ok(Sse::new(events))
}
