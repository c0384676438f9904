// reqwest client for the notification request/response endpoints.

use crate::core::notifications::{ApiClientError, Notification, NotificationApi};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::RwLock;

const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(1);

#[derive(Deserialize)]
struct CountBody {
    count: u64,
}

#[derive(Deserialize)]
struct UpdatedBody {
    updated: u64,
}

pub struct HttpNotificationApi {
    client: Client,
    base_url: String,
    token: RwLock<String>,
    timeout: Duration,
    max_retries: u32,
}

impl HttpNotificationApi {
    pub fn new(
        base_url: impl Into<String>,
        token: impl Into<String>,
        timeout: Duration,
        max_retries: u32,
    ) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: RwLock::new(token.into()),
            timeout,
            max_retries,
        })
    }

    /// Used for every request from now on.
    pub async fn set_token(&self, token: impl Into<String>) {
        *self.token.write().await = token.into();
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send a request, retrying only on 429 up to `max_retries` times. A
    /// `Retry-After` longer than the request timeout is not waited out.
    async fn send(
        &self,
        build: impl Fn() -> RequestBuilder + Send + Sync,
    ) -> Result<Response, ApiClientError> {
        let mut attempt = 0;
        loop {
            let token = self.token.read().await.clone();
            let response = build()
                .bearer_auth(token)
                .send()
                .await
                .map_err(|e| ApiClientError::Transport(e.to_string()))?;

            let status = response.status();
            if status == StatusCode::TOO_MANY_REQUESTS && attempt < self.max_retries {
                let wait = retry_after(&response).unwrap_or(DEFAULT_RETRY_AFTER);
                if wait > self.timeout {
                    tracing::warn!(
                        wait_secs = wait.as_secs(),
                        "Rate limited for longer than the request timeout, giving up"
                    );
                    return Err(ApiClientError::TooManyRequests);
                }
                attempt += 1;
                tracing::warn!(attempt, wait_ms = wait.as_millis() as u64, "Rate limited, retrying");
                tokio::time::sleep(wait).await;
                continue;
            }

            return match status {
                s if s.is_success() => Ok(response),
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(ApiClientError::Unauthorized),
                StatusCode::NOT_FOUND => Err(ApiClientError::NotFound),
                StatusCode::TOO_MANY_REQUESTS => Err(ApiClientError::TooManyRequests),
                s => {
                    let body = response.text().await.unwrap_or_default();
                    Err(ApiClientError::Status(s.as_u16(), body))
                }
            };
        }
    }

    async fn json<T: DeserializeOwned>(response: Response) -> Result<T, ApiClientError> {
        response
            .json::<T>()
            .await
            .map_err(|e| ApiClientError::Decode(e.to_string()))
    }
}

fn retry_after(response: &Response) -> Option<Duration> {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

#[async_trait]
impl NotificationApi for HttpNotificationApi {
    async fn list(&self, limit: u32) -> Result<Vec<Notification>, ApiClientError> {
        let url = self.url("/api/notifications");
        let response = self
            .send(|| self.client.get(&url).query(&[("limit", limit)]))
            .await?;
        Self::json(response).await
    }

    async fn unread_count(&self) -> Result<u64, ApiClientError> {
        let url = self.url("/api/notifications/unread-count");
        let response = self.send(|| self.client.get(&url)).await?;
        Ok(Self::json::<CountBody>(response).await?.count)
    }

    async fn mark_read(&self, id: i64) -> Result<(), ApiClientError> {
        let url = self.url(&format!("/api/notifications/{id}/read"));
        self.send(|| self.client.post(&url)).await?;
        Ok(())
    }

    async fn mark_all_read(&self) -> Result<u64, ApiClientError> {
        let url = self.url("/api/notifications/read-all");
        let response = self.send(|| self.client.post(&url)).await?;
        Ok(Self::json::<UpdatedBody>(response).await?.updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header, StatusCode as AxumStatus};
    use axum::response::IntoResponse;
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    /// Serve a router on an ephemeral port and return its base url.
    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn throttled_router(
        hits: Arc<AtomicU32>,
        throttle_first: u32,
        retry_after: &'static str,
    ) -> Router {
        Router::new().route(
            "/api/notifications/unread-count",
            get(move || {
                let hits = Arc::clone(&hits);
                async move {
                    let n = hits.fetch_add(1, Ordering::SeqCst);
                    if n < throttle_first {
                        (AxumStatus::TOO_MANY_REQUESTS, [(header::RETRY_AFTER, retry_after)]).into_response()
                    } else {
                        Json(json!({"count": 4})).into_response()
                    }
                }
            }),
        )
    }

    #[tokio::test]
    async fn test_retries_rate_limited_requests() {
        let hits = Arc::new(AtomicU32::new(0));
        let base = serve(throttled_router(Arc::clone(&hits), 2, "0")).await;
        let api = HttpNotificationApi::new(base, "t", Duration::from_secs(5), 3).unwrap();

        assert_eq!(api.unread_count().await.unwrap(), 4);
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_retry_budget() {
        let hits = Arc::new(AtomicU32::new(0));
        let base = serve(throttled_router(Arc::clone(&hits), 10, "0")).await;
        let api = HttpNotificationApi::new(base, "t", Duration::from_secs(5), 2).unwrap();

        let err = api.unread_count().await.unwrap_err();
        assert!(matches!(err, ApiClientError::TooManyRequests));
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_long_retry_after_is_not_waited_out() {
        let hits = Arc::new(AtomicU32::new(0));
        let base = serve(throttled_router(Arc::clone(&hits), 10, "3600")).await;
        let api = HttpNotificationApi::new(base, "t", Duration::from_secs(1), 3).unwrap();

        let result = tokio::time::timeout(Duration::from_secs(5), api.unread_count())
            .await
            .expect("client waited on the server's Retry-After");
        assert!(matches!(result, Err(ApiClientError::TooManyRequests)));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_replaced_token_is_used() {
        let router = Router::new().route(
            "/api/notifications/unread-count",
            get(|headers: axum::http::HeaderMap| async move {
                match headers.get(header::AUTHORIZATION) {
                    Some(value) if value == "Bearer fresh" => {
                        Json(json!({"count": 1})).into_response()
                    }
                    _ => AxumStatus::UNAUTHORIZED.into_response(),
                }
            }),
        );
        let base = serve(router).await;
        let api = HttpNotificationApi::new(base, "stale", Duration::from_secs(5), 0).unwrap();

        assert!(matches!(
            api.unread_count().await,
            Err(ApiClientError::Unauthorized)
        ));
        api.set_token("fresh").await;
        assert_eq!(api.unread_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_other_failures_are_not_retried() {
        let hits = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&hits);
        let router = Router::new().route(
            "/api/notifications/read-all",
            axum::routing::post(move || {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    (AxumStatus::INTERNAL_SERVER_ERROR, "boom")
                }
            }),
        );
        let base = serve(router).await;
        let api = HttpNotificationApi::new(base, "t", Duration::from_secs(5), 3).unwrap();

        match api.mark_all_read().await.unwrap_err() {
            ApiClientError::Status(500, body) => assert_eq!(body, "boom"),
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
