// Client stream subscriber - keeps one push channel alive for a session.
//
// The channel is owned by a background task running an explicit state machine:
//
//   CONNECTING -> OPEN -> (error / end of stream) -> RECONNECTING -> CONNECTING
//
// CLOSED is entered only through `SubscriberHandle::close` (or dropping the
// handle). After a failure exactly one new connection is attempted after the
// fixed delay; the old channel is dropped, never retried on its own. The delay
// does not grow and there is no retry cap.
//
// The rest of the application never sees transport callbacks. It consumes a
// typed queue of `SubscriberEvent`s instead.

use super::notification_models::{Frame, Notification};
use async_trait::async_trait;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

const EVENT_QUEUE: usize = 256;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("Channel refused: {0}")]
    Auth(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Undecodable frame: {0}")]
    Decode(String),
}

// ============================================================================
// TRANSPORT TRAIT (PORT)
// ============================================================================

pub type FrameStream = BoxStream<'static, Result<Frame, StreamError>>;

/// Opens one push channel. The token travels in the connection request itself.
#[async_trait]
pub trait ChannelTransport: Send + Sync + 'static {
    async fn connect(&self, token: &str) -> Result<FrameStream, StreamError>;
}

// ============================================================================
// STATE & EVENTS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Connecting,
    Open,
    Reconnecting,
    Closed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubscriberEvent {
    State(ChannelState),
    Notification(Notification),
    Heartbeat,
    /// The server refused the token. Reconnecting continues; supply a fresh
    /// token with `SubscriberHandle::set_token`.
    AuthRejected(String),
}

// ============================================================================
// HANDLE
// ============================================================================

pub struct SubscriberHandle {
    events: mpsc::Receiver<SubscriberEvent>,
    state: watch::Receiver<ChannelState>,
    token: watch::Sender<String>,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SubscriberHandle {
    /// Next event from the channel task. None once the task has finished.
    pub async fn next_event(&mut self) -> Option<SubscriberEvent> {
        self.events.recv().await
    }

    pub fn state(&self) -> ChannelState {
        *self.state.borrow()
    }

    /// Used for every connection attempt from now on.
    pub fn set_token(&self, token: impl Into<String>) {
        self.token.send_replace(token.into());
    }

    /// Explicit teardown. Waits for the channel task to reach CLOSED.
    pub async fn close(self) {
        let SubscriberHandle {
            events,
            shutdown,
            task,
            ..
        } = self;
        // A full event queue must not hold the task open
        drop(events);
        let _ = shutdown.send(true);
        if let Err(e) = task.await {
            tracing::warn!(error = %e, "Subscriber task ended abnormally");
        }
    }
}

// ============================================================================
// SUBSCRIBER
// ============================================================================

pub struct StreamSubscriber<T: ChannelTransport> {
    transport: Arc<T>,
    reconnect_delay: Duration,
}

/// What ended an open channel.
enum Ended {
    Shutdown,
    Dropped,
}

impl<T: ChannelTransport> StreamSubscriber<T> {
    pub fn new(transport: T, reconnect_delay: Duration) -> Self {
        Self {
            transport: Arc::new(transport),
            reconnect_delay,
        }
    }

    /// Start the channel task.
    pub fn spawn(self, token: impl Into<String>) -> SubscriberHandle {
        let (events_tx, events) = mpsc::channel(EVENT_QUEUE);
        let (state_tx, state) = watch::channel(ChannelState::Connecting);
        let (token, token_rx) = watch::channel(token.into());
        let (shutdown, shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(self.run(token_rx, shutdown_rx, state_tx, events_tx));

        SubscriberHandle {
            events,
            state,
            token,
            shutdown,
            task,
        }
    }

    async fn run(
        self,
        token: watch::Receiver<String>,
        mut shutdown: watch::Receiver<bool>,
        state: watch::Sender<ChannelState>,
        events: mpsc::Sender<SubscriberEvent>,
    ) {
        let mut link = Link { state, events };

        'session: loop {
            if !link.set_state(ChannelState::Connecting).await {
                break;
            }

            let current_token = token.borrow().clone();
            let connected = tokio::select! {
                _ = shutdown.changed() => break 'session,
                result = self.transport.connect(&current_token) => result,
            };

            match connected {
                Ok(stream) => {
                    if !link.set_state(ChannelState::Open).await {
                        break;
                    }
                    tracing::info!("Notification channel open");

                    if let Ended::Shutdown = pump(stream, &mut shutdown, &link).await {
                        break 'session;
                    }
                }
                Err(StreamError::Auth(reason)) => {
                    tracing::warn!(reason = %reason, "Notification channel refused");
                    if !link.emit(SubscriberEvent::AuthRejected(reason)).await {
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Notification channel failed to open");
                }
            }

            if !link.set_state(ChannelState::Reconnecting).await {
                break;
            }
            tracing::info!(
                delay_secs = self.reconnect_delay.as_secs_f64(),
                "Reconnecting notification channel"
            );

            tokio::select! {
                _ = shutdown.changed() => break 'session,
                _ = tokio::time::sleep(self.reconnect_delay) => {}
            }
        }

        link.set_state(ChannelState::Closed).await;
        tracing::info!("Notification channel closed");
    }
}

/// Sending side of the task's outputs.
struct Link {
    state: watch::Sender<ChannelState>,
    events: mpsc::Sender<SubscriberEvent>,
}

impl Link {
    /// Returns false once nobody is listening any more.
    async fn emit(&self, event: SubscriberEvent) -> bool {
        self.events.send(event).await.is_ok()
    }

    async fn set_state(&self, next: ChannelState) -> bool {
        self.state.send_replace(next);
        self.emit(SubscriberEvent::State(next)).await
    }
}

/// Drain one open channel until it fails, ends, or teardown is requested.
async fn pump(
    mut stream: FrameStream,
    shutdown: &mut watch::Receiver<bool>,
    link: &Link,
) -> Ended {
    loop {
        let item = tokio::select! {
            _ = shutdown.changed() => return Ended::Shutdown,
            item = stream.next() => item,
        };

        let event = match item {
            Some(Ok(Frame::Notification { notification })) => {
                SubscriberEvent::Notification(notification)
            }
            Some(Ok(Frame::Heartbeat)) => SubscriberEvent::Heartbeat,
            Some(Err(StreamError::Decode(e))) => {
                tracing::warn!(error = %e, "Skipping undecodable frame");
                continue;
            }
            Some(Err(e)) => {
                tracing::warn!(error = %e, "Notification channel dropped");
                return Ended::Dropped;
            }
            None => {
                tracing::info!("Notification channel ended by server");
                return Ended::Dropped;
            }
        };

        if !link.emit(event).await {
            return Ended::Shutdown;
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
