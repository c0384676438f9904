// Client subcommands against a running desk.
//
// `watch` keeps one push channel open, mirrors it into a NotificationCenter
// and logs what arrives until Ctrl-C. `read` and `read-all` flip read state
// through the same center.

use crate::config::ClientConfig;
use crate::core::notifications::{
    AlertSink, Notification, NotificationCenter, StreamSubscriber, SubscriberEvent,
    DEFAULT_LIST_LIMIT,
};
use crate::infra::notifications::{HttpNotificationApi, SseTransport};

/// Terminal "alert": a bell plus the title.
struct ConsoleAlerts;

impl AlertSink for ConsoleAlerts {
    fn alert(&self, notification: &Notification) {
        println!("\x07[{}] {}", notification.kind, notification.title);
    }
}

fn center(
    config: &ClientConfig,
    token: &str,
) -> anyhow::Result<NotificationCenter<HttpNotificationApi>> {
    let api = HttpNotificationApi::new(
        &config.desk_url,
        token,
        config.request_timeout,
        config.max_rate_limit_retries,
    )?;
    Ok(NotificationCenter::new(api, DEFAULT_LIST_LIMIT))
}

pub async fn run(config: &ClientConfig) -> anyhow::Result<()> {
    let token = config.read_token()?;
    let mut center = center(config, &token)?;
    if config.alerts {
        center = center.with_alerts(Box::new(ConsoleAlerts));
    }

    match center.refresh().await {
        Ok(()) => {
            let inbox = center.snapshot().await;
            for n in inbox.notifications().iter().filter(|n| !n.is_read) {
                tracing::info!(notification_id = n.id, title = %n.title, "Unread");
            }
            tracing::info!(unread = inbox.unread_count(), "Watching notifications");
        }
        Err(e) => tracing::warn!(error = %e, "Initial notification fetch failed"),
    }

    let transport = SseTransport::new(&config.desk_url, config.request_timeout)?;
    let mut handle = StreamSubscriber::new(transport, config.reconnect_delay).spawn(token);

    loop {
        let event = tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = handle.next_event() => event,
        };
        let Some(event) = event else { break };

        match &event {
            SubscriberEvent::State(state) => tracing::info!(?state, "Channel state"),
            SubscriberEvent::Notification(n) => tracing::info!(
                notification_id = n.id,
                kind = %n.kind,
                title = %n.title,
                "Notification received"
            ),
            SubscriberEvent::Heartbeat => tracing::debug!("Heartbeat"),
            SubscriberEvent::AuthRejected(reason) => {
                tracing::warn!(reason = %reason, "Token rejected");
                match config.read_token() {
                    Ok(fresh) => {
                        center.api().set_token(fresh.clone()).await;
                        handle.set_token(fresh);
                    }
                    Err(e) => tracing::warn!(error = %e, "No replacement token"),
                }
            }
        }

        center.apply(&event).await;
        if let SubscriberEvent::Notification(_) = event {
            tracing::info!(unread = center.unread_count().await, "Unread notifications");
        }
    }

    tracing::info!(state = ?handle.state(), "Stopping watch");
    handle.close().await;
    Ok(())
}

/// Mark one notification read, or all of them when `id` is None.
pub async fn mark_read(config: &ClientConfig, id: Option<i64>) -> anyhow::Result<()> {
    let center = center(config, &config.read_token()?)?;
    center.refresh().await?;

    match id {
        Some(id) => center.mark_as_read(id).await?,
        None => center.mark_all_as_read().await?,
    }
    tracing::info!(unread = center.unread_count().await, "Read state updated");
    Ok(())
}
