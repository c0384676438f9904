// Entry point for the comment desk.
//
// **Architecture Overview:**
// - `core/` = Business logic (moderation, comment lifecycle, notifications)
// - `infra/` = Implementations of core traits (SQLite, HTTP and SSE clients)
// - `web/` = axum adapters (routes, auth, error mapping)
//
// This file's job is to:
// 1. Load configuration
// 2. Initialize services (dependency injection)
// 3. Run the chosen subcommand: `serve` (default), `token`, `watch`, `read`
//    or `read-all`

// These attrs point each module declaration at a more descriptive root file
// so we don't end up with half a dozen mod.rs files that all look the same.
#[path = "core/core_layer.rs"]
mod core;
#[path = "infra/infra_layer.rs"]
mod infra;
#[path = "web/web_layer.rs"]
mod web;

mod config;
mod watch;

use crate::config::AppConfig;
use crate::core::moderation::Lexicon;
use crate::core::notifications::spawn_heartbeat;
use crate::infra::moderation::load_lexicon;
use crate::web::auth::JwtService;
use crate::web::state::AppState;
use anyhow::{bail, Context};
use std::sync::Arc;

async fn serve(config: AppConfig) -> anyhow::Result<()> {
    let jwt = JwtService::new(config.jwt_secret()?, config.jwt_ttl_hours);

    // A configured lexicon that can't be read stops startup
    let lexicon = match &config.lexicon_file {
        Some(path) => load_lexicon(path)?,
        None => {
            tracing::info!("LEXICON_FILE not set, using built-in lexicon");
            Lexicon::builtin()
        }
    };

    if lexicon.is_empty() {
        tracing::warn!("Lexicon is empty, profanity checks are disabled");
    }

    let pool = infra::sqlite::connect(&config.database_url).await?;
    let state = AppState::build(
        pool,
        lexicon,
        jwt,
        &config.staff_role,
        config.channel_buffer,
    )
    .await?;

    let heartbeat = spawn_heartbeat(Arc::clone(state.channels()), config.heartbeat);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.bind_addr))?;
    tracing::info!(addr = %config.bind_addr, "Comment desk listening");

    axum::serve(listener, web::router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down");
        })
        .await?;

    heartbeat.abort();
    Ok(())
}

fn mint_token(
    config: &AppConfig,
    user_id: Option<String>,
    role: Option<String>,
) -> anyhow::Result<()> {
    let (Some(user_id), Some(role)) = (user_id, role) else {
        bail!("usage: comment_desk token <user_id> <role>");
    };
    let user_id: i64 = user_id
        .parse()
        .with_context(|| format!("user id must be an integer, got {user_id}"))?;

    let jwt = JwtService::new(config.jwt_secret()?, config.jwt_ttl_hours);
    println!("{}", jwt.issue(user_id, &role)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging so we can see what's happening
    tracing_subscriber::fmt::init();

    // Load environment variables from .env file (if it exists)
    dotenv::dotenv().ok();

    let config = AppConfig::from_env()?;
    let mut args = std::env::args().skip(1);

    match args.next().as_deref() {
        None | Some("serve") => serve(config).await,
        Some("token") => mint_token(&config, args.next(), args.next()),
        Some("watch") => watch::run(&config.client).await,
        Some("read") => {
            let Some(id) = args.next() else {
                bail!("usage: comment_desk read <notification_id>");
            };
            let id = id
                .parse()
                .with_context(|| format!("notification id must be an integer, got {id}"))?;
            watch::mark_read(&config.client, Some(id)).await
        }
        Some("read-all") => watch::mark_read(&config.client, None).await,
        Some(other) => {
            bail!("unknown command '{other}', expected serve, token, watch, read or read-all")
        }
    }
}
