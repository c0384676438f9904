// The core module contains all business logic.
// Each feature gets its own submodule.

#[path = "moderation/mod.rs"]
pub mod moderation;

#[path = "comments/mod.rs"]
pub mod comments;

#[path = "notifications/mod.rs"]
pub mod notifications;
