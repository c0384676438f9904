// The infra module contains implementations of core traits.
// Each feature implementation goes in its own submodule.

pub mod sqlite;

#[path = "comments/mod.rs"]
pub mod comments;

#[path = "notifications/mod.rs"]
pub mod notifications;

#[path = "moderation/lexicon_file.rs"]
pub mod moderation;
