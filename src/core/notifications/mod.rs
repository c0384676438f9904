// Core notifications module.
//
// Server side: the dispatcher persists notifications and fans frames out to
// open channels. Client side: the stream subscriber keeps one channel alive
// per session and the notification center keeps local read state in step
// with the server.

pub mod channel_registry;
pub mod inbox;
pub mod notification_models;
pub mod notification_service;
pub mod stream_subscriber;

pub use channel_registry::*;
pub use inbox::*;
pub use notification_models::*;
pub use notification_service::*;
pub use stream_subscriber::*;
