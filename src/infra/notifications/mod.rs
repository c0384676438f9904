// Notification storage plus the client-side HTTP and SSE adapters.

pub mod http_api;
pub mod in_memory;
pub mod sqlite_store;
pub mod sse_transport;

pub use http_api::HttpNotificationApi;
pub use in_memory::InMemoryNotificationStore;
pub use sqlite_store::SqliteNotificationStore;
pub use sse_transport::{SseDecoder, SseTransport};
