// Core comments module - submission lifecycle and the storage port it needs.

pub mod comment_models;
pub mod comment_service;
pub mod validation;

pub use comment_models::*;
pub use comment_service::*;
