// Core moderation module - stateless detectors and the combinator that folds
// them into one verdict per submission.

pub mod lexicon;
pub mod moderation_models;
pub mod moderation_service;
pub mod pattern_detector;

pub use lexicon::Lexicon;
pub use moderation_models::*;
pub use moderation_service::*;
