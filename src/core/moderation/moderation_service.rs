// Moderation combinator - runs every detector over a submission and folds the
// partial results into one verdict.
//
// Detector order is fixed and documents the order reasons appear in:
// 1. content lexicon   -> block, "Profanity detected: <words>"
// 2. display name      -> block, "Inappropriate name"
// 3. spam patterns     -> flag,  "Spam detected"
// 4. excessive caps    -> flag,  "Excessive caps"
//
// Every detector runs; there is no short-circuiting. Nothing here touches
// storage, so identical inputs always give identical verdicts.

use super::lexicon::Lexicon;
use super::moderation_models::{ModerationVerdict, Signal, Submission};
use super::pattern_detector;
use std::sync::Arc;

// ============================================================================
// DETECTOR TRAIT
// ============================================================================

/// One stateless heuristic. Must never fail; odd input means "no signal".
pub trait Detector: Send + Sync {
    fn name(&self) -> &'static str;
    fn inspect(&self, submission: &Submission<'_>) -> Signal;
}

// ============================================================================
// DETECTORS
// ============================================================================

pub struct ContentLexiconDetector {
    lexicon: Arc<Lexicon>,
}

impl ContentLexiconDetector {
    pub fn new(lexicon: Arc<Lexicon>) -> Self {
        Self { lexicon }
    }
}

impl Detector for ContentLexiconDetector {
    fn name(&self) -> &'static str {
        "content_lexicon"
    }

    fn inspect(&self, submission: &Submission<'_>) -> Signal {
        let words = self.lexicon.get_profane_words(submission.content);
        if words.is_empty() {
            return Signal::none();
        }

        Signal {
            block: true,
            flag: false,
            taints_content: true,
            reason: Some(format!("Profanity detected: {}", words.join(", "))),
            flagged_words: words,
        }
    }
}

pub struct DisplayNameDetector {
    lexicon: Arc<Lexicon>,
}

impl DisplayNameDetector {
    pub fn new(lexicon: Arc<Lexicon>) -> Self {
        Self { lexicon }
    }
}

impl Detector for DisplayNameDetector {
    fn name(&self) -> &'static str {
        "display_name"
    }

    fn inspect(&self, submission: &Submission<'_>) -> Signal {
        match submission.display_name {
            Some(name) if self.lexicon.contains_profanity(name) => Signal {
                block: true,
                reason: Some("Inappropriate name".to_string()),
                ..Signal::none()
            },
            _ => Signal::none(),
        }
    }
}

pub struct SpamDetector;

impl Detector for SpamDetector {
    fn name(&self) -> &'static str {
        "spam"
    }

    fn inspect(&self, submission: &Submission<'_>) -> Signal {
        if pattern_detector::is_spam(submission.content) {
            Signal {
                flag: true,
                reason: Some("Spam detected".to_string()),
                ..Signal::none()
            }
        } else {
            Signal::none()
        }
    }
}

pub struct CapsDetector;

impl Detector for CapsDetector {
    fn name(&self) -> &'static str {
        "excessive_caps"
    }

    fn inspect(&self, submission: &Submission<'_>) -> Signal {
        if pattern_detector::is_excessive_caps(submission.content) {
            Signal {
                flag: true,
                reason: Some("Excessive caps".to_string()),
                ..Signal::none()
            }
        } else {
            Signal::none()
        }
    }
}

// ============================================================================
// ENGINE
// ============================================================================

/// Folds an ordered list of detectors into a single verdict.
pub struct ModerationEngine {
    lexicon: Arc<Lexicon>,
    detectors: Vec<Box<dyn Detector>>,
}

impl ModerationEngine {
    /// The standard detector pipeline over an injected lexicon.
    pub fn new(lexicon: Arc<Lexicon>) -> Self {
        let detectors: Vec<Box<dyn Detector>> = vec![
            Box::new(ContentLexiconDetector::new(Arc::clone(&lexicon))),
            Box::new(DisplayNameDetector::new(Arc::clone(&lexicon))),
            Box::new(SpamDetector),
            Box::new(CapsDetector),
        ];
        Self::with_detectors(lexicon, detectors)
    }

    pub fn with_detectors(lexicon: Arc<Lexicon>, detectors: Vec<Box<dyn Detector>>) -> Self {
        Self { lexicon, detectors }
    }

    /// Mask lexicon terms for display.
    pub fn mask(&self, text: &str) -> String {
        self.lexicon.clean(text)
    }

    /// Compute the verdict for one submission.
    pub fn moderate_comment(&self, content: &str, display_name: Option<&str>) -> ModerationVerdict {
        let submission = Submission {
            content,
            display_name,
        };

        self.detectors
            .iter()
            .fold(ModerationVerdict::clean(), |verdict, detector| {
                let signal = detector.inspect(&submission);
                if !signal.is_empty() {
                    tracing::debug!(
                        detector = detector.name(),
                        block = signal.block,
                        flag = signal.flag,
                        "Detector raised a signal"
                    );
                }
                verdict.merge(signal)
            })
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::comments::CommentStatus;

    fn engine() -> ModerationEngine {
        ModerationEngine::new(Arc::new(Lexicon::new(["darn", "heck"])))
    }

    #[test]
    fn test_clean_submission_is_approved() {
        let verdict = engine().moderate_comment("Great article, thanks!", Some("Reader"));
        assert!(verdict.is_clean);
        assert!(!verdict.should_block);
        assert!(!verdict.should_flag);
        assert_eq!(verdict.moderation_reason, None);
        assert_eq!(verdict.status(), CommentStatus::Approved);
    }

    #[test]
    fn test_profanity_blocks_and_lists_words() {
        let verdict = engine().moderate_comment("heck, what a darn mess", None);
        assert!(!verdict.is_clean);
        assert!(verdict.should_block);
        assert_eq!(verdict.flagged_words, vec!["darn", "heck"]);
        assert_eq!(
            verdict.moderation_reason.as_deref(),
            Some("Profanity detected: darn, heck")
        );
        assert_eq!(verdict.status(), CommentStatus::Pending);
    }

    #[test]
    fn test_bad_name_alone_sets_reason() {
        let verdict = engine().moderate_comment("Nice piece", Some("Darn Reader"));
        assert!(verdict.should_block);
        assert!(verdict.is_clean);
        assert_eq!(verdict.moderation_reason.as_deref(), Some("Inappropriate name"));
    }

    #[test]
    fn test_all_signals_accumulate_in_fixed_order() {
        let verdict = engine().moderate_comment("HECK CLICK HERE NOW bit.ly/abc", Some("heck"));
        assert!(verdict.should_block);
        assert!(verdict.should_flag);
        assert_eq!(
            verdict.moderation_reason.as_deref(),
            Some("Profanity detected: heck; Inappropriate name; Spam detected; Excessive caps")
        );
    }

    #[test]
    fn test_spam_only_flags() {
        let verdict = engine().moderate_comment("visit bit.ly/xyz now", None);
        assert!(verdict.is_clean);
        assert!(!verdict.should_block);
        assert!(verdict.should_flag);
        assert_eq!(verdict.moderation_reason.as_deref(), Some("Spam detected"));
        assert_eq!(verdict.status(), CommentStatus::Pending);
    }

    #[test]
    fn test_caps_only_flags() {
        let verdict = engine().moderate_comment("THIS IS A TEST", None);
        assert!(verdict.should_flag);
        assert_eq!(verdict.moderation_reason.as_deref(), Some("Excessive caps"));
    }

    #[test]
    fn test_moderation_is_deterministic() {
        let engine = engine();
        let first = engine.moderate_comment("darn SPAM www.example.com", Some("heck"));
        let second = engine.moderate_comment("darn SPAM www.example.com", Some("heck"));
        assert_eq!(first, second);
    }

    #[test]
    fn test_empty_content_is_not_flagged() {
        let verdict = engine().moderate_comment("", None);
        assert_eq!(verdict, ModerationVerdict::clean());
    }

    #[test]
    fn test_custom_pipeline_runs_in_given_order() {
        let engine = ModerationEngine::with_detectors(
            Arc::new(Lexicon::new(["darn"])),
            vec![Box::new(CapsDetector), Box::new(SpamDetector)],
        );
        let verdict = engine.moderate_comment("LOOK AT www.example.com", None);
        assert_eq!(
            verdict.moderation_reason.as_deref(),
            Some("Excessive caps; Spam detected")
        );
    }

    #[test]
    fn test_mask_uses_engine_lexicon() {
        assert_eq!(engine().mask("oh heck, darn"), "oh ****, ****");
    }
}
