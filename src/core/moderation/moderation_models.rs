// Moderation domain models - inputs and outputs of the detector fold.
//
// None of these are persisted. Only the effect of a verdict (status, reason,
// flagged words) is written onto the comment row.

use crate::core::comments::CommentStatus;
use serde::Serialize;

/// The parts of a submission the detectors look at.
#[derive(Debug, Clone, Copy)]
pub struct Submission<'a> {
    pub content: &'a str,
    pub display_name: Option<&'a str>,
}

/// Partial result produced by a single detector.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Signal {
    /// Withhold from public view until a moderator decides
    pub block: bool,
    /// Hold for review (softer heuristic hit)
    pub flag: bool,
    /// The content itself is tainted (only the content lexicon sets this)
    pub taints_content: bool,
    pub reason: Option<String>,
    pub flagged_words: Vec<String>,
}

impl Signal {
    /// A detector that found nothing.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        !self.block && !self.flag && !self.taints_content && self.reason.is_none()
    }
}

/// Combined outcome for one submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModerationVerdict {
    pub is_clean: bool,
    pub flagged_words: Vec<String>,
    pub moderation_reason: Option<String>,
    pub should_block: bool,
    pub should_flag: bool,
}

impl ModerationVerdict {
    pub fn clean() -> Self {
        Self {
            is_clean: true,
            flagged_words: Vec::new(),
            moderation_reason: None,
            should_block: false,
            should_flag: false,
        }
    }

    /// Fold one more signal into the verdict.
    ///
    /// Flags OR together, reasons concatenate with "; " in the order signals
    /// arrive, flagged words keep their first-seen order.
    pub fn merge(mut self, signal: Signal) -> Self {
        self.should_block |= signal.block;
        self.should_flag |= signal.flag;
        if signal.taints_content {
            self.is_clean = false;
        }

        if let Some(reason) = signal.reason {
            self.moderation_reason = Some(match self.moderation_reason.take() {
                Some(existing) if !existing.is_empty() => format!("{existing}; {reason}"),
                _ => reason,
            });
        }

        for word in signal.flagged_words {
            if !self.flagged_words.contains(&word) {
                self.flagged_words.push(word);
            }
        }

        self
    }

    /// Held verdicts are stored as PENDING; nothing is rejected automatically.
    pub fn status(&self) -> CommentStatus {
        if self.should_block || self.should_flag {
            CommentStatus::Pending
        } else {
            CommentStatus::Approved
        }
    }

    pub fn is_held(&self) -> bool {
        self.status() == CommentStatus::Pending
    }
}
