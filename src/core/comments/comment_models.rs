// Comment domain models.
//
// Pure data - the web layer maps these to its own response shapes and the
// infra layer maps them to rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Visibility state of a comment.
///
/// Submissions land as APPROVED (clean) or PENDING (held). REJECTED is only
/// ever set by a moderator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommentStatus {
    Pending,
    Approved,
    Rejected,
}

impl CommentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommentStatus::Pending => "PENDING",
            CommentStatus::Approved => "APPROVED",
            CommentStatus::Rejected => "REJECTED",
        }
    }

    /// Only approved comments show up in public listings.
    pub fn is_public(&self) -> bool {
        matches!(self, CommentStatus::Approved)
    }
}

impl fmt::Display for CommentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PENDING" => Ok(CommentStatus::Pending),
            "APPROVED" => Ok(CommentStatus::Approved),
            "REJECTED" => Ok(CommentStatus::Rejected),
            other => Err(format!("unknown comment status: {other}")),
        }
    }
}

/// Who wrote the comment. Guests and authenticated authors are exclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submitter {
    Guest { name: String, email: String },
    Author { author_id: i64 },
}

impl Submitter {
    pub fn display_name(&self) -> Option<&str> {
        match self {
            Submitter::Guest { name, .. } => Some(name),
            Submitter::Author { .. } => None,
        }
    }

    pub fn author_id(&self) -> Option<i64> {
        match self {
            Submitter::Guest { .. } => None,
            Submitter::Author { author_id } => Some(*author_id),
        }
    }
}

/// A persisted comment.
#[derive(Debug, Clone, PartialEq)]
pub struct Comment {
    pub id: i64,
    pub article_id: i64,
    pub content: String,
    pub submitter: Submitter,
    pub status: CommentStatus,
    pub moderation_reason: Option<String>,
    pub flagged_words: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// A comment ready to be written; the store assigns the id.
#[derive(Debug, Clone)]
pub struct NewComment {
    pub article_id: i64,
    pub content: String,
    pub submitter: Submitter,
    pub status: CommentStatus,
    pub moderation_reason: Option<String>,
    pub flagged_words: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Raw submission as received from a client. Missing fields fall back to
/// defaults so validation can report them field by field.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SubmitCommentRequest {
    pub article_id: i64,
    pub content: String,
    pub name: Option<String>,
    pub author_id: Option<i64>,
    pub email: Option<String>,
}

/// What the submitter learns about their comment.
///
/// Both outcomes are successes; `is_approved` tells the client whether the
/// comment is already public or waiting for review.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionReceipt {
    pub id: i64,
    pub status: CommentStatus,
    pub is_approved: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub moderation_reason: Option<String>,
}

impl From<&Comment> for SubmissionReceipt {
    fn from(comment: &Comment) -> Self {
        Self {
            id: comment.id,
            status: comment.status,
            is_approved: comment.status == CommentStatus::Approved,
            moderation_reason: comment.moderation_reason.clone(),
        }
    }
}

/// One page of public comments.
#[derive(Debug, Clone)]
pub struct CommentPage {
    pub comments: Vec<Comment>,
    pub total: u64,
    pub page: u32,
    pub per_page: u32,
}

/// A single validation failure, reported per field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Events the lifecycle manager hands to the dispatcher.
#[derive(Debug, Clone)]
pub enum DomainEvent {
    CommentSubmitted {
        comment: Comment,
    },
    CommentStatusChanged {
        comment: Comment,
        previous: CommentStatus,
        moderator_id: i64,
    },
}

impl DomainEvent {
    pub fn comment(&self) -> &Comment {
        match self {
            DomainEvent::CommentSubmitted { comment } => comment,
            DomainEvent::CommentStatusChanged { comment, .. } => comment,
        }
    }

    /// True when the submission was held for review.
    pub fn is_flagged(&self) -> bool {
        matches!(
            self,
            DomainEvent::CommentSubmitted { comment } if comment.status == CommentStatus::Pending
        )
    }
}
