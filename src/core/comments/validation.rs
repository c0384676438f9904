// Field validation for comment submissions. Runs before any moderation; a
// failed submission is never persisted.

use super::comment_models::{FieldError, SubmitCommentRequest, Submitter};
use once_cell::sync::Lazy;
use regex::Regex;

pub const MAX_CONTENT_CHARS: usize = 2000;
pub const MAX_NAME_CHARS: usize = 100;
pub const MAX_EMAIL_CHARS: usize = 254;

static EMAIL_RE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").ok());

/// A submission whose fields passed validation.
#[derive(Debug, Clone)]
pub struct ValidSubmission {
    pub article_id: i64,
    pub content: String,
    pub submitter: Submitter,
}

fn is_email(value: &str) -> bool {
    EMAIL_RE.as_ref().is_some_and(|re| re.is_match(value))
}

/// Check every field and collect all failures rather than stopping at the first.
pub fn validate_submission(
    request: &SubmitCommentRequest,
) -> Result<ValidSubmission, Vec<FieldError>> {
    let mut errors = Vec::new();

    if request.article_id <= 0 {
        errors.push(FieldError::new("articleId", "must reference an article"));
    }

    let content = request.content.trim();
    let content_len = content.chars().count();
    if content_len == 0 {
        errors.push(FieldError::new("content", "must not be empty"));
    } else if content_len > MAX_CONTENT_CHARS {
        errors.push(FieldError::new(
            "content",
            format!("must be at most {MAX_CONTENT_CHARS} characters"),
        ));
    }

    let name = request
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty());
    let email = request
        .email
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty());

    let submitter = match (request.author_id, name) {
        (Some(_), Some(_)) => {
            errors.push(FieldError::new(
                "name",
                "must not be set together with authorId",
            ));
            None
        }
        (Some(author_id), None) => {
            if email.is_some() {
                errors.push(FieldError::new(
                    "email",
                    "must not be set together with authorId",
                ));
            }
            if author_id <= 0 {
                errors.push(FieldError::new("authorId", "must be a valid author"));
            }
            Some(Submitter::Author { author_id })
        }
        (None, Some(name)) => {
            if name.chars().count() > MAX_NAME_CHARS {
                errors.push(FieldError::new(
                    "name",
                    format!("must be at most {MAX_NAME_CHARS} characters"),
                ));
            }
            match email {
                None => {
                    errors.push(FieldError::new("email", "is required for guest comments"));
                    None
                }
                Some(email) if email.len() > MAX_EMAIL_CHARS || !is_email(email) => {
                    errors.push(FieldError::new("email", "must be a valid email address"));
                    None
                }
                Some(email) => Some(Submitter::Guest {
                    name: name.to_string(),
                    email: email.to_string(),
                }),
            }
        }
        (None, None) => {
            errors.push(FieldError::new("name", "is required unless signed in"));
            None
        }
    };

    match submitter {
        Some(submitter) if errors.is_empty() => Ok(ValidSubmission {
            article_id: request.article_id,
            content: content.to_string(),
            submitter,
        }),
        _ => Err(errors),
    }
}
