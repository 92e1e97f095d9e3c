//! Conversation domain validation errors.

use thiserror::Error;

/// Errors returned while constructing conversation domain values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConversationDomainError {
    /// A message was built without any content parts.
    #[error("message content must contain at least one part")]
    EmptyContent,

    /// A session identifier or agent name is empty after trimming.
    #[error("{field} must not be empty")]
    EmptySegment {
        /// Which value was empty.
        field: &'static str,
    },

    /// A session identifier or agent name contains characters outside
    /// `[A-Za-z0-9._-]` or starts with a dot.
    #[error("{field} '{value}' contains invalid characters")]
    InvalidSegment {
        /// Which value was rejected.
        field: &'static str,
        /// The rejected value.
        value: String,
    },

    /// A session identifier or agent name exceeds the length limit.
    #[error("{field} exceeds 128 character limit")]
    SegmentTooLong {
        /// Which value was rejected.
        field: &'static str,
    },

    /// A serialised capability outcome had `ok: false` without an error.
    #[error("capability outcome with ok=false must carry an error")]
    MissingOutcomeError,
}
