//! Identifiers for messages, runs, and persisted sessions.

use super::ConversationDomainError;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

const MAX_SEGMENT_LENGTH: usize = 128;

/// Unique identifier for a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(Uuid);

impl MessageId {
    /// Creates a new random message identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the wrapped UUID.
    #[must_use]
    pub const fn into_inner(self) -> Uuid {
        self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Identifier of one loop run, used to correlate log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(Uuid);

impl RunId {
    /// Creates a new random run identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Caller-chosen identifier for a persisted conversation.
///
/// Session identifiers double as file names in the file-backed store, so
/// they are restricted to `[A-Za-z0-9._-]` and may not start with a dot.
///
/// # Examples
///
/// ```
/// use palladio::conversation::domain::SessionId;
///
/// let id = SessionId::new("support-42").expect("valid session id");
/// assert_eq!(id.as_str(), "support-42");
/// assert!(SessionId::new("../escape").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionId(String);

impl SessionId {
    /// Creates a validated session identifier.
    ///
    /// # Errors
    ///
    /// Returns [`ConversationDomainError`] when the value is empty, too
    /// long, or contains unsupported characters.
    pub fn new(value: impl Into<String>) -> Result<Self, ConversationDomainError> {
        let raw: String = value.into();
        validate_segment("session id", &raw).map(Self)
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for SessionId {
    type Error = ConversationDomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SessionId> for String {
    fn from(value: SessionId) -> Self {
        value.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

/// Key of a persisted session record: the agent name plus the session id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionKey {
    agent: String,
    session: SessionId,
}

impl SessionKey {
    /// Creates a session key.
    ///
    /// # Errors
    ///
    /// Returns [`ConversationDomainError`] when the agent name is not a
    /// valid path segment.
    pub fn new(
        agent: impl Into<String>,
        session: SessionId,
    ) -> Result<Self, ConversationDomainError> {
        let raw: String = agent.into();
        let validated = validate_segment("agent name", &raw)?;
        Ok(Self {
            agent: validated,
            session,
        })
    }

    /// Returns the agent name.
    #[must_use]
    pub fn agent(&self) -> &str {
        &self.agent
    }

    /// Returns the session identifier.
    #[must_use]
    pub const fn session(&self) -> &SessionId {
        &self.session
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}/{}", self.agent, self.session)
    }
}

fn validate_segment(field: &'static str, value: &str) -> Result<String, ConversationDomainError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConversationDomainError::EmptySegment { field });
    }
    let is_valid = !trimmed.starts_with('.')
        && trimmed.chars().all(|character| {
            character.is_ascii_alphanumeric() || matches!(character, '.' | '_' | '-')
        });
    if !is_valid {
        return Err(ConversationDomainError::InvalidSegment {
            field,
            value: trimmed.to_owned(),
        });
    }
    if trimmed.len() > MAX_SEGMENT_LENGTH {
        return Err(ConversationDomainError::SegmentTooLong { field });
    }
    Ok(trimmed.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("support-42")]
    #[case("Run_1.a")]
    fn accepts_path_safe_session_ids(#[case] value: &str) {
        assert_eq!(SessionId::new(value).map(String::from), Ok(value.to_owned()));
    }

    #[rstest]
    #[case("", ConversationDomainError::EmptySegment { field: "session id" })]
    #[case("..", ConversationDomainError::InvalidSegment { field: "session id", value: "..".to_owned() })]
    #[case("a/b", ConversationDomainError::InvalidSegment { field: "session id", value: "a/b".to_owned() })]
    fn rejects_unsafe_session_ids(#[case] value: &str, #[case] expected: ConversationDomainError) {
        assert_eq!(SessionId::new(value), Err(expected));
    }

    #[rstest]
    fn session_key_validates_agent_name() {
        let session = SessionId::new("s1").expect("valid session id");
        assert!(SessionKey::new("weather agent", session.clone()).is_err());
        let key = SessionKey::new("weather-agent", session).expect("valid key");
        assert_eq!(key.to_string(), "weather-agent/s1");
    }

    #[rstest]
    fn overlong_session_id_is_rejected() {
        let value = "a".repeat(MAX_SEGMENT_LENGTH + 1);
        assert_eq!(
            SessionId::new(value),
            Err(ConversationDomainError::SegmentTooLong { field: "session id" })
        );
    }
}
