//! Error types for party synchronization.

use party_http::HttpError;
use thiserror::Error;

/// Result type for party operations.
pub type Result<T> = std::result::Result<T, PartyError>;

/// Errors that can occur while driving a party.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum PartyError {
    /// The local user lacks the role the action needs.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Malformed local input. Never reaches the network.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A logically invalid party action, such as kicking yourself.
    #[error("Party error: {0}")]
    Party(String),

    #[error("Operation timed out")]
    Timeout,

    #[error("Chat error: {0}")]
    Chat(String),

    #[error("Schema decode error for {key}: {source}")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Service error: {0}")]
    Http(#[from] HttpError),
}

impl PartyError {
    pub fn forbidden(msg: impl Into<String>) -> Self {
        PartyError::Forbidden(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        PartyError::Validation(msg.into())
    }

    pub fn party(msg: impl Into<String>) -> Self {
        PartyError::Party(msg.into())
    }

    /// The underlying service error, if any.
    #[inline]
    #[must_use]
    pub fn http(&self) -> Option<&HttpError> {
        match self {
            PartyError::Http(e) => Some(e),
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn is_party_not_found(&self) -> bool {
        self.http().is_some_and(HttpError::is_party_not_found)
    }

    #[inline]
    #[must_use]
    pub fn is_member_not_found(&self) -> bool {
        self.http().is_some_and(HttpError::is_member_not_found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use party_http::codes;

    #[test]
    fn test_http_predicates_pass_through() {
        let err: PartyError = HttpError::service(404, codes::PARTY_NOT_FOUND, vec![]).into();
        assert!(err.is_party_not_found());
        assert!(!err.is_member_not_found());
        assert!(!PartyError::Timeout.is_party_not_found());
    }

    #[test]
    fn test_display() {
        assert_eq!(
            PartyError::forbidden("You must be the party leader").to_string(),
            "Forbidden: You must be the party leader"
        );
        assert_eq!(PartyError::Timeout.to_string(), "Operation timed out");
    }
}
