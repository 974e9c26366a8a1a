//! Error types for party service operations.

use serde::Deserialize;
use thiserror::Error;

/// Result type for party service operations.
pub type Result<T> = std::result::Result<T, HttpError>;

/// Machine-readable error codes returned by the party service.
pub mod codes {
    pub const STALE_REVISION: &str = "errors.com.epicgames.social.party.stale_revision";
    pub const PARTY_NOT_FOUND: &str = "errors.com.epicgames.social.party.party_not_found";
    pub const MEMBER_NOT_FOUND: &str = "errors.com.epicgames.social.party.member_not_found";
    pub const APPLICANT_NOT_FOUND: &str = "errors.com.epicgames.social.party.applicant_not_found";
    pub const USER_HAS_PARTY: &str = "errors.com.epicgames.social.party.user_has_party";
    pub const PARTY_CHANGE_FORBIDDEN: &str =
        "errors.com.epicgames.social.party.party_change_forbidden";
}

/// Error body sent by the service alongside a non-2xx status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceError {
    #[serde(skip)]
    pub status: u16,
    #[serde(default)]
    pub error_code: String,
    #[serde(default)]
    pub error_message: String,
    #[serde(default)]
    pub message_vars: Vec<String>,
    #[serde(default)]
    pub numeric_error_code: Option<i64>,
    #[serde(default)]
    pub originating_service: Option<String>,
    #[serde(default)]
    pub intent: Option<String>,
}

impl ServiceError {
    /// Decode an error body. Bodies that are not the service's JSON error
    /// shape are kept verbatim as the message.
    pub fn from_body(status: u16, body: &str) -> Self {
        let mut err = serde_json::from_str::<ServiceError>(body).unwrap_or_else(|_| ServiceError {
            error_message: body.to_string(),
            ..Default::default()
        });
        err.status = status;
        err
    }
}

/// Errors that can occur while talking to the party service.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum HttpError {
    #[error("service error {} ({}): {}", .0.status, .0.error_code, .0.error_message)]
    Service(ServiceError),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Operation timed out")]
    Timeout,

    #[error("Configuration error: {0}")]
    Config(String),
}

impl HttpError {
    /// Build a service error from its parts.
    pub fn service(status: u16, code: impl Into<String>, message_vars: Vec<String>) -> Self {
        HttpError::Service(ServiceError {
            status,
            error_code: code.into(),
            message_vars,
            ..Default::default()
        })
    }

    /// The service error code, when the failure came from the service.
    #[inline]
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        match self {
            HttpError::Service(e) => Some(e.error_code.as_str()),
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn has_code(&self, code: &str) -> bool {
        self.code() == Some(code)
    }

    #[inline]
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            HttpError::Service(e) => Some(e.status),
            _ => None,
        }
    }

    /// The authoritative revision carried by a stale revision conflict.
    ///
    /// The service reports it as the second message variable. `None` when this
    /// is not a stale revision error or the variable cannot be parsed.
    #[must_use]
    pub fn stale_revision(&self) -> Option<u64> {
        match self {
            HttpError::Service(e) if e.error_code == codes::STALE_REVISION => {
                e.message_vars.get(1).and_then(|v| v.trim().parse().ok())
            }
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn is_stale_revision(&self) -> bool {
        self.has_code(codes::STALE_REVISION)
    }

    #[inline]
    #[must_use]
    pub fn is_party_not_found(&self) -> bool {
        self.has_code(codes::PARTY_NOT_FOUND)
    }

    #[inline]
    #[must_use]
    pub fn is_member_not_found(&self) -> bool {
        self.has_code(codes::MEMBER_NOT_FOUND)
    }

    #[inline]
    #[must_use]
    pub fn is_applicant_not_found(&self) -> bool {
        self.has_code(codes::APPLICANT_NOT_FOUND)
    }

    #[inline]
    #[must_use]
    pub fn is_user_has_party(&self) -> bool {
        self.has_code(codes::USER_HAS_PARTY)
    }

    #[inline]
    #[must_use]
    pub fn is_party_change_forbidden(&self) -> bool {
        self.has_code(codes::PARTY_CHANGE_FORBIDDEN)
    }

    /// Check if this error is retryable at the transport level.
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            HttpError::Service(e) => matches!(e.status, 408 | 425 | 429 | 502 | 503 | 504),
            HttpError::Timeout | HttpError::Http(_) => true,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for HttpError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            HttpError::Timeout
        } else {
            HttpError::Http(err.to_string())
        }
    }
}
