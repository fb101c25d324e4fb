//! Error types for the Hub client.
//!
//! # Design
//! Callers branch on `ErrorKind` instead of matching message text: a 401
//! always yields `AuthenticationFailure`, a 404 that carries an error
//! payload yields `NotFound`, and everything else is `Generic`. The
//! server-supplied `message`, `timestamp` and `details` ride along when the
//! error payload could be read. The underlying failure, if any, is exposed
//! through `std::error::Error::source`.

use std::fmt;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::codec::CodecError;
use crate::http::HttpMethod;

/// Result type for Hub operations.
pub type Result<T> = std::result::Result<T, HubError>;

/// Classification of a failed Hub call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Generic,
    NotFound,
    AuthenticationFailure,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Generic => write!(f, "hub request failed"),
            ErrorKind::NotFound => write!(f, "hub object not found"),
            ErrorKind::AuthenticationFailure => write!(f, "hub authentication failed"),
        }
    }
}

/// The failure underneath a `HubError`.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The connection could not be opened or the exchange was cut short.
    #[error("HTTP request failed: {0}")]
    Http(#[from] ureq::Error),

    /// The server answered with a non-success status.
    #[error("server returned HTTP {status} for {method} {url}")]
    Status {
        status: u16,
        method: HttpMethod,
        url: String,
    },

    /// The server answered but the response body could not be read.
    #[error("could not read response body for {method} {url} (HTTP {status})")]
    UnreadableBody {
        status: u16,
        method: HttpMethod,
        url: String,
    },

    #[error(transparent)]
    Codec(#[from] CodecError),

    /// A path template needed an id the supplied object does not carry.
    #[error("{0} has no id")]
    MissingId(&'static str),

    /// A lookup that must single out one object matched several.
    #[error("found {count} matching {what} records, expected one")]
    Ambiguous { what: &'static str, count: usize },
}

/// Fields of the structured error payload the Hub returns on failure.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorDetails {
    pub message: Option<String>,
    pub timestamp: Option<String>,
    pub details: Option<String>,
}

impl ErrorDetails {
    /// Pick the known fields out of a decoded error payload. Non-string
    /// values are treated as absent.
    pub fn from_map(map: &Map<String, Value>) -> Self {
        let field = |name: &str| map.get(name).and_then(Value::as_str).map(str::to_owned);
        Self {
            message: field("message"),
            timestamp: field("timestamp"),
            details: field("details"),
        }
    }
}

/// Decide the error kind for a failed call.
///
/// Guards are evaluated in order: 401 wins regardless of payload, then 404
/// with a readable payload, then everything else.
pub fn classify(status: u16, details: Option<&ErrorDetails>) -> ErrorKind {
    if status == 401 {
        return ErrorKind::AuthenticationFailure;
    }
    if status == 404 && details.is_some() {
        return ErrorKind::NotFound;
    }
    ErrorKind::Generic
}

/// A classified Hub error.
#[derive(Debug)]
pub struct HubError {
    kind: ErrorKind,
    message: Option<String>,
    cause: Option<TransportError>,
    timestamp: Option<String>,
    details: Option<String>,
}

impl HubError {
    /// A `Generic` error wrapping `cause`, with no server-supplied detail.
    pub fn generic(cause: impl Into<TransportError>) -> Self {
        Self {
            kind: ErrorKind::Generic,
            message: None,
            cause: Some(cause.into()),
            timestamp: None,
            details: None,
        }
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::AuthenticationFailure,
            message: Some(message.into()),
            cause: None,
            timestamp: None,
            details: None,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::NotFound,
            message: Some(message.into()),
            cause: None,
            timestamp: None,
            details: None,
        }
    }

    /// Build an error from a decoded error payload.
    pub fn with_details(kind: ErrorKind, details: ErrorDetails, cause: TransportError) -> Self {
        Self {
            kind,
            message: details.message,
            cause: Some(cause),
            timestamp: details.timestamp,
            details: details.details,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == ErrorKind::NotFound
    }

    pub fn is_authentication_failure(&self) -> bool {
        self.kind == ErrorKind::AuthenticationFailure
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn cause(&self) -> Option<&TransportError> {
        self.cause.as_ref()
    }

    /// Server-side time of the failure, as sent.
    pub fn timestamp(&self) -> Option<&str> {
        self.timestamp.as_deref()
    }

    pub fn details(&self) -> Option<&str> {
        self.details.as_deref()
    }
}

impl fmt::Display for HubError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.message, &self.cause) {
            (Some(message), _) => write!(f, "{}: {message}", self.kind),
            (None, Some(cause)) => write!(f, "{}: {cause}", self.kind),
            (None, None) => write!(f, "{}", self.kind),
        }
    }
}

impl std::error::Error for HubError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause.as_ref().map(|cause| cause as _)
    }
}

impl From<CodecError> for HubError {
    fn from(err: CodecError) -> Self {
        HubError::generic(err)
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use super::*;

    fn details(message: &str) -> ErrorDetails {
        ErrorDetails {
            message: Some(message.to_string()),
            timestamp: None,
            details: None,
        }
    }

    #[test]
    fn unauthorized_wins_with_or_without_payload() {
        assert_eq!(classify(401, None), ErrorKind::AuthenticationFailure);
        assert_eq!(
            classify(401, Some(&details("bad key"))),
            ErrorKind::AuthenticationFailure
        );
    }

    #[test]
    fn not_found_needs_a_payload() {
        assert_eq!(classify(404, Some(&details("missing"))), ErrorKind::NotFound);
        assert_eq!(classify(404, None), ErrorKind::Generic);
    }

    #[test]
    fn other_statuses_are_generic() {
        assert_eq!(classify(500, Some(&details("boom"))), ErrorKind::Generic);
        assert_eq!(classify(400, None), ErrorKind::Generic);
        assert_eq!(classify(403, Some(&details("nope"))), ErrorKind::Generic);
    }

    #[test]
    fn details_ignore_non_string_fields() {
        let map = serde_json::json!({"message": "gone", "timestamp": 12, "details": null});
        let parsed = ErrorDetails::from_map(map.as_object().unwrap());
        assert_eq!(parsed.message.as_deref(), Some("gone"));
        assert!(parsed.timestamp.is_none());
        assert!(parsed.details.is_none());
    }

    #[test]
    fn generic_error_exposes_its_cause() {
        let err = HubError::generic(TransportError::Status {
            status: 500,
            method: HttpMethod::Get,
            url: "http://hub/x".to_string(),
        });
        assert_eq!(err.kind(), ErrorKind::Generic);
        assert!(err.message().is_none());
        assert!(err.source().is_some());
        assert_eq!(
            err.to_string(),
            "hub request failed: server returned HTTP 500 for GET http://hub/x"
        );
    }

    #[test]
    fn message_takes_precedence_in_display() {
        let err = HubError::with_details(
            ErrorKind::NotFound,
            details("project not found"),
            TransportError::MissingId("project"),
        );
        assert_eq!(err.to_string(), "hub object not found: project not found");
        assert!(err.is_not_found());
    }
}
