//! Failure taxonomy and the client-visible error carrier

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::method::Method;
use crate::transport::TransportResponse;

/// Boxed lower-level error, as produced by transports and downloaders.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Pseudo HTTP status reported when the timeout timer preempts the
/// transport.
pub const TIMEOUT_HTTP_STATUS: u16 = 901;

/// Closed set of failure kinds.
///
/// The serialized string values are wire-visible and stable; consumers
/// match on them across process boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// The server answered with a non-200 status.
    HttpStatusError,
    /// The timeout timer fired before the transport resolved.
    RequestTimeout,
    /// Reserved for consumer-installed auth hooks; never raised by the
    /// core itself.
    TokenExpire,
    /// Content-type mismatch, unsupported content type, or a body that
    /// failed to decode.
    ResponseParsingFailed,
}

impl ErrorKind {
    /// Stable wire string for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::HttpStatusError => "HTTP_STATUS_ERROR",
            ErrorKind::RequestTimeout => "REQUEST_TIMEOUT",
            ErrorKind::TokenExpire => "TOKEN_EXPIRE",
            ErrorKind::ResponseParsingFailed => "RESPONSE_PARSING_FAILED",
        }
    }

    /// Default human-readable message for this kind.
    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorKind::HttpStatusError => "server did not respond normally",
            ErrorKind::RequestTimeout => "request timed out",
            ErrorKind::TokenExpire => "token validation expired",
            ErrorKind::ResponseParsingFailed => "failed to parse response",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Client-visible error carrier.
///
/// Every failure path of a request resolves to one of these; callers
/// never see a bare transport or decode error. Created at exactly one
/// of: transport rejection, timeout firing, accept mismatch, non-200
/// status, body-parse failure, or an after-hook veto.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct HttpError {
    /// Failure kind.
    pub code: ErrorKind,
    /// Human-readable description of what failed.
    pub message: String,
    /// HTTP status when known (`901` for timeouts, `None` when the
    /// failure happened off the wire).
    pub http_status: Option<u16>,
    /// The wrapped lower-level error, when one exists.
    #[source]
    pub native: Option<BoxError>,
    /// Clone of the raw response, populated for status errors.
    pub response: Option<TransportResponse>,
}

impl HttpError {
    /// Create an error with the given kind and message and no further
    /// context.
    pub fn new(code: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            http_status: None,
            native: None,
            response: None,
        }
    }

    /// Attach an HTTP status.
    pub fn with_status(mut self, status: u16) -> Self {
        self.http_status = Some(status);
        self
    }

    /// Attach the wrapped lower-level error.
    pub fn with_native(mut self, native: BoxError) -> Self {
        self.native = Some(native);
        self
    }

    /// Attach a clone of the raw response.
    pub fn with_response(mut self, response: TransportResponse) -> Self {
        self.response = Some(response);
        self
    }

    pub(crate) fn timeout() -> Self {
        Self::new(
            ErrorKind::RequestTimeout,
            ErrorKind::RequestTimeout.default_message(),
        )
        .with_status(TIMEOUT_HTTP_STATUS)
    }

    pub(crate) fn transport_failure(native: BoxError) -> Self {
        Self::new(
            ErrorKind::ResponseParsingFailed,
            format!("request failed before a response arrived: {native}"),
        )
        .with_native(native)
    }

    pub(crate) fn status_error(response: TransportResponse) -> Self {
        let status = response.status();
        Self::new(
            ErrorKind::HttpStatusError,
            format!("server returned status {status}"),
        )
        .with_status(status)
        .with_response(response)
    }

    pub(crate) fn accept_mismatch(accept: &str, content_type: &str) -> Self {
        Self::new(
            ErrorKind::ResponseParsingFailed,
            format!(
                "response type does not match the request \
                 [accept:{accept};response-content-type:{content_type}]"
            ),
        )
    }

    pub(crate) fn unsupported_content_type(content_type: &str) -> Self {
        Self::new(
            ErrorKind::ResponseParsingFailed,
            format!("unsupported content type [response-content-type:{content_type}]"),
        )
    }

    pub(crate) fn parse_failure(what: &str, native: BoxError) -> Self {
        Self::new(
            ErrorKind::ResponseParsingFailed,
            format!("failed to decode {what} body: {native}"),
        )
        .with_native(native)
    }

    pub(crate) fn encode_failure(what: &str, native: BoxError) -> Self {
        Self::new(
            ErrorKind::ResponseParsingFailed,
            format!("failed to encode {what}: {native}"),
        )
        .with_native(native)
    }

    pub(crate) fn download_failure(native: BoxError) -> Self {
        Self::new(
            ErrorKind::ResponseParsingFailed,
            format!("failed to save download: {native}"),
        )
        .with_native(native)
    }

    pub(crate) fn method_not_enabled(method: Method) -> Self {
        Self::new(
            ErrorKind::HttpStatusError,
            format!("method {method} is not enabled on this client"),
        )
        .with_status(405)
    }
}
