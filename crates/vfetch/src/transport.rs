//! Transport seam: the injected fetch-like call

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::error::BoxError;
use crate::method::CustomType;
use crate::request::Body;

/// The underlying network transport.
///
/// The core never opens sockets; it hands the final url/options pair to
/// this trait and interprets the resolution or rejection. Rejections are
/// plain boxed errors and get wrapped into [`crate::HttpError`] by the
/// executor.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform one HTTP exchange.
    async fn call(
        &self,
        url: &str,
        request: &TransportRequest,
    ) -> Result<TransportResponse, BoxError>;
}

/// Final per-request options handed to the transport.
///
/// This is also the mutable half of the before-hook carrier: hooks see
/// and may rewrite any of these fields before dispatch.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    /// Wire verb (pseudo-methods are already rewritten).
    pub method: String,
    /// Final header map (defaults merged with per-call overrides).
    pub headers: BTreeMap<String, String>,
    /// Computed body, consistent with the `Content-Type` header.
    pub body: Body,
    /// Pseudo-method marker.
    pub custom_type: CustomType,
    /// Per-call timeout override in milliseconds.
    pub timeout: Option<u64>,
    /// For downloads: trigger the platform download side effect.
    pub immediately: bool,
    /// For downloads: explicit filename override.
    pub filename: Option<String>,
    /// Skip the before-hook pipeline.
    pub skip_before: bool,
    /// Skip the after-hook pipeline.
    pub skip_after: bool,
}

impl TransportRequest {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// A buffered HTTP response as resolved by a transport.
///
/// Body-consumption methods take `self`, so each body is consumable at
/// most once; callers needing both inspection and parsing clone first.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    status: u16,
    headers: BTreeMap<String, String>,
    body: Vec<u8>,
}

impl TransportResponse {
    /// Create a response from its parts.
    pub fn new(status: u16, headers: BTreeMap<String, String>, body: Vec<u8>) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// HTTP status code.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Declared content type with its parameters stripped
    /// (`application/json;charset=UTF-8` reads as `application/json`).
    pub fn content_type(&self) -> Option<&str> {
        self.header("Content-Type")
            .and_then(|value| value.split(';').next())
            .map(str::trim)
    }

    /// Consume the body as UTF-8 text.
    pub fn text(self) -> Result<String, std::string::FromUtf8Error> {
        String::from_utf8(self.body)
    }

    /// Consume the body as JSON.
    pub fn json<T: DeserializeOwned>(self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    /// Consume the body as raw bytes.
    pub fn blob(self) -> Vec<u8> {
        self.body
    }
}
