//! Response validation and parsing

use crate::error::{BoxError, HttpError};
use crate::method::CustomType;
use crate::transport::TransportResponse;

/// Parsed response value as resolved to the caller and seen by after
/// hooks.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseValue {
    /// Body parsed as JSON.
    Json(serde_json::Value),
    /// Body parsed as text.
    Text(String),
    /// Raw binary body (downloads).
    Blob(Vec<u8>),
}

impl ResponseValue {
    /// JSON value, if this is a JSON response.
    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            ResponseValue::Json(value) => Some(value),
            _ => None,
        }
    }

    /// Text, if this is a text response.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ResponseValue::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Raw bytes, if this is a binary response.
    pub fn as_blob(&self) -> Option<&[u8]> {
        match self {
            ResponseValue::Blob(blob) => Some(blob),
            _ => None,
        }
    }
}

/// Reject any status other than 200. The error carries a clone of the
/// raw response so hooks can inspect it.
pub(crate) fn check_status(response: &TransportResponse) -> Result<(), HttpError> {
    if response.status() != 200 {
        return Err(HttpError::status_error(response.clone()));
    }
    Ok(())
}

/// Compare the response's declared content type against the request's
/// `Accept` header. `*/*` accepts anything; otherwise the stripped
/// content type must appear in the accept value. A response without a
/// content type fails the same way. Independent of the status check.
pub(crate) fn check_accept(
    accept: Option<&str>,
    response: &TransportResponse,
) -> Result<(), HttpError> {
    let accept = accept.unwrap_or("*/*");
    let content_type = match response.content_type() {
        Some(content_type) => content_type,
        None => return Err(HttpError::accept_mismatch(accept, "<none>")),
    };
    if accept.contains("*/*") || accept.contains(content_type) {
        return Ok(());
    }
    Err(HttpError::accept_mismatch(accept, content_type))
}

/// Parse the body by content kind: downloads are blobs, `text/*` is
/// text, `*/json` is JSON, anything else is unsupported. Native decode
/// failures are rewrapped with the original error attached.
pub(crate) fn parse(
    response: TransportResponse,
    custom_type: CustomType,
) -> Result<ResponseValue, HttpError> {
    if custom_type == CustomType::Download {
        return Ok(ResponseValue::Blob(response.blob()));
    }

    let content_type = response.content_type().unwrap_or("").to_string();
    if content_type.contains("text") {
        let text = response
            .text()
            .map_err(|e| HttpError::parse_failure("text", BoxError::from(e)))?;
        Ok(ResponseValue::Text(text))
    } else if content_type.contains("json") {
        let value = response
            .json::<serde_json::Value>()
            .map_err(|e| HttpError::parse_failure("json", BoxError::from(e)))?;
        Ok(ResponseValue::Json(value))
    } else {
        Err(HttpError::unsupported_content_type(&content_type))
    }
}
