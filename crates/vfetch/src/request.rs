//! Pure request construction: URL composition, header merge, body
//! encoding
//!
//! Everything here is deterministic and free of I/O. The encoding
//! function and the `Content-Type` value are always chosen together, so
//! a computed body can never disagree with its declared type.

use std::collections::BTreeMap;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde_json::{Map as JsonMap, Value};

use crate::error::{BoxError, HttpError};
use crate::method::{is_soft_verb, CustomType};

/// Default content type applied to non-soft requests that carry a
/// payload and do not set their own.
pub const DEFAULT_CONTENT_TYPE: &str = "application/x-www-form-urlencoded;charset=UTF-8";

/// Query-component escape set: alphanumerics and `-_.!~*'()` pass
/// through, everything else (spaces included) is percent-encoded.
const QUERY_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Per-call request parameters.
#[derive(Debug, Clone, Default)]
pub enum Params {
    /// No parameters.
    #[default]
    None,
    /// Key-value mapping, encoded according to the method and content
    /// type.
    Map(JsonMap<String, Value>),
    /// Pre-serialized body, passed through unchanged for non-soft
    /// methods.
    Raw(String),
    /// Pre-built multipart body, passed through unchanged.
    Form(FormBody),
}

impl From<Value> for Params {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Params::None,
            Value::Object(map) => Params::Map(map),
            Value::String(text) => Params::Raw(text),
            other => Params::Raw(other.to_string()),
        }
    }
}

impl From<JsonMap<String, Value>> for Params {
    fn from(map: JsonMap<String, Value>) -> Self {
        Params::Map(map)
    }
}

impl From<FormBody> for Params {
    fn from(form: FormBody) -> Self {
        Params::Form(form)
    }
}

impl From<String> for Params {
    fn from(text: String) -> Self {
        Params::Raw(text)
    }
}

impl From<&str> for Params {
    fn from(text: &str) -> Self {
        Params::Raw(text.to_string())
    }
}

impl From<()> for Params {
    fn from(_: ()) -> Self {
        Params::None
    }
}

impl Params {
    /// Whether there is no payload at all.
    pub fn is_none(&self) -> bool {
        matches!(self, Params::None)
    }
}

/// One multipart form value.
#[derive(Debug, Clone, PartialEq)]
pub enum FormValue {
    /// Plain text field.
    Text(String),
    /// Binary field, e.g. a file to upload.
    Bytes {
        /// Raw content.
        data: Vec<u8>,
        /// Optional filename to present to the server.
        filename: Option<String>,
    },
}

/// Ordered multipart form body.
///
/// The boundary and the final wire encoding are left to the transport;
/// the core only carries the entries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormBody {
    entries: Vec<(String, FormValue)>,
}

impl FormBody {
    /// Create an empty form.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a text field.
    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.entries.push((name.into(), FormValue::Text(value.into())));
        self
    }

    /// Append a binary field.
    pub fn bytes(
        mut self,
        name: impl Into<String>,
        data: Vec<u8>,
        filename: Option<String>,
    ) -> Self {
        self.entries
            .push((name.into(), FormValue::Bytes { data, filename }));
        self
    }

    /// Entries in insertion order.
    pub fn entries(&self) -> &[(String, FormValue)] {
        &self.entries
    }

    /// Whether the form has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Computed transport body.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Body {
    /// No body.
    #[default]
    None,
    /// String body (JSON or urlencoded pairs).
    Raw(String),
    /// Multipart form body.
    Form(FormBody),
}

/// Compose the final URL from the client base, the per-call override,
/// and the request path. A path containing a scheme separator is
/// treated as absolute and returned unchanged; a base of `/` counts as
/// empty.
pub(crate) fn build_url(default_base: &str, path: &str, override_base: Option<&str>) -> String {
    if path.contains("://") {
        return path.to_string();
    }
    let base = override_base.unwrap_or(default_base);
    let base = if base == "/" { "" } else { base };
    format!("{base}{path}")
}

/// Case-insensitive header lookup over a plain map.
pub(crate) fn get_header<'a>(headers: &'a BTreeMap<String, String>, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

fn remove_header(headers: &mut BTreeMap<String, String>, name: &str) {
    headers.retain(|key, _| !key.eq_ignore_ascii_case(name));
}

/// Merge default headers with per-call overrides (per-call wins
/// key-by-key) and settle the `Content-Type`:
/// uploads drop it entirely so the multipart encoder picks the boundary,
/// soft methods never force one, and anything else defaults to
/// urlencoded when unset and a payload is present. A param-less request
/// declares no content type at all.
pub(crate) fn build_headers(
    defaults: &BTreeMap<String, String>,
    per_call: &BTreeMap<String, String>,
    verb: &str,
    custom_type: CustomType,
    has_params: bool,
) -> BTreeMap<String, String> {
    let mut headers = defaults.clone();
    for (key, value) in per_call {
        remove_header(&mut headers, key);
        headers.insert(key.clone(), value.clone());
    }
    if custom_type == CustomType::Upload {
        remove_header(&mut headers, "Content-Type");
    } else if has_params
        && !is_soft_verb(verb)
        && get_header(&headers, "Content-Type").is_none()
    {
        headers.insert("Content-Type".to_string(), DEFAULT_CONTENT_TYPE.to_string());
    }
    headers
}

/// Render one query/form value as a string.
///
/// `null` and NaN are excluded; `0`, `false`, and the empty string are
/// significant and kept. Compound values are JSON-encoded.
fn render_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Number(number) => {
            if number.as_f64().map(f64::is_nan).unwrap_or(false) {
                return None;
            }
            Some(number.to_string())
        }
        Value::Bool(flag) => Some(flag.to_string()),
        Value::String(text) => Some(text.clone()),
        compound => Some(compound.to_string()),
    }
}

fn included_pairs(map: &JsonMap<String, Value>) -> Vec<(String, String)> {
    map.iter()
        .filter_map(|(key, value)| render_value(value).map(|text| (key.clone(), text)))
        .collect()
}

/// Percent-encoded `key=value` pairs joined by `&`, or `None` when no
/// value survives the inclusion rule. Spaces encode as `%20`, not `+`.
pub(crate) fn build_query(map: &JsonMap<String, Value>) -> Option<String> {
    let pairs = included_pairs(map);
    if pairs.is_empty() {
        return None;
    }
    let encoded = pairs
        .iter()
        .map(|(key, value)| {
            format!(
                "{}={}",
                utf8_percent_encode(key, QUERY_COMPONENT),
                utf8_percent_encode(value, QUERY_COMPONENT)
            )
        })
        .collect::<Vec<_>>()
        .join("&");
    Some(encoded)
}

fn form_from_map(map: &JsonMap<String, Value>) -> FormBody {
    included_pairs(map)
        .into_iter()
        .fold(FormBody::new(), |form, (key, value)| form.text(key, value))
}

/// Produce the final `(url, body)` for dispatch.
///
/// Pre-built forms pass through untouched. Soft methods serialize their
/// params into the query string and never carry a body. Everything else
/// encodes the params by the settled `Content-Type`. A computed raw body
/// of exactly `{}` is dropped.
pub(crate) fn finalize(
    url: String,
    verb: &str,
    params: Params,
    headers: &BTreeMap<String, String>,
) -> Result<(String, Body), HttpError> {
    if let Params::Form(form) = params {
        return Ok((url, Body::Form(form)));
    }

    if is_soft_verb(verb) {
        let url = match &params {
            Params::Map(map) => match build_query(map) {
                Some(query) => format!("{url}?{query}"),
                None => url,
            },
            _ => url,
        };
        return Ok((url, Body::None));
    }

    let body = match params {
        Params::None | Params::Form(_) => Body::None,
        Params::Raw(text) => Body::Raw(text),
        Params::Map(map) => {
            let content_type = get_header(headers, "Content-Type").unwrap_or("");
            if content_type.contains("application/json") {
                let text = serde_json::to_string(&Value::Object(map))
                    .map_err(|e| HttpError::encode_failure("json body", BoxError::from(e)))?;
                Body::Raw(text)
            } else if content_type.contains("application/x-www-form-urlencoded") {
                let text = serde_urlencoded::to_string(included_pairs(&map))
                    .map_err(|e| HttpError::encode_failure("form body", BoxError::from(e)))?;
                Body::Raw(text)
            } else {
                // multipart/form-data, or no content type at all
                // (uploads land here after the header was removed)
                Body::Form(form_from_map(&map))
            }
        }
    };

    let body = match body {
        Body::Raw(text) if text == "{}" => Body::None,
        other => other,
    };

    Ok((url, body))
}
