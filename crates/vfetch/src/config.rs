//! Client configuration: construction contract, per-call options, and
//! the per-request snapshot

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::hooks::{AfterHook, BeforeHook, ErrorHook, HookList};
use crate::method::Method;
use crate::response::ResponseValue;

/// Default request timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 5000;

/// Response wrapper applied to download results.
pub type WrapperFn = Arc<dyn Fn(ResponseValue) -> ResponseValue + Send + Sync>;

/// Long-lived request configuration.
#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    /// Base URL prepended to relative request paths.
    pub base_url: String,
    /// Default headers merged into every request.
    pub headers: BTreeMap<String, String>,
}

/// Construction contract for [`crate::Client`], and the partial-update
/// shape accepted by `set_option`.
///
/// In a partial update, `config.headers` and `config.base_url` merge
/// key-wise into the existing config; every other field replaces the
/// existing value wholesale when present and is left untouched when
/// `None`.
#[derive(Default)]
pub struct ClientOptions {
    /// Base URL and default headers.
    pub config: ClientConfig,
    /// Before hooks, in execution order.
    pub before: Option<Vec<Arc<dyn BeforeHook>>>,
    /// After hooks, in execution order.
    pub after: Option<Vec<Arc<dyn AfterHook>>>,
    /// The single error hook.
    pub error: Option<Arc<dyn ErrorHook>>,
    /// Default timeout in milliseconds.
    pub timeout: Option<u64>,
    /// Wrapper applied to download results.
    pub wrapper: Option<WrapperFn>,
    /// Verbs exposed on the facade; `None` enables all of them.
    pub allow: Option<Vec<Method>>,
}

impl fmt::Debug for ClientOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientOptions")
            .field("config", &self.config)
            .field("before", &self.before.as_ref().map(Vec::len))
            .field("after", &self.after.as_ref().map(Vec::len))
            .field("error", &self.error.is_some())
            .field("timeout", &self.timeout)
            .field("wrapper", &self.wrapper.is_some())
            .field("allow", &self.allow)
            .finish()
    }
}

/// Per-call options.
#[derive(Debug, Clone, Default)]
pub struct SendOptions {
    /// Override the client base URL for this call.
    pub base_url: Option<String>,
    /// Headers merged over the client defaults (per-call wins).
    pub headers: BTreeMap<String, String>,
    /// Timeout override in milliseconds.
    pub timeout: Option<u64>,
    /// For downloads: trigger the download side effect on success.
    pub immediately: bool,
    /// For downloads: explicit filename, winning over
    /// `Content-Disposition`.
    pub filename: Option<String>,
    /// Skip the before-hook pipeline.
    pub skip_before: bool,
    /// Skip the after-hook pipeline.
    pub skip_after: bool,
}

/// Immutable snapshot of the client configuration, taken once per
/// logical request. In-flight requests are unaffected by later
/// `set_option` calls.
#[derive(Clone)]
pub(crate) struct ConfigSnapshot {
    pub(crate) base_url: String,
    pub(crate) headers: BTreeMap<String, String>,
    pub(crate) timeout: u64,
    pub(crate) before: HookList<dyn BeforeHook>,
    pub(crate) after: HookList<dyn AfterHook>,
    pub(crate) error: Option<Arc<dyn ErrorHook>>,
    pub(crate) wrapper: Option<WrapperFn>,
    pub(crate) allow: Vec<Method>,
}
