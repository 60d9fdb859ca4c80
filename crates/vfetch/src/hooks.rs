//! Before/after/error hook pipelines
//!
//! Hooks run strictly in registration order and are awaited uniformly
//! whether they are synchronous closures or async trait impls. Before
//! hooks rewrite the outgoing `(url, options)` carrier in place and may
//! short-circuit the rest of the chain; after hooks inspect the parsed
//! response and may veto it; the single error hook may transform a
//! failure before it reaches the caller.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::HttpError;
use crate::response::ResponseValue;
use crate::transport::TransportRequest;

/// Control flow returned by a before hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Run the next hook.
    Continue,
    /// Stop the before chain after this hook. The request itself still
    /// dispatches with the context as rewritten so far.
    Done,
}

/// Mutable carrier threaded through the before-hook chain.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Final request URL, query string included.
    pub url: String,
    /// Final transport options.
    pub request: TransportRequest,
}

/// Hook invoked before dispatch.
#[async_trait]
pub trait BeforeHook: Send + Sync {
    /// Inspect or rewrite the outgoing request. Returning an error
    /// aborts the request before any network call.
    async fn call(&self, ctx: &mut RequestContext) -> Result<Flow, HttpError>;
}

#[async_trait]
impl<F> BeforeHook for F
where
    F: Fn(&mut RequestContext) -> Result<Flow, HttpError> + Send + Sync,
{
    async fn call(&self, ctx: &mut RequestContext) -> Result<Flow, HttpError> {
        (self)(ctx)
    }
}

/// Hook invoked on the parsed response.
#[async_trait]
pub trait AfterHook: Send + Sync {
    /// Inspect the parsed value. Returning an error vetoes the request;
    /// the value itself cannot be replaced.
    async fn call(&self, response: &ResponseValue) -> Result<(), HttpError>;
}

#[async_trait]
impl<F> AfterHook for F
where
    F: Fn(&ResponseValue) -> Result<(), HttpError> + Send + Sync,
{
    async fn call(&self, response: &ResponseValue) -> Result<(), HttpError> {
        (self)(response)
    }
}

/// The single configured error hook.
#[async_trait]
pub trait ErrorHook: Send + Sync {
    /// Observe a failed request. Returning `Some` replaces the error
    /// the caller sees; `None` keeps the original. The hook cannot
    /// swallow a failure entirely.
    async fn call(
        &self,
        error: &HttpError,
        url: &str,
        request: &TransportRequest,
    ) -> Option<HttpError>;
}

#[async_trait]
impl<F> ErrorHook for F
where
    F: Fn(&HttpError, &str, &TransportRequest) -> Option<HttpError> + Send + Sync,
{
    async fn call(
        &self,
        error: &HttpError,
        url: &str,
        request: &TransportRequest,
    ) -> Option<HttpError> {
        (self)(error, url, request)
    }
}

/// Append-only ordered hook registry.
///
/// Iteration order is registration order; the pipelines await each
/// entry before invoking the next.
pub struct HookList<H: ?Sized> {
    hooks: Vec<Arc<H>>,
}

impl<H: ?Sized> HookList<H> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self { hooks: Vec::new() }
    }

    /// Append a hook.
    pub fn push(&mut self, hook: Arc<H>) {
        self.hooks.push(hook);
    }

    /// Number of registered hooks.
    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Iterate in registration order.
    pub fn iter(&self) -> std::slice::Iter<'_, Arc<H>> {
        self.hooks.iter()
    }
}

impl<H: ?Sized> Default for HookList<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: ?Sized> Clone for HookList<H> {
    fn clone(&self) -> Self {
        Self {
            hooks: self.hooks.clone(),
        }
    }
}

impl<H: ?Sized> fmt::Debug for HookList<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookList")
            .field("len", &self.hooks.len())
            .finish()
    }
}

impl<H: ?Sized> From<Vec<Arc<H>>> for HookList<H> {
    fn from(hooks: Vec<Arc<H>>) -> Self {
        Self { hooks }
    }
}

/// Run the before chain over the carrier, stopping early on
/// [`Flow::Done`].
pub(crate) async fn run_before(
    hooks: &HookList<dyn BeforeHook>,
    ctx: &mut RequestContext,
) -> Result<(), HttpError> {
    for hook in hooks.iter() {
        match hook.call(ctx).await? {
            Flow::Continue => {}
            Flow::Done => {
                tracing::debug!(url = %ctx.url, "before chain short-circuited");
                break;
            }
        }
    }
    Ok(())
}

/// Run the after chain over the parsed value. Every hook sees the same
/// value; the first veto stops the chain.
pub(crate) async fn run_after(
    hooks: &HookList<dyn AfterHook>,
    response: &ResponseValue,
) -> Result<(), HttpError> {
    for hook in hooks.iter() {
        if let Err(error) = hook.call(response).await {
            tracing::debug!(code = %error.code, "after hook vetoed response");
            return Err(error);
        }
    }
    Ok(())
}
