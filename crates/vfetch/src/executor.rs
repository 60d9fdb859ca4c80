//! One logical request: build, hooks, dispatch with timeout, validate,
//! parse, settle
//!
//! A request settles exactly once. The [`Settlement`] guard is shared
//! between the timeout branch and the main chain so the error hook and
//! any terminal side effects fire at most once even when both paths
//! could fail. The timeout race abandons interest in the transport
//! future but does not cancel the in-flight exchange at the wire; this
//! is a known design limitation, not a bug.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::config::{ConfigSnapshot, SendOptions};
use crate::download::{self, Downloader};
use crate::error::HttpError;
use crate::hooks::{self, RequestContext};
use crate::method::{CustomType, Method};
use crate::request::{self, Params};
use crate::response::{self, ResponseValue};
use crate::transport::{Transport, TransportRequest};

/// Set-once settlement cell. `try_settle` returns `true` only for the
/// first caller.
#[derive(Debug, Default)]
pub(crate) struct Settlement {
    settled: AtomicBool,
}

impl Settlement {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn try_settle(&self) -> bool {
        !self.settled.swap(true, Ordering::SeqCst)
    }

    #[cfg(test)]
    pub(crate) fn is_settled(&self) -> bool {
        self.settled.load(Ordering::SeqCst)
    }
}

/// Orchestrates one logical request over a config snapshot.
pub(crate) struct RequestExecutor<'a> {
    snapshot: &'a ConfigSnapshot,
    transport: &'a Arc<dyn Transport>,
    downloader: &'a Arc<dyn Downloader>,
}

impl<'a> RequestExecutor<'a> {
    pub(crate) fn new(
        snapshot: &'a ConfigSnapshot,
        transport: &'a Arc<dyn Transport>,
        downloader: &'a Arc<dyn Downloader>,
    ) -> Self {
        Self {
            snapshot,
            transport,
            downloader,
        }
    }

    pub(crate) async fn execute(
        &self,
        method: Method,
        path: &str,
        params: Params,
        opt: SendOptions,
    ) -> Result<ResponseValue, HttpError> {
        let settlement = Settlement::new();
        let mut ctx = self.build(method, path, params, &opt)?;

        match self.run(&mut ctx).await {
            Ok(value) => {
                settlement.try_settle();
                Ok(value)
            }
            Err(error) => self.reject(error, &ctx, &settlement).await,
        }
    }

    /// Build the final `(url, options)` carrier. Pure; no I/O.
    fn build(
        &self,
        method: Method,
        path: &str,
        params: Params,
        opt: &SendOptions,
    ) -> Result<RequestContext, HttpError> {
        let (verb, custom_type) = method.dispatch();
        let url = request::build_url(&self.snapshot.base_url, path, opt.base_url.as_deref());
        let headers = request::build_headers(
            &self.snapshot.headers,
            &opt.headers,
            verb,
            custom_type,
            !params.is_none(),
        );
        let (url, body) = request::finalize(url, verb, params, &headers)?;

        Ok(RequestContext {
            url,
            request: TransportRequest {
                method: verb.to_string(),
                headers,
                body,
                custom_type,
                timeout: opt.timeout,
                immediately: opt.immediately,
                filename: opt.filename.clone(),
                skip_before: opt.skip_before,
                skip_after: opt.skip_after,
            },
        })
    }

    async fn run(&self, ctx: &mut RequestContext) -> Result<ResponseValue, HttpError> {
        if !ctx.request.skip_before {
            hooks::run_before(&self.snapshot.before, ctx).await?;
        }

        let timeout_ms = ctx.request.timeout.unwrap_or(self.snapshot.timeout);
        tracing::debug!(
            url = %ctx.url,
            method = %ctx.request.method,
            timeout_ms,
            "dispatching request"
        );
        let dispatch = self.transport.call(&ctx.url, &ctx.request);
        let response = match tokio::time::timeout(Duration::from_millis(timeout_ms), dispatch).await
        {
            Ok(Ok(response)) => response,
            Ok(Err(native)) => {
                tracing::warn!(url = %ctx.url, error = %native, "transport rejected request");
                return Err(HttpError::transport_failure(native));
            }
            Err(_elapsed) => {
                tracing::warn!(url = %ctx.url, timeout_ms, "request timed out");
                return Err(HttpError::timeout());
            }
        };

        response::check_status(&response)?;
        response::check_accept(ctx.request.header("Accept"), &response)?;

        let disposition = response.header("Content-Disposition").map(str::to_string);
        let value = response::parse(response, ctx.request.custom_type)?;

        if ctx.request.custom_type == CustomType::Download {
            return self.finish_download(ctx, value, disposition).await;
        }

        if !ctx.request.skip_after {
            hooks::run_after(&self.snapshot.after, &value).await?;
        }
        Ok(value)
    }

    /// Downloads bypass after hooks: the value is a binary blob not
    /// meant for hook inspection.
    async fn finish_download(
        &self,
        ctx: &RequestContext,
        value: ResponseValue,
        disposition: Option<String>,
    ) -> Result<ResponseValue, HttpError> {
        if !ctx.request.immediately {
            return Ok(self.wrap(value));
        }

        let filename = ctx
            .request
            .filename
            .clone()
            .or_else(|| {
                disposition
                    .as_deref()
                    .and_then(download::content_disposition_filename)
            })
            .unwrap_or_else(|| "download".to_string());
        let blob = value.as_blob().unwrap_or_default();
        self.downloader
            .save(blob, &filename)
            .await
            .map_err(HttpError::download_failure)?;
        Ok(self.wrap(ResponseValue::Text("ok".to_string())))
    }

    fn wrap(&self, value: ResponseValue) -> ResponseValue {
        match &self.snapshot.wrapper {
            Some(wrapper) => wrapper(value),
            None => value,
        }
    }

    /// Route a failure through the settlement guard and the configured
    /// error hook. The hook fires only for the first settling path and
    /// may transform the error, never swallow it.
    async fn reject(
        &self,
        error: HttpError,
        ctx: &RequestContext,
        settlement: &Settlement,
    ) -> Result<ResponseValue, HttpError> {
        if settlement.try_settle() {
            if let Some(hook) = &self.snapshot.error {
                if let Some(replacement) = hook.call(&error, &ctx.url, &ctx.request).await {
                    return Err(replacement);
                }
            }
        }
        Err(error)
    }
}
