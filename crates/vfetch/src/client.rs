//! Client facade

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use crate::config::{ClientOptions, ConfigSnapshot, SendOptions, WrapperFn, DEFAULT_TIMEOUT_MS};
use crate::download::{Downloader, FsDownloader};
use crate::error::HttpError;
use crate::executor::RequestExecutor;
use crate::hooks::{AfterHook, BeforeHook, ErrorHook, HookList};
use crate::method::Method;
use crate::request::Params;
use crate::response::ResponseValue;
use crate::transport::Transport;

struct ClientState {
    base_url: String,
    headers: BTreeMap<String, String>,
    timeout: u64,
    before: HookList<dyn BeforeHook>,
    after: HookList<dyn AfterHook>,
    error: Option<Arc<dyn ErrorHook>>,
    wrapper: Option<WrapperFn>,
    allow: Vec<Method>,
}

impl ClientState {
    fn from_options(options: ClientOptions) -> Self {
        Self {
            base_url: options.config.base_url,
            headers: options.config.headers,
            timeout: options.timeout.unwrap_or(DEFAULT_TIMEOUT_MS),
            before: options.before.map(HookList::from).unwrap_or_default(),
            after: options.after.map(HookList::from).unwrap_or_default(),
            error: options.error,
            wrapper: options.wrapper,
            allow: options.allow.unwrap_or_else(Method::all),
        }
    }

    /// Partial-update merge: headers and base URL merge key-wise,
    /// everything else present in the update replaces wholesale.
    fn merge(&mut self, options: ClientOptions) {
        if !options.config.base_url.is_empty() {
            self.base_url = options.config.base_url;
        }
        for (key, value) in options.config.headers {
            self.headers.insert(key, value);
        }
        if let Some(timeout) = options.timeout {
            self.timeout = timeout;
        }
        if let Some(before) = options.before {
            self.before = HookList::from(before);
        }
        if let Some(after) = options.after {
            self.after = HookList::from(after);
        }
        if let Some(error) = options.error {
            self.error = Some(error);
        }
        if let Some(wrapper) = options.wrapper {
            self.wrapper = Some(wrapper);
        }
        if let Some(allow) = options.allow {
            self.allow = allow;
        }
    }

    fn snapshot(&self) -> ConfigSnapshot {
        ConfigSnapshot {
            base_url: self.base_url.clone(),
            headers: self.headers.clone(),
            timeout: self.timeout,
            before: self.before.clone(),
            after: self.after.clone(),
            error: self.error.clone(),
            wrapper: self.wrapper.clone(),
            allow: self.allow.clone(),
        }
    }
}

struct ClientInner {
    state: RwLock<ClientState>,
    transport: Arc<dyn Transport>,
    downloader: Arc<dyn Downloader>,
}

/// HTTP client facade.
///
/// Holds the long-lived configuration (base URL, default headers,
/// timeout, hook registries, error hook) and delegates each call to a
/// fresh request execution over a config snapshot, so two concurrent
/// calls share nothing but the immutable snapshot they took.
///
/// Cloning is cheap and clones share configuration.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.read_state();
        f.debug_struct("Client")
            .field("base_url", &state.base_url)
            .field("timeout", &state.timeout)
            .field("before", &state.before.len())
            .field("after", &state.after.len())
            .field("allow", &state.allow)
            .finish()
    }
}

impl Client {
    /// Create a client over the given transport with the given
    /// construction options.
    pub fn new(transport: impl Transport + 'static, options: ClientOptions) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                state: RwLock::new(ClientState::from_options(options)),
                transport: Arc::new(transport),
                downloader: Arc::new(FsDownloader),
            }),
        }
    }

    /// Create a client builder over the given transport.
    pub fn builder(transport: impl Transport + 'static) -> ClientBuilder {
        ClientBuilder::new(transport)
    }

    /// GET request; params are serialized into the query string.
    pub async fn get(
        &self,
        url: &str,
        params: impl Into<Params>,
        opt: SendOptions,
    ) -> Result<ResponseValue, HttpError> {
        self.send(Method::Get, url, params.into(), opt).await
    }

    /// POST request; params are encoded by the settled content type.
    pub async fn post(
        &self,
        url: &str,
        params: impl Into<Params>,
        opt: SendOptions,
    ) -> Result<ResponseValue, HttpError> {
        self.send(Method::Post, url, params.into(), opt).await
    }

    /// PUT request.
    pub async fn put(
        &self,
        url: &str,
        params: impl Into<Params>,
        opt: SendOptions,
    ) -> Result<ResponseValue, HttpError> {
        self.send(Method::Put, url, params.into(), opt).await
    }

    /// DELETE request; params are serialized into the query string.
    pub async fn delete(
        &self,
        url: &str,
        params: impl Into<Params>,
        opt: SendOptions,
    ) -> Result<ResponseValue, HttpError> {
        self.send(Method::Delete, url, params.into(), opt).await
    }

    /// Multipart upload; dispatched as POST with the content type left
    /// to the multipart encoder.
    pub async fn upload(
        &self,
        url: &str,
        params: impl Into<Params>,
        opt: SendOptions,
    ) -> Result<ResponseValue, HttpError> {
        self.send(Method::Upload, url, params.into(), opt).await
    }

    /// Binary download; dispatched as GET and bypasses after hooks.
    pub async fn download(
        &self,
        url: &str,
        params: impl Into<Params>,
        opt: SendOptions,
    ) -> Result<ResponseValue, HttpError> {
        self.send(Method::Download, url, params.into(), opt).await
    }

    /// Merge a partial configuration update. In-flight requests keep
    /// the snapshot they took; requests built afterwards observe the
    /// merged config.
    pub fn set_option(&self, options: ClientOptions) {
        self.write_state().merge(options);
    }

    /// Append a before hook.
    pub fn inject_before(&self, hook: Arc<dyn BeforeHook>) {
        self.write_state().before.push(hook);
    }

    /// Append an after hook.
    pub fn inject_after(&self, hook: Arc<dyn AfterHook>) {
        self.write_state().after.push(hook);
    }

    /// Replace the error hook.
    pub fn set_error(&self, hook: Arc<dyn ErrorHook>) {
        self.write_state().error = Some(hook);
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        params: Params,
        opt: SendOptions,
    ) -> Result<ResponseValue, HttpError> {
        let snapshot = self.read_state().snapshot();
        if !snapshot.allow.contains(&method) {
            return Err(HttpError::method_not_enabled(method));
        }
        RequestExecutor::new(&snapshot, &self.inner.transport, &self.inner.downloader)
            .execute(method, url, params, opt)
            .await
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, ClientState> {
        self.inner
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> std::sync::RwLockWriteGuard<'_, ClientState> {
        self.inner
            .state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Builder for [`Client`].
pub struct ClientBuilder {
    transport: Arc<dyn Transport>,
    downloader: Arc<dyn Downloader>,
    options: ClientOptions,
}

impl fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("options", &self.options)
            .finish()
    }
}

impl ClientBuilder {
    /// Start a builder over the given transport.
    pub fn new(transport: impl Transport + 'static) -> Self {
        Self {
            transport: Arc::new(transport),
            downloader: Arc::new(FsDownloader),
            options: ClientOptions::default(),
        }
    }

    /// Set the base URL.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.options.config.base_url = base_url.into();
        self
    }

    /// Add one default header.
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options
            .config
            .headers
            .insert(key.into(), value.into());
        self
    }

    /// Set the default timeout in milliseconds.
    pub fn timeout_ms(mut self, timeout: u64) -> Self {
        self.options.timeout = Some(timeout);
        self
    }

    /// Append a before hook.
    pub fn before(mut self, hook: Arc<dyn BeforeHook>) -> Self {
        self.options
            .before
            .get_or_insert_with(Vec::new)
            .push(hook);
        self
    }

    /// Append an after hook.
    pub fn after(mut self, hook: Arc<dyn AfterHook>) -> Self {
        self.options.after.get_or_insert_with(Vec::new).push(hook);
        self
    }

    /// Set the error hook.
    pub fn error(mut self, hook: Arc<dyn ErrorHook>) -> Self {
        self.options.error = Some(hook);
        self
    }

    /// Set the wrapper applied to download results.
    pub fn wrapper(mut self, wrapper: WrapperFn) -> Self {
        self.options.wrapper = Some(wrapper);
        self
    }

    /// Restrict the verbs exposed on the facade.
    pub fn allow(mut self, allow: Vec<Method>) -> Self {
        self.options.allow = Some(allow);
        self
    }

    /// Replace the download side-effect implementation.
    pub fn downloader(mut self, downloader: impl Downloader + 'static) -> Self {
        self.downloader = Arc::new(downloader);
        self
    }

    /// Build the client.
    pub fn build(self) -> Client {
        Client {
            inner: Arc::new(ClientInner {
                state: RwLock::new(ClientState::from_options(self.options)),
                transport: self.transport,
                downloader: self.downloader,
            }),
        }
    }
}
