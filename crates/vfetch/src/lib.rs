//! Hookable HTTP client shell
//!
//! This crate standardizes request construction (URL composition,
//! query/body encoding chosen together with the content type), runs
//! configurable pipelines of before/after hooks, enforces a per-request
//! timeout, classifies failures into a small stable taxonomy, and
//! normalizes upload/download flows. The network itself stays behind
//! the [`Transport`] seam: any fetch-like implementation can be
//! injected, and the optional `reqwest` feature ships one.
//!
//! # Example
//!
//! ```no_run
//! use async_trait::async_trait;
//! use vfetch::{
//!     BoxError, Client, SendOptions, Transport, TransportRequest, TransportResponse,
//! };
//!
//! struct MyTransport;
//!
//! #[async_trait]
//! impl Transport for MyTransport {
//!     async fn call(
//!         &self,
//!         url: &str,
//!         request: &TransportRequest,
//!     ) -> Result<TransportResponse, BoxError> {
//!         // hand the final url/options pair to the platform http stack
//!         # let _ = (url, request);
//!         # unimplemented!()
//!     }
//! }
//!
//! async fn example() -> Result<(), vfetch::HttpError> {
//!     let client = Client::builder(MyTransport)
//!         .base_url("/api")
//!         .header("Accept", "application/json")
//!         .build();
//!     let user = client
//!         .get("/users", serde_json::json!({ "id": 5 }), SendOptions::default())
//!         .await?;
//!     println!("{user:?}");
//!     Ok(())
//! }
//! ```

mod client;
mod config;
mod download;
mod error;
mod executor;
mod hooks;
mod method;
mod request;
mod response;
mod transport;

#[cfg(feature = "reqwest")]
mod backends;

#[cfg(feature = "reqwest")]
pub use backends::ReqwestTransport;
pub use client::{Client, ClientBuilder};
pub use config::{ClientConfig, ClientOptions, SendOptions, WrapperFn, DEFAULT_TIMEOUT_MS};
pub use download::{Downloader, FsDownloader};
pub use error::{BoxError, ErrorKind, HttpError, TIMEOUT_HTTP_STATUS};
pub use hooks::{AfterHook, BeforeHook, ErrorHook, Flow, HookList, RequestContext};
pub use method::{CustomType, Method};
pub use request::{Body, FormBody, FormValue, Params};
pub use response::ResponseValue;
pub use transport::{Transport, TransportRequest, TransportResponse};
