//! reqwest-based Transport implementation

use async_trait::async_trait;

use crate::error::BoxError;
use crate::request::{Body, FormValue};
use crate::transport::{Transport, TransportRequest, TransportResponse};

/// [`Transport`] backed by a shared `reqwest::Client`.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    inner: reqwest::Client,
}

impl ReqwestTransport {
    /// Create a transport with default reqwest settings.
    pub fn new() -> Self {
        Self {
            inner: reqwest::Client::new(),
        }
    }

    /// Create a transport from an existing `reqwest::Client`.
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { inner: client }
    }
}

fn to_multipart(form: &crate::request::FormBody) -> reqwest::multipart::Form {
    let mut multipart = reqwest::multipart::Form::new();
    for (name, value) in form.entries() {
        multipart = match value {
            FormValue::Text(text) => multipart.text(name.clone(), text.clone()),
            FormValue::Bytes { data, filename } => {
                let mut part = reqwest::multipart::Part::bytes(data.clone());
                if let Some(filename) = filename {
                    part = part.file_name(filename.clone());
                }
                multipart.part(name.clone(), part)
            }
        };
    }
    multipart
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn call(
        &self,
        url: &str,
        request: &TransportRequest,
    ) -> Result<TransportResponse, BoxError> {
        let method = reqwest::Method::from_bytes(request.method.as_bytes())?;
        let mut builder = self.inner.request(method, url);
        for (key, value) in &request.headers {
            builder = builder.header(key, value);
        }
        builder = match &request.body {
            Body::None => builder,
            Body::Raw(text) => builder.body(text.clone()),
            Body::Form(form) => builder.multipart(to_multipart(form)),
        };

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(key, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|text| (key.to_string(), text.to_string()))
            })
            .collect();
        let body = response.bytes().await?.to_vec();
        Ok(TransportResponse::new(status, headers, body))
    }
}
