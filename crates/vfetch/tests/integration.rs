//! End-to-end tests for the request pipeline over stub transports

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::json;
use vfetch::{
    BeforeHook, BoxError, Client, ClientConfig, ClientOptions, Downloader, ErrorKind, Flow,
    FormBody, HttpError, Method, RequestContext, ResponseValue, SendOptions, Transport,
    TransportRequest, TransportResponse, TIMEOUT_HTTP_STATUS,
};

type CallLog = Arc<Mutex<Vec<(String, TransportRequest)>>>;

/// Returns a canned response and records every call it sees.
struct StubTransport {
    response: TransportResponse,
    calls: CallLog,
}

impl StubTransport {
    fn new(response: TransportResponse) -> (Self, CallLog) {
        let calls: CallLog = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                response,
                calls: calls.clone(),
            },
            calls,
        )
    }
}

#[async_trait]
impl Transport for StubTransport {
    async fn call(
        &self,
        url: &str,
        request: &TransportRequest,
    ) -> Result<TransportResponse, BoxError> {
        self.calls
            .lock()
            .expect("call log lock")
            .push((url.to_string(), request.clone()));
        Ok(self.response.clone())
    }
}

/// Never resolves; forces the timeout branch to win.
struct NeverTransport;

#[async_trait]
impl Transport for NeverTransport {
    async fn call(
        &self,
        _url: &str,
        _request: &TransportRequest,
    ) -> Result<TransportResponse, BoxError> {
        futures::future::pending().await
    }
}

/// Resolves after a delay; used to simulate the settlement race.
struct SlowTransport {
    delay: Duration,
    response: TransportResponse,
}

#[async_trait]
impl Transport for SlowTransport {
    async fn call(
        &self,
        _url: &str,
        _request: &TransportRequest,
    ) -> Result<TransportResponse, BoxError> {
        tokio::time::sleep(self.delay).await;
        Ok(self.response.clone())
    }
}

/// Rejects every call with an io error.
struct FailTransport;

#[async_trait]
impl Transport for FailTransport {
    async fn call(
        &self,
        _url: &str,
        _request: &TransportRequest,
    ) -> Result<TransportResponse, BoxError> {
        Err(std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused").into())
    }
}

/// Records saved blobs instead of touching the filesystem.
#[derive(Clone, Default)]
struct RecordingDownloader {
    saved: Arc<Mutex<Vec<(Vec<u8>, String)>>>,
}

#[async_trait]
impl Downloader for RecordingDownloader {
    async fn save(&self, blob: &[u8], filename: &str) -> Result<(), BoxError> {
        self.saved
            .lock()
            .expect("saved lock")
            .push((blob.to_vec(), filename.to_string()));
        Ok(())
    }
}

fn response_with(status: u16, content_type: &str, body: &[u8]) -> TransportResponse {
    let mut headers = BTreeMap::new();
    headers.insert("Content-Type".to_string(), content_type.to_string());
    TransportResponse::new(status, headers, body.to_vec())
}

fn json_response(body: &str) -> TransportResponse {
    response_with(200, "application/json", body.as_bytes())
}

fn error_hook_counter() -> (Arc<AtomicUsize>, impl Fn(&HttpError, &str, &TransportRequest) -> Option<HttpError> + Send + Sync)
{
    let count = Arc::new(AtomicUsize::new(0));
    let counted = count.clone();
    (count, move |_: &HttpError, _: &str, _: &TransportRequest| {
        counted.fetch_add(1, Ordering::SeqCst);
        None
    })
}

// === request construction ===

#[tokio::test]
async fn test_get_builds_query_and_parses_json() {
    let (transport, calls) = StubTransport::new(json_response(r#"{"id":5,"name":"x"}"#));
    let client = Client::builder(transport).base_url("/api").build();

    let value = client
        .get("/users", json!({"id": 5}), SendOptions::default())
        .await
        .expect("request succeeds");

    assert_eq!(value, ResponseValue::Json(json!({"id": 5, "name": "x"})));
    let calls = calls.lock().expect("call log lock");
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "/api/users?id=5");
    assert_eq!(calls[0].1.method, "GET");
}

#[tokio::test]
async fn test_query_keeps_zero_and_empty_string() {
    let (transport, calls) = StubTransport::new(json_response("{}"));
    let client = Client::builder(transport).build();

    client
        .get("/list", json!({"a": 1, "b": "", "skip": null}), SendOptions::default())
        .await
        .expect("request succeeds");

    let url = &calls.lock().expect("call log lock")[0].0;
    assert!(url.contains("a=1"), "url was {url}");
    assert!(url.contains("b="), "url was {url}");
    assert!(!url.contains("skip"), "url was {url}");
}

#[tokio::test]
async fn test_query_values_percent_encode_spaces() {
    let (transport, calls) = StubTransport::new(json_response("{}"));
    let client = Client::builder(transport).build();

    client
        .get("/search", json!({"q": "a b"}), SendOptions::default())
        .await
        .expect("request succeeds");

    let url = &calls.lock().expect("call log lock")[0].0;
    assert_eq!(url, "/search?q=a%20b");
}

#[tokio::test]
async fn test_post_without_params_sends_no_content_type() {
    let (transport, calls) = StubTransport::new(json_response("{}"));
    let client = Client::builder(transport).build();

    client
        .post("/ping", (), SendOptions::default())
        .await
        .expect("request succeeds");

    let calls = calls.lock().expect("call log lock");
    assert!(calls[0].1.header("Content-Type").is_none());
    assert_eq!(calls[0].1.body, vfetch::Body::None);
}

#[tokio::test]
async fn test_json_body_and_raw_passthrough() {
    let (transport, calls) = StubTransport::new(json_response("{}"));
    let client = Client::builder(transport)
        .header("Content-Type", "application/json")
        .build();

    let params = json!({"name": "x", "value": 3});
    let expected = serde_json::to_string(&params).expect("encodes");
    client
        .post("/things", params, SendOptions::default())
        .await
        .expect("request succeeds");
    client
        .post("/things", expected.as_str(), SendOptions::default())
        .await
        .expect("request succeeds");

    let calls = calls.lock().expect("call log lock");
    assert_eq!(calls[0].1.body, vfetch::Body::Raw(expected.clone()));
    assert_eq!(calls[1].1.body, vfetch::Body::Raw(expected));
}

#[tokio::test]
async fn test_upload_is_post_multipart_without_content_type() {
    let (transport, calls) = StubTransport::new(json_response("{}"));
    let client = Client::builder(transport)
        .header("Content-Type", "application/json")
        .build();

    let form = FormBody::new().bytes("file", vec![1, 2, 3], Some("a.bin".to_string()));
    client
        .upload("/files", form.clone(), SendOptions::default())
        .await
        .expect("request succeeds");

    let calls = calls.lock().expect("call log lock");
    let request = &calls[0].1;
    assert_eq!(request.method, "POST");
    assert!(request.header("Content-Type").is_none());
    assert_eq!(request.body, vfetch::Body::Form(form));
}

// === hooks ===

#[tokio::test]
async fn test_before_hook_short_circuit() {
    let (transport, calls) = StubTransport::new(json_response("{}"));
    let second_hook_calls = Arc::new(AtomicUsize::new(0));
    let counted = second_hook_calls.clone();

    let client = Client::builder(transport)
        .before(Arc::new(|_: &mut RequestContext| Ok(Flow::Done)))
        .before(Arc::new(move |_: &mut RequestContext| {
            counted.fetch_add(1, Ordering::SeqCst);
            Ok(Flow::Continue)
        }))
        .build();

    client
        .get("/x", (), SendOptions::default())
        .await
        .expect("request succeeds");

    // the chain stopped, but the request itself still dispatched
    assert_eq!(second_hook_calls.load(Ordering::SeqCst), 0);
    assert_eq!(calls.lock().expect("call log lock").len(), 1);
}

#[tokio::test]
async fn test_before_hook_rewrite_reaches_transport() {
    let (transport, calls) = StubTransport::new(json_response("{}"));
    let client = Client::builder(transport)
        .before(Arc::new(|ctx: &mut RequestContext| {
            ctx.url = format!("{}?token=1", ctx.url);
            ctx.request
                .headers
                .insert("X-Trace".to_string(), "abc".to_string());
            Ok(Flow::Continue)
        }))
        .build();

    client
        .get("/x", (), SendOptions::default())
        .await
        .expect("request succeeds");

    let calls = calls.lock().expect("call log lock");
    assert_eq!(calls[0].0, "/x?token=1");
    assert_eq!(calls[0].1.header("X-Trace"), Some("abc"));
}

#[tokio::test]
async fn test_before_hook_error_aborts_without_dispatch() {
    let (transport, calls) = StubTransport::new(json_response("{}"));
    let client = Client::builder(transport)
        .before(Arc::new(|_: &mut RequestContext| {
            Err(HttpError::new(ErrorKind::TokenExpire, "no token"))
        }))
        .build();

    let error = client
        .get("/x", (), SendOptions::default())
        .await
        .expect_err("hook aborts");

    assert_eq!(error.code, ErrorKind::TokenExpire);
    assert!(calls.lock().expect("call log lock").is_empty());
}

#[tokio::test]
async fn test_skip_before_flag() {
    let (transport, _calls) = StubTransport::new(json_response("{}"));
    let hook_calls = Arc::new(AtomicUsize::new(0));
    let counted = hook_calls.clone();
    let client = Client::builder(transport)
        .before(Arc::new(move |_: &mut RequestContext| {
            counted.fetch_add(1, Ordering::SeqCst);
            Ok(Flow::Continue)
        }))
        .build();

    let opt = SendOptions {
        skip_before: true,
        ..Default::default()
    };
    client.get("/x", (), opt).await.expect("request succeeds");
    assert_eq!(hook_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_after_hook_veto_and_error_hook_once() {
    let (transport, _calls) = StubTransport::new(json_response("{}"));
    let (hook_count, error_hook) = error_hook_counter();
    let client = Client::builder(transport)
        .after(Arc::new(|_: &ResponseValue| {
            Err(HttpError::new(ErrorKind::TokenExpire, "expired"))
        }))
        .error(Arc::new(error_hook))
        .build();

    let error = client
        .get("/x", (), SendOptions::default())
        .await
        .expect_err("vetoed");

    assert_eq!(error.code, ErrorKind::TokenExpire);
    assert_eq!(hook_count.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_after_hooks_see_same_value() {
    let (transport, _calls) = StubTransport::new(json_response(r#"{"ok":true}"#));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let first = seen.clone();
    let second = seen.clone();
    let client = Client::builder(transport)
        .after(Arc::new(move |value: &ResponseValue| {
            first.lock().expect("seen lock").push(value.clone());
            Ok(())
        }))
        .after(Arc::new(move |value: &ResponseValue| {
            second.lock().expect("seen lock").push(value.clone());
            Ok(())
        }))
        .build();

    let value = client
        .get("/x", (), SendOptions::default())
        .await
        .expect("request succeeds");

    let seen = seen.lock().expect("seen lock");
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0], value);
    assert_eq!(seen[1], value);
}

#[tokio::test]
async fn test_error_hook_transforms_error() {
    let (transport, _calls) = StubTransport::new(response_with(500, "text/plain", b"boom"));
    let client = Client::builder(transport)
        .error(Arc::new(|error: &HttpError, _: &str, _: &TransportRequest| {
            assert_eq!(error.code, ErrorKind::HttpStatusError);
            Some(HttpError::new(ErrorKind::TokenExpire, "relogin"))
        }))
        .build();

    let error = client
        .get("/x", (), SendOptions::default())
        .await
        .expect_err("status error");

    assert_eq!(error.code, ErrorKind::TokenExpire);
    assert_eq!(error.message, "relogin");
}

// === dispatch, timeout, validation ===

#[tokio::test]
async fn test_timeout_rejects_with_901() {
    let (hook_count, error_hook) = error_hook_counter();
    let client = Client::builder(NeverTransport)
        .error(Arc::new(error_hook))
        .build();

    let opt = SendOptions {
        timeout: Some(50),
        ..Default::default()
    };
    let start = Instant::now();
    let error = client.get("/x", (), opt).await.expect_err("times out");

    assert_eq!(error.code, ErrorKind::RequestTimeout);
    assert_eq!(error.http_status, Some(TIMEOUT_HTTP_STATUS));
    assert!(start.elapsed() < Duration::from_millis(500));
    assert_eq!(hook_count.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_settlement_when_transport_loses_race() {
    let (hook_count, error_hook) = error_hook_counter();
    let client = Client::builder(SlowTransport {
        delay: Duration::from_millis(200),
        response: json_response("{}"),
    })
    .error(Arc::new(error_hook))
    .build();

    let opt = SendOptions {
        timeout: Some(50),
        ..Default::default()
    };
    let error = client.get("/x", (), opt).await.expect_err("timeout wins");

    assert_eq!(error.code, ErrorKind::RequestTimeout);
    // the late transport resolution must not produce a second outcome
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(hook_count.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_transport_failure_wraps_native_error() {
    let client = Client::builder(FailTransport).build();

    let error = client
        .get("/x", (), SendOptions::default())
        .await
        .expect_err("transport rejects");

    assert_eq!(error.code, ErrorKind::ResponseParsingFailed);
    assert!(error.native.is_some());
}

#[tokio::test]
async fn test_accept_mismatch_rejects() {
    let (transport, _calls) = StubTransport::new(response_with(200, "text/html", b"<html/>"));
    let client = Client::builder(transport)
        .header("Accept", "application/json")
        .build();

    let error = client
        .get("/x", (), SendOptions::default())
        .await
        .expect_err("mismatch");

    assert_eq!(error.code, ErrorKind::ResponseParsingFailed);
    assert!(error.message.contains("text/html"));
}

#[tokio::test]
async fn test_accept_wildcard_takes_anything() {
    let (transport, _calls) = StubTransport::new(response_with(200, "text/html", b"<html/>"));
    let client = Client::builder(transport).header("Accept", "*/*").build();

    let value = client
        .get("/x", (), SendOptions::default())
        .await
        .expect("wildcard accepts");
    assert_eq!(value.as_text(), Some("<html/>"));
}

#[tokio::test]
async fn test_status_error_carries_response() {
    let (transport, _calls) = StubTransport::new(response_with(404, "text/plain", b"missing"));
    let client = Client::builder(transport).build();

    let error = client
        .get("/x", (), SendOptions::default())
        .await
        .expect_err("non-200");

    assert_eq!(error.code, ErrorKind::HttpStatusError);
    assert_eq!(error.http_status, Some(404));
    let response = error.response.expect("cloned response");
    assert_eq!(response.status(), 404);
    assert_eq!(response.text().expect("utf-8"), "missing");
}

// === downloads ===

fn download_response() -> TransportResponse {
    let mut headers = BTreeMap::new();
    headers.insert(
        "Content-Type".to_string(),
        "application/octet-stream".to_string(),
    );
    headers.insert(
        "Content-Disposition".to_string(),
        "attachment; filename=report.pdf".to_string(),
    );
    TransportResponse::new(200, headers, vec![1, 2, 3, 4])
}

#[tokio::test]
async fn test_download_immediate_saves_and_resolves_sentinel() {
    let (transport, _calls) = StubTransport::new(download_response());
    let downloader = RecordingDownloader::default();
    let client = Client::builder(transport)
        .downloader(downloader.clone())
        .build();

    let opt = SendOptions {
        immediately: true,
        ..Default::default()
    };
    let value = client
        .download("/report", (), opt)
        .await
        .expect("download succeeds");

    assert_eq!(value, ResponseValue::Text("ok".to_string()));
    let saved = downloader.saved.lock().expect("saved lock");
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].0, vec![1, 2, 3, 4]);
    assert_eq!(saved[0].1, "report.pdf");
}

#[tokio::test]
async fn test_download_filename_override_wins() {
    let (transport, _calls) = StubTransport::new(download_response());
    let downloader = RecordingDownloader::default();
    let client = Client::builder(transport)
        .downloader(downloader.clone())
        .build();

    let opt = SendOptions {
        immediately: true,
        filename: Some("renamed.pdf".to_string()),
        ..Default::default()
    };
    client
        .download("/report", (), opt)
        .await
        .expect("download succeeds");

    assert_eq!(
        downloader.saved.lock().expect("saved lock")[0].1,
        "renamed.pdf"
    );
}

#[tokio::test]
async fn test_download_bypasses_after_hooks_and_returns_blob() {
    let (transport, _calls) = StubTransport::new(download_response());
    let after_calls = Arc::new(AtomicUsize::new(0));
    let counted = after_calls.clone();
    let client = Client::builder(transport)
        .after(Arc::new(move |_: &ResponseValue| {
            counted.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }))
        .build();

    let value = client
        .download("/report", (), SendOptions::default())
        .await
        .expect("download succeeds");

    assert_eq!(value.as_blob(), Some(&[1u8, 2, 3, 4][..]));
    assert_eq!(after_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_download_wrapper_applied() {
    let (transport, _calls) = StubTransport::new(download_response());
    let client = Client::builder(transport)
        .wrapper(Arc::new(|value: ResponseValue| {
            let size = value.as_blob().map(<[u8]>::len).unwrap_or(0);
            ResponseValue::Json(json!({"code": 200, "size": size, "success": true}))
        }))
        .build();

    let value = client
        .download("/report", (), SendOptions::default())
        .await
        .expect("download succeeds");

    assert_eq!(
        value,
        ResponseValue::Json(json!({"code": 200, "size": 4, "success": true}))
    );
}

#[tokio::test]
async fn test_download_params_serialize_into_query() {
    let (transport, calls) = StubTransport::new(download_response());
    let client = Client::builder(transport).build();

    client
        .download("/report", json!({"year": 2026}), SendOptions::default())
        .await
        .expect("download succeeds");

    let calls = calls.lock().expect("call log lock");
    assert_eq!(calls[0].0, "/report?year=2026");
    assert_eq!(calls[0].1.method, "GET");
}

// === facade ===

#[tokio::test]
async fn test_disabled_verb_rejects_without_dispatch() {
    let (transport, calls) = StubTransport::new(json_response("{}"));
    let client = Client::builder(transport)
        .allow(vec![Method::Get])
        .build();

    let error = client
        .post("/x", (), SendOptions::default())
        .await
        .expect_err("post disabled");

    assert_eq!(error.code, ErrorKind::HttpStatusError);
    assert_eq!(error.http_status, Some(405));
    assert!(calls.lock().expect("call log lock").is_empty());
}

#[tokio::test]
async fn test_set_option_merges_headers_keywise() {
    let (transport, calls) = StubTransport::new(json_response("{}"));
    let client = Client::builder(transport)
        .header("Accept", "application/json")
        .header("X-Env", "prod")
        .build();

    let mut headers = BTreeMap::new();
    headers.insert("X-Env".to_string(), "test".to_string());
    client.set_option(ClientOptions {
        config: ClientConfig {
            base_url: "/v2".to_string(),
            headers,
        },
        ..Default::default()
    });

    client
        .get("/x", (), SendOptions::default())
        .await
        .expect("request succeeds");

    let calls = calls.lock().expect("call log lock");
    assert_eq!(calls[0].0, "/v2/x");
    assert_eq!(calls[0].1.header("X-Env"), Some("test"));
    assert_eq!(calls[0].1.header("Accept"), Some("application/json"));
}

#[tokio::test]
async fn test_set_option_replaces_hook_lists_wholesale() {
    let (transport, _calls) = StubTransport::new(json_response("{}"));
    let original_calls = Arc::new(AtomicUsize::new(0));
    let replacement_calls = Arc::new(AtomicUsize::new(0));
    let original = original_calls.clone();
    let replacement = replacement_calls.clone();

    let client = Client::builder(transport)
        .before(Arc::new(move |_: &mut RequestContext| {
            original.fetch_add(1, Ordering::SeqCst);
            Ok(Flow::Continue)
        }))
        .build();

    let hook: Arc<dyn BeforeHook> = Arc::new(move |_: &mut RequestContext| {
        replacement.fetch_add(1, Ordering::SeqCst);
        Ok(Flow::Continue)
    });
    client.set_option(ClientOptions {
        before: Some(vec![hook]),
        ..Default::default()
    });

    client
        .get("/x", (), SendOptions::default())
        .await
        .expect("request succeeds");

    // the list was replaced, not appended to
    assert_eq!(original_calls.load(Ordering::SeqCst), 0);
    assert_eq!(replacement_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_set_option_replaces_timeout() {
    let client = Client::builder(NeverTransport).build();
    client.set_option(ClientOptions {
        timeout: Some(30),
        ..Default::default()
    });

    let start = Instant::now();
    let error = client
        .get("/x", (), SendOptions::default())
        .await
        .expect_err("times out");

    // the default would have waited 5000 ms
    assert_eq!(error.code, ErrorKind::RequestTimeout);
    assert!(start.elapsed() < Duration::from_millis(1000));
}

#[tokio::test]
async fn test_injected_hooks_append_in_order() {
    let (transport, _calls) = StubTransport::new(json_response("{}"));
    let order = Arc::new(Mutex::new(Vec::new()));
    let first = order.clone();
    let second = order.clone();

    let client = Client::builder(transport).build();
    client.inject_before(Arc::new(move |_: &mut RequestContext| {
        first.lock().expect("order lock").push(1);
        Ok(Flow::Continue)
    }));
    client.inject_before(Arc::new(move |_: &mut RequestContext| {
        second.lock().expect("order lock").push(2);
        Ok(Flow::Continue)
    }));

    client
        .get("/x", (), SendOptions::default())
        .await
        .expect("request succeeds");

    assert_eq!(*order.lock().expect("order lock"), vec![1, 2]);
}

#[tokio::test]
async fn test_per_call_timeout_overrides_default() {
    let client = Client::builder(NeverTransport).timeout_ms(10_000).build();

    let opt = SendOptions {
        timeout: Some(30),
        ..Default::default()
    };
    let start = Instant::now();
    let error = client.get("/x", (), opt).await.expect_err("times out");

    assert_eq!(error.code, ErrorKind::RequestTimeout);
    assert!(start.elapsed() < Duration::from_millis(500));
}
