//! End-to-end pipeline tests against the live mock server.
//!
//! # Design
//! Starts the mock server on a random port and plugs a ureq-backed
//! `Transport` into the pipeline. Each channel runs its blocking round-trip
//! on a thread and reports back through the event sink, the way a browser
//! reports through request callbacks.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use courier_core::{
    Body, CancelSource, Channel, ChannelEvent, ChannelSnapshot, Courier, DocumentCookies,
    Environment, ErrorKind, EventSink, Method, PageOrigin, Progress, RequestConfig, ResponseBody,
    ResponseType, Transport,
};
use serde_json::json;

struct UreqTransport;

struct UreqChannel {
    method: String,
    url: String,
    headers: Vec<(String, String)>,
    timeout: Option<u64>,
    report_download: bool,
    aborted: Arc<AtomicBool>,
}

impl Transport for UreqTransport {
    type Channel = UreqChannel;

    fn open(&self, method: &str, url: &str) -> Result<UreqChannel, String> {
        Ok(UreqChannel {
            method: method.to_string(),
            url: url.to_string(),
            headers: Vec::new(),
            timeout: None,
            report_download: false,
            aborted: Arc::new(AtomicBool::new(false)),
        })
    }
}

impl Channel for UreqChannel {
    fn set_response_type(&mut self, _response_type: ResponseType) {}

    fn set_timeout(&mut self, millis: u64) {
        self.timeout = Some(millis);
    }

    fn set_with_credentials(&mut self, _with_credentials: bool) {}

    fn set_request_header(&mut self, name: &str, value: &str) {
        self.headers.push((name.to_string(), value.to_string()));
    }

    fn observe_progress(&mut self, download: bool, _upload: bool) {
        self.report_download = download;
    }

    fn send(&mut self, body: Option<Body>, events: EventSink) {
        let method = self.method.clone();
        let url = self.url.clone();
        let headers = self.headers.clone();
        let timeout = self.timeout;
        let report_download = self.report_download;
        let aborted = Arc::clone(&self.aborted);

        std::thread::spawn(move || {
            let outcome = round_trip(&method, &url, &headers, timeout, body.map(body_bytes));
            if aborted.load(Ordering::SeqCst) {
                events.emit(ChannelEvent::Abort);
                return;
            }
            if let ChannelEvent::ReadyStateChange(snapshot) = &outcome {
                if report_download {
                    let loaded = snapshot.response_text.as_deref().map_or(0, str::len) as u64;
                    events.emit(ChannelEvent::DownloadProgress(Progress {
                        loaded,
                        total: Some(loaded),
                    }));
                }
            }
            events.emit(outcome);
        });
    }

    fn abort(&mut self) {
        self.aborted.store(true, Ordering::SeqCst);
    }
}

fn body_bytes(body: Body) -> Vec<u8> {
    match body {
        Body::Text(text) => text.into_bytes(),
        Body::Bytes(bytes) => bytes,
        Body::Json(value) => value.to_string().into_bytes(),
        Body::UrlEncoded(pairs) => url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(pairs)
            .finish()
            .into_bytes(),
        Body::Multipart(form) => form
            .fields()
            .iter()
            .map(|(k, v)| format!("{k}={v}\n"))
            .collect::<String>()
            .into_bytes(),
    }
}

/// Execute one exchange with ureq and translate the result into a channel event.
///
/// Disables ureq's automatic status-code-as-error behavior so 4xx/5xx
/// responses come back as data and the pipeline does the classifying.
fn round_trip(
    method: &str,
    url: &str,
    headers: &[(String, String)],
    timeout: Option<u64>,
    body: Option<Vec<u8>>,
) -> ChannelEvent {
    let agent = ureq::Agent::config_builder()
        .http_status_as_error(false)
        .timeout_global(timeout.map(Duration::from_millis))
        .build()
        .new_agent();

    let mut builder = ureq::http::Request::builder().method(method).uri(url);
    for (name, value) in headers {
        builder = builder.header(name.as_str(), value.as_str());
    }

    let result = match body {
        Some(bytes) => match builder.body(bytes) {
            Ok(request) => agent.run(request),
            Err(_) => return ChannelEvent::Error,
        },
        None => match builder.body(()) {
            Ok(request) => agent.run(request),
            Err(_) => return ChannelEvent::Error,
        },
    };

    let mut response = match result {
        Ok(response) => response,
        Err(ureq::Error::Timeout(_)) => return ChannelEvent::Timeout,
        Err(_) => return ChannelEvent::Error,
    };

    let status = response.status();
    let raw_headers: String = response
        .headers()
        .iter()
        .filter_map(|(name, value)| Some(format!("{}: {}\r\n", name, value.to_str().ok()?)))
        .collect();
    let text = response.body_mut().read_to_string().unwrap_or_default();

    ChannelEvent::ReadyStateChange(ChannelSnapshot::done(
        status.as_u16(),
        status.canonical_reason().unwrap_or_default(),
        raw_headers,
        text.as_bytes(),
    ))
}

fn start_server() -> SocketAddr {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run(listener).await
        })
        .unwrap();
    });

    addr
}

fn courier() -> (Courier<UreqTransport>, String) {
    let addr = start_server();
    (Courier::new(UreqTransport), format!("http://{addr}"))
}

#[tokio::test]
async fn get_echo_is_parsed_and_carries_default_accept() {
    let (courier, base) = courier();
    let response = courier.get(&format!("{base}/echo")).await.unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(response.status_text, "OK");
    assert!(response.headers.get("content-type").unwrap().starts_with("application/json"));

    let echo = response.data.as_json().expect("echo body parses as JSON");
    assert_eq!(echo["method"], "GET");
    assert_eq!(echo["headers"]["accept"], "application/json, text/plain, */*");
    assert!(echo["headers"].get("content-type").is_none());
}

#[tokio::test]
async fn bodiless_request_never_submits_content_type() {
    let (courier, base) = courier();
    let config = RequestConfig::new(format!("{base}/echo"))
        .method(Method::Delete)
        .header("Content-Type", "application/json");
    let response = courier.request(config).await.unwrap();

    let echo = response.data.as_json().unwrap();
    assert_eq!(echo["method"], "DELETE");
    assert!(echo["headers"].get("content-type").is_none());
}

#[tokio::test]
async fn json_post_is_serialized_with_json_type() {
    let (courier, base) = courier();
    let response = courier
        .post(&format!("{base}/echo"), Some(Body::Json(json!({"title": "Buy milk"}))))
        .await
        .unwrap();

    let echo = response.data.as_json().unwrap();
    assert_eq!(echo["method"], "POST");
    assert_eq!(echo["headers"]["content-type"], "application/json;charset=utf-8");
    let sent: serde_json::Value = serde_json::from_str(echo["body"].as_str().unwrap()).unwrap();
    assert_eq!(sent, json!({"title": "Buy milk"}));
}

#[tokio::test]
async fn text_post_keeps_form_default_type() {
    let (courier, base) = courier();
    let response = courier
        .put(&format!("{base}/echo"), Some(Body::Text("a=1&b=2".into())))
        .await
        .unwrap();

    let echo = response.data.as_json().unwrap();
    assert_eq!(echo["headers"]["content-type"], "application/x-www-form-urlencoded");
    assert_eq!(echo["body"], "a=1&b=2");
}

#[tokio::test]
async fn not_found_is_bad_status_with_response() {
    let (courier, base) = courier();
    let err = courier.get(&format!("{base}/status/404")).await.unwrap_err();

    assert_eq!(err.kind, ErrorKind::BadStatus);
    let response = err.response.expect("bad status carries the response");
    assert_eq!(response.status, 404);
    assert_eq!(response.data, ResponseBody::Json(json!({"status": 404})));
}

#[tokio::test]
async fn no_content_succeeds() {
    let (courier, base) = courier();
    let response = courier.get(&format!("{base}/status/204")).await.unwrap();
    assert_eq!(response.status, 204);
}

#[tokio::test]
async fn custom_validator_accepts_client_errors() {
    let (courier, base) = courier();
    let config = RequestConfig::new(format!("{base}/status/418")).validate_status(|status| status < 500);
    let response = courier.request(config).await.unwrap();
    assert_eq!(response.status, 418);
}

#[tokio::test]
async fn slow_response_times_out() {
    let (courier, base) = courier();
    let config = RequestConfig::new(format!("{base}/delay/2000")).timeout(100);
    let err = courier.request(config).await.unwrap_err();

    assert_eq!(err.kind, ErrorKind::Timeout);
    assert_eq!(err.message, "Timeout of 100 ms exceeded");
    assert!(err.response.is_none());
}

#[tokio::test]
async fn cancel_during_flight_settles_as_cancelled() {
    let (courier, base) = courier();
    let source = CancelSource::new();
    let config = RequestConfig::new(format!("{base}/delay/500")).cancel_token(source.token());

    let (result, _) = tokio::join!(courier.request(config), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        source.cancel("navigated away");
    });

    let err = result.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Cancelled);
    assert_eq!(err.message, "navigated away");
}

#[tokio::test]
async fn refused_connection_is_network_error() {
    let closed = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };
    let courier = Courier::new(UreqTransport);
    let err = courier.get(&format!("http://{closed}/echo")).await.unwrap_err();

    assert_eq!(err.kind, ErrorKind::Network);
    assert!(err.request.is_some());
    assert!(err.response.is_none());
}

#[tokio::test]
async fn same_origin_request_carries_xsrf_and_auth() {
    let (courier, base) = courier();
    let env = Environment {
        cookies: Arc::new(DocumentCookies::new("theme=dark; XSRF-TOKEN=tok123")),
        origin: Arc::new(PageOrigin::parse(&format!("{base}/app/")).unwrap()),
    };
    let courier = courier.with_environment(env);

    let response = courier
        .request(RequestConfig::new(format!("{base}/echo")).auth("u", "p"))
        .await
        .unwrap();

    let echo = response.data.as_json().unwrap();
    assert_eq!(echo["headers"]["x-xsrf-token"], "tok123");
    assert_eq!(echo["headers"]["authorization"], "Basic dTpw");
}

#[tokio::test]
async fn cross_origin_request_omits_xsrf() {
    let (courier, base) = courier();
    let env = Environment {
        cookies: Arc::new(DocumentCookies::new("XSRF-TOKEN=tok123")),
        origin: Arc::new(PageOrigin::parse("http://app.invalid/").unwrap()),
    };
    let courier = courier.with_environment(env);

    let response = courier.get(&format!("{base}/echo")).await.unwrap();
    let echo = response.data.as_json().unwrap();
    assert!(echo["headers"].get("x-xsrf-token").is_none());
}

#[tokio::test]
async fn params_are_appended_to_the_url() {
    let (courier, base) = courier();
    let config = RequestConfig::new(format!("{base}/echo")).param("q", "a b");
    let response = courier.request(config).await.unwrap();
    assert_eq!(response.request.url, format!("{base}/echo?q=a+b"));
}

#[tokio::test]
async fn text_response_type_skips_json_parsing_of_plain_text() {
    let (courier, base) = courier();
    let config = RequestConfig::new(format!("{base}/text")).response_type(ResponseType::Text);
    let response = courier.request(config).await.unwrap();
    assert_eq!(response.data, ResponseBody::Text("plain text body".into()));
}

#[tokio::test]
async fn download_progress_is_reported_before_settlement() {
    let (courier, base) = courier();
    let seen = Arc::new(AtomicU64::new(0));
    let counter = Arc::clone(&seen);
    let config = RequestConfig::new(format!("{base}/text")).on_download_progress(move |progress| {
        counter.store(progress.loaded, Ordering::SeqCst);
    });
    courier.request(config).await.unwrap();
    assert_eq!(seen.load(Ordering::SeqCst), "plain text body".len() as u64);
}
