//! Request configuration, defaults, and the merge between them.
//!
//! # Design
//! `RequestConfig` is what callers write: every field optional. `Defaults`
//! is an explicit value built once (in code or from TOML) and passed into
//! `merge`; nothing here is global. `ResolvedConfig` is the effective result.
//!
//! Headers resolve in two layers. The shared `common` bucket and the bucket
//! for the request's method combine into `default_headers`; the caller's
//! headers stay in `headers` until `flatten_headers` lays them on top by exact
//! name. Keeping the layers apart until then lets the request transform chain
//! see only what the caller set when it decides on a Content-Type.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::cancel::CancelToken;
use crate::error::ConfigError;
use crate::headers::CONTENT_TYPE;
use crate::http::{Body, Headers, Method, Progress, ResponseType};
use crate::transform::{default_request_chain, default_response_chain, RequestTransform, ResponseTransform};
use crate::validate::ValidateStatus;

pub const DEFAULT_ACCEPT: &str = "application/json, text/plain, */*";
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
pub const DEFAULT_XSRF_COOKIE_NAME: &str = "XSRF-TOKEN";
pub const DEFAULT_XSRF_HEADER_NAME: &str = "X-XSRF-TOKEN";

/// Credentials for the `Authorization: Basic` header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicAuth {
    pub username: String,
    pub password: String,
}

impl BasicAuth {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

/// Callback for upload or download progress.
#[derive(Clone)]
pub struct ProgressCallback(Arc<dyn Fn(&Progress) + Send + Sync>);

impl ProgressCallback {
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(&Progress) + Send + Sync + 'static,
    {
        Self(Arc::new(callback))
    }

    pub fn call(&self, progress: &Progress) {
        (self.0)(progress)
    }
}

impl fmt::Debug for ProgressCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ProgressCallback(..)")
    }
}

/// Caller-supplied request configuration.
#[derive(Debug, Clone, Default)]
pub struct RequestConfig {
    pub url: Option<String>,
    pub method: Option<Method>,
    pub headers: Headers,
    pub params: Vec<(String, String)>,
    pub data: Option<Body>,
    pub response_type: Option<ResponseType>,
    /// Milliseconds; 0 disables the timeout.
    pub timeout: Option<u64>,
    pub with_credentials: Option<bool>,
    pub xsrf_cookie_name: Option<String>,
    pub xsrf_header_name: Option<String>,
    pub auth: Option<BasicAuth>,
    pub validate_status: Option<ValidateStatus>,
    pub transform_request: Option<RequestTransform>,
    pub transform_response: Option<ResponseTransform>,
    pub cancel_token: Option<CancelToken>,
    pub on_download_progress: Option<ProgressCallback>,
    pub on_upload_progress: Option<ProgressCallback>,
}

impl RequestConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Default::default()
        }
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.set(name, value);
        self
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((name.into(), value.into()));
        self
    }

    pub fn data(mut self, body: Body) -> Self {
        self.data = Some(body);
        self
    }

    pub fn json(self, value: serde_json::Value) -> Self {
        self.data(Body::Json(value))
    }

    pub fn response_type(mut self, response_type: ResponseType) -> Self {
        self.response_type = Some(response_type);
        self
    }

    pub fn timeout(mut self, millis: u64) -> Self {
        self.timeout = Some(millis);
        self
    }

    pub fn with_credentials(mut self, with_credentials: bool) -> Self {
        self.with_credentials = Some(with_credentials);
        self
    }

    pub fn xsrf(mut self, cookie_name: impl Into<String>, header_name: impl Into<String>) -> Self {
        self.xsrf_cookie_name = Some(cookie_name.into());
        self.xsrf_header_name = Some(header_name.into());
        self
    }

    pub fn auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.auth = Some(BasicAuth::new(username, password));
        self
    }

    pub fn validate_status<F>(mut self, predicate: F) -> Self
    where
        F: Fn(u16) -> bool + Send + Sync + 'static,
    {
        self.validate_status = Some(ValidateStatus::new(predicate));
        self
    }

    pub fn transform_request(mut self, chain: RequestTransform) -> Self {
        self.transform_request = Some(chain);
        self
    }

    pub fn transform_response(mut self, chain: ResponseTransform) -> Self {
        self.transform_response = Some(chain);
        self
    }

    pub fn cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel_token = Some(token);
        self
    }

    pub fn on_download_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Progress) + Send + Sync + 'static,
    {
        self.on_download_progress = Some(ProgressCallback::new(callback));
        self
    }

    pub fn on_upload_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Progress) + Send + Sync + 'static,
    {
        self.on_upload_progress = Some(ProgressCallback::new(callback));
        self
    }
}

/// Default header buckets: one shared, one per method.
#[derive(Debug, Clone, Default)]
pub struct HeaderDefaults {
    pub common: Headers,
    pub methods: BTreeMap<Method, Headers>,
}

impl HeaderDefaults {
    /// `common` overlaid with the bucket for `method`.
    pub fn for_method(&self, method: Method) -> Headers {
        let mut headers = self.common.clone();
        if let Some(bucket) = self.methods.get(&method) {
            headers.overlay(bucket);
        }
        headers
    }

    fn bucket_mut(&mut self, name: &str) -> Result<&mut Headers, ConfigError> {
        if name == "common" {
            return Ok(&mut self.common);
        }
        let method: Method = name
            .parse()
            .map_err(|_| ConfigError::UnknownHeaderBucket(name.to_string()))?;
        Ok(self.methods.entry(method).or_default())
    }
}

/// Defaults every request is merged over.
#[derive(Debug, Clone)]
pub struct Defaults {
    pub method: Method,
    pub timeout: u64,
    pub headers: HeaderDefaults,
    pub response_type: Option<ResponseType>,
    pub with_credentials: bool,
    pub xsrf_cookie_name: Option<String>,
    pub xsrf_header_name: Option<String>,
    pub transform_request: RequestTransform,
    pub transform_response: ResponseTransform,
    pub validate_status: ValidateStatus,
}

impl Defaults {
    pub fn standard() -> Self {
        let mut headers = HeaderDefaults::default();
        headers.common.set("Accept", DEFAULT_ACCEPT);
        for method in Method::ALL {
            let mut bucket = Headers::new();
            if method.has_body() {
                bucket.set(CONTENT_TYPE, FORM_CONTENT_TYPE);
            }
            headers.methods.insert(method, bucket);
        }

        Self {
            method: Method::Get,
            timeout: 0,
            headers,
            response_type: None,
            with_credentials: false,
            xsrf_cookie_name: Some(DEFAULT_XSRF_COOKIE_NAME.to_string()),
            xsrf_header_name: Some(DEFAULT_XSRF_HEADER_NAME.to_string()),
            transform_request: default_request_chain(),
            transform_response: default_response_chain(),
            validate_status: ValidateStatus::default(),
        }
    }

    /// Overlay a TOML document on `Defaults::standard()`.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let file: DefaultsFile = toml::from_str(source)?;
        let mut defaults = Self::standard();

        if let Some(method) = file.method {
            defaults.method = method;
        }
        if let Some(timeout) = file.timeout {
            defaults.timeout = timeout;
        }
        if let Some(with_credentials) = file.with_credentials {
            defaults.with_credentials = with_credentials;
        }
        if file.response_type.is_some() {
            defaults.response_type = file.response_type;
        }
        if file.xsrf_cookie_name.is_some() {
            defaults.xsrf_cookie_name = file.xsrf_cookie_name;
        }
        if file.xsrf_header_name.is_some() {
            defaults.xsrf_header_name = file.xsrf_header_name;
        }
        for (bucket, entries) in file.headers {
            let target = defaults.headers.bucket_mut(&bucket)?;
            for (name, value) in entries {
                target.set(name, value);
            }
        }

        Ok(defaults)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }
}

impl Default for Defaults {
    fn default() -> Self {
        Self::standard()
    }
}

/// On-disk shape of `Defaults`.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct DefaultsFile {
    method: Option<Method>,
    timeout: Option<u64>,
    with_credentials: Option<bool>,
    response_type: Option<ResponseType>,
    xsrf_cookie_name: Option<String>,
    xsrf_header_name: Option<String>,
    headers: BTreeMap<String, BTreeMap<String, String>>,
}

/// Effective configuration for one execution.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub url: Option<String>,
    pub method: Method,
    /// Caller layer, or the final list once flattened.
    pub headers: Headers,
    /// `common` plus the method bucket; empty once flattened.
    pub default_headers: Headers,
    pub params: Vec<(String, String)>,
    pub data: Option<Body>,
    pub response_type: Option<ResponseType>,
    pub timeout: u64,
    pub with_credentials: bool,
    pub xsrf_cookie_name: Option<String>,
    pub xsrf_header_name: Option<String>,
    pub auth: Option<BasicAuth>,
    pub validate_status: ValidateStatus,
    pub transform_request: RequestTransform,
    pub transform_response: ResponseTransform,
    pub cancel_token: Option<CancelToken>,
    pub on_download_progress: Option<ProgressCallback>,
    pub on_upload_progress: Option<ProgressCallback>,
}

impl ResolvedConfig {
    /// Default layer with the caller layer laid on top by exact name.
    pub fn effective_headers(&self) -> Headers {
        let mut headers = self.default_headers.clone();
        headers.overlay(&self.headers);
        headers
    }

    /// Collapse both layers into `headers`. Idempotent.
    pub fn flatten_headers(&mut self) {
        if self.default_headers.is_empty() {
            return;
        }
        self.headers = self.effective_headers();
        self.default_headers = Headers::new();
    }
}

/// Merge caller config over defaults. Never fails.
pub fn merge(defaults: &Defaults, caller: RequestConfig) -> ResolvedConfig {
    let method = caller.method.unwrap_or(defaults.method);

    ResolvedConfig {
        url: caller.url,
        method,
        headers: caller.headers,
        default_headers: defaults.headers.for_method(method),
        params: caller.params,
        data: caller.data,
        response_type: caller.response_type.or(defaults.response_type),
        timeout: caller.timeout.unwrap_or(defaults.timeout),
        with_credentials: caller.with_credentials.unwrap_or(defaults.with_credentials),
        xsrf_cookie_name: caller.xsrf_cookie_name.or_else(|| defaults.xsrf_cookie_name.clone()),
        xsrf_header_name: caller.xsrf_header_name.or_else(|| defaults.xsrf_header_name.clone()),
        auth: caller.auth,
        validate_status: caller
            .validate_status
            .unwrap_or_else(|| defaults.validate_status.clone()),
        transform_request: caller
            .transform_request
            .unwrap_or_else(|| defaults.transform_request.clone()),
        transform_response: caller
            .transform_response
            .unwrap_or_else(|| defaults.transform_response.clone()),
        cancel_token: caller.cancel_token,
        on_download_progress: caller.on_download_progress,
        on_upload_progress: caller.on_upload_progress,
    }
}
