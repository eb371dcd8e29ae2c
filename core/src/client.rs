//! The request front door.
//!
//! # Design
//! `dispatch` strings the stages together: merge over defaults, build the
//! final URL from `params`, run the request transform chain against the
//! caller's header layer, then hand the resolved config to the adapter. The
//! adapter flattens headers, finalizes them and talks to the channel.
//!
//! `Courier` is a thin owner of the three inputs `dispatch` needs besides the
//! request itself, with one method per HTTP verb.

use url::form_urlencoded;

use crate::adapter::execute;
use crate::config::{merge, Defaults, RequestConfig};
use crate::error::TransportError;
use crate::host::Environment;
use crate::http::{Body, Method};
use crate::response::Response;
use crate::transport::Transport;

/// Run one request through the whole pipeline.
pub async fn dispatch<T: Transport>(
    transport: &T,
    env: &Environment,
    defaults: &Defaults,
    config: RequestConfig,
) -> Result<Response, TransportError> {
    let mut resolved = merge(defaults, config);
    resolved.url = resolved.url.take().map(|url| build_url(&url, &resolved.params));

    let data = resolved.data.take();
    resolved.data = resolved.transform_request.apply(data, &mut resolved.headers);

    execute(transport, env, resolved).await
}

/// Append `params` to `url` as a query string. Drops any fragment.
pub fn build_url(url: &str, params: &[(String, String)]) -> String {
    if params.is_empty() {
        return url.to_string();
    }

    let base = match url.find('#') {
        Some(idx) => &url[..idx],
        None => url,
    };
    let query = form_urlencoded::Serializer::new(String::new())
        .extend_pairs(params.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .finish();

    let separator = if base.contains('?') { '&' } else { '?' };
    format!("{base}{separator}{query}")
}

/// HTTP client over a host transport.
#[derive(Debug)]
pub struct Courier<T> {
    defaults: Defaults,
    transport: T,
    env: Environment,
}

impl<T: Transport> Courier<T> {
    pub fn new(transport: T) -> Self {
        Self {
            defaults: Defaults::standard(),
            transport,
            env: Environment::default(),
        }
    }

    pub fn with_defaults(mut self, defaults: Defaults) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn with_environment(mut self, env: Environment) -> Self {
        self.env = env;
        self
    }

    pub fn defaults(&self) -> &Defaults {
        &self.defaults
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub async fn request(&self, config: RequestConfig) -> Result<Response, TransportError> {
        dispatch(&self.transport, &self.env, &self.defaults, config).await
    }

    pub async fn get(&self, url: &str) -> Result<Response, TransportError> {
        self.request(RequestConfig::new(url).method(Method::Get)).await
    }

    pub async fn delete(&self, url: &str) -> Result<Response, TransportError> {
        self.request(RequestConfig::new(url).method(Method::Delete)).await
    }

    pub async fn head(&self, url: &str) -> Result<Response, TransportError> {
        self.request(RequestConfig::new(url).method(Method::Head)).await
    }

    pub async fn options(&self, url: &str) -> Result<Response, TransportError> {
        self.request(RequestConfig::new(url).method(Method::Options)).await
    }

    pub async fn post(&self, url: &str, data: Option<Body>) -> Result<Response, TransportError> {
        self.request(with_data(RequestConfig::new(url).method(Method::Post), data)).await
    }

    pub async fn put(&self, url: &str, data: Option<Body>) -> Result<Response, TransportError> {
        self.request(with_data(RequestConfig::new(url).method(Method::Put), data)).await
    }

    pub async fn patch(&self, url: &str, data: Option<Body>) -> Result<Response, TransportError> {
        self.request(with_data(RequestConfig::new(url).method(Method::Patch), data)).await
    }
}

fn with_data(mut config: RequestConfig, data: Option<Body>) -> RequestConfig {
    config.data = data;
    config
}
