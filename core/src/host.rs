//! Services the host environment provides to the pipeline.
//!
//! The pipeline only needs to read one cookie and to ask whether a URL shares
//! the page's origin. Hosts plug in their own implementations; the ones here
//! cover a cookie string and a fixed page URL.

use std::fmt;
use std::sync::Arc;

use url::Url;

/// Read access to the host's cookies.
pub trait CookieStore: Send + Sync {
    fn read(&self, name: &str) -> Option<String>;
}

/// Same-origin test for request URLs.
pub trait OriginPolicy: Send + Sync {
    fn is_same_origin(&self, url: &str) -> bool;
}

/// Host collaborators handed to each execution.
#[derive(Clone)]
pub struct Environment {
    pub cookies: Arc<dyn CookieStore>,
    pub origin: Arc<dyn OriginPolicy>,
}

impl Default for Environment {
    fn default() -> Self {
        Self {
            cookies: Arc::new(NoCookies),
            origin: Arc::new(CrossOrigin),
        }
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment").finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoCookies;

impl CookieStore for NoCookies {
    fn read(&self, _name: &str) -> Option<String> {
        None
    }
}

/// Cookies from a `document.cookie` style string: `a=1; b=2`.
#[derive(Debug, Clone, Default)]
pub struct DocumentCookies {
    raw: String,
}

impl DocumentCookies {
    pub fn new(raw: impl Into<String>) -> Self {
        Self { raw: raw.into() }
    }
}

impl CookieStore for DocumentCookies {
    fn read(&self, name: &str) -> Option<String> {
        self.raw
            .split(';')
            .filter_map(|pair| pair.trim_start().split_once('='))
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.to_string())
    }
}

/// Treats every URL as cross-origin.
#[derive(Debug, Clone, Copy, Default)]
pub struct CrossOrigin;

impl OriginPolicy for CrossOrigin {
    fn is_same_origin(&self, _url: &str) -> bool {
        false
    }
}

/// Compares request URLs, resolved against the page URL, with the page origin.
#[derive(Debug, Clone)]
pub struct PageOrigin {
    page: Url,
}

impl PageOrigin {
    pub fn new(page: Url) -> Self {
        Self { page }
    }

    pub fn parse(page: &str) -> Result<Self, url::ParseError> {
        Ok(Self::new(Url::parse(page)?))
    }
}

impl OriginPolicy for PageOrigin {
    fn is_same_origin(&self, url: &str) -> bool {
        match self.page.join(url) {
            Ok(target) => target.origin() == self.page.origin(),
            Err(_) => false,
        }
    }
}
