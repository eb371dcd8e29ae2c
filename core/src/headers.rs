//! Request header computation and response header parsing.
//!
//! # Design
//! `finalize_headers` runs the four ordered steps that turn the merged header
//! list into exactly what the channel receives: multipart content-type
//! removal, XSRF injection, basic auth, then the content-type deletion pass
//! for bodiless requests. The first three add or remove entries that the last
//! one inspects, so the order is fixed.
//!
//! Content-Type deletion matches names ignoring case while merging
//! (`Headers::set`) matches exactly. Both behaviors are relied upon.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::config::{BasicAuth, ResolvedConfig};
use crate::host::Environment;
use crate::http::{Body, Headers};

pub const CONTENT_TYPE: &str = "Content-Type";
pub const AUTHORIZATION: &str = "Authorization";
pub const JSON_CONTENT_TYPE: &str = "application/json;charset=utf-8";

/// Rename any case variant of `canonical` to the canonical spelling.
pub fn normalize_header_name(headers: &mut Headers, canonical: &str) {
    let entries = headers.entries_mut();
    for entry in entries.iter_mut() {
        if entry.0 != canonical && entry.0.eq_ignore_ascii_case(canonical) {
            entry.0 = canonical.to_string();
        }
    }
    // Renaming can leave duplicates; the last one wins.
    while entries.iter().filter(|(k, _)| k == canonical).count() > 1 {
        match entries.iter().position(|(k, _)| k == canonical) {
            Some(first) => {
                entries.remove(first);
            }
            None => break,
        }
    }
}

/// Canonicalize Content-Type and infer it for structured bodies.
pub fn process_headers(headers: &mut Headers, body: Option<&Body>) {
    normalize_header_name(headers, CONTENT_TYPE);
    if body.is_some_and(Body::is_structured) && !headers.contains(CONTENT_TYPE) {
        headers.set(CONTENT_TYPE, JSON_CONTENT_TYPE);
    }
}

pub fn basic_auth(auth: &BasicAuth) -> String {
    let credentials = format!("{}:{}", auth.username, auth.password);
    format!("Basic {}", STANDARD.encode(credentials))
}

/// Compute the headers submitted to the channel, mutating `headers` in place.
pub fn finalize_headers(headers: &mut Headers, config: &ResolvedConfig, env: &Environment) {
    let body = config.data.as_ref();

    if body.is_some_and(Body::is_multipart) {
        headers.remove_ignore_case(CONTENT_TYPE);
    }

    let url = config.url.as_deref().unwrap_or_default();
    if config.with_credentials || env.origin.is_same_origin(url) {
        if let Some(cookie_name) = config.xsrf_cookie_name.as_deref() {
            let token = env.cookies.read(cookie_name);
            if let (Some(token), Some(header_name)) = (token, config.xsrf_header_name.as_deref()) {
                headers.set(header_name, token);
            }
        }
    }

    if let Some(auth) = &config.auth {
        headers.set(AUTHORIZATION, basic_auth(auth));
    }

    if body.is_none() {
        headers.remove_ignore_case(CONTENT_TYPE);
    }
}

/// Parse a raw header block into lower-cased names.
pub fn parse_headers(raw: &str) -> Headers {
    let mut parsed = Headers::new();
    for line in raw.split('\n') {
        let (name, value) = match line.split_once(':') {
            Some((name, value)) => (name, value),
            None => (line, ""),
        };
        let name = name.trim().to_ascii_lowercase();
        if name.is_empty() {
            continue;
        }
        parsed.set(name, value.trim());
    }
    parsed
}
