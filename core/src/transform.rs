//! Ordered body transforms for both directions.
//!
//! A chain is a list of synchronous functions `(value, &mut Headers) -> value`.
//! Request chains run once before send and may settle Content-Type through
//! the header reference. Response chains run once per completed response.

use std::fmt;
use std::sync::Arc;

use crate::headers::process_headers;
use crate::http::{Body, Headers, ResponseBody};

type Step<T> = Arc<dyn Fn(T, &mut Headers) -> T + Send + Sync>;

pub struct TransformChain<T> {
    steps: Vec<Step<T>>,
}

/// Chain over outbound bodies.
pub type RequestTransform = TransformChain<Option<Body>>;

/// Chain over inbound bodies.
pub type ResponseTransform = TransformChain<ResponseBody>;

impl<T: 'static> TransformChain<T> {
    pub fn new() -> Self {
        Self { steps: Vec::new() }
    }

    pub fn then<F>(mut self, step: F) -> Self
    where
        F: Fn(T, &mut Headers) -> T + Send + Sync + 'static,
    {
        self.steps.push(Arc::new(step));
        self
    }

    pub fn apply(&self, value: T, headers: &mut Headers) -> T {
        self.steps.iter().fold(value, |value, step| step(value, headers))
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl<T: 'static> Default for TransformChain<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for TransformChain<T> {
    fn clone(&self) -> Self {
        Self {
            steps: self.steps.clone(),
        }
    }
}

impl<T> fmt::Debug for TransformChain<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformChain")
            .field("steps", &self.steps.len())
            .finish()
    }
}

/// Infers Content-Type, then serializes structured bodies to JSON text.
pub fn default_request_chain() -> RequestTransform {
    TransformChain::new().then(|body: Option<Body>, headers: &mut Headers| {
        process_headers(headers, body.as_ref());
        match body {
            Some(Body::Json(value)) => Some(Body::Text(value.to_string())),
            other => other,
        }
    })
}

/// Parses textual bodies that hold JSON. Anything else passes through.
pub fn default_response_chain() -> ResponseTransform {
    TransformChain::new().then(|data: ResponseBody, _headers: &mut Headers| parse_json_text(data))
}

fn parse_json_text(data: ResponseBody) -> ResponseBody {
    match data {
        ResponseBody::Text(text) => match serde_json::from_str(&text) {
            Ok(value) => ResponseBody::Json(value),
            Err(_) => ResponseBody::Text(text),
        },
        other => other,
    }
}
