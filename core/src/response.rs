//! The settled response envelope.

use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::config::ResolvedConfig;
use crate::http::{Headers, Method, ResponseBody};

/// Identifies the channel an envelope or error came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelHandle {
    pub id: Uuid,
    pub method: Method,
    pub url: String,
    /// Headers as applied to the channel, after finalization.
    pub headers: Headers,
}

/// A completed response. Built only at settlement.
#[derive(Debug, Clone)]
pub struct Response {
    pub data: ResponseBody,
    pub status: u16,
    pub status_text: String,
    /// Parsed from the raw header block; names are lower-case.
    pub headers: Headers,
    pub config: ResolvedConfig,
    pub request: ChannelHandle,
}

impl Response {
    /// Deserialize a structured body.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        match &self.data {
            ResponseBody::Json(value) => serde_json::from_value(value.clone()),
            ResponseBody::Text(text) => serde_json::from_str(text),
            ResponseBody::Bytes(bytes) => serde_json::from_slice(bytes),
            ResponseBody::Empty => serde_json::from_str(""),
        }
    }
}
