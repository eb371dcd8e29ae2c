//! Error types for the request pipeline.
//!
//! # Design
//! Every failed execution yields one `TransportError`. `kind` says which of
//! the four terminal failures happened; the error also carries the effective
//! config and, when a channel was opened, its handle. Only `BadStatus`
//! carries a response. None of these are retried here.

use std::fmt;

use crate::config::ResolvedConfig;
use crate::response::{ChannelHandle, Response};

/// Code attached to timeouts.
pub const TIMEOUT_CODE: &str = "ECONNABORTED";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The transport failed and produced no response.
    Network,
    /// The deadline passed before a response completed.
    Timeout,
    /// The caller's token fired, or the channel was aborted.
    Cancelled,
    /// A response arrived and the validator rejected its status.
    BadStatus,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Network => "network",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::BadStatus => "bad status",
        };
        f.write_str(name)
    }
}

/// A failed execution.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct TransportError {
    pub kind: ErrorKind,
    pub message: String,
    pub code: Option<String>,
    pub config: Box<ResolvedConfig>,
    pub request: Option<ChannelHandle>,
    pub response: Option<Box<Response>>,
}

impl TransportError {
    pub fn new(
        kind: ErrorKind,
        message: impl Into<String>,
        config: ResolvedConfig,
        request: Option<ChannelHandle>,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            code: None,
            config: Box::new(config),
            request,
            response: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn network(config: ResolvedConfig, request: Option<ChannelHandle>) -> Self {
        Self::new(ErrorKind::Network, "Network Error", config, request)
    }

    pub fn timeout(config: ResolvedConfig, request: ChannelHandle) -> Self {
        let message = format!("Timeout of {} ms exceeded", config.timeout);
        Self::new(ErrorKind::Timeout, message, config, Some(request)).with_code(TIMEOUT_CODE)
    }

    pub fn cancelled(message: impl Into<String>, config: ResolvedConfig, request: ChannelHandle) -> Self {
        Self::new(ErrorKind::Cancelled, message, config, Some(request))
    }

    pub fn bad_status(response: Response) -> Self {
        let message = format!("Request failed with status code {}", response.status);
        let mut err = Self::new(
            ErrorKind::BadStatus,
            message,
            response.config.clone(),
            Some(response.request.clone()),
        );
        err.response = Some(Box::new(response));
        err
    }

    pub fn is_cancel(&self) -> bool {
        self.kind == ErrorKind::Cancelled
    }
}

/// Errors loading `Defaults` from TOML.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read defaults: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse defaults: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("unknown header bucket: {0}")]
    UnknownHeaderBucket(String),
}
