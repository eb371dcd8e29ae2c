//! Config-driven HTTP request pipeline over a host-provided transport.
//!
//! # Overview
//! The host owns the transport primitive (a browser request object, a
//! blocking client on a thread, a test double). This crate owns everything
//! around it: merging request config over defaults, transforming bodies,
//! computing the headers the channel receives, racing the channel's terminal
//! signals against cancellation, and classifying the result.
//!
//! # Design
//! - `Defaults` is an explicit value passed into each dispatch; there is no
//!   shared mutable default config.
//! - Each execution settles exactly once: the first terminal signal wins and
//!   later ones are dropped.
//! - Failures are one `TransportError` with an `ErrorKind` of `Network`,
//!   `Timeout`, `Cancelled` or `BadStatus`.
//! - Cookie access and origin checks come from the host through `Environment`.

pub mod adapter;
pub mod cancel;
pub mod client;
pub mod config;
pub mod error;
pub mod headers;
pub mod host;
pub mod http;
pub mod response;
pub mod transform;
pub mod transport;
pub mod validate;

pub use adapter::execute;
pub use cancel::{Cancel, CancelSource, CancelToken};
pub use client::{dispatch, Courier};
pub use config::{merge, BasicAuth, Defaults, RequestConfig, ResolvedConfig};
pub use error::{ConfigError, ErrorKind, TransportError};
pub use host::{CookieStore, DocumentCookies, Environment, OriginPolicy, PageOrigin};
pub use http::{Body, FormData, Headers, Method, Progress, ReadyState, ResponseBody, ResponseType};
pub use response::{ChannelHandle, Response};
pub use transform::{RequestTransform, ResponseTransform, TransformChain};
pub use transport::{Channel, ChannelEvent, ChannelSnapshot, EventSink, Transport};
pub use validate::ValidateStatus;
