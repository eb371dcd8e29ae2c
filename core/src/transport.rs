//! The host transport interface.
//!
//! # Design
//! The host owns the actual I/O. `Transport::open` creates a channel bound to
//! a method and URL; the adapter configures it, applies headers and calls
//! `send` with an `EventSink`. From then on the host reports everything that
//! happens through the sink, in platform order: zero or more progress events,
//! ready-state changes, then one terminal signal.
//!
//! The adapter drops the receiving end as soon as it settles, so anything a
//! host emits afterwards is discarded without error.

use tokio::sync::mpsc;

use crate::http::{Body, Progress, ReadyState, ResponseBody, ResponseType};

/// Opens channels on the host's transport primitive.
pub trait Transport {
    type Channel: Channel;

    /// `method` is upper-case. An `Err` means no channel could be created.
    fn open(&self, method: &str, url: &str) -> Result<Self::Channel, String>;
}

/// One in-flight request/response exchange.
pub trait Channel {
    fn set_response_type(&mut self, response_type: ResponseType);

    fn set_timeout(&mut self, millis: u64);

    fn set_with_credentials(&mut self, with_credentials: bool);

    fn set_request_header(&mut self, name: &str, value: &str);

    /// Ask the host to report progress for the given directions.
    fn observe_progress(&mut self, download: bool, upload: bool);

    fn send(&mut self, body: Option<Body>, events: EventSink);

    fn abort(&mut self);
}

/// What the channel looks like at a ready-state change.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelSnapshot {
    pub ready_state: ReadyState,
    pub status: u16,
    pub status_text: String,
    /// Unparsed response header block, `name: value` per line.
    pub raw_headers: String,
    /// Body in the representation the response type asked for.
    pub response: ResponseBody,
    /// Body as text; only meaningful for textual response types.
    pub response_text: Option<String>,
}

impl ChannelSnapshot {
    /// A finished exchange.
    pub fn done(status: u16, status_text: impl Into<String>, raw_headers: impl Into<String>, body: &[u8]) -> Self {
        let text = String::from_utf8_lossy(body).into_owned();
        Self {
            ready_state: ReadyState::Done,
            status,
            status_text: status_text.into(),
            raw_headers: raw_headers.into(),
            response: ResponseBody::Text(text.clone()),
            response_text: Some(text),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.ready_state == ReadyState::Done && self.status != 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    ReadyStateChange(ChannelSnapshot),
    DownloadProgress(Progress),
    UploadProgress(Progress),
    Error,
    Timeout,
    Abort,
}

/// Where a channel reports its events.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<ChannelEvent>,
}

impl EventSink {
    pub(crate) fn pair() -> (Self, mpsc::UnboundedReceiver<ChannelEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Deliver an event. Silently dropped once the execution has settled.
    pub fn emit(&self, event: ChannelEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("channel event after settlement discarded");
        }
    }

    pub fn is_settled(&self) -> bool {
        self.tx.is_closed()
    }
}
