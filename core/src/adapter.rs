//! Drives one request through a host channel to a single settlement.
//!
//! # Design
//! The channel moves Idle → Opened → Sent, then to exactly one terminal
//! state. Terminal branches are the `Outcome` enum; the event loop breaks out
//! on the first one, drops the receiver, and every later signal on that
//! channel is discarded by the sink.
//!
//! A token settled before send aborts the channel without writing the body.
//! After send, the first terminal signal wins in arrival order: when the
//! cancellation watcher fires, events the host already queued are drained
//! first, and a terminal one among them settles the request instead.

use tokio::sync::mpsc::UnboundedReceiver;
use tracing::Instrument;
use uuid::Uuid;

use crate::cancel::{Cancel, CancelToken};
use crate::config::ResolvedConfig;
use crate::error::{ErrorKind, TransportError};
use crate::headers::{finalize_headers, parse_headers};
use crate::host::Environment;
use crate::http::{ResponseBody, ResponseType};
use crate::response::{ChannelHandle, Response};
use crate::transport::{Channel, ChannelEvent, ChannelSnapshot, EventSink, Transport};

/// How a sent channel ended.
#[derive(Debug)]
enum Outcome {
    Completed(ChannelSnapshot),
    Errored(&'static str),
    TimedOut,
    Aborted(Cancel),
}

/// Execute a resolved request on `transport`. Settles exactly once.
pub async fn execute<T: Transport>(
    transport: &T,
    env: &Environment,
    mut config: ResolvedConfig,
) -> Result<Response, TransportError> {
    config.flatten_headers();

    let url = match config.url.clone() {
        Some(url) => url,
        None => {
            tracing::debug!("request has no url");
            return Err(TransportError::new(
                ErrorKind::Network,
                "Request URL is missing",
                config,
                None,
            ));
        }
    };

    let mut handle = ChannelHandle {
        id: Uuid::new_v4(),
        method: config.method,
        url: url.clone(),
        headers: Default::default(),
    };
    let span = tracing::debug_span!("request", id = %handle.id, method = %config.method, url = %url);

    async move {
        let binding = config.cancel_token.as_ref().map(CancelToken::bind);
        let _binding = match binding {
            Some(None) => {
                tracing::debug!("cancel token already bound to an in-flight request");
                return Err(TransportError::new(
                    ErrorKind::Network,
                    "Cancel token is already in use by another request",
                    config,
                    Some(handle),
                ));
            }
            Some(binding) => binding,
            None => None,
        };

        // Idle -> Opened
        let mut channel = match transport.open(config.method.as_upper(), &url) {
            Ok(channel) => channel,
            Err(reason) => {
                tracing::debug!(%reason, "transport refused to open a channel");
                return Err(TransportError::network(config, Some(handle)));
            }
        };
        if let Some(response_type) = config.response_type {
            channel.set_response_type(response_type);
        }
        if config.timeout > 0 {
            channel.set_timeout(config.timeout);
        }
        if config.with_credentials {
            channel.set_with_credentials(true);
        }

        // Opened -> Sent
        let mut headers = std::mem::take(&mut config.headers);
        finalize_headers(&mut headers, &config, env);
        for (name, value) in headers.iter() {
            channel.set_request_header(name, value);
        }
        config.headers = headers.clone();
        handle.headers = headers;

        let download = config.on_download_progress.is_some();
        let upload = config.on_upload_progress.is_some();
        if download || upload {
            channel.observe_progress(download, upload);
        }

        if let Some(reason) = config.cancel_token.as_ref().and_then(CancelToken::reason) {
            channel.abort();
            return settle(Outcome::Aborted(reason), config, handle);
        }

        let (sink, mut events) = EventSink::pair();
        tracing::debug!("sending");
        channel.send(config.data.clone(), sink);

        let outcome = await_outcome(&mut channel, &mut events, &config).await;
        drop(events);

        settle(outcome, config, handle)
    }
    .instrument(span)
    .await
}

async fn await_outcome<C: Channel>(
    channel: &mut C,
    events: &mut UnboundedReceiver<ChannelEvent>,
    config: &ResolvedConfig,
) -> Outcome {
    let token = config.cancel_token.as_ref();
    loop {
        tokio::select! {
            biased;

            reason = watch_cancel(token) => {
                // A terminal event queued before the cancel still wins.
                while let Ok(event) = events.try_recv() {
                    if let Some(outcome) = on_event(event, config) {
                        return outcome;
                    }
                }
                channel.abort();
                return Outcome::Aborted(reason);
            }

            event = events.recv() => {
                let Some(event) = event else {
                    return Outcome::Errored("Channel closed before settling");
                };
                if let Some(outcome) = on_event(event, config) {
                    return outcome;
                }
            }
        }
    }
}

/// The outcome a channel event settles on, if it is terminal.
fn on_event(event: ChannelEvent, config: &ResolvedConfig) -> Option<Outcome> {
    match event {
        ChannelEvent::ReadyStateChange(snapshot) => {
            if snapshot.is_complete() {
                return Some(Outcome::Completed(snapshot));
            }
            tracing::trace!(ready_state = ?snapshot.ready_state, status = snapshot.status, "ready state change ignored");
            None
        }
        ChannelEvent::DownloadProgress(progress) => {
            tracing::trace!(loaded = progress.loaded, total = ?progress.total, "download progress");
            if let Some(callback) = &config.on_download_progress {
                callback.call(&progress);
            }
            None
        }
        ChannelEvent::UploadProgress(progress) => {
            tracing::trace!(loaded = progress.loaded, total = ?progress.total, "upload progress");
            if let Some(callback) = &config.on_upload_progress {
                callback.call(&progress);
            }
            None
        }
        ChannelEvent::Error => Some(Outcome::Errored("Network Error")),
        ChannelEvent::Timeout => Some(Outcome::TimedOut),
        ChannelEvent::Abort => Some(Outcome::Aborted(Cancel::new("Request aborted"))),
    }
}

async fn watch_cancel(token: Option<&CancelToken>) -> Cancel {
    match token {
        Some(token) => token.cancelled().await,
        None => std::future::pending().await,
    }
}

fn settle(outcome: Outcome, config: ResolvedConfig, handle: ChannelHandle) -> Result<Response, TransportError> {
    match outcome {
        Outcome::Completed(snapshot) => {
            let response = build_response(snapshot, config, handle);
            if response.config.validate_status.check(response.status) {
                tracing::debug!(status = response.status, "completed");
                Ok(response)
            } else {
                tracing::debug!(status = response.status, "rejected by status validation");
                Err(TransportError::bad_status(response))
            }
        }
        Outcome::Errored(message) => {
            tracing::debug!(error = message, "network error");
            Err(TransportError::new(
                ErrorKind::Network,
                message,
                config,
                Some(handle),
            ))
        }
        Outcome::TimedOut => {
            tracing::debug!(timeout_ms = config.timeout, "timed out");
            Err(TransportError::timeout(config, handle))
        }
        Outcome::Aborted(reason) => {
            tracing::debug!(reason = reason.message_or_default(), "cancelled");
            Err(TransportError::cancelled(reason.message_or_default(), config, handle))
        }
    }
}

fn build_response(snapshot: ChannelSnapshot, config: ResolvedConfig, handle: ChannelHandle) -> Response {
    let mut headers = parse_headers(&snapshot.raw_headers);
    let data = match config.response_type {
        Some(ResponseType::Text) => ResponseBody::Text(snapshot.response_text.unwrap_or_default()),
        _ => snapshot.response,
    };
    let data = config.transform_response.apply(data, &mut headers);

    Response {
        data,
        status: snapshot.status,
        status_text: snapshot.status_text,
        headers,
        config,
        request: handle,
    }
}
