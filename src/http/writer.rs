//! Per-request response writer backing `Context::send`.
//!
//! # Responsibilities
//! - Accumulate handler headers between writes
//! - Commit the response head on the first write
//! - Deliver body chunks strictly in call order
//! - Terminate the response exactly once (success or error)
//!
//! # Design Decisions
//! - Head and chunks travel over separate channels so the HTTP response can
//!   start streaming while the action keeps running
//! - The header accumulator resets after every `send`
//! - Headers set after the head is committed cannot reach the wire; they are
//!   dropped with a debug log
//! - `send` is synchronous, so the chunk channel is unbounded: a handler that
//!   outpaces a slow client buffers its output in memory until the client
//!   drains it or disconnects. Handlers streaming large volumes should pace
//!   themselves

use axum::body::{Body, Bytes};
use axum::http::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use parking_lot::Mutex;
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

use crate::error::RouteError;
use crate::handler::Reply;
use crate::http::response::{serialize, APPLICATION_JSON};

/// Status line and headers of a response.
#[derive(Debug, Clone)]
pub struct ResponseHead {
    pub status: StatusCode,
    pub headers: HeaderMap,
}

struct WriterState {
    pending: HeaderMap,
    head: Option<oneshot::Sender<ResponseHead>>,
    chunks: Option<mpsc::UnboundedSender<Bytes>>,
}

/// Handler-facing half of a response.
pub struct ResponseWriter {
    raw: bool,
    state: Mutex<WriterState>,
}

/// Transport-facing half of a response.
pub struct ResponseStream {
    head: oneshot::Receiver<ResponseHead>,
    chunks: mpsc::UnboundedReceiver<Bytes>,
}

impl ResponseWriter {
    /// Create a connected writer/stream pair.
    pub fn channel(raw: bool) -> (Arc<Self>, ResponseStream) {
        let (head_tx, head_rx) = oneshot::channel();
        let (chunk_tx, chunk_rx) = mpsc::unbounded_channel();

        let writer = Arc::new(Self {
            raw,
            state: Mutex::new(WriterState {
                pending: HeaderMap::new(),
                head: Some(head_tx),
                chunks: Some(chunk_tx),
            }),
        });

        (
            writer,
            ResponseStream {
                head: head_rx,
                chunks: chunk_rx,
            },
        )
    }

    /// Merge a header into the accumulator for the next write.
    pub fn set_header(&self, name: HeaderName, value: HeaderValue) {
        self.state.lock().pending.insert(name, value);
    }

    /// Flush `reply` now, then reset the header accumulator.
    pub fn send(&self, reply: Reply) {
        let mut state = self.state.lock();
        self.write(&mut state, reply);
        state.pending.clear();
    }

    /// Write the final reply and close the response.
    pub fn finish(&self, reply: Reply) {
        let mut state = self.state.lock();
        self.write(&mut state, reply);

        if let Some(head) = state.head.take() {
            let headers = std::mem::take(&mut state.pending);
            let _ = head.send(ResponseHead {
                status: StatusCode::OK,
                headers,
            });
        }
        state.chunks = None;
    }

    /// Close the response with an error envelope.
    ///
    /// Before the head is committed the envelope is the whole response;
    /// afterwards it is appended as the last chunk.
    pub fn fail(&self, err: &RouteError) {
        let mut state = self.state.lock();
        let body = match serde_json::to_vec(&err.envelope()) {
            Ok(body) => Bytes::from(body),
            Err(_) => Bytes::from_static(b"{}"),
        };

        if let Some(head) = state.head.take() {
            let mut headers = HeaderMap::new();
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(APPLICATION_JSON));
            let _ = head.send(ResponseHead {
                status: err.status(),
                headers,
            });
        } else {
            tracing::warn!(error = %err, "Handler failed after response started");
        }

        if let Some(chunks) = state.chunks.take() {
            let _ = chunks.send(body);
        }
    }

    /// Returns true once the response head has been handed to the transport.
    pub fn is_committed(&self) -> bool {
        self.state.lock().head.is_none()
    }

    fn write(&self, state: &mut WriterState, reply: Reply) {
        if state.chunks.is_none() {
            tracing::debug!("Write after response was closed; ignoring");
            return;
        }

        let Some(frame) = serialize(reply, &state.pending, self.raw) else {
            return;
        };

        match state.head.take() {
            Some(head) => {
                let _ = head.send(ResponseHead {
                    status: StatusCode::OK,
                    headers: frame.headers,
                });
            }
            None if !state.pending.is_empty() => {
                tracing::debug!(
                    headers = ?state.pending.keys().collect::<Vec<_>>(),
                    "Response head already sent; dropping headers"
                );
            }
            None => {}
        }

        if !frame.body.is_empty() {
            if let Some(chunks) = &state.chunks {
                if chunks.send(frame.body).is_err() {
                    tracing::debug!("Client went away; dropping chunk");
                }
            }
        }
    }
}

impl ResponseStream {
    /// Wait for the head and turn the stream into an axum response.
    pub async fn into_response(self) -> Response {
        let ResponseStream { head, chunks } = self;

        let head = match head.await {
            Ok(head) => head,
            Err(_) => {
                return RouteError::internal("handler stopped before responding").into_response()
            }
        };

        let stream = futures_util::stream::unfold(chunks, |mut rx| async move {
            rx.recv().await.map(|chunk| (Ok::<_, Infallible>(chunk), rx))
        });

        let mut response = Response::new(Body::from_stream(stream));
        *response.status_mut() = head.status;
        *response.headers_mut() = head.headers;
        response
    }

    /// Drain head and all chunks. Only meaningful once the writer is closed.
    pub async fn collect(self) -> (Option<ResponseHead>, Vec<Bytes>) {
        let ResponseStream { head, mut chunks } = self;
        let head = head.await.ok();

        let mut out = Vec::new();
        while let Some(chunk) = chunks.recv().await {
            out.push(chunk);
        }
        (head, out)
    }
}
