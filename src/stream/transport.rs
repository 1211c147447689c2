use std::collections::VecDeque;
use std::fmt::Display;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{BoxStream, Stream, StreamExt};
use reqwest::header::{ACCEPT, CACHE_CONTROL, CONTENT_TYPE};
use tracing::debug;

use super::sse::{SseDecoder, SseEvent};
use crate::error::StreamError;

/// Events of one open connection. Dropping the stream closes the connection.
pub type EventStream = BoxStream<'static, Result<SseEvent, StreamError>>;

/// Opens the push channel behind a subscription.
#[async_trait]
pub trait InsightTransport: Send + Sync {
    async fn connect(
        &self,
        url: &str,
        last_event_id: Option<&str>,
    ) -> Result<EventStream, StreamError>;
}

/// Server-Sent Events over a long-lived `reqwest` response body.
pub struct SseTransport {
    client: reqwest::Client,
}

impl SseTransport {
    /// Only connection setup is bounded; an open stream has no timeout.
    pub fn new(connect_timeout: Duration) -> Result<Self, StreamError> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| StreamError::Transport(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl InsightTransport for SseTransport {
    async fn connect(
        &self,
        url: &str,
        last_event_id: Option<&str>,
    ) -> Result<EventStream, StreamError> {
        let mut request = self
            .client
            .get(url)
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache");
        if let Some(id) = last_event_id {
            request = request.header("Last-Event-ID", id);
        }

        let response = request.send().await.map_err(|e| StreamError::Connect {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(StreamError::Status(status.as_u16()));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if !content_type.starts_with("text/event-stream") {
            return Err(StreamError::Connect {
                url: url.to_string(),
                reason: format!("unexpected content type '{}'", content_type),
            });
        }

        debug!(url, "Event stream opened");
        Ok(decode_event_stream(response.bytes_stream()))
    }
}

/// Adapt a byte-chunk stream into decoded events. A chunk error or an
/// overlong line is yielded once as `StreamError::Transport`, then the
/// stream ends.
pub fn decode_event_stream<S, B, E>(bytes: S) -> EventStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
{
    let state = (Box::pin(bytes), SseDecoder::new(), VecDeque::new(), false);
    futures::stream::unfold(
        state,
        |(mut bytes, mut decoder, mut pending, failed)| async move {
            if failed {
                return None;
            }
            loop {
                if let Some(event) = pending.pop_front() {
                    return Some((Ok(event), (bytes, decoder, pending, false)));
                }
                match bytes.next().await {
                    Some(Ok(chunk)) => match decoder.feed(chunk.as_ref()) {
                        Ok(events) => pending.extend(events),
                        Err(err) => return Some((Err(err), (bytes, decoder, pending, true))),
                    },
                    Some(Err(e)) => {
                        let err = StreamError::Transport(e.to_string());
                        return Some((Err(err), (bytes, decoder, pending, true)));
                    }
                    None => return None,
                }
            }
        },
    )
    .boxed()
}
