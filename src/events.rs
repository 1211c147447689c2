use serde::Serialize;
use serde_json::Value;
use tracing::debug;

/// Event names pushed to the dashboard shell.
pub mod event_names {
    pub const INSIGHTS_UPDATE: &str = "insights:update";
    pub const STREAM_STATUS: &str = "stream:status";
}

/// Receives named events from the live stream client.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &str, payload: Value) -> Result<(), String>;
}

pub fn emit_event<T: Serialize>(sink: &dyn EventSink, event: &str, payload: T) -> Result<(), String> {
    let payload = serde_json::to_value(payload).map_err(|e| e.to_string())?;
    sink.emit(event, payload)
}

/// Default sink: events only show up in the debug log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl EventSink for LogSink {
    fn emit(&self, event: &str, payload: Value) -> Result<(), String> {
        debug!(event, %payload, "Event");
        Ok(())
    }
}

/// Forwards events into a tokio channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: tokio::sync::mpsc::UnboundedSender<(String, Value)>,
}

impl ChannelSink {
    pub fn new() -> (Self, tokio::sync::mpsc::UnboundedReceiver<(String, Value)>) {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: &str, payload: Value) -> Result<(), String> {
        self.tx
            .send((event.to_string(), payload))
            .map_err(|_| "Event receiver dropped".to_string())
    }
}
