//! Live insights over Server-Sent Events.

pub mod controller;
pub mod sse;
pub mod subscription;
pub mod supervisor;
pub mod transport;

pub use controller::LiveInsights;
pub use sse::{SseDecoder, SseEvent};
pub use subscription::{StreamState, Subscription};
pub use supervisor::{ConnectionStatus, ReconnectPolicy};
pub use transport::{EventStream, InsightTransport, SseTransport};
