use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{Stream, StreamExt};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::supervisor::{ConnectionStatus, ConnectionSupervisor, ReconnectPolicy};
use super::sse::SseEvent;
use super::transport::InsightTransport;
use crate::events::{emit_event, event_names, EventSink};
use crate::types::CampaignInsights;

/// Everything a consumer can observe about one subscription.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamState {
    pub campaign_id: String,
    pub status: ConnectionStatus,
    /// Last successfully parsed event. Survives disconnects.
    pub latest: Option<CampaignInsights>,
    /// Malformed payloads that were skipped.
    pub decode_errors: u64,
    /// Events older than `latest` that were skipped.
    pub stale_events: u64,
    pub reconnect_attempts: u32,
}

impl StreamState {
    fn new(campaign_id: &str) -> Self {
        Self {
            campaign_id: campaign_id.to_string(),
            status: ConnectionStatus::Idle,
            latest: None,
            decode_errors: 0,
            stale_events: 0,
            reconnect_attempts: 0,
        }
    }

    pub fn connected(&self) -> bool {
        self.status == ConnectionStatus::Connected
    }
}

#[derive(Serialize)]
struct InsightsUpdate<'a> {
    campaign_id: &'a str,
    insights: &'a CampaignInsights,
}

#[derive(Serialize)]
struct StatusChange<'a> {
    campaign_id: &'a str,
    status: ConnectionStatus,
    connected: bool,
}

/// Shared between the subscription handle and its reader task.
struct Shared {
    campaign_id: String,
    state: watch::Sender<StreamState>,
    sink: Arc<dyn EventSink>,
    /// Set on teardown. A reader still mid-poll on another worker must not
    /// write over the final `Idle`.
    closed: AtomicBool,
}

impl Shared {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Mark the subscription torn down and publish `Idle`.
    fn shut_down(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.set_status(ConnectionStatus::Idle);
    }

    fn set_status(&self, status: ConnectionStatus) {
        // Checked under the channel's write lock, so a late reader write
        // either lands before `Idle` or not at all.
        let changed = self.state.send_if_modified(|s| {
            if s.status == status || (self.is_closed() && status != ConnectionStatus::Idle) {
                return false;
            }
            s.status = status;
            true
        });
        if changed {
            debug!(campaign_id = %self.campaign_id, ?status, "Stream status changed");
            let payload = StatusChange {
                campaign_id: &self.campaign_id,
                status,
                connected: status == ConnectionStatus::Connected,
            };
            if let Err(e) = emit_event(self.sink.as_ref(), event_names::STREAM_STATUS, payload) {
                warn!(error = %e, "Failed to emit stream status");
            }
        }
    }

    /// Apply one pushed event to `latest`.
    fn apply(&self, event: &SseEvent) {
        if !event.is_message() {
            debug!(campaign_id = %self.campaign_id, event = %event.event, "Ignoring named event");
            return;
        }

        let insights = match CampaignInsights::from_event_data(&event.data) {
            Ok(insights) => insights,
            Err(e) => {
                warn!(campaign_id = %self.campaign_id, error = %e, "Skipping malformed insights event");
                self.state.send_if_modified(|s| {
                    if self.is_closed() {
                        return false;
                    }
                    s.decode_errors += 1;
                    true
                });
                return;
            }
        };

        let mut applied = false;
        self.state.send_if_modified(|s| {
            if self.is_closed() {
                return false;
            }
            // Older than what is shown: skipped and counted (see DESIGN.md,
            // out-of-order events).
            let stale = s
                .latest
                .as_ref()
                .is_some_and(|current| insights.timestamp < current.timestamp);
            if stale {
                s.stale_events += 1;
            } else {
                s.latest = Some(insights.clone());
                applied = true;
            }
            true
        });

        if !applied {
            debug!(campaign_id = %self.campaign_id, timestamp = %insights.timestamp, "Skipping out-of-order event");
            return;
        }
        let payload = InsightsUpdate {
            campaign_id: &self.campaign_id,
            insights: &insights,
        };
        if let Err(e) = emit_event(self.sink.as_ref(), event_names::INSIGHTS_UPDATE, payload) {
            warn!(error = %e, "Failed to emit insights update");
        }
    }
}

/// One live insights channel for one campaign.
///
/// The reader task owns the transport; the handle owns the task. Closing or
/// dropping the handle stops the task, which closes the connection, and
/// leaves the state `Idle`.
pub struct Subscription {
    shared: Arc<Shared>,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    /// Open a subscription on the current tokio runtime.
    ///
    /// Without a runtime the subscription starts `Disconnected` and never
    /// connects; the caller is not failed.
    pub fn open(
        campaign_id: &str,
        url: String,
        transport: Arc<dyn InsightTransport>,
        policy: ReconnectPolicy,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        let (state, _) = watch::channel(StreamState::new(campaign_id));
        let shared = Arc::new(Shared {
            campaign_id: campaign_id.to_string(),
            state,
            sink,
            closed: AtomicBool::new(false),
        });

        let task = match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                shared.set_status(ConnectionStatus::Connecting);
                Some(handle.spawn(run(shared.clone(), url, transport, policy)))
            }
            Err(e) => {
                warn!(campaign_id, error = %e, "Cannot open insights stream outside a runtime");
                shared.set_status(ConnectionStatus::Disconnected);
                None
            }
        };

        Self { shared, task }
    }

    pub fn campaign_id(&self) -> &str {
        &self.shared.campaign_id
    }

    pub fn state(&self) -> StreamState {
        self.shared.state.borrow().clone()
    }

    pub fn latest(&self) -> Option<CampaignInsights> {
        self.shared.state.borrow().latest.clone()
    }

    pub fn connected(&self) -> bool {
        self.shared.state.borrow().connected()
    }

    /// A receiver that observes every state change.
    pub fn watch(&self) -> watch::Receiver<StreamState> {
        self.shared.state.subscribe()
    }

    /// State changes as an async sequence. It ends once the subscription
    /// is closed and dropped.
    pub fn changes(&self) -> impl Stream<Item = StreamState> + Send + 'static {
        futures::stream::unfold(self.watch(), |mut rx| async move {
            rx.changed().await.ok()?;
            let state = rx.borrow_and_update().clone();
            Some((state, rx))
        })
    }

    /// Stop the reader task and wait until its connection is released.
    pub async fn close(mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            let _ = task.await;
        }
        self.shared.shut_down();
        info!(campaign_id = %self.shared.campaign_id, "Insights stream closed");
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.shared.shut_down();
    }
}

async fn run(
    shared: Arc<Shared>,
    url: String,
    transport: Arc<dyn InsightTransport>,
    policy: ReconnectPolicy,
) {
    let campaign_id = shared.campaign_id.clone();
    let mut supervisor = ConnectionSupervisor::new(policy);
    let mut last_event_id: Option<String> = None;

    loop {
        shared.set_status(ConnectionStatus::Connecting);
        match transport.connect(&url, last_event_id.as_deref()).await {
            Ok(mut events) => {
                supervisor.record_open();
                shared.state.send_if_modified(|s| {
                    let changed = !shared.is_closed() && s.reconnect_attempts != 0;
                    if changed {
                        s.reconnect_attempts = 0;
                    }
                    changed
                });
                shared.set_status(ConnectionStatus::Connected);
                info!(campaign_id = %campaign_id, url = %url, "Insights stream connected");

                while let Some(item) = events.next().await {
                    match item {
                        Ok(event) => {
                            if let Some(id) = &event.id {
                                last_event_id = Some(id.clone());
                            }
                            if let Some(ms) = event.retry {
                                supervisor.set_retry_floor(Duration::from_millis(ms));
                            }
                            shared.apply(&event);
                        }
                        Err(e) => {
                            warn!(campaign_id = %campaign_id, error = %e, "Insights stream error");
                            break;
                        }
                    }
                }
                // closes the connection before any reconnect
                drop(events);
            }
            Err(e) => {
                warn!(campaign_id = %campaign_id, error = %e, "Failed to open insights stream");
            }
        }

        shared.set_status(ConnectionStatus::Disconnected);

        match supervisor.record_failure() {
            Some(delay) => {
                let attempt = supervisor.attempts();
                shared.state.send_if_modified(|s| {
                    if shared.is_closed() {
                        return false;
                    }
                    s.reconnect_attempts = attempt;
                    true
                });
                info!(
                    campaign_id = %campaign_id,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Reconnecting insights stream"
                );
                tokio::time::sleep(delay).await;
            }
            None => {
                info!(campaign_id = %campaign_id, "Insights stream stopped");
                return;
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted in-memory transport shared by the stream tests.

    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use futures::stream::{self, StreamExt};

    use crate::error::StreamError;
    use crate::stream::sse::SseEvent;
    use crate::stream::transport::{EventStream, InsightTransport};

    /// What one `connect` call produces.
    pub enum Script {
        Refuse(StreamError),
        /// Yield these items, then stay open until dropped.
        Open(Vec<Result<SseEvent, StreamError>>),
        /// Yield these items, then end the stream.
        Finite(Vec<Result<SseEvent, StreamError>>),
    }

    struct OpenGuard(Arc<AtomicUsize>);

    impl OpenGuard {
        fn new(counter: Arc<AtomicUsize>) -> Self {
            counter.fetch_add(1, Ordering::SeqCst);
            Self(counter)
        }

        fn touch(&self) {}
    }

    impl Drop for OpenGuard {
        fn drop(&mut self) {
            self.0.fetch_sub(1, Ordering::SeqCst);
        }
    }

    #[derive(Default)]
    pub struct ScriptedTransport {
        scripts: Mutex<VecDeque<Script>>,
        connects: Mutex<Vec<(String, Option<String>)>>,
        open: Arc<AtomicUsize>,
    }

    impl ScriptedTransport {
        pub fn new(scripts: Vec<Script>) -> Self {
            Self {
                scripts: Mutex::new(scripts.into()),
                ..Self::default()
            }
        }

        pub fn push(&self, script: Script) {
            self.scripts.lock().unwrap().push_back(script);
        }

        pub fn connected_urls(&self) -> Vec<String> {
            self.connects
                .lock()
                .unwrap()
                .iter()
                .map(|(url, _)| url.clone())
                .collect()
        }

        pub fn last_event_ids(&self) -> Vec<Option<String>> {
            self.connects
                .lock()
                .unwrap()
                .iter()
                .map(|(_, id)| id.clone())
                .collect()
        }

        /// Connections currently held open by a subscriber.
        pub fn open_connections(&self) -> usize {
            self.open.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl InsightTransport for ScriptedTransport {
        async fn connect(
            &self,
            url: &str,
            last_event_id: Option<&str>,
        ) -> Result<EventStream, StreamError> {
            self.connects
                .lock()
                .unwrap()
                .push((url.to_string(), last_event_id.map(str::to_string)));
            let script = self.scripts.lock().unwrap().pop_front();
            let guard = OpenGuard::new(self.open.clone());
            let items = match script {
                None => {
                    return Err(StreamError::Connect {
                        url: url.to_string(),
                        reason: "no script".to_string(),
                    })
                }
                Some(Script::Refuse(e)) => return Err(e),
                Some(Script::Open(items)) => stream::iter(items).chain(stream::pending()).boxed(),
                Some(Script::Finite(items)) => stream::iter(items).boxed(),
            };
            Ok(items
                .map(move |item| {
                    guard.touch();
                    item
                })
                .boxed())
        }
    }

    pub fn insights_event(spend: f64, clicks: u64, timestamp: &str) -> SseEvent {
        SseEvent::message(format!(
            r#"{{"timestamp":"{}","impressions":{},"clicks":{},"conversions":1,"spend":{},"ctr":1.5,"cpc":0.5,"conversion_rate":2.0}}"#,
            timestamp,
            clicks * 100,
            clicks,
            spend
        ))
    }
}
