use std::sync::Arc;

use tracing::debug;

use super::subscription::{StreamState, Subscription};
use super::supervisor::{ConnectionStatus, ReconnectPolicy};
use super::transport::InsightTransport;
use crate::api::Endpoints;
use crate::events::{EventSink, LogSink};
use crate::types::CampaignInsights;

/// Keeps at most one insights subscription, bound to the campaign currently
/// on screen.
///
/// Binding a different campaign closes the old subscription before the new
/// one opens, and the new one starts from a fresh state.
pub struct LiveInsights {
    endpoints: Endpoints,
    transport: Arc<dyn InsightTransport>,
    policy: ReconnectPolicy,
    sink: Arc<dyn EventSink>,
    current: Option<Subscription>,
}

impl LiveInsights {
    pub fn new(
        endpoints: Endpoints,
        transport: Arc<dyn InsightTransport>,
        policy: ReconnectPolicy,
    ) -> Self {
        Self {
            endpoints,
            transport,
            policy,
            sink: Arc::new(LogSink),
            current: None,
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Follow `campaign_id`. An empty id behaves like [`LiveInsights::unbind`];
    /// the id already bound is a no-op.
    pub async fn bind(&mut self, campaign_id: &str) {
        let campaign_id = campaign_id.trim();
        if self.campaign_id() == Some(campaign_id) {
            return;
        }
        self.unbind().await;
        if campaign_id.is_empty() {
            return;
        }

        debug!(campaign_id, "Binding live insights");
        self.current = Some(Subscription::open(
            campaign_id,
            self.endpoints.insights_stream(campaign_id),
            self.transport.clone(),
            self.policy.clone(),
            self.sink.clone(),
        ));
    }

    pub async fn unbind(&mut self) {
        if let Some(subscription) = self.current.take() {
            subscription.close().await;
        }
    }

    pub fn campaign_id(&self) -> Option<&str> {
        self.current.as_ref().map(Subscription::campaign_id)
    }

    pub fn subscription(&self) -> Option<&Subscription> {
        self.current.as_ref()
    }

    /// `None` while unbound.
    pub fn state(&self) -> Option<StreamState> {
        self.current.as_ref().map(Subscription::state)
    }

    pub fn status(&self) -> ConnectionStatus {
        self.current
            .as_ref()
            .map_or(ConnectionStatus::Idle, |s| s.state().status)
    }

    pub fn latest(&self) -> Option<CampaignInsights> {
        self.current.as_ref().and_then(Subscription::latest)
    }

    pub fn connected(&self) -> bool {
        self.current.as_ref().is_some_and(Subscription::connected)
    }
}
