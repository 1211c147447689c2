pub mod campaign;
pub mod overview;

use std::sync::Arc;

use crate::api::{Endpoints, HttpSource, SnapshotSource};
use crate::config::DashboardConfig;
use crate::events::EventSink;
use crate::fetch::SnapshotStore;
use crate::stream::{InsightTransport, LiveInsights, ReconnectPolicy, SseTransport};

/// The dashboard's data layer: snapshot resources plus the live stream of the
/// campaign currently open in the detail view.
pub struct Dashboard {
    endpoints: Endpoints,
    store: SnapshotStore,
    live: LiveInsights,
    open_campaign: Option<String>,
}

impl Dashboard {
    pub fn new(
        endpoints: Endpoints,
        source: Arc<dyn SnapshotSource>,
        transport: Arc<dyn InsightTransport>,
        policy: ReconnectPolicy,
    ) -> Self {
        Self {
            live: LiveInsights::new(endpoints.clone(), transport, policy),
            store: SnapshotStore::new(source),
            endpoints,
            open_campaign: None,
        }
    }

    /// Wire the HTTP snapshot source and SSE transport from configuration.
    pub fn from_config(config: &DashboardConfig) -> Result<Self, String> {
        let source = HttpSource::new(config.request_timeout).map_err(|e| e.to_string())?;
        let transport = SseTransport::new(config.request_timeout).map_err(|e| e.to_string())?;
        Ok(Self::new(
            Endpoints::new(config.base_url.as_str()),
            Arc::new(source),
            Arc::new(transport),
            config.reconnect.clone(),
        ))
    }

    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.live = self.live.with_sink(sink);
        self
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    pub fn live(&self) -> &LiveInsights {
        &self.live
    }

    /// The window regained focus. Returns how many resources were revalidated.
    pub async fn focus(&self) -> usize {
        self.store.focus().await
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::ConnectionStatus;

    #[test]
    fn from_config_uses_configured_base_url() {
        let config = DashboardConfig {
            base_url: "http://localhost:4000/".to_string(),
            ..DashboardConfig::default()
        };
        let dashboard = Dashboard::from_config(&config).unwrap();
        assert_eq!(dashboard.endpoints().base_url(), "http://localhost:4000");
        assert!(dashboard.store().is_empty());
        assert_eq!(dashboard.live().status(), ConnectionStatus::Idle);
    }
}
