use futures::future::join_all;
use tracing::debug;

use super::Dashboard;
use crate::fetch::{FetchOptions, FetchState};
use crate::types::{Campaign, CampaignInsights, CampaignsEnvelope, InsightsEnvelope, OverviewInsights};
use crate::view::{campaign_row, dashboard_state, CampaignRow, DashboardState};

impl Dashboard {
    /// Load the campaign list and the aggregate insights side by side.
    pub async fn overview(&self) -> DashboardState {
        let options = FetchOptions::dashboard();
        let campaigns_key = self.endpoints.campaigns();
        let overview_key = self.endpoints.overview_insights();
        let (campaigns, overview) = tokio::join!(
            self.store.fetch::<CampaignsEnvelope>(&campaigns_key, &options),
            self.store
                .fetch::<InsightsEnvelope<OverviewInsights>>(&overview_key, &options),
        );
        render(campaigns, overview)
    }

    /// Manual refresh: request both dashboard resources again.
    pub async fn refresh(&self) -> DashboardState {
        debug!("Refreshing dashboard");
        let campaigns_key = self.endpoints.campaigns();
        let overview_key = self.endpoints.overview_insights();
        let (campaigns, overview) = tokio::join!(
            self.store.revalidate::<CampaignsEnvelope>(&campaigns_key),
            self.store
                .revalidate::<InsightsEnvelope<OverviewInsights>>(&overview_key),
        );
        render(campaigns, overview)
    }

    /// Campaign list as last loaded, without issuing a request.
    pub fn campaigns(&self) -> FetchState<Vec<Campaign>> {
        self.store
            .state::<CampaignsEnvelope>(&self.endpoints.campaigns())
            .map(|envelope| envelope.campaigns)
    }

    /// One table row. Each row loads its own insights.
    pub async fn campaign_row(&self, campaign: &Campaign) -> CampaignRow {
        let key = self.endpoints.campaign_insights(&campaign.id);
        let insights = self
            .store
            .fetch::<InsightsEnvelope<CampaignInsights>>(&key, &FetchOptions::campaign_row())
            .await
            .map(|envelope| envelope.insights);
        campaign_row(campaign, &insights)
    }

    /// Rows for every campaign in the loaded list, fetched concurrently.
    pub async fn campaign_rows(&self) -> Vec<CampaignRow> {
        let campaigns = self.campaigns().data.unwrap_or_default();
        join_all(campaigns.iter().map(|campaign| self.campaign_row(campaign))).await
    }
}

fn render(
    campaigns: FetchState<CampaignsEnvelope>,
    overview: FetchState<InsightsEnvelope<OverviewInsights>>,
) -> DashboardState {
    dashboard_state(
        &campaigns.map(|envelope| envelope.campaigns),
        &overview.map(|envelope| envelope.insights),
    )
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::api::Endpoints;
    use crate::commands::testing::FixedSource;
    use crate::error::FetchError;
    use crate::stream::subscription::testing::ScriptedTransport;
    use crate::stream::ReconnectPolicy;
    use crate::types::fixtures::{campaign, insights, overview};
    use crate::view::RowState;

    const BASE: &str = "http://test";

    fn dashboard(source: Arc<FixedSource>) -> Dashboard {
        Dashboard::new(
            Endpoints::new(BASE),
            source,
            Arc::new(ScriptedTransport::new(vec![])),
            ReconnectPolicy::disabled(),
        )
    }

    fn seeded(campaigns: Vec<Campaign>) -> Arc<FixedSource> {
        let source = Arc::new(FixedSource::default());
        source.set(
            "http://test/campaigns",
            Ok(json!({ "campaigns": campaigns })),
        );
        source.set(
            "http://test/campaigns/insights",
            Ok(json!({ "insights": overview() })),
        );
        source
    }

    #[tokio::test]
    async fn overview_ready_with_campaigns() {
        let source = seeded(vec![campaign("c1", 1000.0, 100.0), campaign("c2", 500.0, 50.0)]);
        let dashboard = dashboard(source.clone());

        let DashboardState::Ready { campaigns, overview } = dashboard.overview().await else {
            panic!("expected ready");
        };
        assert_eq!(campaigns.len(), 2);
        assert_eq!(overview.total_campaigns, 3);
        assert_eq!(source.total_calls(), 2);
    }

    #[tokio::test]
    async fn overview_empty_list() {
        let dashboard = dashboard(seeded(vec![]));
        assert_eq!(dashboard.overview().await, DashboardState::Empty);
    }

    #[tokio::test]
    async fn overview_is_deduped_but_refresh_is_not() {
        let source = seeded(vec![campaign("c1", 1000.0, 100.0)]);
        let dashboard = dashboard(source.clone());

        dashboard.overview().await;
        dashboard.overview().await;
        assert_eq!(source.calls("http://test/campaigns"), 1);

        source.set(
            "http://test/campaigns",
            Ok(json!({ "campaigns": [campaign("c1", 1000.0, 100.0), campaign("c9", 1.0, 1.0)] })),
        );
        let DashboardState::Ready { campaigns, .. } = dashboard.refresh().await else {
            panic!("expected ready");
        };
        assert_eq!(campaigns.len(), 2);
        assert_eq!(source.calls("http://test/campaigns"), 2);
        assert_eq!(source.calls("http://test/campaigns/insights"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limited_list_shows_rate_limit_panel() {
        let source = seeded(vec![]);
        source.set(
            "http://test/campaigns",
            Err(FetchError::RateLimited {
                message: "Rate limit exceeded".to_string(),
                retry_after: Some(20),
            }),
        );
        let dashboard = dashboard(source.clone());

        let DashboardState::Failed(panel) = dashboard.overview().await else {
            panic!("expected failure");
        };
        assert_eq!(panel.title, "Rate Limit Exceeded");
        assert_eq!(panel.retry_after, Some(20));
        assert!(!panel.can_retry);
        // First attempt plus three retries.
        assert_eq!(source.calls("http://test/campaigns"), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn rows_load_independently() {
        let source = seeded(vec![campaign("c1", 1000.0, 100.0), campaign("c2", 500.0, 50.0)]);
        source.set(
            "http://test/campaigns/c1/insights",
            Ok(json!({ "insights": insights(250.0, 5) })),
        );
        source.set(
            "http://test/campaigns/c2/insights",
            Err(FetchError::Http {
                status: 500,
                message: "Internal error".to_string(),
            }),
        );
        let dashboard = dashboard(source.clone());
        dashboard.overview().await;

        let rows = dashboard.campaign_rows().await;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].campaign.id, "c1");
        match &rows[0].state {
            RowState::Loaded {
                budget_used_pct, ..
            } => assert_eq!(*budget_used_pct, 25.0),
            other => panic!("expected loaded, got {:?}", other),
        }
        assert_eq!(rows[1].state, RowState::Failed { rate_limited: false });
        // Row preset: first attempt plus two retries.
        assert_eq!(source.calls("http://test/campaigns/c2/insights"), 3);
    }

    #[tokio::test]
    async fn rows_before_list_loads_are_empty() {
        let dashboard = dashboard(seeded(vec![campaign("c1", 1.0, 1.0)]));
        assert!(dashboard.campaign_rows().await.is_empty());
    }

    #[tokio::test]
    async fn focus_skips_row_resources() {
        let source = seeded(vec![campaign("c1", 1000.0, 100.0)]);
        source.set(
            "http://test/campaigns/c1/insights",
            Ok(json!({ "insights": insights(10.0, 1) })),
        );
        let dashboard = dashboard(source.clone());
        dashboard.overview().await;
        dashboard.campaign_rows().await;

        assert_eq!(dashboard.focus().await, 2);
        assert_eq!(source.calls("http://test/campaigns/c1/insights"), 1);
        assert_eq!(source.calls("http://test/campaigns"), 2);
    }
}
