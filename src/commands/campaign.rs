use tracing::info;

use super::Dashboard;
use crate::fetch::{FetchOptions, FetchState};
use crate::types::{Campaign, CampaignEnvelope, CampaignInsights, InsightsEnvelope};
use crate::view::{detail_state, DetailState};

impl Dashboard {
    /// Show the detail view for `campaign_id`: follow its live stream and load
    /// the campaign and its insights snapshot concurrently.
    ///
    /// Opening another campaign closes the previous stream first.
    pub async fn open_campaign(&mut self, campaign_id: &str) -> DetailState {
        let campaign_id = campaign_id.trim();
        if campaign_id.is_empty() {
            self.close_campaign().await;
            return DetailState::Loading;
        }

        info!(campaign_id, "Opening campaign");
        self.open_campaign = Some(campaign_id.to_string());
        self.live.bind(campaign_id).await;

        let options = FetchOptions::dashboard();
        let campaign_key = self.endpoints.campaign(campaign_id);
        let insights_key = self.endpoints.campaign_insights(campaign_id);
        tokio::join!(
            self.store.fetch::<CampaignEnvelope>(&campaign_key, &options),
            self.store
                .fetch::<InsightsEnvelope<CampaignInsights>>(&insights_key, &options),
        );
        self.campaign_detail()
    }

    pub fn open_campaign_id(&self) -> Option<&str> {
        self.open_campaign.as_deref()
    }

    /// Render the open campaign from what is cached and streamed right now.
    pub fn campaign_detail(&self) -> DetailState {
        let Some(campaign_id) = self.open_campaign.as_deref() else {
            return DetailState::Loading;
        };
        let (campaign, snapshot) = self.detail_resources(campaign_id);
        let live = self.live.latest();
        detail_state(&campaign, &snapshot, live.as_ref(), self.live.connected())
    }

    /// "Try Again" on the detail error panel.
    pub async fn retry_campaign(&self) -> DetailState {
        let Some(campaign_id) = self.open_campaign.as_deref() else {
            return DetailState::Loading;
        };
        let campaign_key = self.endpoints.campaign(campaign_id);
        let insights_key = self.endpoints.campaign_insights(campaign_id);
        tokio::join!(
            self.store.revalidate::<CampaignEnvelope>(&campaign_key),
            self.store
                .revalidate::<InsightsEnvelope<CampaignInsights>>(&insights_key),
        );
        self.campaign_detail()
    }

    /// Leave the detail view and release its stream.
    pub async fn close_campaign(&mut self) {
        if let Some(campaign_id) = self.open_campaign.take() {
            info!(campaign_id = %campaign_id, "Closing campaign");
        }
        self.live.unbind().await;
    }

    fn detail_resources(
        &self,
        campaign_id: &str,
    ) -> (FetchState<Campaign>, FetchState<CampaignInsights>) {
        let campaign = self
            .store
            .state::<CampaignEnvelope>(&self.endpoints.campaign(campaign_id))
            .map(|envelope| envelope.campaign);
        let snapshot = self
            .store
            .state::<InsightsEnvelope<CampaignInsights>>(
                &self.endpoints.campaign_insights(campaign_id),
            )
            .map(|envelope| envelope.insights);
        (campaign, snapshot)
    }
}
