use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StreamError;

/// Point-in-time performance metrics for one campaign.
///
/// The same shape is served by the snapshot endpoint and pushed by the live
/// stream. `campaign_id` is optional because stream payloads are scoped by
/// the subscription rather than by the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignInsights {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub campaign_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub impressions: u64,
    pub clicks: u64,
    pub conversions: u64,
    pub spend: f64,
    pub ctr: f64,
    pub cpc: f64,
    pub conversion_rate: f64,
}

impl CampaignInsights {
    /// Parse the `data` field of a pushed stream event.
    ///
    /// Rejects documents whose real-valued metrics are negative or not finite;
    /// the integer metrics are already unsigned.
    pub fn from_event_data(data: &str) -> Result<Self, StreamError> {
        let insights: CampaignInsights =
            serde_json::from_str(data).map_err(|e| StreamError::Decode(e.to_string()))?;
        for (field, value) in [
            ("spend", insights.spend),
            ("ctr", insights.ctr),
            ("cpc", insights.cpc),
            ("conversion_rate", insights.conversion_rate),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(StreamError::Decode(format!(
                    "{} must be a non-negative number, got {}",
                    field, value
                )));
            }
        }
        Ok(insights)
    }
}

/// Aggregate metrics across every campaign, served by `GET /campaigns/insights`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverviewInsights {
    pub timestamp: DateTime<Utc>,
    pub total_campaigns: u64,
    pub active_campaigns: u64,
    pub paused_campaigns: u64,
    pub completed_campaigns: u64,
    pub total_impressions: u64,
    pub total_clicks: u64,
    pub total_conversions: u64,
    pub total_spend: f64,
    pub avg_ctr: f64,
    pub avg_cpc: f64,
    pub avg_conversion_rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsightsEnvelope<T> {
    pub insights: T,
}
