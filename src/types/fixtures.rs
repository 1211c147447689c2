//! Sample values for tests.

use super::{Campaign, CampaignInsights, CampaignStatus, OverviewInsights};

pub fn campaign(id: &str, budget: f64, daily_budget: f64) -> Campaign {
    Campaign {
        id: id.to_string(),
        name: format!("Campaign {}", id),
        status: CampaignStatus::Active,
        platforms: vec!["meta".to_string(), "google".to_string()],
        budget,
        daily_budget,
        created_at: None,
    }
}

pub fn insights(spend: f64, conversions: u64) -> CampaignInsights {
    CampaignInsights {
        campaign_id: None,
        timestamp: "2025-06-01T12:00:00Z".parse().unwrap(),
        impressions: 10_000,
        clicks: 250,
        conversions,
        spend,
        ctr: 2.5,
        cpc: spend / 250.0,
        conversion_rate: conversions as f64 / 250.0 * 100.0,
    }
}

pub fn overview() -> OverviewInsights {
    OverviewInsights {
        timestamp: "2025-06-01T12:00:00Z".parse().unwrap(),
        total_campaigns: 3,
        active_campaigns: 2,
        paused_campaigns: 1,
        completed_campaigns: 0,
        total_impressions: 30_000,
        total_clicks: 750,
        total_conversions: 30,
        total_spend: 1500.0,
        avg_ctr: 2.5,
        avg_cpc: 2.0,
        avg_conversion_rate: 4.0,
    }
}
