use chrono::{DateTime, Utc};
use serde::Serialize;

use super::error_panel::ErrorPanel;
use super::percent;
use crate::fetch::FetchState;
use crate::merge::{effective_insights, InsightSource};
use crate::types::{Campaign, CampaignInsights};

/// Daily usage above this shows the "approaching daily budget limit" warning.
pub const DAILY_LIMIT_WARNING_PCT: f64 = 85.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BudgetUsage {
    pub budget_used_pct: f64,
    /// Capped at 100.
    pub daily_budget_used_pct: f64,
    /// Negative once the campaign overspends.
    pub remaining_budget: f64,
    pub approaching_daily_limit: bool,
}

pub fn budget_usage(campaign: &Campaign, insights: &CampaignInsights) -> BudgetUsage {
    let daily_budget_used_pct = percent(insights.spend, campaign.daily_budget).min(100.0);
    BudgetUsage {
        budget_used_pct: percent(insights.spend, campaign.budget),
        daily_budget_used_pct,
        remaining_budget: campaign.budget - insights.spend,
        approaching_daily_limit: daily_budget_used_pct > DAILY_LIMIT_WARNING_PCT,
    }
}

pub fn cost_per_conversion(insights: &CampaignInsights) -> Option<f64> {
    (insights.conversions > 0).then(|| insights.spend / insights.conversions as f64)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LiveIndicator {
    Live,
    Disconnected,
}

impl LiveIndicator {
    pub fn from_connected(connected: bool) -> Self {
        if connected {
            LiveIndicator::Live
        } else {
            LiveIndicator::Disconnected
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            LiveIndicator::Live => "Live Updates",
            LiveIndicator::Disconnected => "Disconnected",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CampaignDetailView {
    pub campaign: Campaign,
    pub insights: CampaignInsights,
    pub source: InsightSource,
    pub indicator: LiveIndicator,
    pub budget: BudgetUsage,
    pub cost_per_conversion: Option<f64>,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DetailState {
    Loading,
    Failed(ErrorPanel),
    Ready(Box<CampaignDetailView>),
}

/// Combine the campaign snapshot, its insights snapshot and the live stream
/// into what the detail screen renders.
pub fn detail_state(
    campaign: &FetchState<Campaign>,
    snapshot: &FetchState<CampaignInsights>,
    live: Option<&CampaignInsights>,
    connected: bool,
) -> DetailState {
    if let Some(error) = &campaign.error {
        return DetailState::Failed(ErrorPanel::from(error));
    }
    let Some(campaign) = &campaign.data else {
        return DetailState::Loading;
    };
    let Some(effective) = effective_insights(live, snapshot.data.as_ref()) else {
        return DetailState::Loading;
    };

    let insights = effective.insights.clone();
    DetailState::Ready(Box::new(CampaignDetailView {
        budget: budget_usage(campaign, &insights),
        cost_per_conversion: cost_per_conversion(&insights),
        last_updated: insights.timestamp,
        source: effective.source,
        indicator: LiveIndicator::from_connected(connected),
        campaign: campaign.clone(),
        insights,
    }))
}
