use serde::Serialize;

use super::error_panel::ErrorPanel;
use super::percent;
use crate::fetch::FetchState;
use crate::types::{Campaign, CampaignInsights, OverviewInsights};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RowState {
    Loading,
    Failed {
        rate_limited: bool,
    },
    Loaded {
        insights: CampaignInsights,
        budget_used_pct: f64,
    },
}

/// One line of the campaign table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CampaignRow {
    pub campaign: Campaign,
    pub state: RowState,
}

pub fn campaign_row(campaign: &Campaign, insights: &FetchState<CampaignInsights>) -> CampaignRow {
    let state = match (&insights.error, &insights.data) {
        (Some(error), _) => RowState::Failed {
            rate_limited: error.is_rate_limited(),
        },
        (None, Some(data)) => RowState::Loaded {
            budget_used_pct: percent(data.spend, campaign.budget),
            insights: data.clone(),
        },
        (None, None) => RowState::Loading,
    };
    CampaignRow {
        campaign: campaign.clone(),
        state,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DashboardState {
    Loading,
    Failed(ErrorPanel),
    Empty,
    Ready {
        campaigns: Vec<Campaign>,
        overview: OverviewInsights,
    },
}

/// The campaign list error is reported before the overview error.
pub fn dashboard_state(
    campaigns: &FetchState<Vec<Campaign>>,
    overview: &FetchState<OverviewInsights>,
) -> DashboardState {
    if let Some(error) = campaigns.error.as_ref().or(overview.error.as_ref()) {
        return DashboardState::Failed(ErrorPanel::from(error));
    }
    match (&campaigns.data, &overview.data) {
        (Some(campaigns), Some(_)) if campaigns.is_empty() => DashboardState::Empty,
        (Some(campaigns), Some(overview)) => DashboardState::Ready {
            campaigns: campaigns.clone(),
            overview: overview.clone(),
        },
        _ => DashboardState::Loading,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use crate::types::fixtures::{campaign, insights, overview};

    fn loaded<T>(data: T) -> FetchState<T> {
        FetchState {
            data: Some(data),
            ..FetchState::default()
        }
    }

    fn failed<T>(error: FetchError) -> FetchState<T> {
        FetchState {
            error: Some(error),
            ..FetchState::default()
        }
    }

    #[test]
    fn row_loaded_reports_budget_usage() {
        let row = campaign_row(&campaign("c1", 200.0, 20.0), &loaded(insights(50.0, 1)));
        match row.state {
            RowState::Loaded {
                budget_used_pct, ..
            } => assert_eq!(budget_used_pct, 25.0),
            other => panic!("expected loaded, got {:?}", other),
        }
    }

    #[test]
    fn row_failure_flags_rate_limit() {
        let limited = failed(FetchError::RateLimited {
            message: "slow".into(),
            retry_after: None,
        });
        let row = campaign_row(&campaign("c1", 200.0, 20.0), &limited);
        assert_eq!(row.state, RowState::Failed { rate_limited: true });

        let broken = failed(FetchError::Transport("reset".into()));
        let row = campaign_row(&campaign("c1", 200.0, 20.0), &broken);
        assert_eq!(row.state, RowState::Failed { rate_limited: false });
    }

    #[test]
    fn row_without_data_is_loading() {
        let row = campaign_row(&campaign("c1", 200.0, 20.0), &FetchState::default());
        assert_eq!(row.state, RowState::Loading);
    }

    #[test]
    fn dashboard_states() {
        assert_eq!(
            dashboard_state(&FetchState::default(), &loaded(overview())),
            DashboardState::Loading
        );
        assert_eq!(
            dashboard_state(&loaded(vec![]), &loaded(overview())),
            DashboardState::Empty
        );
        let ready = dashboard_state(&loaded(vec![campaign("c1", 1.0, 1.0)]), &loaded(overview()));
        assert!(matches!(ready, DashboardState::Ready { ref campaigns, .. } if campaigns.len() == 1));
    }

    #[test]
    fn campaign_list_error_reported_first() {
        let state = dashboard_state(
            &failed(FetchError::Http {
                status: 500,
                message: "list down".into(),
            }),
            &failed(FetchError::Http {
                status: 502,
                message: "overview down".into(),
            }),
        );
        let DashboardState::Failed(panel) = state else {
            panic!("expected failure");
        };
        assert_eq!(panel.message, "list down");
    }

    #[test]
    fn ready_state_serializes_with_tag() {
        let json = serde_json::to_value(DashboardState::Empty).unwrap();
        assert_eq!(json["state"], "empty");
    }
}
