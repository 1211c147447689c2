//! What each screen renders, derived from fetched and streamed data.
//! Formatting is left to the presentation layer.

pub mod dashboard;
pub mod detail;
pub mod error_panel;

pub use dashboard::{campaign_row, dashboard_state, CampaignRow, DashboardState, RowState};
pub use detail::{
    budget_usage, cost_per_conversion, detail_state, BudgetUsage, CampaignDetailView, DetailState,
    LiveIndicator,
};
pub use error_panel::ErrorPanel;

/// `part` as a percentage of `whole`; 0 when `whole` is not positive.
pub(crate) fn percent(part: f64, whole: f64) -> f64 {
    if whole > 0.0 {
        part * 100.0 / whole
    } else {
        0.0
    }
}
