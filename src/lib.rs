pub mod api;
pub mod commands;
pub mod config;
pub mod error;
pub mod events;
pub mod fetch;
pub mod merge;
pub mod stream;
pub mod types;
pub mod view;

use std::sync::Arc;

use futures::StreamExt;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::commands::Dashboard;
use crate::config::DashboardConfig;
use crate::events::LogSink;
use crate::view::{DashboardState, DetailState};

/// Initialize structured logging with tracing.
/// Respects RUST_LOG env var; defaults to `info` level for the adwatch crate.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("adwatch=info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

/// Load the dashboard once, then follow the configured campaign's live
/// insights until Ctrl-C.
pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    // A missing .env is fine; the process environment still applies.
    dotenvy::dotenv().ok();
    init_tracing();

    let config = DashboardConfig::from_env()?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(follow(config))
}

async fn follow(config: DashboardConfig) -> Result<(), Box<dyn std::error::Error>> {
    info!(base_url = %config.base_url, "Starting dashboard");
    let mut dashboard = Dashboard::from_config(&config)?.with_sink(Arc::new(LogSink));

    match dashboard.overview().await {
        DashboardState::Ready { campaigns, overview } => {
            info!(
                campaigns = campaigns.len(),
                active = overview.active_campaigns,
                total_spend = overview.total_spend,
                avg_ctr = overview.avg_ctr,
                "Overview loaded"
            );
            for row in dashboard.campaign_rows().await {
                info!(campaign_id = %row.campaign.id, state = ?row.state, "Campaign");
            }
        }
        DashboardState::Empty => info!("No campaigns found"),
        DashboardState::Failed(panel) => warn!(title = %panel.title, message = %panel.message, "Overview failed"),
        DashboardState::Loading => {}
    }

    let Some(campaign_id) = config.campaign_id.clone() else {
        info!("No campaign to follow; set ADWATCH_CAMPAIGN_ID");
        return Ok(());
    };

    match dashboard.open_campaign(&campaign_id).await {
        DetailState::Failed(panel) => {
            warn!(campaign_id = %campaign_id, message = %panel.message, "Campaign failed to load")
        }
        state => info!(campaign_id = %campaign_id, ready = matches!(state, DetailState::Ready(_)), "Campaign opened"),
    }

    let Some(subscription) = dashboard.live().subscription() else {
        return Ok(());
    };
    let mut changes = subscription.changes().boxed();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
            change = changes.next() => {
                let Some(state) = change else { break };
                match &state.latest {
                    Some(latest) => info!(
                        status = ?state.status,
                        spend = latest.spend,
                        clicks = latest.clicks,
                        conversions = latest.conversions,
                        timestamp = %latest.timestamp,
                        "Live insights"
                    ),
                    None => info!(status = ?state.status, "Stream status"),
                }
            }
        }
    }

    dashboard.close_campaign().await;
    Ok(())
}
