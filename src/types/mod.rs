pub mod campaign;
pub mod insights;

#[cfg(test)]
pub(crate) mod fixtures;

pub use campaign::{Campaign, CampaignEnvelope, CampaignStatus, CampaignsEnvelope};
pub use insights::{CampaignInsights, InsightsEnvelope, OverviewInsights};
