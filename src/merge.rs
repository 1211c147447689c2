use serde::Serialize;

use crate::types::CampaignInsights;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightSource {
    Live,
    Snapshot,
}

/// The insights value a view should render and where it came from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EffectiveInsights<'a> {
    pub insights: &'a CampaignInsights,
    pub source: InsightSource,
}

impl EffectiveInsights<'_> {
    pub fn is_live(&self) -> bool {
        self.source == InsightSource::Live
    }
}

/// Prefer the live value; fall back to the snapshot; `None` means loading.
pub fn effective_insights<'a>(
    live: Option<&'a CampaignInsights>,
    snapshot: Option<&'a CampaignInsights>,
) -> Option<EffectiveInsights<'a>> {
    match (live, snapshot) {
        (Some(insights), _) => Some(EffectiveInsights {
            insights,
            source: InsightSource::Live,
        }),
        (None, Some(insights)) => Some(EffectiveInsights {
            insights,
            source: InsightSource::Snapshot,
        }),
        (None, None) => None,
    }
}
