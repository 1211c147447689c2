use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    Active,
    Paused,
    Completed,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Campaign {
    pub id: String,
    pub name: String,
    pub status: CampaignStatus,
    #[serde(default)]
    pub platforms: Vec<String>,
    pub budget: f64,
    pub daily_budget: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl Campaign {
    pub fn platforms_label(&self) -> String {
        self.platforms.join(", ")
    }
}

/// `GET /campaigns`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignsEnvelope {
    pub campaigns: Vec<Campaign>,
}

/// `GET /campaigns/{id}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignEnvelope {
    pub campaign: Campaign,
}
