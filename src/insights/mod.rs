//! Insights stage: schema and the single-call reasoning agent.

mod agent;
mod schema;

pub use agent::{fallback_report, truncate_for_prompt, InsightsAgent, InsightsConfig};
pub use schema::{
    CampaignInsight, CampaignInsightsSection, InsightsReport, PerformanceOverview, ProductInsight,
    ProductInsightsSection, SearchTermAction, SearchTermActionsSection,
};
