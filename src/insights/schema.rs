//! Structured insights report schema.
//!
//! The fixed output contract of the reasoning stage. List fields default to
//! empty so a sparse model response still parses; the narrative summary is
//! required.

use crate::models::{AccountSummary, CampaignMetrics, ProductMetrics, SearchTermMetrics};
use serde::{Deserialize, Serialize};

/// High-level description of account performance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceOverview {
    pub account_summary: AccountSummary,
    #[serde(default)]
    pub key_trends: Vec<String>,
    #[serde(default)]
    pub strategic_theme: Option<String>,
}

/// Classification and commentary for a single campaign.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignInsight {
    #[serde(default)]
    pub campaign_id: Option<String>,
    #[serde(default)]
    pub campaign_name: Option<String>,
    pub rationale: String,
    #[serde(default)]
    pub referenced_metrics: Option<CampaignMetrics>,
}

/// Recommended action for a specific search term.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchTermAction {
    pub search_term: String,
    #[serde(default)]
    pub campaign_id: Option<String>,
    #[serde(default)]
    pub campaign_name: Option<String>,
    pub action_reason: String,
    #[serde(default)]
    pub referenced_metrics: Option<SearchTermMetrics>,
}

/// Insight for a specific product / ASIN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductInsight {
    #[serde(default)]
    pub asin: Option<String>,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub product_name: Option<String>,
    pub insight_reason: String,
    #[serde(default)]
    pub referenced_metrics: Option<ProductMetrics>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CampaignInsightsSection {
    #[serde(default)]
    pub scale_candidates: Vec<CampaignInsight>,
    #[serde(default)]
    pub optimization_needed: Vec<CampaignInsight>,
    #[serde(default)]
    pub pause_candidates: Vec<CampaignInsight>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchTermActionsSection {
    #[serde(default)]
    pub increase_bids: Vec<SearchTermAction>,
    #[serde(default)]
    pub add_negative_keywords: Vec<SearchTermAction>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductInsightsSection {
    #[serde(default)]
    pub hero_products: Vec<ProductInsight>,
    #[serde(default)]
    pub budget_drainers: Vec<ProductInsight>,
}

/// The complete structured output of the insights stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InsightsReport {
    #[serde(default)]
    pub performance_overview: PerformanceOverview,
    #[serde(default)]
    pub campaign_insights: CampaignInsightsSection,
    #[serde(default)]
    pub search_term_actions: SearchTermActionsSection,
    #[serde(default)]
    pub product_insights: ProductInsightsSection,
    #[serde(default)]
    pub budget_reallocation: Vec<String>,
    #[serde(default)]
    pub priority_actions: Vec<String>,
    #[serde(default)]
    pub risk_flags: Vec<String>,
    pub natural_language_summary: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sparse_report_parses_with_defaults() {
        let json = r#"{
            "natural_language_summary": "Steady month with improving ROAS."
        }"#;
        let report: InsightsReport = serde_json::from_str(json).unwrap();
        assert!(report.campaign_insights.scale_candidates.is_empty());
        assert!(report.priority_actions.is_empty());
        assert_eq!(
            report.natural_language_summary,
            "Steady month with improving ROAS."
        );
    }

    #[test]
    fn test_missing_summary_is_an_error() {
        let json = r#"{"risk_flags": ["low data volume"]}"#;
        assert!(serde_json::from_str::<InsightsReport>(json).is_err());
    }

    #[test]
    fn test_unknown_top_level_field_is_an_error() {
        let json = r#"{
            "natural_language_summary": "ok",
            "bonus_section": {}
        }"#;
        assert!(serde_json::from_str::<InsightsReport>(json).is_err());
    }
}
