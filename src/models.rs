//! Data models for the metrics pipeline.
//!
//! This module contains the core value objects produced by the aggregation
//! engine: base performance metrics, per-entity metrics, the account summary,
//! and the complete metrics bundle handed to the insights stage.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Source report type a campaign row came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CampaignType {
    /// Sponsored Display
    SD,
    /// Sponsored Brands
    SB,
    /// Any other / unrecognized source
    Other,
}

impl fmt::Display for CampaignType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CampaignType::SD => write!(f, "SD"),
            CampaignType::SB => write!(f, "SB"),
            CampaignType::Other => write!(f, "Other"),
        }
    }
}

/// Core performance metrics shared by every aggregation level.
///
/// The five raw fields are summed from row data; the five ratios are always
/// derived from them via [`BaseMetrics::from_totals`] and never set
/// independently.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BaseMetrics {
    pub spend: f64,
    pub sales: f64,
    pub orders: u64,
    pub impressions: u64,
    pub clicks: u64,

    /// clicks / impressions
    pub ctr: f64,
    /// orders / clicks
    pub cvr: f64,
    /// spend / clicks
    pub cpc: f64,
    /// spend / sales
    pub acos: f64,
    /// sales / spend
    pub roas: f64,
}

/// Division that maps a zero denominator to 0.0 instead of inf/NaN.
pub fn safe_div(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

impl BaseMetrics {
    /// Build metrics from summed totals, deriving all five ratios.
    pub fn from_totals(spend: f64, sales: f64, orders: u64, impressions: u64, clicks: u64) -> Self {
        Self {
            spend,
            sales,
            orders,
            impressions,
            clicks,
            ctr: safe_div(clicks as f64, impressions as f64),
            cvr: safe_div(orders as f64, clicks as f64),
            cpc: safe_div(spend, clicks as f64),
            acos: safe_div(spend, sales),
            roas: safe_div(sales, spend),
        }
    }

    /// Re-derive the ratio fields from the raw totals in place.
    pub fn recompute_ratios(&mut self) {
        *self = Self::from_totals(
            self.spend,
            self.sales,
            self.orders,
            self.impressions,
            self.clicks,
        );
    }

    /// Check the bundle invariants, returning the names of violated fields.
    ///
    /// `prefix` identifies the owning entity in the violation messages.
    pub fn violations(&self, prefix: &str) -> Vec<String> {
        let mut out = Vec::new();

        if self.spend < 0.0 || !self.spend.is_finite() {
            out.push(format!("{prefix}.spend"));
        }
        if self.sales < 0.0 || !self.sales.is_finite() {
            out.push(format!("{prefix}.sales"));
        }

        let expected = Self::from_totals(
            self.spend,
            self.sales,
            self.orders,
            self.impressions,
            self.clicks,
        );
        for (name, actual, want) in [
            ("ctr", self.ctr, expected.ctr),
            ("cvr", self.cvr, expected.cvr),
            ("cpc", self.cpc, expected.cpc),
            ("acos", self.acos, expected.acos),
            ("roas", self.roas, expected.roas),
        ] {
            if !actual.is_finite() || (actual - want).abs() > 1e-9 {
                out.push(format!("{prefix}.{name}"));
            }
        }

        out
    }
}

/// Access to the embedded [`BaseMetrics`] of any entity-level record.
pub trait MetricRecord {
    fn metrics(&self) -> &BaseMetrics;
    fn metrics_mut(&mut self) -> &mut BaseMetrics;
}

macro_rules! impl_metric_record {
    ($ty:ty) => {
        impl MetricRecord for $ty {
            fn metrics(&self) -> &BaseMetrics {
                &self.base
            }
            fn metrics_mut(&mut self) -> &mut BaseMetrics {
                &mut self.base
            }
        }
    };
}

/// Aggregated metrics for one campaign.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignMetrics {
    #[serde(flatten)]
    pub base: BaseMetrics,
    pub campaign_id: Option<String>,
    pub campaign_name: Option<String>,
    pub campaign_type: Option<CampaignType>,
}

/// Aggregated metrics for one search term within its campaign context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchTermMetrics {
    #[serde(flatten)]
    pub base: BaseMetrics,
    pub search_term: String,
    pub match_type: Option<String>,
    pub campaign_id: Option<String>,
    pub campaign_name: Option<String>,
    pub ad_group_name: Option<String>,
}

/// Aggregated metrics for one advertised product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductMetrics {
    #[serde(flatten)]
    pub base: BaseMetrics,
    pub asin: Option<String>,
    pub sku: Option<String>,
    pub product_name: Option<String>,
    pub brand: Option<String>,
    pub category: Option<String>,
    pub campaign_id: Option<String>,
    pub campaign_name: Option<String>,
}

impl_metric_record!(CampaignMetrics);
impl_metric_record!(SearchTermMetrics);
impl_metric_record!(ProductMetrics);

/// Account-wide totals plus entity counts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountSummary {
    #[serde(flatten)]
    pub base: BaseMetrics,
    pub total_campaigns: u64,
    pub total_products: u64,
    pub total_search_terms: u64,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

/// Reporting window and generation timestamp of a bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub generated_at: DateTime<Utc>,
}

impl ReportMetadata {
    /// Stamp a metadata record for the given window at the current instant.
    pub fn now(start_date: Option<NaiveDate>, end_date: Option<NaiveDate>) -> Self {
        Self {
            start_date,
            end_date,
            generated_at: Utc::now(),
        }
    }
}

impl Default for ReportMetadata {
    fn default() -> Self {
        Self::now(None, None)
    }
}

/// The complete payload passed from the metrics stage to the insights stage.
///
/// Carries the account summary plus top/bottom slices of each entity level;
/// slices are empty when an aggregation yielded no data, never missing.
/// Created fresh on every computation cycle and treated as immutable once
/// handed to the insights stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsBundle {
    pub report_metadata: ReportMetadata,
    pub account_summary: AccountSummary,

    pub top_campaigns_by_spend: Vec<CampaignMetrics>,
    pub top_campaigns_by_roas: Vec<CampaignMetrics>,
    pub bottom_campaigns_by_roas: Vec<CampaignMetrics>,

    pub top_search_terms_by_spend: Vec<SearchTermMetrics>,
    pub top_search_terms_by_roas: Vec<SearchTermMetrics>,

    pub top_products_by_spend: Vec<ProductMetrics>,
    pub top_products_by_roas: Vec<ProductMetrics>,
    pub bottom_products_by_roas: Vec<ProductMetrics>,
}
