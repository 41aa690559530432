//! Human-readable rendering of the insights report.
//!
//! Produces the plain-text summary printed at the end of a run. The metrics
//! bundle itself is persisted as JSON; this rendering is for the terminal.

use crate::insights::{
    CampaignInsight, InsightsReport, ProductInsight, SearchTermAction,
};
use crate::models::AccountSummary;

/// Render the complete insights report as display text.
pub fn render_insights(report: &InsightsReport) -> String {
    let mut output = String::new();

    output.push_str("=== Ad Performance Insights ===\n\n");
    output.push_str(&render_account_summary(
        &report.performance_overview.account_summary,
    ));

    if !report.performance_overview.key_trends.is_empty() {
        output.push_str("Key trends:\n");
        for trend in &report.performance_overview.key_trends {
            output.push_str(&format!("  - {trend}\n"));
        }
        output.push('\n');
    }

    if let Some(theme) = &report.performance_overview.strategic_theme {
        output.push_str(&format!("Strategic theme: {theme}\n\n"));
    }

    output.push_str(&render_campaign_bucket(
        "Scale candidates",
        &report.campaign_insights.scale_candidates,
    ));
    output.push_str(&render_campaign_bucket(
        "Optimization needed",
        &report.campaign_insights.optimization_needed,
    ));
    output.push_str(&render_campaign_bucket(
        "Pause candidates",
        &report.campaign_insights.pause_candidates,
    ));

    output.push_str(&render_term_bucket(
        "Increase bids",
        &report.search_term_actions.increase_bids,
    ));
    output.push_str(&render_term_bucket(
        "Add negative keywords",
        &report.search_term_actions.add_negative_keywords,
    ));

    output.push_str(&render_product_bucket(
        "Hero products",
        &report.product_insights.hero_products,
    ));
    output.push_str(&render_product_bucket(
        "Budget drainers",
        &report.product_insights.budget_drainers,
    ));

    output.push_str(&render_list("Budget reallocation", &report.budget_reallocation));
    output.push_str(&render_list("Priority actions", &report.priority_actions));
    output.push_str(&render_list("Risk flags", &report.risk_flags));

    output.push_str("=== Executive Summary ===\n");
    output.push_str(&report.natural_language_summary);
    output.push('\n');

    output
}

fn render_account_summary(summary: &AccountSummary) -> String {
    let base = &summary.base;
    let mut section = String::new();

    section.push_str("Account summary:\n");
    section.push_str(&format!(
        "  Spend: {:.2} | Sales: {:.2} | Orders: {}\n",
        base.spend, base.sales, base.orders
    ));
    section.push_str(&format!(
        "  Impressions: {} | Clicks: {} | CTR: {:.4} | CVR: {:.4}\n",
        base.impressions, base.clicks, base.ctr, base.cvr
    ));
    section.push_str(&format!(
        "  CPC: {:.2} | ACOS: {:.2} | ROAS: {:.2}\n",
        base.cpc, base.acos, base.roas
    ));
    section.push_str(&format!(
        "  Entities: {} campaigns, {} products, {} search terms\n",
        summary.total_campaigns, summary.total_products, summary.total_search_terms
    ));
    if let (Some(start), Some(end)) = (summary.start_date, summary.end_date) {
        section.push_str(&format!("  Window: {start} to {end}\n"));
    }
    section.push('\n');

    section
}

fn render_campaign_bucket(title: &str, insights: &[CampaignInsight]) -> String {
    if insights.is_empty() {
        return String::new();
    }

    let mut section = format!("{title}:\n");
    for insight in insights {
        let label = insight
            .campaign_name
            .as_deref()
            .or(insight.campaign_id.as_deref())
            .unwrap_or("(unnamed campaign)");
        section.push_str(&format!("  - {label}: {}\n", insight.rationale));
    }
    section.push('\n');
    section
}

fn render_term_bucket(title: &str, actions: &[SearchTermAction]) -> String {
    if actions.is_empty() {
        return String::new();
    }

    let mut section = format!("{title}:\n");
    for action in actions {
        section.push_str(&format!(
            "  - \"{}\": {}\n",
            action.search_term, action.action_reason
        ));
    }
    section.push('\n');
    section
}

fn render_product_bucket(title: &str, insights: &[ProductInsight]) -> String {
    if insights.is_empty() {
        return String::new();
    }

    let mut section = format!("{title}:\n");
    for insight in insights {
        let label = insight
            .product_name
            .as_deref()
            .or(insight.asin.as_deref())
            .or(insight.sku.as_deref())
            .unwrap_or("(unknown product)");
        section.push_str(&format!("  - {label}: {}\n", insight.insight_reason));
    }
    section.push('\n');
    section
}

fn render_list(title: &str, items: &[String]) -> String {
    if items.is_empty() {
        return String::new();
    }

    let mut section = format!("{title}:\n");
    for item in items {
        section.push_str(&format!("  - {item}\n"));
    }
    section.push('\n');
    section
}
