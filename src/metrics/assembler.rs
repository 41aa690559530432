//! Metrics bundle assembly and validation.
//!
//! Runs the aggregation engine across all required groupings, takes the
//! top/bottom slices, stamps the report metadata, and validates the result.
//! A bundle that fails validation gets exactly one repair pass (re-deriving
//! ratio fields from raw totals) before the failure becomes fatal.

use crate::data::{self, DatasetCatalog};
use crate::metrics::aggregate::{
    account_summary, campaign_metrics, product_metrics, search_term_metrics, sort_and_truncate,
    MetricField, SortSpec,
};
use crate::models::{MetricRecord, MetricsBundle, ReportMetadata};
use chrono::NaiveDate;
use thiserror::Error;
use tracing::{info, warn};

/// Default result-count cap for every slice.
pub const DEFAULT_TOP_N: usize = 5;

/// Fatal assembly failure: the bundle still violates its invariants after
/// the repair pass.
#[derive(Debug, Error)]
pub enum AssemblyError {
    #[error("metrics bundle failed validation after repair; violated fields: {}", .0.join(", "))]
    Validation(Vec<String>),
}

/// Compute a complete, validated [`MetricsBundle`] over the given datasets.
pub fn assemble(
    catalog: &mut DatasetCatalog,
    dataset_names: &[String],
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    top_n: usize,
) -> Result<MetricsBundle, AssemblyError> {
    let summary = account_summary(catalog, dataset_names, start_date, end_date);
    let campaigns = campaign_metrics(catalog, dataset_names);
    let search_terms = search_term_metrics(catalog, data::SPONSORED_BRANDS);
    let products = product_metrics(catalog, data::SPONSORED_DISPLAY);

    info!(
        "Assembling bundle: {} campaigns, {} search terms, {} products",
        campaigns.len(),
        search_terms.len(),
        products.len()
    );

    let mut bundle = MetricsBundle {
        report_metadata: ReportMetadata::now(start_date, end_date),
        account_summary: summary,

        top_campaigns_by_spend: sort_and_truncate(
            campaigns.clone(),
            SortSpec::top(MetricField::Spend, top_n),
        ),
        top_campaigns_by_roas: sort_and_truncate(
            campaigns.clone(),
            SortSpec::top(MetricField::Roas, top_n),
        ),
        bottom_campaigns_by_roas: sort_and_truncate(
            campaigns,
            SortSpec::bottom(MetricField::Roas, top_n),
        ),

        top_search_terms_by_spend: sort_and_truncate(
            search_terms.clone(),
            SortSpec::top(MetricField::Spend, top_n),
        ),
        top_search_terms_by_roas: sort_and_truncate(
            search_terms,
            SortSpec::top(MetricField::Roas, top_n),
        ),

        top_products_by_spend: sort_and_truncate(
            products.clone(),
            SortSpec::top(MetricField::Spend, top_n),
        ),
        top_products_by_roas: sort_and_truncate(
            products.clone(),
            SortSpec::top(MetricField::Roas, top_n),
        ),
        bottom_products_by_roas: sort_and_truncate(
            products,
            SortSpec::bottom(MetricField::Roas, top_n),
        ),
    };

    let violations = validate_bundle(&bundle);
    if !violations.is_empty() {
        warn!(
            "Bundle failed validation ({} violations); attempting repair",
            violations.len()
        );
        repair_bundle(&mut bundle);

        let remaining = validate_bundle(&bundle);
        if !remaining.is_empty() {
            return Err(AssemblyError::Validation(remaining));
        }
        info!("Bundle repaired successfully");
    }

    Ok(bundle)
}

fn slice_violations<T: MetricRecord>(name: &str, items: &[T], out: &mut Vec<String>) {
    for (i, item) in items.iter().enumerate() {
        out.extend(item.metrics().violations(&format!("{name}[{i}]")));
    }
}

/// Collect every invariant violation in the bundle, empty when valid.
pub fn validate_bundle(bundle: &MetricsBundle) -> Vec<String> {
    let mut out = bundle.account_summary.base.violations("account_summary");

    slice_violations("top_campaigns_by_spend", &bundle.top_campaigns_by_spend, &mut out);
    slice_violations("top_campaigns_by_roas", &bundle.top_campaigns_by_roas, &mut out);
    slice_violations(
        "bottom_campaigns_by_roas",
        &bundle.bottom_campaigns_by_roas,
        &mut out,
    );
    slice_violations(
        "top_search_terms_by_spend",
        &bundle.top_search_terms_by_spend,
        &mut out,
    );
    slice_violations(
        "top_search_terms_by_roas",
        &bundle.top_search_terms_by_roas,
        &mut out,
    );
    slice_violations("top_products_by_spend", &bundle.top_products_by_spend, &mut out);
    slice_violations("top_products_by_roas", &bundle.top_products_by_roas, &mut out);
    slice_violations(
        "bottom_products_by_roas",
        &bundle.bottom_products_by_roas,
        &mut out,
    );

    out
}

/// One repair pass: re-derive every ratio field from its raw totals.
pub fn repair_bundle(bundle: &mut MetricsBundle) {
    bundle.account_summary.base.recompute_ratios();

    for c in bundle
        .top_campaigns_by_spend
        .iter_mut()
        .chain(bundle.top_campaigns_by_roas.iter_mut())
        .chain(bundle.bottom_campaigns_by_roas.iter_mut())
    {
        c.metrics_mut().recompute_ratios();
    }
    for t in bundle
        .top_search_terms_by_spend
        .iter_mut()
        .chain(bundle.top_search_terms_by_roas.iter_mut())
    {
        t.metrics_mut().recompute_ratios();
    }
    for p in bundle
        .top_products_by_spend
        .iter_mut()
        .chain(bundle.top_products_by_roas.iter_mut())
        .chain(bundle.bottom_products_by_roas.iter_mut())
    {
        p.metrics_mut().recompute_ratios();
    }
}
