//! The aggregation engine.
//!
//! Groups raw report rows by entity keys, sums the five core numeric fields,
//! and derives the performance ratios. Grouping is keyed through a `BTreeMap`
//! so the emitted entity set and its order are independent of input row order.
//!
//! Failure semantics: a dataset that cannot be loaded, or whose required
//! numeric columns cannot be resolved, is skipped with a warning; an empty
//! result set is returned when nothing usable remains.

use crate::data::columns::{self, NumericColumns};
use crate::data::{DatasetCatalog, Table};
use crate::models::{
    AccountSummary, BaseMetrics, CampaignMetrics, CampaignType, MetricRecord, ProductMetrics,
    SearchTermMetrics,
};
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// A numeric metric field that slices can be ranked by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricField {
    Spend,
    Sales,
    Orders,
    Impressions,
    Clicks,
    Ctr,
    Cvr,
    Cpc,
    Acos,
    Roas,
}

impl MetricField {
    /// The field's value on a set of base metrics.
    pub fn value(&self, metrics: &BaseMetrics) -> f64 {
        match self {
            MetricField::Spend => metrics.spend,
            MetricField::Sales => metrics.sales,
            MetricField::Orders => metrics.orders as f64,
            MetricField::Impressions => metrics.impressions as f64,
            MetricField::Clicks => metrics.clicks as f64,
            MetricField::Ctr => metrics.ctr,
            MetricField::Cvr => metrics.cvr,
            MetricField::Cpc => metrics.cpc,
            MetricField::Acos => metrics.acos,
            MetricField::Roas => metrics.roas,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// Ranking request: field, direction, and result-count cap.
#[derive(Debug, Clone, Copy)]
pub struct SortSpec {
    pub field: MetricField,
    pub direction: SortDirection,
    pub limit: usize,
}

impl SortSpec {
    /// Top `limit` entities by `field` (descending).
    pub fn top(field: MetricField, limit: usize) -> Self {
        Self {
            field,
            direction: SortDirection::Descending,
            limit,
        }
    }

    /// Bottom `limit` entities by `field` (ascending).
    pub fn bottom(field: MetricField, limit: usize) -> Self {
        Self {
            field,
            direction: SortDirection::Ascending,
            limit,
        }
    }
}

/// Rank entities per `spec` and truncate to its cap.
///
/// The sort is stable, so ties keep the group emission order.
pub fn sort_and_truncate<T: MetricRecord>(mut entities: Vec<T>, spec: SortSpec) -> Vec<T> {
    entities.sort_by(|a, b| {
        let va = spec.field.value(a.metrics());
        let vb = spec.field.value(b.metrics());
        match spec.direction {
            SortDirection::Ascending => va.total_cmp(&vb),
            SortDirection::Descending => vb.total_cmp(&va),
        }
    });
    entities.truncate(spec.limit);
    entities
}

/// Running totals for one group.
#[derive(Debug, Default, Clone)]
struct Totals {
    spend: f64,
    sales: f64,
    orders: f64,
    impressions: f64,
    clicks: f64,
}

impl Totals {
    fn add_row(&mut self, table: &Table, row: usize, numeric: &NumericColumns) {
        self.spend += table.numeric(row, &numeric.spend).unwrap_or(0.0);
        self.sales += table.numeric(row, &numeric.sales).unwrap_or(0.0);
        self.orders += table.numeric(row, &numeric.orders).unwrap_or(0.0);
        self.impressions += table.numeric(row, &numeric.impressions).unwrap_or(0.0);
        self.clicks += table.numeric(row, &numeric.clicks).unwrap_or(0.0);
    }

    fn merge(&mut self, other: &Totals) {
        self.spend += other.spend;
        self.sales += other.sales;
        self.orders += other.orders;
        self.impressions += other.impressions;
        self.clicks += other.clicks;
    }

    fn finalize(&self) -> BaseMetrics {
        BaseMetrics::from_totals(
            self.spend,
            self.sales,
            self.orders.round() as u64,
            self.impressions.round() as u64,
            self.clicks.round() as u64,
        )
    }
}

/// Group the table by the given key columns and sum the numeric fields.
///
/// Each element of `key_cols` is an actual (resolved) column name, or `None`
/// for a dimension absent from this table; absent dimensions contribute a
/// `None` key component for every row. Rows with blank key cells form their
/// own group rather than being dropped. With no resolvable keys at all, the
/// whole table collapses into a single catch-all group.
fn group_and_sum(
    table: &Table,
    numeric: &NumericColumns,
    key_cols: &[Option<&str>],
) -> Vec<(Vec<Option<String>>, Totals)> {
    let mut groups: BTreeMap<Vec<Option<String>>, Totals> = BTreeMap::new();

    for row in 0..table.row_count() {
        let key: Vec<Option<String>> = key_cols
            .iter()
            .map(|col| col.and_then(|c| table.cell(row, c)).map(str::to_string))
            .collect();
        groups
            .entry(key)
            .or_default()
            .add_row(table, row, numeric);
    }

    groups.into_iter().collect()
}

/// Map a dataset name to the campaign type tag used in grouping.
fn campaign_type_for(dataset_name: &str) -> CampaignType {
    if dataset_name.contains("sponsored_display") {
        CampaignType::SD
    } else if dataset_name.contains("sponsored_brands") {
        CampaignType::SB
    } else {
        CampaignType::Other
    }
}

/// Load a dataset and resolve its required numeric columns, or skip it.
fn usable_table<'a>(
    catalog: &'a mut DatasetCatalog,
    name: &str,
) -> Option<(&'a Table, NumericColumns)> {
    let table = match catalog.load(name) {
        Ok(table) => table,
        Err(err) => {
            warn!("Skipping dataset '{}': {}", name, err);
            return None;
        }
    };
    match NumericColumns::resolve(table.headers()) {
        Ok(numeric) => Some((table, numeric)),
        Err(err) => {
            warn!("Skipping dataset '{}': {}", name, err);
            None
        }
    }
}

/// Campaign-level metrics across all the given datasets.
///
/// Groups by campaign id, campaign name, and source dataset type; the same
/// campaign key occurring in several datasets of the same type accumulates
/// into one entity.
pub fn campaign_metrics(
    catalog: &mut DatasetCatalog,
    dataset_names: &[String],
) -> Vec<CampaignMetrics> {
    type Key = (Option<String>, Option<String>, CampaignType);
    let mut merged: BTreeMap<Key, Totals> = BTreeMap::new();

    for name in dataset_names {
        let Some((table, numeric)) = usable_table(catalog, name) else {
            continue;
        };
        let campaign_type = campaign_type_for(name);
        let id_col = columns::resolve(table.headers(), columns::CAMPAIGN_ID_CANDIDATES);
        let name_col = columns::resolve(table.headers(), columns::CAMPAIGN_NAME_CANDIDATES);

        if id_col.is_none() && name_col.is_none() {
            // No campaign dimension at all; a catch-all group here would be
            // a phantom campaign.
            warn!(
                "Dataset '{}' has no campaign id or name column; skipping for campaign metrics",
                name
            );
            continue;
        }

        for (key, totals) in group_and_sum(table, &numeric, &[id_col, name_col]) {
            let merged_key = (key[0].clone(), key[1].clone(), campaign_type);
            merged.entry(merged_key).or_default().merge(&totals);
        }
    }

    debug!("Aggregated {} campaign groups", merged.len());
    merged
        .into_iter()
        .map(|((campaign_id, campaign_name, campaign_type), totals)| CampaignMetrics {
            base: totals.finalize(),
            campaign_id,
            campaign_name,
            campaign_type: Some(campaign_type),
        })
        .collect()
}

/// Search-term-level metrics for a single dataset.
///
/// Returns an empty set when the dataset is unusable or carries no search
/// term column.
pub fn search_term_metrics(
    catalog: &mut DatasetCatalog,
    dataset_name: &str,
) -> Vec<SearchTermMetrics> {
    let Some((table, numeric)) = usable_table(catalog, dataset_name) else {
        return Vec::new();
    };

    let Some(term_col) = columns::resolve(table.headers(), columns::SEARCH_TERM_CANDIDATES) else {
        warn!(
            "Dataset '{}' has no search term column; returning no search term metrics",
            dataset_name
        );
        return Vec::new();
    };
    let id_col = columns::resolve(table.headers(), columns::CAMPAIGN_ID_CANDIDATES);
    let name_col = columns::resolve(table.headers(), columns::CAMPAIGN_NAME_CANDIDATES);
    let ad_group_col = columns::resolve(table.headers(), columns::AD_GROUP_CANDIDATES);
    let match_col = columns::resolve(table.headers(), columns::MATCH_TYPE_CANDIDATES);

    group_and_sum(
        table,
        &numeric,
        &[Some(term_col), id_col, name_col, ad_group_col, match_col],
    )
    .into_iter()
    .map(|(key, totals)| SearchTermMetrics {
        base: totals.finalize(),
        search_term: key[0].clone().unwrap_or_default(),
        campaign_id: key[1].clone(),
        campaign_name: key[2].clone(),
        ad_group_name: key[3].clone(),
        match_type: key[4].clone(),
    })
    .collect()
}

/// Product-level metrics for a single dataset.
///
/// Falls back to one catch-all group when no product or campaign dimension
/// resolves.
pub fn product_metrics(catalog: &mut DatasetCatalog, dataset_name: &str) -> Vec<ProductMetrics> {
    let Some((table, numeric)) = usable_table(catalog, dataset_name) else {
        return Vec::new();
    };

    let asin_col = columns::resolve(table.headers(), columns::ASIN_CANDIDATES);
    let sku_col = columns::resolve(table.headers(), columns::SKU_CANDIDATES);
    let product_col = columns::resolve(table.headers(), columns::PRODUCT_NAME_CANDIDATES);
    let brand_col = columns::resolve(table.headers(), columns::BRAND_CANDIDATES);
    let category_col = columns::resolve(table.headers(), columns::CATEGORY_CANDIDATES);
    let id_col = columns::resolve(table.headers(), columns::CAMPAIGN_ID_CANDIDATES);
    let name_col = columns::resolve(table.headers(), columns::CAMPAIGN_NAME_CANDIDATES);

    group_and_sum(
        table,
        &numeric,
        &[
            asin_col,
            sku_col,
            product_col,
            brand_col,
            category_col,
            id_col,
            name_col,
        ],
    )
    .into_iter()
    .map(|(key, totals)| ProductMetrics {
        base: totals.finalize(),
        asin: key[0].clone(),
        sku: key[1].clone(),
        product_name: key[2].clone(),
        brand: key[3].clone(),
        category: key[4].clone(),
        campaign_id: key[5].clone(),
        campaign_name: key[6].clone(),
    })
    .collect()
}

/// Account-level summary: sums over the entire combined table (no grouping)
/// plus distinct-counts of each dimension's non-null values.
pub fn account_summary(
    catalog: &mut DatasetCatalog,
    dataset_names: &[String],
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
) -> AccountSummary {
    let mut totals = Totals::default();
    let mut campaigns: BTreeSet<String> = BTreeSet::new();
    let mut products: BTreeSet<String> = BTreeSet::new();
    let mut search_terms: BTreeSet<String> = BTreeSet::new();

    for name in dataset_names {
        let Some((table, numeric)) = usable_table(catalog, name) else {
            continue;
        };

        // Campaigns dedupe by id, falling back to name when no id column.
        let campaign_col = columns::resolve(table.headers(), columns::CAMPAIGN_ID_CANDIDATES)
            .or_else(|| columns::resolve(table.headers(), columns::CAMPAIGN_NAME_CANDIDATES));
        // Products dedupe by ASIN, then SKU, then product name.
        let product_col = columns::resolve(table.headers(), columns::ASIN_CANDIDATES)
            .or_else(|| columns::resolve(table.headers(), columns::SKU_CANDIDATES))
            .or_else(|| columns::resolve(table.headers(), columns::PRODUCT_NAME_CANDIDATES));
        let term_col = columns::resolve(table.headers(), columns::SEARCH_TERM_CANDIDATES);

        for row in 0..table.row_count() {
            totals.add_row(table, row, &numeric);
            if let Some(value) = campaign_col.and_then(|c| table.cell(row, c)) {
                campaigns.insert(value.to_string());
            }
            if let Some(value) = product_col.and_then(|c| table.cell(row, c)) {
                products.insert(value.to_string());
            }
            if let Some(value) = term_col.and_then(|c| table.cell(row, c)) {
                search_terms.insert(value.to_string());
            }
        }
    }

    AccountSummary {
        base: totals.finalize(),
        total_campaigns: campaigns.len() as u64,
        total_products: products.len() as u64,
        total_search_terms: search_terms.len() as u64,
        start_date,
        end_date,
    }
}
