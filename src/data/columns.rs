//! Column resolution for loosely-named report exports.
//!
//! Report headers vary across exports ("Spend" vs "spend", "Sales" vs
//! "14 Day Total Sales (₹)"...). The resolver maps each canonical field to the
//! first actual header matching one of its known name variants, comparing
//! case-insensitively with whitespace and underscores stripped.

use thiserror::Error;

/// A required numeric column could not be located in the table headers.
///
/// Callers treat this as "skip this dataset", not as a fatal error.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("required numeric columns not found: {}", .0.join(", "))]
    MissingColumns(Vec<&'static str>),
}

pub const SPEND_CANDIDATES: &[&str] = &["Spend", "spend", "Cost", "cost"];

pub const SALES_CANDIDATES: &[&str] = &[
    "Sales",
    "sales",
    "Revenue",
    "revenue",
    "14 Day Total Sales (₹)",
    "14 Day Total Sales – (Click)",
];

pub const ORDERS_CANDIDATES: &[&str] = &[
    "Orders",
    "orders",
    "Purchases",
    "14 Day Total Orders (#)",
    "14 Day Total Orders (#) – (Click)",
];

pub const IMPRESSIONS_CANDIDATES: &[&str] = &["Impressions", "impressions"];

pub const CLICKS_CANDIDATES: &[&str] = &["Clicks", "clicks"];

pub const CAMPAIGN_ID_CANDIDATES: &[&str] = &["Campaign ID", "campaign_id"];

pub const CAMPAIGN_NAME_CANDIDATES: &[&str] = &["Campaign Name", "campaign_name", "Campaign"];

pub const SEARCH_TERM_CANDIDATES: &[&str] =
    &["Search Term", "search_term", "Customer Search Term"];

pub const AD_GROUP_CANDIDATES: &[&str] = &["Ad Group Name", "ad_group_name"];

pub const MATCH_TYPE_CANDIDATES: &[&str] = &["Match Type", "match_type"];

pub const ASIN_CANDIDATES: &[&str] = &["ASIN", "asin"];

pub const SKU_CANDIDATES: &[&str] = &["SKU", "sku"];

pub const PRODUCT_NAME_CANDIDATES: &[&str] =
    &["Advertised ASIN", "Product Name", "product_name"];

pub const BRAND_CANDIDATES: &[&str] = &["Brand", "brand"];

pub const CATEGORY_CANDIDATES: &[&str] = &["Category", "category"];

/// Lowercase a header and strip whitespace and underscores.
fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace() && *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Return the first header matching any of `candidates`, or `None`.
///
/// Used for dimension columns, where an unresolved field simply means the
/// dimension is absent from this export.
pub fn resolve<'a>(headers: &'a [String], candidates: &[&str]) -> Option<&'a str> {
    for cand in candidates {
        let key = normalize(cand);
        if let Some(found) = headers.iter().find(|h| normalize(h) == key) {
            return Some(found.as_str());
        }
    }
    None
}

/// The five resolved numeric columns every aggregation needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumericColumns {
    pub spend: String,
    pub sales: String,
    pub orders: String,
    pub impressions: String,
    pub clicks: String,
}

impl NumericColumns {
    /// Resolve all five required columns or report exactly which are missing.
    pub fn resolve(headers: &[String]) -> Result<Self, ResolveError> {
        let spend = resolve(headers, SPEND_CANDIDATES);
        let sales = resolve(headers, SALES_CANDIDATES);
        let orders = resolve(headers, ORDERS_CANDIDATES);
        let impressions = resolve(headers, IMPRESSIONS_CANDIDATES);
        let clicks = resolve(headers, CLICKS_CANDIDATES);

        let missing: Vec<&'static str> = [
            ("spend", spend),
            ("sales", sales),
            ("orders", orders),
            ("impressions", impressions),
            ("clicks", clicks),
        ]
        .iter()
        .filter(|(_, col)| col.is_none())
        .map(|(name, _)| *name)
        .collect();

        if !missing.is_empty() {
            return Err(ResolveError::MissingColumns(missing));
        }

        // All five are Some once the missing check passed.
        Ok(Self {
            spend: spend.unwrap_or_default().to_string(),
            sales: sales.unwrap_or_default().to_string(),
            orders: orders.unwrap_or_default().to_string(),
            impressions: impressions.unwrap_or_default().to_string(),
            clicks: clicks.unwrap_or_default().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_resolve_exact_match() {
        let h = headers(&["Spend", "Clicks"]);
        assert_eq!(resolve(&h, SPEND_CANDIDATES), Some("Spend"));
    }

    #[test]
    fn test_resolve_case_and_separator_insensitive() {
        let h = headers(&["CAMPAIGN_NAME", "customer search term"]);
        assert_eq!(resolve(&h, CAMPAIGN_NAME_CANDIDATES), Some("CAMPAIGN_NAME"));
        assert_eq!(
            resolve(&h, SEARCH_TERM_CANDIDATES),
            Some("customer search term")
        );
    }

    #[test]
    fn test_resolve_prefers_first_candidate() {
        let h = headers(&["Revenue", "Sales"]);
        // "Sales" comes before "Revenue" in the candidate list.
        assert_eq!(resolve(&h, SALES_CANDIDATES), Some("Sales"));
    }

    #[test]
    fn test_resolve_missing_dimension_is_none() {
        let h = headers(&["Spend", "Sales"]);
        assert_eq!(resolve(&h, ASIN_CANDIDATES), None);
    }

    #[test]
    fn test_numeric_columns_full_set() {
        let h = headers(&["Spend", "Sales", "Orders", "Impressions", "Clicks"]);
        let cols = NumericColumns::resolve(&h).unwrap();
        assert_eq!(cols.spend, "Spend");
        assert_eq!(cols.clicks, "Clicks");
    }

    #[test]
    fn test_numeric_columns_long_variants() {
        let h = headers(&[
            "Spend",
            "14 Day Total Sales (₹)",
            "14 Day Total Orders (#)",
            "Impressions",
            "Clicks",
        ]);
        let cols = NumericColumns::resolve(&h).unwrap();
        assert_eq!(cols.sales, "14 Day Total Sales (₹)");
        assert_eq!(cols.orders, "14 Day Total Orders (#)");
    }

    #[test]
    fn test_numeric_columns_reports_every_missing_field() {
        let h = headers(&["Spend", "Clicks"]);
        let err = NumericColumns::resolve(&h).unwrap_err();
        assert_eq!(
            err,
            ResolveError::MissingColumns(vec!["sales", "orders", "impressions"])
        );
        assert!(err.to_string().contains("sales, orders, impressions"));
    }
}
