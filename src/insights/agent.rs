//! Insights generation: one structured LLM call with a deterministic fallback.
//!
//! The agent serializes the metrics bundle to compact JSON (truncated and
//! deduplicated per category), sends a single non-streaming chat request to
//! Ollama, and parses the response into an [`InsightsReport`]. Any failure on
//! that path, or mock mode, yields the deterministic fallback report instead;
//! the insights stage never fails the run.

use crate::insights::schema::{InsightsReport, PerformanceOverview};
use crate::models::MetricsBundle;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{info, warn};

/// Cap on entities per bundle slice in the prompt payload.
pub const MAX_PROMPT_ENTITIES: usize = 50;

/// Configuration for the insights agent.
#[derive(Debug, Clone)]
pub struct InsightsConfig {
    pub ollama_url: String,
    pub model_name: String,
    pub temperature: f32,
    pub timeout_seconds: u64,
    /// Skip the model call entirely and return the fallback report.
    pub mock_mode: bool,
}

impl Default for InsightsConfig {
    fn default() -> Self {
        Self {
            ollama_url: "http://localhost:11434".to_string(),
            model_name: "llama3.2:latest".to_string(),
            temperature: 0.4,
            timeout_seconds: 300,
            mock_mode: false,
        }
    }
}

/// Chat message sent to Ollama.
#[derive(Debug, Clone, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

/// Ollama chat API request.
#[derive(Debug, Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
}

/// Ollama chat API response.
#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: String,
}

/// The insights agent: holds the HTTP client and model settings.
pub struct InsightsAgent {
    config: InsightsConfig,
    http_client: reqwest::Client,
}

impl InsightsAgent {
    pub fn new(config: InsightsConfig) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            config,
            http_client,
        }
    }

    /// Produce an insights report for the bundle.
    ///
    /// Makes at most one model call; every failure path resolves to the
    /// deterministic fallback report.
    pub async fn generate(&self, bundle: &MetricsBundle) -> InsightsReport {
        if self.config.mock_mode {
            info!("Mock mode enabled; skipping model call");
            return fallback_report(bundle);
        }

        match self.request_insights(bundle).await {
            Ok(report) => {
                info!("Insights generated successfully (1 call)");
                report
            }
            Err(err) => {
                warn!("Insights call failed: {:#}; using fallback report", err);
                fallback_report(bundle)
            }
        }
    }

    async fn request_insights(&self, bundle: &MetricsBundle) -> Result<InsightsReport> {
        let compact = truncate_for_prompt(bundle, MAX_PROMPT_ENTITIES);
        let metrics_json =
            serde_json::to_string(&compact).context("Failed to serialize metrics bundle")?;

        let url = format!("{}/api/chat", self.config.ollama_url);
        let request = OllamaChatRequest {
            model: self.config.model_name.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: INSIGHTS_SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: format!("Metrics Data:\n{metrics_json}"),
                },
            ],
            stream: false,
            options: OllamaOptions {
                temperature: self.config.temperature,
            },
        };

        let response = self
            .http_client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    anyhow::anyhow!("Request timed out after {}s", self.config.timeout_seconds)
                } else if e.is_connect() {
                    anyhow::anyhow!("Cannot connect to Ollama at {}", self.config.ollama_url)
                } else {
                    anyhow::anyhow!("Failed to send request: {}", e)
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("Ollama API error {}: {}", status, body));
        }

        let chat_response: OllamaChatResponse = response
            .json()
            .await
            .context("Failed to parse Ollama response")?;

        parse_report(&chat_response.message.content)
    }
}

/// Parse an insights report from model output, tolerating code fences and
/// surrounding prose.
fn parse_report(content: &str) -> Result<InsightsReport> {
    let start = content
        .find('{')
        .context("No JSON object in model response")?;
    let end = content
        .rfind('}')
        .context("No JSON object in model response")?;
    if end < start {
        // A stray '}' before the first '{' is not an object.
        anyhow::bail!("No JSON object in model response");
    }
    let json = &content[start..=end];

    serde_json::from_str(json).context("Model response did not match the insights schema")
}

fn dedup_truncate<T: Clone>(items: &[T], cap: usize, key: impl Fn(&T) -> String) -> Vec<T> {
    let mut seen: HashSet<String> = HashSet::new();
    items
        .iter()
        .filter(|item| seen.insert(key(item)))
        .take(cap)
        .cloned()
        .collect()
}

/// Bound the bundle for prompt serialization: at most `cap` entities per
/// slice, deduplicated by identity key, keeping each slice's ranking order.
pub fn truncate_for_prompt(bundle: &MetricsBundle, cap: usize) -> MetricsBundle {
    let campaign_key = |c: &crate::models::CampaignMetrics| {
        c.campaign_id
            .clone()
            .or_else(|| c.campaign_name.clone())
            .unwrap_or_default()
    };
    let term_key = |t: &crate::models::SearchTermMetrics| t.search_term.clone();
    let product_key = |p: &crate::models::ProductMetrics| {
        format!(
            "{}/{}",
            p.asin.as_deref().unwrap_or(""),
            p.sku.as_deref().unwrap_or("")
        )
    };

    MetricsBundle {
        report_metadata: bundle.report_metadata.clone(),
        account_summary: bundle.account_summary.clone(),

        top_campaigns_by_spend: dedup_truncate(&bundle.top_campaigns_by_spend, cap, campaign_key),
        top_campaigns_by_roas: dedup_truncate(&bundle.top_campaigns_by_roas, cap, campaign_key),
        bottom_campaigns_by_roas: dedup_truncate(
            &bundle.bottom_campaigns_by_roas,
            cap,
            campaign_key,
        ),

        top_search_terms_by_spend: dedup_truncate(&bundle.top_search_terms_by_spend, cap, term_key),
        top_search_terms_by_roas: dedup_truncate(&bundle.top_search_terms_by_roas, cap, term_key),

        top_products_by_spend: dedup_truncate(&bundle.top_products_by_spend, cap, product_key),
        top_products_by_roas: dedup_truncate(&bundle.top_products_by_roas, cap, product_key),
        bottom_products_by_roas: dedup_truncate(&bundle.bottom_products_by_roas, cap, product_key),
    }
}

/// Deterministic placeholder report derived directly from the bundle.
///
/// Used whenever the model call fails or mock mode is on; the summary text
/// explicitly flags the fallback so downstream consumers can tell it apart
/// from a real model response.
pub fn fallback_report(bundle: &MetricsBundle) -> InsightsReport {
    let summary = &bundle.account_summary;
    let base = &summary.base;

    InsightsReport {
        performance_overview: PerformanceOverview {
            account_summary: summary.clone(),
            key_trends: vec![
                format!(
                    "Account spend {:.2} generated sales {:.2} (ROAS {:.2})",
                    base.spend, base.sales, base.roas
                ),
                format!(
                    "{} impressions and {} clicks (CTR {:.4})",
                    base.impressions, base.clicks, base.ctr
                ),
                format!(
                    "{} campaigns, {} products, {} search terms in scope",
                    summary.total_campaigns, summary.total_products, summary.total_search_terms
                ),
            ],
            strategic_theme: Some("Fallback report: metrics echo only".to_string()),
        },
        campaign_insights: Default::default(),
        search_term_actions: Default::default(),
        product_insights: Default::default(),
        budget_reallocation: Vec::new(),
        priority_actions: vec![
            "Re-run with a reachable reasoning model to obtain qualitative insights".to_string(),
        ],
        risk_flags: vec![
            "Insights were generated in fallback/mock mode without a model call".to_string(),
        ],
        natural_language_summary: format!(
            "[FALLBACK/MOCK MODE] No model-generated insights are available. \
             Account totals: spend {:.2}, sales {:.2}, {} orders, ROAS {:.2}, ACOS {:.2}.",
            base.spend, base.sales, base.orders, base.roas, base.acos
        ),
    }
}

/// System prompt for the insights call.
const INSIGHTS_SYSTEM_PROMPT: &str = r#"You are a Senior Amazon Ads Strategist. Analyze the metrics below and return structured JSON.

Your analysis MUST include:
1. performance_overview with key_trends, strategic_theme, and the account_summary (copy it verbatim).
2. campaign_insights: classify into scale_candidates, optimization_needed, pause_candidates.
3. search_term_actions: increase_bids vs add_negative_keywords.
4. product_insights: hero_products vs budget_drainers.
5. budget_reallocation, priority_actions, risk_flags (string lists).
6. natural_language_summary (executive narrative).

Rules:
- Ground every insight in the provided metrics. Do NOT invent numbers.
- Be concise. Each rationale/reason should be 1-2 sentences max.
- Return ONLY valid JSON matching the insights report schema."#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BaseMetrics, CampaignMetrics};

    fn bundle_with_summary() -> MetricsBundle {
        let mut bundle = MetricsBundle::default();
        bundle.account_summary.base = BaseMetrics::from_totals(100.0, 250.0, 10, 5000, 200);
        bundle.account_summary.total_campaigns = 4;
        bundle
    }

    #[test]
    fn test_fallback_report_is_marked() {
        let report = fallback_report(&bundle_with_summary());
        assert!(report.natural_language_summary.contains("FALLBACK"));
        assert!(!report.risk_flags.is_empty());
        assert_eq!(
            report.performance_overview.account_summary.total_campaigns,
            4
        );
    }

    #[test]
    fn test_parse_report_plain_json() {
        let content = r#"{"natural_language_summary": "All good."}"#;
        let report = parse_report(content).unwrap();
        assert_eq!(report.natural_language_summary, "All good.");
    }

    #[test]
    fn test_parse_report_fenced_json() {
        let content = "Here is the report:\n```json\n{\"natural_language_summary\": \"ok\"}\n```";
        let report = parse_report(content).unwrap();
        assert_eq!(report.natural_language_summary, "ok");
    }

    #[test]
    fn test_parse_report_rejects_non_json() {
        assert!(parse_report("no structured data here").is_err());
        assert!(parse_report("{\"wrong_field\": 1}").is_err());
    }

    #[test]
    fn test_parse_report_rejects_reversed_braces() {
        // A '}' preceding the first '{' must be an error, not a panic.
        assert!(parse_report("} not a json object {").is_err());
        assert!(parse_report("}{").is_err());
    }

    #[test]
    fn test_truncate_for_prompt_dedups_and_caps() {
        let mut bundle = MetricsBundle::default();
        for i in 0..6 {
            let id = if i < 2 {
                "C1".to_string()
            } else {
                format!("C{i}")
            };
            bundle.top_campaigns_by_spend.push(CampaignMetrics {
                base: BaseMetrics::from_totals(10.0 - i as f64, 0.0, 0, 100, 1),
                campaign_id: Some(id),
                campaign_name: None,
                campaign_type: None,
            });
        }

        let compact = truncate_for_prompt(&bundle, 3);
        // Duplicate C1 collapses, then the cap applies, preserving order.
        let ids: Vec<_> = compact
            .top_campaigns_by_spend
            .iter()
            .map(|c| c.campaign_id.clone().unwrap())
            .collect();
        assert_eq!(ids, vec!["C1", "C2", "C3"]);
    }

    #[tokio::test]
    async fn test_generate_in_mock_mode_uses_fallback() {
        let agent = InsightsAgent::new(InsightsConfig {
            mock_mode: true,
            ..Default::default()
        });
        let report = agent.generate(&bundle_with_summary()).await;
        assert!(report.natural_language_summary.contains("FALLBACK"));
    }

    #[tokio::test]
    async fn test_generate_unreachable_endpoint_falls_back() {
        let agent = InsightsAgent::new(InsightsConfig {
            ollama_url: "http://127.0.0.1:1".to_string(),
            timeout_seconds: 1,
            ..Default::default()
        });
        let report = agent.generate(&bundle_with_summary()).await;
        assert!(report.natural_language_summary.contains("FALLBACK"));
    }
}
