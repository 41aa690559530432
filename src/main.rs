//! AdSight - Amazon Ads Performance Analyzer
//!
//! A CLI tool that aggregates Sponsored Display and Sponsored Brands
//! report exports into a deterministic metrics bundle, then asks a local
//! Ollama model for structured insights and recommendations.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (bad arguments, config, data load, workflow failure)

mod cli;
mod config;
mod data;
mod insights;
mod metrics;
mod models;
mod report;
mod workflow;

use anyhow::{Context, Result};
use cli::Args;
use config::Config;
use data::DatasetCatalog;
use insights::{InsightsAgent, InsightsConfig};
use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;
use workflow::{WorkflowRunner, WorkflowState};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Initialize logging
    init_logging(&args);

    info!("AdSight v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    // Run the analysis
    match run_analysis(args).await {
        Ok(()) => Ok(()),
        Err(e) => {
            error!("Analysis failed: {}", e);
            eprintln!("\n❌ Error: {}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .adsight.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(".adsight.toml");

    if path.exists() {
        eprintln!("⚠️  .adsight.toml already exists. Remove it first or edit it manually.");
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).context("Failed to write .adsight.toml")?;

    println!("✅ Created .adsight.toml with default settings.");
    println!("   Edit it to customize model, data files, and report output.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Run the complete analysis workflow.
async fn run_analysis(args: Args) -> Result<()> {
    let start_time = Instant::now();

    // Load configuration
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    // Dates were validated with the rest of the arguments.
    let start_date = args.parsed_start_date().ok().flatten();
    let end_date = args.parsed_end_date().ok().flatten();

    // Step 1: Register the datasets
    println!("📂 Data directory: {}", config.data.data_dir.display());
    let catalog = DatasetCatalog::standard(
        &config.data.data_dir,
        &config.data.sponsored_display_file,
        &config.data.sponsored_brands_file,
    );
    info!("Registered datasets: {:?}", catalog.dataset_names());

    // Step 2: Initialize the insights agent
    if config.model.mock_mode {
        println!("🤖 Mock mode: no model calls will be made.");
    } else {
        println!("🤖 Initializing insights agent...");
        println!("   Model: {}", config.model.name);
        println!("   Ollama: {}", config.model.ollama_url);
        println!("   Timeout: {}s", config.model.timeout_seconds);
    }

    let agent = InsightsAgent::new(InsightsConfig {
        ollama_url: config.model.ollama_url.clone(),
        model_name: config.model.name.clone(),
        temperature: config.model.temperature,
        timeout_seconds: config.model.timeout_seconds,
        mock_mode: config.model.mock_mode,
    });

    // Step 3: Drive the workflow to completion
    println!("\n🔬 Running analysis workflow...\n");
    let initial_state = WorkflowState::new(args.request.clone(), start_date, end_date);

    let mut runner = WorkflowRunner::new(catalog, agent, config.report.top_n);
    let final_state = runner.run(initial_state).await?;

    let duration = start_time.elapsed().as_secs_f64();

    // Step 4: Persist the metrics bundle
    match &final_state.metrics_bundle {
        Some(bundle) => {
            let json = serde_json::to_string_pretty(bundle)
                .context("Failed to serialize metrics bundle")?;
            std::fs::write(&config.report.output, json).with_context(|| {
                format!(
                    "Failed to write metrics bundle to {}",
                    config.report.output.display()
                )
            })?;
            println!(
                "📊 Metrics bundle saved to: {}",
                config.report.output.display()
            );
        }
        None => warn!("Workflow finished without a metrics bundle"),
    }

    // Step 5: Print the insights report
    match &final_state.insights_report {
        Some(insights_report) => {
            println!("\n{}", report::render_insights(insights_report));
        }
        None => warn!("Workflow finished without an insights report"),
    }

    println!("✅ Analysis complete in {:.1}s", duration);

    Ok(())
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from .adsight.toml");
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}
