//! Command handlers for CLI operations
//!
//! - run: execute one goal and print the answer
//! - batch: execute a batch request file and print `{results, summary}`
//! - outcomes: list stored outcome statistics
//! - strategies: list context strategies in priority order
//! - config show / path

use anyhow::{Context, Result};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::conductor::{
    BatchOrchestrator, BatchRequest, EngineContext, ExecutionOverrides, FeedbackReport, Goal,
    GoalOutcome, OutcomeFeedbackBinder, OutcomeKeys, SubGoalOrchestrator,
};
use crate::config::Config;
use crate::db::Database;
use crate::judge::LlmJudge;
use crate::llm::{LLMProvider, OllamaProvider, OpenAIProvider};
use crate::outcomes::{EntityKind, OutcomeMemoryStore, OutcomeRecord};
use crate::planner::LlmPlanner;
use crate::strategy::StrategyRegistry;
use crate::summarizer::LlmSummarizer;
use crate::surface::HttpSurfaceDriver;

/// Output format for command results
#[derive(Debug, Clone, Copy)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for machine consumption
    Json,
}

/// Everything a run needs, wired from config
pub struct Engine {
    pub context: EngineContext,
    pub feedback: OutcomeFeedbackBinder,
    pub database: Database,
}

/// Provider selected by `llm.provider`
pub fn build_provider(config: &Config) -> Result<Arc<dyn LLMProvider>> {
    let provider: Arc<dyn LLMProvider> = match config.llm.provider.as_str() {
        "ollama" => Arc::new(OllamaProvider::new(
            config.llm.ollama.base_url.clone(),
            config.llm.ollama.model.clone(),
        )),
        "openai" => Arc::new(OpenAIProvider::from_env(
            config.llm.openai.base_url.clone(),
            config.llm.openai.model.clone(),
            &config.llm.openai.api_key_env,
        )),
        other => anyhow::bail!("Unsupported LLM provider: {}", other),
    };
    Ok(provider)
}

/// Wire the surface, LLM collaborators, strategies and outcome store
pub async fn build_engine(config: &Config) -> Result<Engine> {
    let llm = build_provider(config)?;
    info!("Using LLM provider {} ({})", llm.name(), llm.model());

    let registry = config
        .engine
        .registry()
        .context("Invalid strategy configuration")?;

    let context = EngineContext::new(
        Arc::new(HttpSurfaceDriver::new(config.surface.base_url.clone())),
        Arc::new(LlmPlanner::new(Arc::clone(&llm))),
        Arc::new(LlmSummarizer::new(Arc::clone(&llm))),
        Arc::new(registry),
    )
    .with_limits(config.engine.limits());

    let database = Database::new(&config.database_path())
        .await
        .context("Failed to open database")?;
    let store = Arc::new(OutcomeMemoryStore::new(database.outcomes()));
    let feedback = OutcomeFeedbackBinder::new(Arc::new(LlmJudge::new(llm)), store)
        .with_judge_timeout(config.engine.judge_timeout())
        .with_regression_threshold(config.engine.regression_threshold);

    Ok(Engine {
        context,
        feedback,
        database,
    })
}

/// Execute one goal
pub async fn handle_run(
    goal: String,
    overrides: ExecutionOverrides,
    no_feedback: bool,
    config: &Config,
    format: OutputFormat,
) -> Result<()> {
    let engine = build_engine(config).await?;

    let outcome = SubGoalOrchestrator::new(&engine.context)
        .run_goal(&Goal::new(goal), &overrides)
        .await
        .context("Goal could not be started")?;

    let report = if no_feedback {
        None
    } else {
        let registry = engine
            .context
            .registry_for(overrides.strategies.as_deref())
            .context("Invalid strategy selection")?;
        let keys = OutcomeKeys::for_outcome(&outcome, &registry);
        Some(
            engine
                .feedback
                .bind(&outcome, &keys)
                .await
                .context("Failed to record outcome")?,
        )
    };

    match format {
        OutputFormat::Text => print_outcome(&outcome, report.as_ref()),
        OutputFormat::Json => {
            let output = json!({
                "outcome": outcome,
                "evaluation": report.as_ref().map(|r| &r.evaluation),
                "regressions": report.as_ref().map(|r| &r.regressions),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    engine.database.close().await?;
    Ok(())
}

fn print_outcome(outcome: &GoalOutcome, report: Option<&FeedbackReport>) {
    println!("Goal: {}", outcome.goal);
    println!(
        "  Status: {}",
        if outcome.succeeded() { "completed" } else { "failed" }
    );
    if let Some(error) = outcome.trace.first_error() {
        println!("  Error: {}", error);
    }
    println!(
        "  Steps: {} across {} sub-goal(s), {} planner call(s), {}ms",
        outcome.metrics.steps,
        outcome.metrics.sub_goals,
        outcome.metrics.planner_calls,
        outcome.metrics.elapsed_ms
    );
    println!();

    if outcome.answer.is_empty() {
        println!("(no answer)");
    } else {
        println!("{}", outcome.answer);
    }

    if !outcome.sources.is_empty() {
        println!();
        println!("Sources:");
        for source in &outcome.sources {
            if source.title.is_empty() {
                println!("  {}", source.url);
            } else {
                println!("  {} ({})", source.title, source.url);
            }
        }
    }

    if let Some(report) = report {
        println!();
        match report.evaluation.global_score {
            Some(score) => println!("Score: {:.2}", score),
            None => println!("Score: n/a"),
        }
        for regression in &report.regressions {
            println!(
                "  Regression on {} '{}': {:.2} -> {:.2} ({:+.2})",
                regression.kind,
                regression.key,
                regression.flag.previous_score,
                regression.flag.current_score,
                regression.flag.delta
            );
        }
    }
}

/// Read a batch request file
pub fn load_batch_request(path: &Path) -> Result<BatchRequest> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read batch file {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("Invalid batch request in {}", path.display()))
}

/// Execute a batch request file; always prints the `{results, summary}` shape
pub async fn handle_batch(
    file: &Path,
    no_feedback: bool,
    config: &Config,
    format: OutputFormat,
) -> Result<()> {
    let request = load_batch_request(file)?;
    let engine = build_engine(config).await?;

    let mut orchestrator = BatchOrchestrator::new(&engine.context)
        .with_max_consecutive_failures(config.engine.max_consecutive_failures);
    if !no_feedback {
        orchestrator = orchestrator.with_feedback(&engine.feedback);
    }
    let result = orchestrator.run(&request).await;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        OutputFormat::Text => {
            for item in &result.results {
                let status = if item.success { "ok" } else { "FAILED" };
                println!("[{}] {}: {}", status, item.id, item.goal);
                if let Some(error) = &item.error {
                    println!("    error: {}", error);
                }
                for regression in &item.regressions {
                    println!(
                        "    regression on {} '{}' ({:+.2})",
                        regression.kind, regression.key, regression.flag.delta
                    );
                }
            }
            let summary = &result.summary;
            println!();
            println!(
                "{} total, {} succeeded, {} failed ({:.0}%), aborted={}, threshold={}, {}ms",
                summary.total,
                summary.succeeded,
                summary.failed,
                summary.failure_ratio * 100.0,
                summary.aborted,
                summary.max_consecutive_failures,
                summary.elapsed_ms
            );
        }
    }

    engine.database.close().await?;
    Ok(())
}

/// Show stored outcome statistics for one entity kind
pub async fn handle_outcomes(
    kind: EntityKind,
    key: Option<String>,
    config: &Config,
    format: OutputFormat,
) -> Result<()> {
    let database = Database::new(&config.database_path())
        .await
        .context("Failed to open database")?;
    let store = OutcomeMemoryStore::new(database.outcomes());

    let records = match key {
        Some(key) => store.get(kind, &key).await?.into_iter().collect(),
        None => store.list(kind).await?,
    };

    match format {
        OutputFormat::Json => {
            let output = json!({
                "kind": kind,
                "records": records,
                "count": records.len(),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Text => {
            if records.is_empty() {
                println!("No {} outcomes recorded", kind);
            }
            for record in &records {
                print_record(record);
            }
        }
    }

    database.close().await?;
    Ok(())
}

fn print_record(record: &OutcomeRecord) {
    let fmt_score = |score: Option<f64>| {
        score
            .map(|s| format!("{:.2}", s))
            .unwrap_or_else(|| "-".to_string())
    };

    println!("{} ({})", record.key, record.kind);
    println!(
        "  last {}  best {}  worst {}  mean {}  runs {}",
        fmt_score(record.last_score),
        fmt_score(record.best_score),
        fmt_score(record.worst_score),
        fmt_score(record.mean_score),
        record.run_count
    );
    let updated = chrono::DateTime::from_timestamp(record.updated_at, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "Unknown".to_string());
    println!("  updated {}", updated);
    for issue in &record.issues {
        println!("  - {}", issue);
    }
    println!();
}

/// List context strategies in priority order
pub fn handle_strategies(config: &Config, format: OutputFormat) -> Result<()> {
    let builtin = StrategyRegistry::builtin();
    let enabled = config.engine.registry()?;

    match format {
        OutputFormat::Json => {
            let strategies: Vec<_> = builtin
                .names()
                .into_iter()
                .enumerate()
                .map(|(priority, name)| {
                    json!({
                        "name": name,
                        "priority": priority,
                        "enabled": enabled.names().contains(&name),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&json!({ "strategies": strategies }))?);
        }
        OutputFormat::Text => {
            for (priority, name) in builtin.names().into_iter().enumerate() {
                let marker = if enabled.names().contains(&name) { "*" } else { " " };
                println!("{} {}. {}", marker, priority + 1, name);
            }
        }
    }
    Ok(())
}

/// Show current configuration
pub fn handle_config_show(config: &Config, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(config)?),
        OutputFormat::Text => println!("{}", toml::to_string_pretty(config)?),
    }
    Ok(())
}
