// Wayfind goal execution engine
// Entry point for the wayfind binary

use clap::Parser;
use wayfind_engine::cli::{Cli, Command, ConfigAction};
use wayfind_engine::conductor::ExecutionOverrides;
use wayfind_engine::config::Config;
use wayfind_engine::handlers::{
    handle_batch, handle_config_show, handle_outcomes, handle_run, handle_strategies,
    OutputFormat,
};
use wayfind_engine::telemetry::init_telemetry_with_level;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration (or use custom path if provided)
    let config = if let Some(config_path) = &cli.config {
        Config::load_from_path(config_path)?
    } else {
        Config::load_or_create()?
    };

    // --log beats the config file; RUST_LOG beats both
    init_telemetry_with_level(cli.log.as_deref().unwrap_or(&config.core.log_level));

    let version = env!("CARGO_PKG_VERSION");
    let commit = env!("GIT_COMMIT_HASH");
    let timestamp = env!("BUILD_TIMESTAMP");
    tracing::info!("Wayfind v{} ({} - {})", version, commit, timestamp);

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };

    match cli.command {
        Command::Run {
            goal,
            max_steps,
            strategies,
            focus,
            no_feedback,
        } => {
            let overrides = ExecutionOverrides {
                max_steps,
                strategies: if strategies.is_empty() {
                    None
                } else {
                    Some(strategies)
                },
                focus_entity: focus,
            };
            handle_run(goal, overrides, no_feedback, &config, format).await
        }

        Command::Batch { file, no_feedback } => {
            tracing::info!("Running batch file {}", file.display());
            handle_batch(&file, no_feedback, &config, format).await
        }

        Command::Outcomes { kind, key } => handle_outcomes(kind, key, &config, format).await,

        Command::Strategies => handle_strategies(&config, format),

        Command::Config { action } => match action {
            ConfigAction::Show => handle_config_show(&config, format),
            ConfigAction::Path => {
                match &cli.config {
                    Some(path) => println!("{}", path.display()),
                    None => println!("{}", Config::default_config_path()?.display()),
                }
                Ok(())
            }
        },
    }
}
