mod cli;
mod demo;
mod ui;

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use actionsm::ExecutorConfig;
use actionsm::config::{ActionsmConfig, parse_timeout};
use actionsm::inference::{InferenceClient, Predictor};
use actionsm::recognition::{ACTION_NAME, GenderGoal, gender_executor};
use cli::{Cli, Command};
use ui::ActionProgress;

fn init_tracing(verbose: bool) {
    let default = if verbose { "actionsm=debug" } else { "actionsm=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Config file values, overridden by CLI flags where given.
fn executor_config(cli: &Cli, config: &ActionsmConfig) -> Result<ExecutorConfig> {
    let mut executor = config.executor.to_executor_config()?;
    if let Some(secs) = cli.timeout {
        executor.timeout = parse_timeout(secs)?;
    }
    if let Some(attempts) = cli.max_recovery_attempts {
        executor.max_recovery_attempts = attempts;
    }
    Ok(executor)
}

fn read_goal(path: &Path) -> Result<GenderGoal> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read goal {}", path.display()))?;
    let goal: GenderGoal = serde_json::from_str(&contents)
        .with_context(|| format!("failed to parse goal {}", path.display()))?;
    goal.image.validate()?;
    Ok(goal)
}

async fn run(
    goal: &Path,
    endpoint: Option<String>,
    config: &ActionsmConfig,
    executor_config: ExecutorConfig,
) -> Result<ExitCode> {
    let goal = read_goal(goal)?;
    let mut recognition = config.recognition.clone();
    if let Some(endpoint) = endpoint {
        recognition.endpoint = endpoint;
    }

    let client = InferenceClient::new(&recognition.endpoint, &recognition.model)?;
    let progress = ActionProgress::start(ACTION_NAME);
    let mut executor = gender_executor(Arc::new(client), &recognition, executor_config)?
        .on_transition(progress.hook());

    let result = executor.execute(goal).await?;
    progress.complete(&result);
    progress.print_audit(&result.report);

    Ok(if result.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn status(config: &ActionsmConfig, executor_config: ExecutorConfig) -> Result<ExitCode> {
    let recognition = &config.recognition;
    println!("Executor:");
    println!("  timeout:               {:?}", executor_config.timeout);
    println!("  max recovery attempts: {}", executor_config.max_recovery_attempts);
    println!("Recognition:");
    println!("  endpoint:   {}", recognition.endpoint);
    println!("  model:      {}", recognition.model);
    println!("  labels:     {}", recognition.labels.join(", "));
    println!(
        "  input size: {}x{}",
        recognition.image_size[0], recognition.image_size[1]
    );

    let client = InferenceClient::new(&recognition.endpoint, &recognition.model)?;
    match client.model_status().await {
        Ok(status) => match status.available_version() {
            Some(v) => {
                println!("Model: version {} AVAILABLE", v.version);
                Ok(ExitCode::SUCCESS)
            }
            None => {
                println!("Model: unavailable ({})", status.describe_unavailable());
                Ok(ExitCode::FAILURE)
            }
        },
        Err(e) => {
            println!("Model: unreachable ({e})");
            Ok(ExitCode::FAILURE)
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match &cli.config {
        Some(path) => ActionsmConfig::load_from(path)?,
        None => ActionsmConfig::load()?,
    };
    let executor_config = executor_config(&cli, &config)?;

    match &cli.command {
        Command::Run { goal, endpoint } => {
            run(goal, endpoint.clone(), &config, executor_config).await
        }
        Command::Status => status(&config, executor_config).await,
        Command::Demo {
            fail_times,
            task_ms,
        } => demo::run(*fail_times, *task_ms, executor_config).await,
    }
}
