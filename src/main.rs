use anyhow::{Context, Result};
use matrix_pipeline::cli::commands::{ExpandCommand, HistoryCommand, RunCommand, ValidateCommand};
use matrix_pipeline::cli::output::*;
use matrix_pipeline::cli::{exit_code, Cli, Command};
use matrix_pipeline::core::{JobGroup, PipelineResult, WorkflowConfig};
use matrix_pipeline::coverage::{CoverageReporter, CoverageUploader};
use matrix_pipeline::execution::{
    CommandExecutor, EventSink, ExecutionEvent, JobExecutor, JobRunner, PipelineOrchestrator, ProcessExecutor,
    StepSequencer,
};
use matrix_pipeline::persistence::{InMemoryPersistence, PersistenceBackend, RunSummary};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, warn, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging; RUST_LOG wins when set
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("Failed to set logging subscriber")?;

    match &cli.command {
        Command::Run(cmd) => run_workflow(cmd).await?,
        Command::Validate(cmd) => validate_workflow(cmd)?,
        Command::Expand(cmd) => expand_workflow(cmd)?,
        Command::History(cmd) => show_history(cmd).await?,
    }

    Ok(())
}

fn load_config(file: &str) -> Result<WorkflowConfig> {
    WorkflowConfig::from_file(file).with_context(|| format!("Failed to load workflow {}", file))
}

/// Groups named on the command line, or all of them in declaration order
fn select_groups(config: &WorkflowConfig, names: &[String]) -> Result<Vec<JobGroup>> {
    if names.is_empty() {
        return Ok(config.job_groups()?);
    }
    names
        .iter()
        .map(|name| config.job_group(name).map_err(Into::into))
        .collect()
}

/// History store for `run`; failing to open it only costs the history
async fn run_history(no_history: bool) -> Arc<dyn PersistenceBackend> {
    if no_history {
        return Arc::new(InMemoryPersistence::new());
    }

    #[cfg(feature = "sqlite")]
    let store = matrix_pipeline::persistence::SqliteRunStore::open_or_in_memory(
        &matrix_pipeline::persistence::SqliteRunStore::default_path(),
    )
    .await;

    #[cfg(not(feature = "sqlite"))]
    let store: Arc<dyn PersistenceBackend> = {
        warn!("Built without sqlite support; history is not kept");
        Arc::new(InMemoryPersistence::new())
    };

    store
}

async fn history_store() -> Result<Arc<dyn PersistenceBackend>> {
    #[cfg(feature = "sqlite")]
    let store: Arc<dyn PersistenceBackend> =
        Arc::new(matrix_pipeline::persistence::SqliteRunStore::with_default_path().await?);

    #[cfg(not(feature = "sqlite"))]
    let store: Arc<dyn PersistenceBackend> = Arc::new(InMemoryPersistence::new());

    Ok(store)
}

async fn run_workflow(cmd: &RunCommand) -> Result<()> {
    let config = load_config(&cmd.file)?;
    let groups = select_groups(&config, &cmd.group)?;

    let base_dir = match &cmd.workdir {
        Some(dir) => PathBuf::from(dir),
        None => std::env::current_dir().context("Failed to resolve current directory")?,
    };
    let executor: Arc<dyn CommandExecutor> = Arc::new(ProcessExecutor::new(base_dir.clone()));
    let store = run_history(cmd.no_history).await;

    if !cmd.json {
        println!("{} Loaded workflow: {}", INFO, style(&config.name).bold());
    }

    let mut results: Vec<PipelineResult> = Vec::with_capacity(groups.len());
    for group in &groups {
        let jobs = group.jobs()?;

        let progress = (!cmd.json).then(|| create_progress_bar(jobs.len()));
        let mut events = EventSink::new();
        if let Some(progress) = &progress {
            let progress = progress.clone();
            events = events.with_handler(move |event| {
                progress.println(format_execution_event(event));
                if matches!(
                    event,
                    ExecutionEvent::JobFinished { .. } | ExecutionEvent::JobCancelled { .. }
                ) {
                    progress.inc(1);
                }
            });
        }

        let sequencer = StepSequencer::new(executor.clone(), events.clone());
        let runner = JobRunner::new(sequencer, group.steps.clone());
        let job_executor: Arc<dyn JobExecutor> = match &group.coverage {
            Some(settings) => {
                let uploader: Arc<dyn CoverageUploader> = Arc::new(
                    settings
                        .upload
                        .http_uploader()
                        .context("Failed to create coverage uploader")?,
                );
                Arc::new(CoverageReporter::new(
                    runner,
                    settings.clone(),
                    uploader,
                    base_dir.clone(),
                    events.clone(),
                ))
            }
            None => Arc::new(runner),
        };

        let fail_fast = cmd.fail_fast_override().unwrap_or(group.fail_fast);
        let orchestrator = PipelineOrchestrator::new(job_executor, cmd.strategy(group.max_parallel), events);
        let result = orchestrator.run(&group.name, jobs, fail_fast).await;

        if let Some(progress) = progress {
            progress.finish_and_clear();
            println!("\n{}\n", format_pipeline_report(&result));
        }

        if let Err(e) = store.save_run(&RunSummary::from_result(&config.name, &result)).await {
            warn!("Failed to save run history: {:#}", e);
        }

        results.push(result);
    }

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    }

    let code = exit_code(&results);
    if code == 0 {
        if !cmd.json {
            println!(
                "{} {} completed {}",
                CHECK,
                style(&config.name).bold(),
                style("successfully").green()
            );
        }
        return Ok(());
    }

    let failed: Vec<&str> = results
        .iter()
        .filter(|r| !r.is_success())
        .map(|r| r.group.as_str())
        .collect();
    if !cmd.json {
        println!("{} {} {}", CROSS, style(&config.name).bold(), style("failed").red());
    }
    error!("Failed groups: {}", failed.join(", "));
    std::process::exit(code);
}

fn validate_workflow(cmd: &ValidateCommand) -> Result<()> {
    if !cmd.json {
        println!("{} Validating workflow...", INFO);
    }

    match WorkflowConfig::from_file(&cmd.file).and_then(|config| {
        let groups = config.job_groups()?;
        Ok((config, groups))
    }) {
        Ok((config, groups)) => {
            if cmd.json {
                println!("{}", serde_json::to_string_pretty(&config)?);
                return Ok(());
            }
            println!("{} Workflow configuration is valid!", CHECK);
            println!("  Name: {}", style(&config.name).bold());
            for group in &groups {
                let jobs = group.jobs()?;
                println!(
                    "  Group {}: {} jobs, {} steps{}",
                    style(&group.name).bold(),
                    style(jobs.len()).cyan(),
                    style(group.steps.len()).cyan(),
                    if group.is_coverage() { ", coverage" } else { "" }
                );
            }
            Ok(())
        }
        Err(e) => {
            if cmd.json {
                let data = serde_json::json!({ "valid": false, "error": e.to_string() });
                println!("{}", serde_json::to_string_pretty(&data)?);
            } else {
                println!("{} Validation failed:", CROSS);
                println!("  {}", style(e).red());
            }
            std::process::exit(1);
        }
    }
}

fn expand_workflow(cmd: &ExpandCommand) -> Result<()> {
    let config = load_config(&cmd.file)?;
    let groups = select_groups(&config, &cmd.group)?;

    let mut expanded = Vec::with_capacity(groups.len());
    for group in &groups {
        expanded.push((group.name.clone(), group.jobs()?));
    }

    if cmd.json {
        let data: serde_json::Map<String, serde_json::Value> = expanded
            .iter()
            .map(|(name, jobs)| -> Result<(String, serde_json::Value)> {
                Ok((name.clone(), serde_json::to_value(jobs)?))
            })
            .collect::<Result<_>>()?;
        println!("{}", serde_json::to_string_pretty(&data)?);
        return Ok(());
    }

    for (name, jobs) in &expanded {
        println!("{} {} ({} jobs)", INFO, style(name).bold(), jobs.len());
        for job in jobs {
            let marker = if job.soft_fail {
                style(" [soft-fail]").yellow().to_string()
            } else {
                String::new()
            };
            println!("  {:>3}. {}{}", job.index + 1, job.name(), marker);
        }
    }

    Ok(())
}

async fn show_history(cmd: &HistoryCommand) -> Result<()> {
    let store = history_store().await?;
    let runs = store.list_runs(cmd.workflow.as_deref(), cmd.limit).await?;

    if cmd.json {
        let data = serde_json::json!({ "runs": runs });
        println!("{}", serde_json::to_string_pretty(&data)?);
        return Ok(());
    }

    if runs.is_empty() {
        println!("{} No runs found", INFO);
        return Ok(());
    }

    println!("{} Run history (showing latest {}):", INFO, cmd.limit);
    for run in &runs {
        println!("  {}", format_run_summary(run));
    }

    Ok(())
}
