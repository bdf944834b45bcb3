//! CLI output formatting

use crate::{
    core::{JobResult, JobStatus, PipelineResult, PipelineStatus, StepStatus},
    execution::ExecutionEvent,
    persistence::RunSummary,
};
use console::{Emoji, StyledObject};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "! ");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");
pub static SKIP: Emoji<'_, '_> = Emoji("⏭️  ", "- ");

/// Lines of captured output shown for a failed step
const FAILURE_OUTPUT_LINES: usize = 20;

/// Width of the status column in the final report
const STATUS_WIDTH: usize = 10;

/// Create a progress bar
pub fn create_progress_bar(total: usize) -> ProgressBar {
    let progress = ProgressBar::new(total as u64);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    progress.set_style(style);
    progress.enable_steady_tick(Duration::from_millis(100));
    progress
}

/// Format a job's terminal status; tolerated failures are distinct from both
/// success and hard failure
pub fn format_job_status(result: &JobResult) -> String {
    style_job_status(result, job_status_label(result)).to_string()
}

fn job_status_label(result: &JobResult) -> &'static str {
    match (result.status, result.tolerated) {
        (JobStatus::Success, _) => "SUCCESS",
        (JobStatus::Failed, true) => "TOLERATED",
        (JobStatus::Failed, false) => "FAILED",
        (JobStatus::Cancelled, _) => "CANCELLED",
    }
}

fn style_job_status<D>(result: &JobResult, text: D) -> StyledObject<D> {
    match (result.status, result.tolerated) {
        (JobStatus::Success, _) => style(text).green(),
        (JobStatus::Failed, true) => style(text).yellow(),
        (JobStatus::Failed, false) => style(text).red(),
        (JobStatus::Cancelled, _) => style(text).dim(),
    }
}

/// Status padded to the report column, then styled
fn job_status_cell(result: &JobResult) -> StyledObject<String> {
    let label = format!("{:<width$}", job_status_label(result), width = STATUS_WIDTH);
    style_job_status(result, label)
}

fn job_icon(result: &JobResult) -> Emoji<'static, 'static> {
    match (result.status, result.tolerated) {
        (JobStatus::Success, _) => CHECK,
        (JobStatus::Failed, true) => WARN,
        (JobStatus::Failed, false) => CROSS,
        (JobStatus::Cancelled, _) => SKIP,
    }
}

/// Format a pipeline status for display
pub fn format_status(status: PipelineStatus) -> String {
    match status {
        PipelineStatus::Success => style("SUCCESS").green().to_string(),
        PipelineStatus::Failed => style("FAILED").red().to_string(),
    }
}

/// Format an execution event for display
pub fn format_execution_event(event: &ExecutionEvent) -> String {
    match event {
        ExecutionEvent::PipelineStarted { group, total_jobs } => format!(
            "{} Starting group {} ({} jobs)",
            ROCKET,
            style(group).bold(),
            total_jobs
        ),
        ExecutionEvent::JobStarted { job } => format!("{} {}", SPINNER, style(job.name()).cyan()),
        ExecutionEvent::StepFinished { job, outcome } => {
            let step = format!("{} / {}", job.name(), outcome.step);
            match outcome.status {
                StepStatus::Succeeded => format!("  {} {}", CHECK, style(step).dim()),
                StepStatus::Failed => match outcome.exit_code {
                    Some(code) => format!("  {} {} (exit {})", CROSS, style(step).red(), code),
                    None => format!(
                        "  {} {}: {}",
                        CROSS,
                        style(step).red(),
                        style(outcome.detail.as_deref().unwrap_or("")).dim()
                    ),
                },
                StepStatus::Skipped => format!(
                    "  {} {} ({})",
                    SKIP,
                    style(step).dim(),
                    outcome.detail.as_deref().unwrap_or("skipped")
                ),
            }
        }
        ExecutionEvent::JobFinished { result } => format!(
            "{} {} {}",
            job_icon(result),
            style(result.spec.name()).bold(),
            format_job_status(result)
        ),
        ExecutionEvent::JobCancelled { job } => format!(
            "{} {} {}",
            SKIP,
            style(job.name()).dim(),
            style("cancelled (fail-fast)").dim()
        ),
        ExecutionEvent::CoverageUploaded { job, report } => format!(
            "{} {} uploaded {}",
            INFO,
            style(job.name()).cyan(),
            style(report).dim()
        ),
        ExecutionEvent::CoverageUploadFailed { job, error, fatal } => {
            let severity = if *fatal {
                style("fatal").red().to_string()
            } else {
                style("ignored").yellow().to_string()
            };
            format!(
                "{} {} coverage upload failed ({}): {}",
                WARN,
                style(job.name()).yellow(),
                severity,
                style(error).dim()
            )
        }
        ExecutionEvent::PipelineCompleted { run_id, group, status } => format!(
            "{} Group {} ({}) {}",
            INFO,
            style(group).bold(),
            style(short_id(&run_id.to_string())).dim(),
            format_status(*status)
        ),
    }
}

/// Final report: every job's status, and the first failing step's output for
/// failed jobs
pub fn format_pipeline_report(result: &PipelineResult) -> String {
    let mut lines = vec![format!(
        "{} {} {}",
        style("Group").bold(),
        style(&result.group).bold().cyan(),
        format_status(result.status)
    )];

    for job in &result.jobs {
        lines.push(format!(
            "  {}{} {}",
            job_icon(job),
            job_status_cell(job),
            job.spec.name()
        ));

        if job.status == JobStatus::Failed {
            if let Some(step) = job.first_failure() {
                let reason = match (step.exit_code, &step.detail) {
                    (Some(code), _) => format!("exit code {}", code),
                    (None, Some(detail)) => detail.clone(),
                    (None, None) => "failed".to_string(),
                };
                lines.push(format!(
                    "      step {} failed: {}",
                    style(&step.step).red(),
                    reason
                ));

                let captured = [step.stdout.trim_end(), step.stderr.trim_end()]
                    .iter()
                    .filter(|s| !s.is_empty())
                    .cloned()
                    .collect::<Vec<_>>()
                    .join("\n");
                if !captured.is_empty() {
                    for line in format_output(&captured, FAILURE_OUTPUT_LINES).lines() {
                        lines.push(format!("      {}", style(line).dim()));
                    }
                }
            }
        }

        if let Some(coverage) = &job.coverage {
            if let Some(error) = &coverage.error {
                lines.push(format!("      coverage upload failed: {}", style(error).yellow()));
            }
        }
    }

    lines.push(format!(
        "  {} succeeded, {} failed, {} tolerated, {} cancelled",
        style(result.succeeded()).green(),
        style(result.failed()).red(),
        style(result.tolerated()).yellow(),
        style(result.cancelled()).dim()
    ));

    lines.join("\n")
}

/// Format a run summary for display
pub fn format_run_summary(summary: &RunSummary) -> String {
    let status_icon = match summary.status {
        PipelineStatus::Success => CHECK,
        PipelineStatus::Failed => CROSS,
    };

    format!(
        "{} {} - {} / {} - {} ({}/{} ok, {} tolerated, {} cancelled) - {}",
        status_icon,
        style(short_id(&summary.run_id.to_string())).dim(),
        style(&summary.workflow).bold(),
        summary.group,
        format_status(summary.status),
        summary.succeeded,
        summary.total,
        summary.tolerated,
        summary.cancelled,
        style(summary.started_at.format("%Y-%m-%d %H:%M:%S")).dim()
    )
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

/// Format step output with truncation
pub fn format_output(output: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = output.lines().collect();

    if lines.len() <= max_lines {
        output.to_string()
    } else {
        let truncated = lines[..max_lines].join("\n");
        format!(
            "{}\n{}... ({} more lines)",
            truncated,
            style("[truncated]").dim(),
            lines.len() - max_lines
        )
    }
}
