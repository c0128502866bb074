//! CLI output formatting

use crate::core::DeployStage;
use crate::execution::{ExecutionEvent, TickOutcome};
use console::Emoji;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "!");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");

/// Format a list of stages as `Build → Test → Deploy`
pub fn format_stages(stages: &[DeployStage]) -> String {
    stages
        .iter()
        .map(|stage| stage.name())
        .collect::<Vec<_>>()
        .join(" → ")
}

/// Format an execution event for display
pub fn format_execution_event(event: &ExecutionEvent) -> String {
    match event {
        ExecutionEvent::RunStarted {
            run_id,
            branch,
            stages,
        } => format!(
            "{} Deploying {} ({})\n   {}",
            ROCKET,
            style(branch).bold(),
            style(&run_id.to_string()[..8]).dim(),
            style(format_stages(stages)).dim()
        ),
        ExecutionEvent::StageStarted { stage } => {
            format!("{} {}", SPINNER, style(stage).cyan())
        }
        ExecutionEvent::StageCompleted { stage } => {
            format!("{} {}", CHECK, style(stage).green())
        }
        ExecutionEvent::StageFailed { stage, error } => {
            format!("{} {}: {}", CROSS, style(stage).red(), style(error).dim())
        }
        ExecutionEvent::PostTasksFailed { error } => {
            format!("{} {}: {}", WARN, style("Post Tasks").yellow(), style(error).dim())
        }
        ExecutionEvent::RunCompleted {
            run_id,
            success,
            elapsed_secs,
        } => {
            let status = if *success {
                format!("{} completed", style("successfully").green())
            } else {
                style("failed").red().to_string()
            };
            format!(
                "{} Deploy ({}) {} in {}",
                INFO,
                style(&run_id.to_string()[..8]).dim(),
                status,
                format_duration(*elapsed_secs)
            )
        }
    }
}

/// Summarise what a single tick did
pub fn format_tick(outcome: &TickOutcome) -> String {
    match outcome {
        TickOutcome::Skipped => format!("{} Deploy already in progress, nothing done", INFO),
        TickOutcome::UpToDate => format!("{} Already up to date", CHECK),
        TickOutcome::Deployed(result) if result.success => match result.post_tasks_succeeded {
            Some(false) => format!("{} Deployed, but post tasks {}", WARN, style("failed").yellow()),
            _ => format!("{} Deployed {}", CHECK, style("successfully").green()),
        },
        TickOutcome::Deployed(_) => format!("{} Deploy {}", CROSS, style("failed").red()),
    }
}

pub fn format_duration(secs: i64) -> String {
    let secs = secs.max(0);
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
