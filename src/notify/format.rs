//! Progress formatting - renders stage state and error detail into a notification

use crate::core::{CommandError, DeployError, DeployStage, TaskOutcome, TaskProgress};
use crate::notify::{Attachment, NotificationPayload};

/// Characters of stdout kept in error details (the tail)
pub const STDOUT_LIMIT: usize = 500;

/// Characters of stderr / generic error text kept in error details (the tail)
pub const ERROR_TEXT_LIMIT: usize = 1000;

const STAGE_COMPLETE: &str = ":white_check_mark:";
const STAGE_FAILED: &str = ":x:";
const STAGE_WITHHELD: &str = ":double_vertical_bar:";

const GROUP_FAILED: &str = ":small_red_triangle_down:";
const GROUP_COMPLETE: &str = ":black_small_square:";
const GROUP_PENDING: &str = ":white_small_square:";

/// Rendering state of one stage line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageMark {
    Complete,
    Failed,
    Withheld,
}

impl StageMark {
    fn glyph(self) -> &'static str {
        match self {
            StageMark::Complete => STAGE_COMPLETE,
            StageMark::Failed => STAGE_FAILED,
            StageMark::Withheld => STAGE_WITHHELD,
        }
    }
}

/// Builds notification payloads from stage progress
#[derive(Debug, Clone)]
pub struct ProgressFormatter {
    title: String,
}

impl ProgressFormatter {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
        }
    }

    /// Mark each stage: complete before `current`, failed at `current` when
    /// there is an error, withheld after it. Without an error all are complete.
    pub fn marks(
        stages: &[DeployStage],
        current: DeployStage,
        failed: bool,
    ) -> Vec<(DeployStage, StageMark)> {
        let mut seen_failure = false;
        stages
            .iter()
            .map(|&stage| {
                let mark = if failed && stage == current {
                    seen_failure = true;
                    StageMark::Failed
                } else if seen_failure {
                    StageMark::Withheld
                } else {
                    StageMark::Complete
                };
                (stage, mark)
            })
            .collect()
    }

    /// Render `(text, stages, current, error)` into a payload
    pub fn format(
        &self,
        text: &str,
        stages: &[DeployStage],
        current: DeployStage,
        error: Option<&DeployError>,
    ) -> NotificationPayload {
        let progress = Self::marks(stages, current, error.is_some())
            .into_iter()
            .map(|(stage, mark)| format!("{} {}", mark.glyph(), stage))
            .collect::<Vec<_>>()
            .join("\n");

        let mut attachments = vec![Attachment {
            pretext: Some(text.to_string()),
            color: if error.is_some() { "danger" } else { "good" }.to_string(),
            title: self.title.clone(),
            text: progress,
            mrkdwn_in: Vec::new(),
        }];

        if let Some(error) = error {
            attachments.push(Attachment {
                pretext: None,
                color: "warning".to_string(),
                title: "Error details".to_string(),
                text: format_error(error),
                mrkdwn_in: vec!["text".to_string()],
            });
        }

        NotificationPayload {
            attachments,
            ..Default::default()
        }
    }
}

/// Render error detail as markdown
pub fn format_error(error: &DeployError) -> String {
    match error {
        DeployError::Command(cmd) => format_command_error(cmd),
        DeployError::Tasks(aggregate) => format_task_progress(&aggregate.progress),
        other => format!(
            "UNEXPECTED ERROR:\n```{}```",
            tail_chars(&other.to_string(), ERROR_TEXT_LIMIT)
        ),
    }
}

fn format_command_error(cmd: &CommandError) -> String {
    let blocks = format!(
        "```STDOUT:\n{}```\n```STDERR:\n{}```",
        tail_chars(&cmd.stdout, STDOUT_LIMIT),
        tail_chars(&cmd.stderr, ERROR_TEXT_LIMIT)
    );
    match cmd.exit_code {
        Some(code) => format!("`[{}] {}`\n>{}", code, cmd.command, blocks),
        None => format!(
            "`{}` {}\n{}",
            cmd.command,
            tail_chars(&cmd.message, ERROR_TEXT_LIMIT),
            blocks
        ),
    }
}

fn format_task_progress(progress: &TaskProgress) -> String {
    progress
        .iter()
        .map(|(group, outcome)| {
            let line = format!("{} {}", group_glyph(outcome), group);
            match &outcome.error {
                Some(error) => format!("{}\n{}", line, format_error(error)),
                None => line,
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn group_glyph(outcome: &TaskOutcome) -> &'static str {
    if outcome.error.is_some() {
        GROUP_FAILED
    } else if outcome.done {
        GROUP_COMPLETE
    } else {
        GROUP_PENDING
    }
}

/// Last `limit` characters of `s`
pub fn tail_chars(s: &str, limit: usize) -> &str {
    let count = s.chars().count();
    if count <= limit {
        return s;
    }
    let start = s
        .char_indices()
        .nth(count - limit)
        .map_or(0, |(idx, _)| idx);
    &s[start..]
}
