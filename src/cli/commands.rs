//! CLI command definitions

use clap::Args;

/// Poll the remote on the configured interval
#[derive(Debug, Args, Clone)]
pub struct WatchCommand {
    /// Override the poll interval in seconds
    #[arg(long)]
    pub interval: Option<u64>,
}

/// Run one tick and exit
#[derive(Debug, Args, Clone)]
pub struct OnceCommand {
    /// Deploy even when there are no new commits
    #[arg(long)]
    pub force: bool,
}

/// Validate a deploy configuration
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}
