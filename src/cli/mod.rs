//! Command-line interface

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};
use commands::{OnceCommand, ValidateCommand, WatchCommand};
use std::ffi::OsString;
use std::path::PathBuf;

/// Continuous deployment agent for a single git repository
#[derive(Debug, Parser, Clone)]
#[command(name = "autodeploy")]
#[command(version)]
#[command(about = "Polls a git remote and deploys new commits", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to the deploy configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Poll the remote and deploy new commits until stopped
    Watch(WatchCommand),

    /// Run a single sync-and-deploy cycle
    Once(OnceCommand),

    /// Validate a deploy configuration
    Validate(ValidateCommand),
}

impl Cli {
    /// Parse CLI arguments from environment
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Parse CLI arguments from a slice
    pub fn try_parse_from<I, T>(itr: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(itr)
    }

    /// Explicit `--config`, else `<config dir>/autodeploy/config.yaml`
    pub fn config_path(&self) -> Option<PathBuf> {
        self.config
            .clone()
            .or_else(|| dirs::config_dir().map(|dir| dir.join("autodeploy").join("config.yaml")))
    }
}
