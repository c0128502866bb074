use anyhow::{Context, Result};
use autodeploy::cli::commands::{OnceCommand, ValidateCommand, WatchCommand};
use autodeploy::cli::output::*;
use autodeploy::cli::{Cli, Command};
use autodeploy::core::DeployStage;
use autodeploy::{
    DeployConfig, GitCli, LogNotifier, Notifier, PipelineRunner, PollScheduler,
    ShellCommandRunner, SlackNotifier,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging; RUST_LOG wins over --verbose
    let default_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.to_string()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to set logging subscriber: {}", e))?;

    let config_path = cli
        .config_path()
        .context("No --config given and no user config directory available")?;

    match &cli.command {
        Command::Watch(cmd) => watch(cmd, &config_path).await?,
        Command::Once(cmd) => once(cmd, &config_path).await?,
        Command::Validate(cmd) => validate(cmd, &config_path)?,
    }

    Ok(())
}

fn load_config(path: &Path) -> Result<Arc<DeployConfig>> {
    let config = DeployConfig::from_file(path).context("Failed to load deploy config")?;
    println!(
        "{} Loaded config: {} ({} → {})",
        INFO,
        style(path.display()).bold(),
        style(config.repository.path.display()).cyan(),
        style(config.deploy_path.display()).cyan()
    );
    if config.debug {
        println!("{} Debug mode: deploying on every tick, notifications only logged", WARN);
    }
    Ok(Arc::new(config))
}

fn build_scheduler(config: Arc<DeployConfig>) -> PollScheduler {
    let notifier: Arc<dyn Notifier> = match &config.notify.endpoint {
        Some(endpoint) => Arc::new(SlackNotifier::new(endpoint.clone())),
        None => Arc::new(LogNotifier),
    };

    let pipeline = PipelineRunner::new(
        Arc::clone(&config),
        Arc::new(ShellCommandRunner::new()),
        notifier,
    )
    .with_event_handler(|event| println!("{}", format_execution_event(&event)));

    let repo = GitCli::new(
        config.repository.path.clone(),
        config.repository.remote.clone(),
        config.repository.branch.clone(),
    );

    PollScheduler::new(&config, Arc::new(repo), Arc::new(pipeline))
}

async fn watch(cmd: &WatchCommand, config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    let mut scheduler = build_scheduler(Arc::clone(&config));
    let interval = match cmd.interval {
        Some(secs) => Duration::from_secs(secs),
        None => config.poll_interval(),
    };
    scheduler = scheduler.with_interval(interval);

    println!(
        "{} Watching {} on {}/{} every {}s",
        ROCKET,
        style(config.repository.path.display()).bold(),
        config.repository.remote,
        config.repository.branch,
        interval.as_secs()
    );

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    match scheduler.run_until(shutdown).await {
        Ok(()) => {
            info!("Stopped");
            Ok(())
        }
        Err(e) => {
            println!("{} {}", CROSS, style(&e).red());
            std::process::exit(1);
        }
    }
}

async fn once(cmd: &OnceCommand, config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    let scheduler = build_scheduler(config).with_force(cmd.force);

    let outcome = scheduler.tick().await.context("Repository sync failed")?;
    println!("\n{}", format_tick(&outcome));

    if let autodeploy::TickOutcome::Deployed(result) = &outcome {
        if !result.success {
            std::process::exit(1);
        }
    }
    Ok(())
}

fn validate(cmd: &ValidateCommand, config_path: &Path) -> Result<()> {
    println!("{} Validating {}...", INFO, style(config_path.display()).bold());

    match DeployConfig::from_file(config_path) {
        Ok(config) => {
            println!("{} Deploy configuration is valid!", CHECK);
            println!(
                "  Repository: {} ({}/{})",
                style(config.repository.path.display()).bold(),
                config.repository.remote,
                config.repository.branch
            );
            println!("  Deploy to: {}", style(config.deploy_path.display()).bold());
            println!(
                "  Stages: {}",
                style(format_stages(&DeployStage::planned(&config))).cyan()
            );
            println!(
                "  Build: {} group(s), {} command(s)",
                style(config.build.len()).cyan(),
                style(config.build.command_count()).cyan()
            );
            println!("  Poll interval: {}s", style(config.poll_secs).cyan());

            if cmd.json {
                let json = serde_json::to_string_pretty(&config)?;
                println!("\n{}", json);
            }
            Ok(())
        }
        Err(e) => {
            println!("{} Validation failed:", CROSS);
            println!("  {}", style(format!("{:#}", e)).red());
            std::process::exit(1);
        }
    }
}
