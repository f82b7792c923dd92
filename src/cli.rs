use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use sealwatch::config::ServiceConfig;
use sealwatch::error::SealwatchError;
use sealwatch::logging;
use sealwatch::node::NodeRegistry;
use sealwatch::signing::SignatureEngine;
use sealwatch::watcher::{CancellationToken, FileIntake, SigningPipeline, StopReason, WatchLoop};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(
    name = "sealwatch",
    about = "Validates and signs measurement files dropped by field devices"
)]
pub struct Cli {
    /// Path to the JSON configuration file. Defaults to the platform config directory.
    #[arg(long, global = true, env = "SEALWATCH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override the configured watch path
    #[arg(long, global = true)]
    pub watch_path: Option<PathBuf>,

    /// Re-verify every signature right after writing it
    #[arg(long, global = true)]
    pub force_validation: bool,

    /// Override the configured node type
    #[arg(long, global = true)]
    pub node_type: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Watch the incoming folder and sign every file that lands in it (default)
    Run,
    /// Validate and sign a single file in place
    Sign {
        /// File to sign; the signature is written to `<file>.sig`
        file: PathBuf,
    },
    /// Verify the detached signature of a file
    Verify {
        /// Signed file; its signature is read from `<file>.sig`
        file: PathBuf,
    },
    /// Print the checksum validation report of a file
    Check {
        /// Measurement file to check
        file: PathBuf,
    },
}

impl Cli {
    /// Load the configuration file and apply command-line overrides.
    fn load_config(&self) -> Result<ServiceConfig> {
        let path = match &self.config {
            Some(path) => path.clone(),
            None => ServiceConfig::default_path()?,
        };
        let mut config = ServiceConfig::load(&path)?;

        if let Some(watch_path) = &self.watch_path {
            config.watch_path.clone_from(watch_path);
        }
        if self.force_validation {
            config.force_validation = true;
        }
        if let Some(node_type) = &self.node_type {
            config.node_type.clone_from(node_type);
        }
        Ok(config)
    }
}

pub fn run_command(cli: Cli) -> Result<()> {
    let config = cli.load_config()?;
    logging::init(config.log_dir.as_deref())?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => handle_run(&config),
        Commands::Sign { file } => handle_sign(&config, &file),
        Commands::Verify { file } => handle_verify(&config, &file),
        Commands::Check { file } => handle_check(&config, &file),
    }
}

fn handle_run(config: &ServiceConfig) -> Result<()> {
    config.validate()?;
    let profile = NodeRegistry::default().create(&config.node_type)?;
    let engine = SignatureEngine::new(config.keystore_spec()?);

    tracing::info!(
        watch_path = %config.watch_path.display(),
        node_type = profile.key(),
        force_validation = config.force_validation,
        "Starting sealwatch"
    );

    let cancel = CancellationToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || {
        tracing::warn!("Shutdown signal received");
        handler_token.cancel();
    })
    .context("Failed to set Ctrl-C handler")?;

    let intake = FileIntake::new(
        config.watch_path.clone(),
        profile,
        engine,
        config.retry_policy(),
        cancel.clone(),
    )
    .gate_on_mismatch(config.gate_on_mismatch);
    let dir = intake.incoming_dir();

    let pipeline = SigningPipeline::new(intake, config.force_validation);
    let reason = WatchLoop::new(dir, pipeline, cancel).run()?;

    match reason {
        StopReason::Interrupted => Ok(()),
        StopReason::Invalidated | StopReason::Disconnected => {
            anyhow::bail!("Watcher stopped: {reason:?}")
        }
    }
}

fn handle_sign(config: &ServiceConfig, file: &Path) -> Result<()> {
    config.validate()?;
    let profile = NodeRegistry::default().create(&config.node_type)?;

    let report = profile.validate(file)?;
    println!("{}", report.format_cli());
    if config.gate_on_mismatch && !report.is_clean() {
        anyhow::bail!(SealwatchError::Intake(format!(
            "{} checksum problems in {}, signing refused",
            report.problem_count(),
            file.display()
        )));
    }

    let artifact = SignatureEngine::new(config.keystore_spec()?).sign(file)?;
    println!("Signature written to {}", artifact.path.display());
    Ok(())
}

fn handle_verify(config: &ServiceConfig, file: &Path) -> Result<()> {
    config.validate()?;
    let result = SignatureEngine::new(config.keystore_spec()?).verify(file)?;
    println!("{}", result.format_cli());

    if !result.passed {
        anyhow::bail!(SealwatchError::Verification(result.message));
    }
    Ok(())
}

fn handle_check(config: &ServiceConfig, file: &Path) -> Result<()> {
    let profile = NodeRegistry::default().create(&config.node_type)?;
    let report = profile
        .validate(file)
        .with_context(|| format!("Failed to check {}", file.display()))?;
    println!("{}", report.format_cli());
    Ok(())
}
