//! judgeguard CLI
//!
//! A command-line tool for inspecting the harness configuration and checking
//! how a wrapped program terminates.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use judgeguard::{Config, EXAMPLE_CONFIG, Outcome};
use tokio::process::Command;
use tracing::{Level, debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "judgeguard")]
#[command(about = "A tool for inspecting programs wrapped by the judgeguard harness")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new configuration file
    Init {
        /// Output path (default: judgeguard.toml)
        #[arg(short, long, default_value = "judgeguard.toml")]
        output: PathBuf,

        /// Overwrite existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Run a wrapped program and report how it terminated
    Probe {
        /// Input file (default: stdin)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Program to run
        #[arg(value_name = "PROGRAM")]
        program: PathBuf,

        /// Arguments passed to the program
        #[arg(value_name = "ARGS", trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Show effective configuration
    ShowConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::from_default_env().add_directive(Level::DEBUG.into())
    } else {
        EnvFilter::from_default_env().add_directive(Level::INFO.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Load configuration
    let config = if let Some(ref path) = cli.config {
        info!(?path, "loading configuration");
        Config::from_file(path).context("failed to load configuration")?
    } else {
        debug!("using environment configuration");
        Config::load().context("failed to load configuration")?
    };

    match cli.command {
        Commands::Init { output, force } => init_config(&output, force).await,
        Commands::Probe {
            input,
            program,
            args,
        } => run_probe(&config, &program, &args, input.as_deref()).await,
        Commands::ShowConfig => {
            show_config(&config);
            Ok(())
        }
    }
}

async fn run_probe(
    config: &Config,
    program: &Path,
    args: &[String],
    input: Option<&Path>,
) -> Result<()> {
    let stdin = match input {
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("failed to open input file '{}'", path.display()))?;
            Stdio::from(file.into_std().await)
        }
        None => Stdio::inherit(),
    };

    info!(program = %program.display(), "running program");

    // The child harness reads the same signal pair from its environment
    let status = Command::new(program)
        .args(args)
        .envs(config.to_env())
        .stdin(stdin)
        .status()
        .await
        .with_context(|| format!("failed to run '{}'", program.display()))?;

    let outcome = Outcome::from_status(status, &config.signals);

    info!(
        exit_code = status.code(),
        signal = std::os::unix::process::ExitStatusExt::signal(&status),
        "program terminated"
    );
    println!("{outcome}");

    match outcome {
        Outcome::Exited(code) => std::process::exit(code),
        _ => std::process::exit(1),
    }
}

fn show_config(config: &Config) {
    println!("Signals:");
    println!(
        "  Resource exhaustion: {} ({})",
        config.signals.resource_exhaustion,
        config.signals.resource_exhaustion.number()
    );
    println!(
        "  Other failure: {} ({})",
        config.signals.other_failure,
        config.signals.other_failure.number()
    );
    println!();
    println!("Stdio:");
    println!("  Desynchronized: {}", config.stdio.desync);
    println!("  Buffer size: {} bytes", config.stdio.buffer_size);
    println!();
    println!("Allocation failure trap: {}", config.oom.trap_abort);
    println!();
    println!("Environment for wrapped programs:");
    for (key, value) in config.to_env() {
        println!("  {key}={value}");
    }
}

async fn init_config(output: &PathBuf, force: bool) -> Result<()> {
    if output.exists() && !force {
        anyhow::bail!(
            "Configuration file already exists at '{}'. Use --force to overwrite.",
            output.display()
        );
    }

    tokio::fs::write(output, EXAMPLE_CONFIG)
        .await
        .context("failed to write configuration file")?;

    println!("Created configuration file at '{}'", output.display());
    Ok(())
}
