use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::contract::TracingStatusReporter;
use crate::limits::Limits;
use crate::load_config::load_config;
use crate::process::TokioCommandRunner;
use crate::request::JobRequest;
use crate::runner::{run_build, RunContext, RunnerKind};

pub const EXIT_OK: i32 = 0;
pub const EXIT_FAILED: i32 = 1;
/// `EX_TEMPFAIL`: an input does not exist yet, try again later.
pub const EXIT_BLOCKED: i32 = 75;

/// CLI for roadrunners: run one content build job.
#[derive(Parser)]
#[clap(
    name = "roadrunners",
    version,
    about = "Build completezip, offlinezip, epub, pdf and print artifacts for a content package"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a single build and print the produced artifact paths
    Build {
        /// Which runner to use
        #[clap(long)]
        runner: RunnerKind,
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
        /// Path to the JSON build request
        #[clap(long)]
        request: PathBuf,
        /// Upper bound for each download and converter run
        #[clap(long)]
        timeout_secs: Option<u64>,
    },
    /// List the available runners
    Runners,
}

/// Async CLI entrypoint shared by main() and the integration tests. Returns
/// the process exit code.
pub async fn run(cli: Cli) -> Result<i32> {
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Runners => {
            for kind in RunnerKind::ALL {
                println!("{kind}");
            }
            Ok(EXIT_OK)
        }
        Commands::Build {
            runner,
            config,
            request,
            timeout_secs,
        } => {
            let configs = load_config(&config)?;
            let settings = configs.settings_for(runner.as_str())?.clone();
            let mut job = JobRequest::from_path(&request)?;

            let cancel = CancellationToken::new();
            let limits = Limits::new(timeout_secs.map(Duration::from_secs), cancel.clone());
            let interrupt = tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupt received, cancelling build");
                    cancel.cancel();
                }
            });

            let reporter = TracingStatusReporter;
            let commands = TokioCommandRunner;
            let ctx = RunContext {
                reporter: &reporter,
                commands: &commands,
                limits,
            };
            let outcome = run_build(runner, &mut job, &settings, &ctx).await;
            interrupt.abort();

            match outcome {
                Ok(artifacts) => {
                    for artifact in artifacts {
                        println!("{}", artifact.display());
                    }
                    Ok(EXIT_OK)
                }
                Err(e) if e.is_blocked() => {
                    eprintln!("[BLOCKED] {}", e);
                    Ok(EXIT_BLOCKED)
                }
                Err(e) => {
                    eprintln!("[ERROR] Build failed: {}", e);
                    Ok(EXIT_FAILED)
                }
            }
        }
    }
}
