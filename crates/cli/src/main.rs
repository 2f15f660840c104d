// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `ralph` — autonomous issue-processing daemon.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use ralph_daemon::config::{Config, Overrides};

#[derive(Parser)]
#[command(name = "ralph", about = "Autonomous issue-processing daemon", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the daemon: ingest tracker items, drive builds, watch reviews.
    Serve(ServeArgs),
}

#[derive(Args)]
struct ServeArgs {
    /// Address for the operator HTTP/WS surface.
    #[arg(long)]
    addr: Option<String>,

    /// Path to the toml configuration file.
    #[arg(long, default_value = "ralph.toml")]
    config: PathBuf,

    /// State directory (store file, workspaces, lock).
    #[arg(long)]
    state_dir: Option<PathBuf>,

    /// Override the tracker API base URL (testing).
    #[arg(long)]
    tracker_base_url: Option<String>,

    /// Override the forge API base URL (testing).
    #[arg(long)]
    forge_base_url: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match cli.command {
        Command::Serve(args) => match serve(args).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("error: {:#}", e);
                ExitCode::FAILURE
            }
        },
    }
}

async fn serve(args: ServeArgs) -> anyhow::Result<()> {
    let overrides = Overrides {
        addr: args.addr,
        state_dir: args.state_dir,
        tracker_base_url: args.tracker_base_url,
        forge_base_url: args.forge_base_url,
    };
    let config = Config::load(&args.config, overrides)
        .with_context(|| format!("loading {}", args.config.display()))?;

    let _log_guard = ralph_daemon::logging::init(config.log_file.as_deref());

    ralph_daemon::serve(config).await.context("daemon failed")?;
    Ok(())
}
