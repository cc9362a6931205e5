// Copyright 2026 Rankwatch Contributors
// SPDX-License-Identifier: Apache-2.0

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use rankwatch_runtime::cli::{self, GlobalArgs};
use rankwatch_runtime::cli::probe_cmd::ProbeArgs;
use rankwatch_runtime::cli::run_cmd::{RunOptions, TaskBackend};

#[derive(Parser)]
#[command(
    name = "rankwatch",
    about = "Rankwatch: search-rank tracker agent",
    version,
    after_help = "Run 'rankwatch <command> --help' for details on each command."
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Pull tasks from the task API and report ranks until interrupted
    Run {
        /// Stop after this many cycles
        #[arg(long)]
        cycles: Option<u64>,

        /// Do not write the JSONL audit log
        #[arg(long)]
        no_audit: bool,
    },
    /// Run the loop on built-in sample tasks and print payloads instead of posting
    Simulate {
        /// Stop after this many cycles
        #[arg(long)]
        cycles: Option<u64>,

        /// Do not write the JSONL audit log
        #[arg(long)]
        no_audit: bool,
    },
    /// Locate one product for one keyword and print the record
    Probe {
        /// Search keyword
        keyword: String,

        /// Product code to look for
        target: String,

        /// Secondary item id of the product
        #[arg(long)]
        item_id: Option<String>,

        /// Secondary vendor item id of the product
        #[arg(long)]
        vendor_item_id: Option<String>,
    },
    /// Fetch and list the proxy directory
    Proxies {
        /// Print the list as JSON
        #[arg(long)]
        json: bool,
    },
    /// Check environment readiness
    Doctor,
    /// Generate shell completions
    Completions {
        /// Shell type (bash, zsh, fish, powershell)
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let quiet = cli.global.quiet;

    let result = dispatch(cli).await;

    // Consistent exit codes: 0=success, 1=error
    if let Err(e) = &result {
        if !quiet {
            eprintln!("  Error: {e:#}");
        }
        std::process::exit(1);
    }

    result
}

async fn dispatch(cli: Cli) -> Result<()> {
    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(shell, &mut cmd, "rankwatch", &mut std::io::stdout());
        return Ok(());
    }

    cli::init_tracing(&cli.global)?;

    match cli.command {
        Commands::Run { cycles, no_audit } => {
            let config = cli::load_config(&cli.global)?;
            let options = RunOptions {
                cycles,
                no_audit,
                quiet: cli.global.quiet,
            };
            cli::run_cmd::run(config, TaskBackend::Api, options).await
        }
        Commands::Simulate { cycles, no_audit } => {
            let config = cli::load_config(&cli.global)?;
            let options = RunOptions {
                cycles,
                no_audit,
                quiet: cli.global.quiet,
            };
            cli::run_cmd::run(config, TaskBackend::Simulated, options).await
        }
        Commands::Probe {
            keyword,
            target,
            item_id,
            vendor_item_id,
        } => {
            let config = cli::load_config(&cli.global)?;
            let args = ProbeArgs {
                keyword,
                target,
                item_id,
                vendor_item_id,
            };
            cli::probe_cmd::run(config, args).await
        }
        Commands::Proxies { json } => {
            let config = cli::load_config(&cli.global)?;
            cli::proxies_cmd::run(&config, json).await
        }
        Commands::Doctor => {
            let mut config = rankwatch_runtime::config::AgentConfig::from_env();
            if let Some(path) = &cli.global.chromium {
                config.browser.executable = Some(path.clone());
            }
            cli::doctor::run(&config).await
        }
        Commands::Completions { .. } => Ok(()),
    }
}
