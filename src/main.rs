// src/main.rs

mod cli;
mod commands;

use clap::Parser;
use cli::Cli;
use commands::InstallOptions;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let cli = Cli::parse();

    // RUST_LOG wins over --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();

    let opts = InstallOptions {
        config: cli.config,
        dry_run: cli.dry_run,
        dl_only: cli.dl_only,
        dev: cli.dev,
        refresh: cli.refresh,
        cache_dir: cli.cache_dir,
        profile_dir: cli.profile_dir,
        firefox_dir: cli.firefox_dir,
    };

    match commands::cmd_install(&opts) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(2)
        }
    }
}
