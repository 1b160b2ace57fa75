// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! clay CLI - load modules from a directory of module files
//!
//! Each module identifier maps to a JSON module file under the root
//! (`ui.tabs` -> `<root>/ui/tabs.json`). The loaded modules' exports are
//! printed as JSON.

mod repl;

use anyhow::Context;
use clap::Parser;
use clay_loader::{Clay, DrainOrder, FsHost, LoaderConfig, VERSION};
use owo_colors::OwoColorize;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser)]
#[command(
    name = "clay",
    about = "Load clay modules and print their exports",
    version = VERSION,
    author = "Pegasus Heavy Industries"
)]
struct Cli {
    /// Module identifiers to load
    modules: Vec<String>,

    /// Directory containing module files
    #[arg(short = 'r', long = "root", default_value = ".")]
    root: PathBuf,

    /// Configuration file (default: user config, then ./clay.toml)
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Declare prerequisites, e.g. `ui.tabs=modules.anim,modules.util`
    #[arg(short = 'd', long = "depend", value_parser = parse_depend)]
    depend: Vec<(String, Vec<String>)>,

    /// Module file extension (default: configured, else `json`)
    #[arg(long)]
    extension: Option<String>,

    /// Per-load deadline in milliseconds (0 disables)
    #[arg(long)]
    timeout: Option<u64>,

    /// Run completion callbacks in the order they were queued
    #[arg(long)]
    fifo: bool,

    /// Start the interactive shell
    #[arg(short = 'i', long = "interactive")]
    interactive: bool,

    /// Enable verbose logging
    #[arg(long)]
    verbose: bool,
}

fn parse_depend(s: &str) -> Result<(String, Vec<String>), String> {
    let (module, deps) = s
        .split_once('=')
        .ok_or_else(|| format!("expected MODULE=DEP[,DEP...], got '{}'", s))?;
    let deps: Vec<String> = deps
        .split(',')
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(String::from)
        .collect();
    Ok((module.trim().to_string(), deps))
}

/// Extension for module files: the flag, else a configured one, else `json`
fn module_extension(flag: Option<&str>, configured: &str) -> String {
    match flag {
        Some(ext) => ext.to_string(),
        None if configured == LoaderConfig::default().extension => "json".to_string(),
        None => configured.to_string(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // Initialize logging
    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("clay=debug,clay_loader=debug")
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter("clay=warn,clay_loader=warn")
            .init();
    }

    let mut config = match &cli.config {
        Some(path) => LoaderConfig::load_with(Some(path.as_path()))
            .with_context(|| format!("reading {}", path.display()))?,
        None => LoaderConfig::load()?,
    };
    config.extension = module_extension(cli.extension.as_deref(), &config.extension);
    if let Some(timeout) = cli.timeout {
        config.load_timeout_ms = timeout;
    }
    if cli.fifo {
        config.drain_order = DrainOrder::Fifo;
    }
    // No document to wait for on the command line.
    config.ready_on_start = true;

    let clay = Clay::new(config, Arc::new(FsHost::new(cli.root.clone())));
    clay.depend(cli.depend.clone());

    if cli.interactive || (cli.modules.is_empty() && atty::is(atty::Stream::Stdin)) {
        let handle = tokio::runtime::Handle::current();
        tokio::task::spawn_blocking(move || repl::run(clay, handle)).await??;
        return Ok(ExitCode::SUCCESS);
    }

    if cli.modules.is_empty() {
        eprintln!("{}: no modules given", "Error".red().bold());
        eprintln!("Use {} for usage information", "--help".cyan());
        return Ok(ExitCode::FAILURE);
    }

    if let Err(e) = clay.knead_async(cli.modules.clone()).await {
        eprintln!("{}: {}", "Error".red().bold(), e);
        return Ok(ExitCode::FAILURE);
    }

    let mut status = ExitCode::SUCCESS;
    for module in &cli.modules {
        match clay.fetch(module) {
            Ok(value) => {
                println!("{}", module.cyan().bold());
                println!("{}", serde_json::to_string_pretty(&value)?);
            }
            Err(e) => {
                eprintln!("{}: {}", "Error".red().bold(), e);
                status = ExitCode::FAILURE;
            }
        }
    }
    Ok(status)
}
