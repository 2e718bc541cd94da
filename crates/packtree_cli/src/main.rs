//! `packtree` command-line entry point.
//!
//! # Responsibility
//! - Parse flags, load the optional TOML config and start file logging.
//! - Dispatch to one command module; report failures on stderr with exit
//!   code 1.

mod cli;
mod commands;
mod config;
mod support;

use clap::Parser;
use cli::{Cli, Commands};
use config::{CliConfig, Settings};
use log::{error, info};
use packtree_core::{init_logging_with, LoggingOptions};
use std::path::{Path, PathBuf};

fn absolute(path: &Path) -> Result<PathBuf, String> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .map_err(|err| format!("failed to resolve {}: {err}", path.display()))
}

fn start_logging(settings: &Settings) -> Result<(), String> {
    let log_dir = absolute(&settings.log_dir)?;
    let options = LoggingOptions {
        level: settings.log_level.clone(),
        log_dir: log_dir.to_string_lossy().into_owned(),
        echo_warnings: !settings.json,
    };
    init_logging_with(&options)
}

fn dispatch(command: Commands, settings: &Settings, config: &CliConfig) -> Result<(), String> {
    match command {
        Commands::Import {
            feed,
            phonetics,
            root_title,
        } => commands::import::run(
            settings,
            config,
            commands::import::Args {
                feed,
                phonetics,
                root_title,
            },
        ),

        Commands::Reconcile {
            parent,
            root_title,
            dedupe_pack,
            exceptions_only,
            transactional,
            shallow,
            dedupe_courses,
        } => commands::reconcile::run(
            settings,
            config,
            commands::reconcile::Args {
                parent,
                root_title,
                dedupe_pack,
                exceptions_only,
                transactional,
                shallow,
                dedupe_courses,
            },
        ),

        Commands::Collapse {
            root,
            level,
            no_premerge,
            dedupe_courses,
            transactional,
        } => commands::collapse::run(
            settings,
            config,
            commands::collapse::Args {
                root,
                level,
                no_premerge,
                dedupe_courses,
                transactional,
            },
        ),

        Commands::Audit => commands::audit::run(settings),

        Commands::Hierarchy { root } => commands::hierarchy::run(settings, root),

        Commands::Covers {
            root,
            level,
            cover,
            clear,
        } => commands::covers::run(
            settings,
            commands::covers::Args {
                root,
                level,
                cover,
                clear,
            },
        ),
    }
}

fn run(cli: Cli) -> Result<(), String> {
    let config = CliConfig::load(cli.config.as_deref())?;
    let settings = Settings::resolve(cli.db, cli.log_dir, cli.log_level, cli.json, &config)?;
    start_logging(&settings)?;
    info!(
        "event=cli_start module=cli status=ok version={} db={}",
        packtree_core::core_version(),
        settings.db.display()
    );

    let result = dispatch(cli.command, &settings, &config);
    if let Err(message) = &result {
        error!("event=cli_finish module=cli status=error error={message}");
    }
    result
}

fn main() {
    if let Err(message) = run(Cli::parse()) {
        eprintln!("error: {message}");
        std::process::exit(1);
    }
}
