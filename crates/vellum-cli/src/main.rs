//! Vellum CLI - Extract controls and coverage from compliance reports.

use anyhow::Context;
use clap::Parser;
use std::fs;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use vellum_cli::commands;
use vellum_cli::{Cli, Command, Config, Formatter};
use vellum_store::SqliteStore;

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_ref())?;

    let format = cli.format.map(Into::into).unwrap_or(config.settings.format);
    let color_enabled = !cli.no_color && config.settings.color;
    let formatter = Formatter::new(format, color_enabled);

    match cli.command {
        Command::Plan(args) => {
            commands::execute_plan(args, &config, &formatter)?;
        }
        Command::Extract(args) => {
            let database = database_path(cli.db, &config)?;
            commands::execute_extract(args, &config, &database, &formatter)?;
        }
        Command::Status(args) => {
            let mut store = open_store(cli.db, &config)?;
            commands::execute_status(args, &mut store, &formatter)?;
        }
        Command::Show(args) => {
            let store = open_store(cli.db, &config)?;
            commands::execute_show(args, &store, &config, &formatter)?;
        }
    }

    Ok(())
}

fn load_config(explicit: Option<&PathBuf>) -> anyhow::Result<Config> {
    if let Some(path) = explicit {
        return Config::load_from(path).with_context(|| format!("loading config from {}", path.display()));
    }

    let path = Config::path()?;
    if path.exists() {
        return Config::load_from(&path).with_context(|| format!("loading config from {}", path.display()));
    }

    // First run: leave a template behind
    let config = Config::default();
    if let Err(e) = config.save_to(&path) {
        tracing::debug!(path = %path.display(), error = %e, "Could not write default config");
    }
    Ok(config)
}

fn database_path(flag: Option<PathBuf>, config: &Config) -> anyhow::Result<PathBuf> {
    let path = match flag {
        Some(path) => path,
        None => config.database_path()?,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
    }
    Ok(path)
}

fn open_store(flag: Option<PathBuf>, config: &Config) -> anyhow::Result<SqliteStore> {
    let path = database_path(flag, config)?;
    SqliteStore::new(&path).with_context(|| format!("opening database {}", path.display()))
}
