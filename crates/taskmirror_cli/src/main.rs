//! `tm`: command-line access to the collection transfer surface.
//!
//! # Responsibility
//! - Resolve settings from the config file and flags.
//! - Export or import one collection per invocation.

use clap::{Parser, Subcommand};
use log::info;
use std::error::Error;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use taskmirror_core::db::open_db;
use taskmirror_core::{
    core_version, default_log_level, init_logging, CollectionService, CoreConfig, ImportWarning,
    SystemClock,
};

#[derive(Debug, Parser)]
#[command(name = "tm", version, about = "Mirror task collections into SQLite and back")]
struct Cli {
    /// TOML config file; flags override its values.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// SQLite database file.
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    /// Principal that owns imported pending tasks.
    #[arg(long, global = true)]
    principal: Option<String>,
    /// Absolute directory for rolling log files.
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,
    #[arg(long, global = true)]
    log_level: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print a collection (`pending.data`, `completed.data`, `undo.data`).
    Export {
        collection: String,
        /// Write to this file instead of stdout.
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Replace a collection with the contents of FILE (`-` reads stdin).
    Import { collection: String, file: PathBuf },
    /// Print the core version.
    Version,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("tm: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    if let Command::Version = cli.command {
        println!("taskmirror_core version={}", core_version());
        return Ok(());
    }

    let config = resolve_config(&cli)?;
    if let Some(dir) = &config.log_dir {
        let level = config.log_level.as_deref().unwrap_or(default_log_level());
        init_logging(level, dir)?;
    }

    let mut conn = open_db(&config.database)?;
    let mut service = CollectionService::new(&mut conn, SystemClock);

    match cli.command {
        Command::Export { collection, output } => {
            let text = service.read(&collection, &config.principal)?;
            match output {
                Some(path) => std::fs::write(path, text)?,
                None => std::io::stdout().write_all(text.as_bytes())?,
            }
        }
        Command::Import { collection, file } => {
            let payload = read_payload(&file)?;
            let report = service.write(&collection, &payload, &config.principal)?;
            for warning in &report.warnings {
                match warning {
                    ImportWarning::DanglingDependency { record_uuid, token } => {
                        eprintln!("warning: {record_uuid} depends on unknown `{token}`; edge skipped");
                    }
                }
            }
            println!(
                "{}: {} records, {} removed, {} kept as placeholders, {} placeholders created",
                report.collection,
                report.records,
                report.removed,
                report.demoted,
                report.placeholders_created
            );
            info!("event=cli_import module=cli status=ok collection={}", report.collection);
        }
        Command::Version => {}
    }
    Ok(())
}

fn resolve_config(cli: &Cli) -> Result<CoreConfig, Box<dyn Error>> {
    let mut config = match &cli.config {
        Some(path) => CoreConfig::load(path)?,
        None => CoreConfig::default(),
    };
    if let Some(db) = &cli.db {
        config.database = db.clone();
    }
    if let Some(principal) = &cli.principal {
        config.principal = principal.clone();
    }
    if let Some(dir) = &cli.log_dir {
        config.log_dir = Some(dir.clone());
    }
    if let Some(level) = &cli.log_level {
        config.log_level = Some(level.clone());
    }
    config.validate()?;
    Ok(config)
}

fn read_payload(file: &Path) -> Result<String, Box<dyn Error>> {
    if file.as_os_str() == "-" {
        let mut text = String::new();
        std::io::stdin().read_to_string(&mut text)?;
        return Ok(text);
    }
    Ok(std::fs::read_to_string(file)?)
}
