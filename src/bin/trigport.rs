//! trigport: Oracle trigger to PostgreSQL converter
//!
//! # Usage
//!
//! ```bash
//! # Convert one trigger, print the three-key JSON
//! trigport convert triggers/trg_orders.sql
//!
//! # Convert a directory tree into out/
//! trigport convert triggers/ -o out/ --jobs 8
//!
//! # Round-trip self check
//! trigport check triggers/trg_orders.sql
//! ```

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use colored::*;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;
use trigport::engine::{FileReport, RunReport};
use trigport::prelude::*;

#[derive(Parser)]
#[command(name = "trigport")]
#[command(version)]
#[command(about = "Oracle PL/SQL triggers to per-operation PostgreSQL DO blocks", long_about = None)]
#[command(after_help = "EXAMPLES:
    trigport convert trg_orders.sql
    trigport convert triggers/ -o out/
    trigport render trg_orders.sql --op update
    trigport check trg_orders.sql")]
struct Cli {
    /// Config file (default: ./trigport.toml, then the user config dir)
    #[arg(long, global = true, env = "TRIGPORT_CONFIG")]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Write logs to a file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a trigger file or every trigger file under a directory
    Convert {
        path: PathBuf,

        /// Output directory for <name>.json files
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Worker threads (overrides the config file)
        #[arg(short, long)]
        jobs: Option<usize>,
    },
    /// Print the parsed tree as JSON
    Parse { file: PathBuf },
    /// Render one trigger, optionally specialized for one operation
    Render {
        file: PathBuf,

        /// postgres or oracle
        #[arg(short, long, default_value = "postgres")]
        dialect: Dialect,

        /// insert, update or delete
        #[arg(long, value_parser = parse_operation)]
        op: Option<Operation>,
    },
    /// Check that the Oracle rendering parses back to the same tree
    Check { file: PathBuf },
    /// Print the effective mapping tables
    Mappings {
        /// JSON instead of TOML
        #[arg(long)]
        json: bool,
    },
}

fn parse_operation(s: &str) -> Result<Operation, String> {
    Operation::from_keyword(s).ok_or_else(|| format!("unknown operation '{}'", s))
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.verbose, cli.log_file.as_deref()) {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(2);
    }

    match run(&cli) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            std::process::exit(1);
        }
    }
}

fn init_logging(verbose: bool, log_file: Option<&Path>) -> Result<()> {
    let default = if verbose { "trigport=debug" } else { "trigport=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    match log_file {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("cannot create log file '{}'", path.display()))?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => builder.with_writer(std::io::stderr).init(),
    }
    Ok(())
}

/// Returns `false` when some input could not be processed.
fn run(cli: &Cli) -> Result<bool> {
    let config = Config::load(cli.config.as_deref())?;
    let mut diags = Diagnostics::new();
    let engine = Engine::from_config(&config, &mut diags);
    for d in diags.iter() {
        eprintln!("{} {}", "!".yellow(), d);
    }

    match &cli.command {
        Commands::Convert { path, output, jobs } => {
            let jobs = jobs.unwrap_or(config.jobs);
            convert(&engine, &config, path, output.as_deref(), jobs)
        }
        Commands::Parse { file } => {
            let trigger = parse(&read(file)?)?;
            println!("{}", serde_json::to_string_pretty(&trigger)?);
            Ok(true)
        }
        Commands::Render { file, dialect, op } => {
            let trigger = parse(&read(file)?)?;
            let trigger = match op {
                Some(op) => specialize(&trigger, *op),
                None => trigger,
            };
            let mut diags = Diagnostics::new();
            let text = dialect.render(&trigger, engine.tables(), &config.generate, &mut diags);
            print!("{}", text);
            Ok(diags.count(Severity::Error) == 0)
        }
        Commands::Check { file } => match roundtrip(&read(file)?) {
            Ok(_) => {
                println!("{} {} round-trips", "✓".green(), file.display());
                Ok(true)
            }
            Err(e) => {
                println!("{} {}: {}", "✗".red(), file.display(), e);
                Ok(false)
            }
        },
        Commands::Mappings { json } => {
            let text = if *json {
                serde_json::to_string_pretty(engine.tables())?
            } else {
                toml::to_string_pretty(engine.tables())?
            };
            println!("{}", text);
            Ok(true)
        }
    }
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("cannot read '{}'", path.display()))
}

fn convert(
    engine: &Engine,
    config: &Config,
    path: &Path,
    output: Option<&Path>,
    jobs: usize,
) -> Result<bool> {
    // A single file without an output directory goes to stdout.
    if path.is_file() && output.is_none() {
        let conversion = engine.convert(&read(path)?)?;
        println!("{}", conversion.output.to_json()?);
        return Ok(true);
    }

    let (root, inputs) = if path.is_dir() {
        let mut inputs = Vec::new();
        collect_inputs(path, config, &mut inputs)?;
        (path.to_path_buf(), inputs)
    } else {
        let root = path.parent().map(Path::to_path_buf).unwrap_or_default();
        (root, vec![path.to_path_buf()])
    };
    if inputs.is_empty() {
        println!("{} no trigger files under {}", "!".yellow(), path.display());
        return Ok(true);
    }

    let started = Utc::now();
    let reports = engine.batch(&inputs, jobs);
    for report in &reports {
        write_report(report, &root, output)?;
    }

    let summary = RunReport::new(started, &reports);
    println!();
    println!(
        "{} {} converted, {} failed, {} warning(s), {} error(s) in {} ms ({})",
        "Done:".cyan().bold(),
        summary.converted.to_string().green(),
        summary.failed.to_string().red(),
        summary.warnings.to_string().yellow(),
        summary.errors,
        summary.elapsed().num_milliseconds(),
        summary.finished_at.format("%Y-%m-%d %H:%M:%S UTC"),
    );
    Ok(summary.failed == 0)
}

fn collect_inputs(dir: &Path, config: &Config, out: &mut Vec<PathBuf>) -> Result<()> {
    let mut entries = fs::read_dir(dir)
        .with_context(|| format!("cannot list '{}'", dir.display()))?
        .map(|e| e.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()?;
    entries.sort();
    for path in entries {
        if path.is_dir() {
            collect_inputs(&path, config, out)?;
        } else if config.accepts(&path) {
            out.push(path);
        }
    }
    Ok(())
}

/// Target of `<input>` under `output`, keeping its path below `root`.
fn target_path(input: &Path, root: &Path, output: Option<&Path>) -> PathBuf {
    let json = input.with_extension("json");
    match output {
        Some(dir) => dir.join(json.strip_prefix(root).unwrap_or(&json)),
        None => json,
    }
}

fn write_report(report: &FileReport, root: &Path, output: Option<&Path>) -> Result<()> {
    let conversion = match &report.result {
        Ok(conversion) => conversion,
        Err(e) => {
            println!("{} {}: {}", "✗".red(), report.path.display(), e);
            return Ok(());
        }
    };

    let target = target_path(&report.path, root, output);
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("cannot create '{}'", parent.display()))?;
    }
    fs::write(&target, conversion.output.to_json()?)
        .with_context(|| format!("cannot write '{}'", target.display()))?;

    let warnings = conversion.diagnostics.count(Severity::Warning);
    let errors = conversion.diagnostics.count(Severity::Error);
    let mark = if errors > 0 { "!".yellow() } else { "✓".green() };
    println!(
        "{} {} → {}{}",
        mark,
        report.path.display(),
        target.display().to_string().cyan(),
        if warnings + errors > 0 {
            format!(" ({} warning(s), {} error(s))", warnings, errors).dimmed().to_string()
        } else {
            String::new()
        }
    );
    Ok(())
}
