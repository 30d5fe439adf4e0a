//! Smartfolders CLI - script-filter frontend for smart folder navigation

use clap::Parser;
use colored::Colorize;
use serde::Serialize;
use smartfolders_core::{
    run_claimed, Assembler, CacheStore, Config, MdfindGateway, Outcome, RefreshExecutor,
    RefreshTask, ResultItem, SmartFoldersError,
};
use std::path::PathBuf;
use std::process::{Command, ExitCode, Stdio};
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "smartfolders")]
#[command(about = "Browse and fuzzy-search macOS smart folders", long_about = None)]
struct Cli {
    /// Combined navigation query (e.g. "Projects ⟩ invoice")
    query: Option<String>,

    /// Search contents of the named folder directly
    #[arg(short, long)]
    folder: Option<String>,

    /// Override the cache directory
    #[arg(long, env = "SMARTFOLDERS_CACHE_DIR")]
    cache_dir: Option<PathBuf>,

    /// Config file path (built-in defaults when omitted)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Human-readable output instead of script-filter JSON
    #[arg(long)]
    pretty: bool,

    /// Worker mode: execute one refresh task and exit. Spawned by the
    /// request path so refreshes outlive the invocation that kicked them.
    #[arg(long, hide = true, value_name = "TASK")]
    refresh: Option<String>,
}

/// Script-filter envelope handed to the launcher host on stdout.
#[derive(Serialize)]
struct ScriptFilterOutput<'a> {
    items: &'a [ResultItem],
    /// Seconds after which the host should re-invoke us, set while a
    /// background refresh is in flight.
    #[serde(skip_serializing_if = "Option::is_none")]
    rerun: Option<f64>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{}: {}", "error".red(), err);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> smartfolders_core::Result<ExitCode> {
    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    let cache_dir = cli.cache_dir.clone().unwrap_or_else(default_cache_dir);
    let cache = Arc::new(CacheStore::open(&cache_dir.join("cache.db"))?);

    if let Some(task_json) = &cli.refresh {
        let task: RefreshTask = serde_json::from_str(task_json)?;
        run_claimed(&task, &cache, &MdfindGateway);
        return Ok(ExitCode::SUCCESS);
    }

    let executor = Arc::new(WorkerExecutor {
        cache_dir,
        config_path: cli.config.clone(),
    });
    let assembler = Assembler::with_executor(config, cache, executor);

    let query = cli.query.as_deref().unwrap_or("");
    let outcome = match &cli.folder {
        Some(folder) => assembler.browse_folder(folder, query),
        None => assembler.run(query),
    };

    let outcome = match outcome {
        Err(SmartFoldersError::UnknownFolder { selector }) => {
            let items = vec![ResultItem::notice(
                format!("Unknown folder '{}'", selector),
                "Type part of a folder name, or end with the delimiter to go back",
            )];
            emit(cli, &items, None)?;
            return Ok(ExitCode::FAILURE);
        }
        other => other?,
    };

    let (items, rerun_after) = match outcome {
        // Backing out lands on the top-level folder list with an empty query.
        Outcome::Reset => match assembler.run("")? {
            Outcome::Results { items, rerun_after } => (items, rerun_after),
            // An empty query never backs up again.
            Outcome::Reset => (Vec::new(), None),
        },
        Outcome::Results { items, rerun_after } => (items, rerun_after),
    };

    emit(cli, &items, rerun_after)?;
    Ok(ExitCode::SUCCESS)
}

fn emit(cli: &Cli, items: &[ResultItem], rerun: Option<Duration>) -> smartfolders_core::Result<()> {
    if cli.pretty {
        for item in items {
            if item.valid {
                println!("{}  {}", item.title.bold(), item.subtitle.dimmed());
            } else {
                println!("{}  {}", item.title.cyan(), item.subtitle.dimmed());
            }
        }
        if let Some(delay) = rerun {
            eprintln!(
                "{}: refresh in flight, re-run in {:.1}s",
                "note".yellow(),
                delay.as_secs_f64()
            );
        }
    } else {
        let output = ScriptFilterOutput {
            items,
            rerun: rerun.map(|d| d.as_secs_f64()),
        };
        println!("{}", serde_json::to_string(&output)?);
    }
    Ok(())
}

/// Hands claimed refresh tasks to a detached copy of this binary. The
/// invocation that kicked the refresh exits as soon as it has printed its
/// items; the worker keeps running and lands the snapshot on its own.
struct WorkerExecutor {
    cache_dir: PathBuf,
    config_path: Option<PathBuf>,
}

impl RefreshExecutor for WorkerExecutor {
    fn submit(&self, task: RefreshTask) -> smartfolders_core::Result<()> {
        let exe = std::env::current_exe()?;
        let mut cmd = Command::new(exe);
        cmd.arg("--refresh")
            .arg(serde_json::to_string(&task)?)
            .arg("--cache-dir")
            .arg(&self.cache_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        if let Some(path) = &self.config_path {
            cmd.arg("--config").arg(path);
        }
        // Spawned detached and never waited on; if the worker dies its
        // claim expires and the next staleness check retries.
        cmd.spawn()?;
        Ok(())
    }
}

fn default_cache_dir() -> PathBuf {
    std::env::temp_dir().join("smartfolders")
}
