mod cli;
mod commands;
mod config;
mod output;

use std::collections::BTreeSet;
use std::process::ExitCode;
use std::sync::mpsc::TryRecvError;
use std::time::Duration;

use anyhow::{bail, Result};
use batch_core::{JobId, TerminalKind, TrackerEvent};
use batch_engine::{Artifact, TrackerHandle};
use batch_logging::{batch_error, batch_info, batch_warn, LevelFilter, LogDestination};
use clap::Parser;

use crate::commands::Command;
use crate::config::{AppConfig, FileConfig};
use crate::output::OutputFormat;

const EVENT_WAIT: Duration = Duration::from_millis(100);

fn main() -> Result<ExitCode> {
    let cli = cli::Cli::parse();
    let file_config = match &cli.config {
        Some(path) => FileConfig::load(path)?,
        None => FileConfig::default(),
    };
    let config = AppConfig::resolve(&cli, file_config);
    init_logging(&config, cli.verbose);

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };

    let artifacts: Vec<Artifact> = cli
        .files
        .iter()
        .filter_map(|path| match Artifact::read(path) {
            Ok(artifact) => Some(artifact),
            Err(err) => {
                batch_warn!("Skipping {:?}: {}", path, err);
                eprintln!("skipping {}: {err}", path.display());
                None
            }
        })
        .collect();
    if artifacts.is_empty() {
        bail!("no submittable files (expected non-empty .pdf, .jpg, .jpeg or .png)");
    }

    let tracker = TrackerHandle::new(config.settings)?;
    for artifact in artifacts {
        tracker.submit(artifact);
    }
    batch_info!("Submitted {} job(s)", tracker.jobs().len());

    let failed = run_event_loop(&tracker, format);
    if failed.is_empty() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

fn init_logging(config: &AppConfig, verbose: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    match &config.log_file {
        Some(path) if config.log_to_terminal => {
            batch_logging::initialize(LogDestination::Both(path.clone()), level)
        }
        Some(path) => batch_logging::initialize(LogDestination::File(path.clone()), level),
        // Keep stdout for events; terminal logging is limited to warnings.
        None => batch_logging::initialize(LogDestination::Terminal, LevelFilter::Warn),
    }
}

/// Print events until every job has settled or `quit` is typed.
/// Returns the ids of jobs that failed.
fn run_event_loop(tracker: &TrackerHandle, format: OutputFormat) -> BTreeSet<JobId> {
    let commands = commands::spawn_stdin_reader();
    let mut failed = BTreeSet::new();

    loop {
        loop {
            match commands.try_recv() {
                Ok(Command::Quit) => {
                    batch_info!("Quit requested with {} job(s) tracked", tracker.jobs().len());
                    return failed;
                }
                Ok(command) => handle_command(tracker, command, format),
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }

        if let Some(event) = tracker.recv_timeout(EVENT_WAIT) {
            print_event(&event, format, &mut failed);
            while let Some(event) = tracker.try_recv() {
                print_event(&event, format, &mut failed);
            }
        }

        if tracker.registry().all_settled() {
            // Events emitted just before settling are already queued.
            while let Some(event) = tracker.try_recv() {
                print_event(&event, format, &mut failed);
            }
            return failed;
        }
    }
}

fn handle_command(tracker: &TrackerHandle, command: Command, format: OutputFormat) {
    match command {
        Command::Remove(job_id) => {
            if tracker.remove_job(job_id) {
                println!("removed job {job_id}");
            } else {
                eprintln!("no job {job_id}");
            }
        }
        Command::ClearFinished => {
            let cleared = tracker.clear_finished();
            println!("cleared {} finished job(s)", cleared.len());
        }
        Command::ClearAll => {
            let removed = tracker.clear_all();
            println!("removed {removed} job(s)");
        }
        Command::List => match output::render_view(&tracker.view(), format) {
            Ok(lines) => lines.iter().for_each(|line| println!("{line}")),
            Err(err) => batch_error!("Failed to render job list: {}", err),
        },
        Command::Quit => {}
    }
}

fn print_event(event: &TrackerEvent, format: OutputFormat, failed: &mut BTreeSet<JobId>) {
    if let TrackerEvent::Terminal {
        job_id,
        kind: TerminalKind::Error,
        ..
    } = event
    {
        failed.insert(*job_id);
    }
    match output::render_event(event, format) {
        Ok(line) => println!("{line}"),
        Err(err) => batch_error!("Failed to render event for job {}: {}", event.job_id(), err),
    }
}
