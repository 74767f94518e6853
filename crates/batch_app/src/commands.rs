use std::io::BufRead;
use std::sync::mpsc;
use std::thread;

use batch_core::JobId;
use batch_logging::batch_debug;

pub const USAGE: &str = "commands: rm <id> | clear | clear all | list | quit";

/// A line typed on stdin while jobs are running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Remove(JobId),
    ClearFinished,
    ClearAll,
    List,
    Quit,
}

pub fn parse_command(line: &str) -> Option<Command> {
    let mut words = line.split_whitespace();
    let command = match (words.next()?, words.next()) {
        ("rm", Some(id)) => Command::Remove(JobId(id.trim_start_matches('#').parse().ok()?)),
        ("clear", None) => Command::ClearFinished,
        ("clear", Some("all")) => Command::ClearAll,
        ("list", None) => Command::List,
        ("quit" | "q", None) => Command::Quit,
        _ => return None,
    };
    words.next().is_none().then_some(command)
}

/// Read commands from stdin on a background thread.
///
/// End of input is delivered as nothing at all; the main loop keeps running
/// until its jobs settle.
pub fn spawn_stdin_reader() -> mpsc::Receiver<Command> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if line.trim().is_empty() {
                continue;
            }
            match parse_command(&line) {
                Some(command) => {
                    if tx.send(command).is_err() {
                        break;
                    }
                }
                None => eprintln!("{USAGE}"),
            }
        }
        batch_debug!("stdin closed");
    });
    rx
}
