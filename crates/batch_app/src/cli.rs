use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser, Clone)]
#[command(
    name = "batch-tracker",
    version,
    about = "Submit documents for batch extraction and follow results as they arrive"
)]
pub struct Cli {
    /// PDF, JPEG or PNG files to submit
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// RON config file; flags below override its values
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Base URL of the extraction service
    #[arg(long)]
    pub base_url: Option<String>,

    /// Delay between status polls for each job
    #[arg(long)]
    pub poll_interval: Option<humantime::Duration>,

    /// TCP connect timeout
    #[arg(long)]
    pub connect_timeout: Option<humantime::Duration>,

    /// Per-request timeout
    #[arg(long)]
    pub request_timeout: Option<humantime::Duration>,

    /// Document field used to deduplicate results
    #[arg(long)]
    pub key_field: Option<String>,

    /// Write logs to this file instead of the terminal
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Also log to the terminal when a log file is configured
    #[arg(long)]
    pub log_to_terminal: bool,

    /// Print events as JSON lines
    #[arg(long)]
    pub json: bool,

    /// Log at debug level
    #[arg(short, long)]
    pub verbose: bool,
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn parses_files_and_durations() {
        let cli = Cli::try_parse_from([
            "batch-tracker",
            "--poll-interval",
            "250ms",
            "--json",
            "a.pdf",
            "b.png",
        ])
        .unwrap();
        assert_eq!(cli.files, vec![PathBuf::from("a.pdf"), PathBuf::from("b.png")]);
        assert_eq!(
            cli.poll_interval.map(Duration::from),
            Some(Duration::from_millis(250))
        );
        assert!(cli.json);
        assert!(cli.base_url.is_none());
    }

    #[test]
    fn requires_at_least_one_file() {
        assert!(Cli::try_parse_from(["batch-tracker", "--json"]).is_err());
    }
}
