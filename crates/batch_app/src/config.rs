use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use batch_core::KeyPolicy;
use batch_engine::TrackerSettings;
use batch_logging::batch_info;
use serde::Deserialize;

use crate::cli::Cli;

/// Optional settings read from the `--config` file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub base_url: Option<String>,
    pub poll_interval_ms: Option<u64>,
    pub connect_timeout_ms: Option<u64>,
    pub request_timeout_ms: Option<u64>,
    pub key_field: Option<String>,
    pub log_file: Option<PathBuf>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config = ron::from_str(&content)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        batch_info!("Loaded config from {:?}", path);
        Ok(config)
    }
}

/// Effective configuration after layering flags over the file over defaults.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub settings: TrackerSettings,
    pub log_file: Option<PathBuf>,
    /// Mirror file logging to the terminal.
    pub log_to_terminal: bool,
}

impl AppConfig {
    pub fn resolve(cli: &Cli, file: FileConfig) -> Self {
        let mut settings = TrackerSettings::default();

        if let Some(base_url) = cli.base_url.clone().or(file.base_url) {
            settings.client.base_url = base_url;
        }
        if let Some(interval) =
            flag_duration(cli.poll_interval).or(millis(file.poll_interval_ms))
        {
            settings.poll.interval = interval;
        }
        if let Some(timeout) = flag_duration(cli.connect_timeout)
            .or(millis(file.connect_timeout_ms))
        {
            settings.client.connect_timeout = timeout;
        }
        if let Some(timeout) = flag_duration(cli.request_timeout)
            .or(millis(file.request_timeout_ms))
        {
            settings.client.request_timeout = timeout;
        }
        if let Some(field) = cli.key_field.clone().or(file.key_field) {
            settings.key_policy = KeyPolicy::new(field);
        }

        Self {
            settings,
            log_file: cli.log_file.clone().or(file.log_file),
            log_to_terminal: cli.log_to_terminal,
        }
    }
}

// Zero means "not set" for every duration knob.
fn flag_duration(value: Option<humantime::Duration>) -> Option<Duration> {
    value.map(Duration::from).filter(|duration| !duration.is_zero())
}

fn millis(value: Option<u64>) -> Option<Duration> {
    value.filter(|ms| *ms > 0).map(Duration::from_millis)
}
