use std::time::Duration;

use batch_core::KeyPolicy;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1500);

#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub base_url: String,
    pub connect_timeout: Duration,
    /// Per-request limit; an expired status request counts as a transient failure.
    pub request_timeout: Duration,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PollSettings {
    pub interval: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TrackerSettings {
    pub client: ClientSettings,
    pub poll: PollSettings,
    pub key_policy: KeyPolicy,
}
