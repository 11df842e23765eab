use std::time::Duration;

use serfnet::NetConfig;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub net: NetConfig,
    pub join_attempts: u32,
    pub retry_delay: Duration,
    /// Interval between random transfers once input is allowed.
    pub action_interval: Option<Duration>,
    pub status_interval: Duration,
    pub run_for: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            net: NetConfig::default(),
            join_attempts: 5,
            retry_delay: Duration::from_secs(1),
            action_interval: Some(Duration::from_secs(2)),
            status_interval: Duration::from_secs(5),
            run_for: None,
        }
    }
}
