use std::time::Duration;

use super::protocol::{DEFAULT_PORT, MAX_PLAYERS};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("soft timeout {soft:?} must be shorter than hard timeout {hard:?}")]
    TimeoutOrder { soft: Duration, hard: Duration },
    #[error("{0} must be non-zero")]
    Zero(&'static str),
    #[error("player limit {requested} exceeds the maximum of {limit}")]
    TooManyPlayers { requested: usize, limit: usize },
}

#[derive(Debug, Clone)]
pub struct NetConfig {
    pub port: u16,
    /// Silence after which the peer is asked for fresh state.
    pub soft_timeout: Duration,
    /// Silence after which the connection is dropped.
    pub hard_timeout: Duration,
    pub liveness_poll: Duration,
    pub heartbeat_interval: Duration,
    pub max_players: usize,
}

impl Default for NetConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            soft_timeout: Duration::from_secs(5),
            hard_timeout: Duration::from_secs(10),
            liveness_poll: Duration::from_millis(250),
            heartbeat_interval: Duration::from_secs(1),
            max_players: MAX_PLAYERS,
        }
    }
}

impl NetConfig {
    pub fn with_timeouts(self, soft: Duration, hard: Duration) -> Result<Self, ConfigError> {
        if hard.is_zero() {
            return Err(ConfigError::Zero("hard timeout"));
        }
        if soft >= hard {
            return Err(ConfigError::TimeoutOrder { soft, hard });
        }
        Ok(Self {
            soft_timeout: soft,
            hard_timeout: hard,
            ..self
        })
    }

    /// Hard timeout only; the soft threshold is half of it.
    pub fn with_hard_timeout(self, hard: Duration) -> Result<Self, ConfigError> {
        self.with_timeouts(hard / 2, hard)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.liveness_poll.is_zero() {
            return Err(ConfigError::Zero("liveness poll interval"));
        }
        if self.max_players == 0 {
            return Err(ConfigError::Zero("player limit"));
        }
        if self.max_players > MAX_PLAYERS {
            return Err(ConfigError::TooManyPlayers {
                requested: self.max_players,
                limit: MAX_PLAYERS,
            });
        }
        if self.hard_timeout.is_zero() {
            return Err(ConfigError::Zero("hard timeout"));
        }
        if self.soft_timeout >= self.hard_timeout {
            return Err(ConfigError::TimeoutOrder {
                soft: self.soft_timeout,
                hard: self.hard_timeout,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = NetConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.soft_timeout * 2, config.hard_timeout);
    }

    #[test]
    fn test_timeout_order_enforced() {
        let err = NetConfig::default()
            .with_timeouts(Duration::from_secs(3), Duration::from_secs(3))
            .unwrap_err();
        assert!(matches!(err, ConfigError::TimeoutOrder { .. }));
    }

    #[test]
    fn test_hard_timeout_halves_soft() {
        let config = NetConfig::default()
            .with_hard_timeout(Duration::from_millis(200))
            .unwrap();
        assert_eq!(config.soft_timeout, Duration::from_millis(100));
    }

    #[test]
    fn test_player_limit_capped() {
        let config = NetConfig {
            max_players: 300,
            ..NetConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::TooManyPlayers {
                requested: 300,
                limit: MAX_PLAYERS
            })
        );
    }
}
