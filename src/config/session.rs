//! Session policy configuration (capacity, expiry, sweep cadence)

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Session lifecycle policy.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionPolicyConfig {
    /// Maximum participants per session; absent means unbounded
    pub capacity: Option<usize>,

    /// Sessions with no participant activity for this long are expired
    /// by the sweep
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,

    /// How often the background sweep runs
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    /// Buffer size of the whiteboard store-to-bus bridge queue
    #[serde(default = "default_fanout_capacity")]
    pub fanout_capacity: usize,
}

impl SessionPolicyConfig {
    /// Get idle timeout as Duration
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    /// Get sweep interval as Duration
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    /// Validate session policy configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.idle_timeout_secs == 0 {
            return Err(ValidationError::InvalidIdleTimeout);
        }
        if self.sweep_interval_secs == 0 {
            return Err(ValidationError::InvalidSweepInterval);
        }
        Ok(())
    }
}

impl Default for SessionPolicyConfig {
    fn default() -> Self {
        Self {
            capacity: None,
            idle_timeout_secs: default_idle_timeout(),
            sweep_interval_secs: default_sweep_interval(),
            fanout_capacity: default_fanout_capacity(),
        }
    }
}

fn default_idle_timeout() -> u64 {
    3_600
}

fn default_sweep_interval() -> u64 {
    60
}

fn default_fanout_capacity() -> usize {
    256
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_policy_defaults() {
        let config = SessionPolicyConfig::default();
        assert!(config.capacity.is_none());
        assert_eq!(config.idle_timeout(), Duration::from_secs(3_600));
        assert_eq!(config.sweep_interval(), Duration::from_secs(60));
    }

    #[test]
    fn test_zero_idle_timeout_rejected() {
        let config = SessionPolicyConfig {
            idle_timeout_secs: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_sweep_interval_rejected() {
        let config = SessionPolicyConfig {
            sweep_interval_secs: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
