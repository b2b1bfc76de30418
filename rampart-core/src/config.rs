//! Configuration for the blocking engine and login protection.
//!
//! Config is injected at construction time; there is no global state.

use chrono::Duration;

use crate::block::BlockDuration;

/// Configuration for the blocking engine.
#[derive(Debug, Clone, Copy)]
pub struct BlockingConfig {
    /// Duration applied when the caller does not specify one.
    pub default_duration: BlockDuration,
    /// Interval of the background expiry sweep task. Sweeping only
    /// re-labels records; `is_blocked` never depends on it having run.
    pub sweep_interval: std::time::Duration,
}

impl Default for BlockingConfig {
    fn default() -> Self {
        Self {
            default_duration: BlockDuration::ONE_DAY,
            sweep_interval: std::time::Duration::from_secs(3_600),
        }
    }
}

/// Configuration for login failure protection.
#[derive(Debug, Clone)]
pub struct LoginProtectionConfig {
    /// When disabled, failed attempts are not tracked and nothing is blocked.
    pub enabled: bool,
    /// Number of failed attempts within the window that triggers a block.
    pub max_attempts: u32,
    /// Rolling window for the failed-attempt counter. The window is
    /// refreshed on every increment, not fixed to the first failure.
    pub attempt_window: Duration,
}

impl Default for LoginProtectionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: 5,
            attempt_window: Duration::hours(1),
        }
    }
}

impl LoginProtectionConfig {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let blocking = BlockingConfig::default();
        assert_eq!(blocking.default_duration, BlockDuration::ONE_DAY);
        assert_eq!(blocking.sweep_interval.as_secs(), 3_600);

        let login = LoginProtectionConfig::default();
        assert!(login.enabled);
        assert_eq!(login.max_attempts, 5);
        assert_eq!(login.attempt_window, Duration::hours(1));
    }

    #[test]
    fn test_disabled() {
        let login = LoginProtectionConfig::disabled();
        assert!(!login.enabled);
        assert_eq!(login.max_attempts, 5);
    }
}
