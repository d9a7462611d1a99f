//! Actuator configuration
//!
//! Timing knobs default to the values the Machine API expects from this
//! provider and may be overridden through the environment of the hosting
//! controller. Environment access goes through [`EnvSource`] so tests never
//! touch process state.

use std::time::Duration;

use alicloud_common::poll::{PollOptions, DEFAULT_INTERVAL, DEFAULT_TIMEOUT};
use alicloud_common::{Error, Result};

/// Overrides [`ActuatorConfig::instance_timeout`]
pub const INSTANCE_TIMEOUT_ENV: &str = "ALICLOUD_INSTANCE_TIMEOUT_SECS";
/// Overrides [`ActuatorConfig::poll_interval`]
pub const POLL_INTERVAL_ENV: &str = "ALICLOUD_POLL_INTERVAL_SECS";
/// Overrides [`ActuatorConfig::requeue_after`]
pub const REQUEUE_AFTER_ENV: &str = "ALICLOUD_REQUEUE_AFTER_SECS";
/// Overrides [`ActuatorConfig::requeue_after_fatal`]
pub const REQUEUE_AFTER_FATAL_ENV: &str = "ALICLOUD_REQUEUE_AFTER_FATAL_SECS";

/// Default delay before re-checking an instance that is not visible yet
pub const DEFAULT_REQUEUE_AFTER: Duration = Duration::from_secs(20);
/// Default delay after an instance vanished for good
pub const DEFAULT_REQUEUE_AFTER_FATAL: Duration = Duration::from_secs(180);
/// Field manager used for server-side apply patches
pub const DEFAULT_FIELD_MANAGER: &str = "alibabacloud-controller";

/// Source of environment variables
#[cfg_attr(test, mockall::automock)]
pub trait EnvSource: Send + Sync {
    /// Value of `key`, `None` when unset
    fn var(&self, key: &str) -> Option<String>;
}

/// Reads the process environment
#[derive(Clone, Default)]
pub struct OsEnv;

impl EnvSource for OsEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// Timing and identity settings of the actuator
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActuatorConfig {
    /// Bound on waiting for an instance to reach a status
    pub instance_timeout: Duration,
    /// Delay between instance status checks
    pub poll_interval: Duration,
    /// Requeue delay while a freshly created instance is not visible yet
    pub requeue_after: Duration,
    /// Requeue delay once the instance is considered gone
    pub requeue_after_fatal: Duration,
    /// Field manager for Machine patches
    pub field_manager: String,
}

impl Default for ActuatorConfig {
    fn default() -> Self {
        Self {
            instance_timeout: DEFAULT_TIMEOUT,
            poll_interval: DEFAULT_INTERVAL,
            requeue_after: DEFAULT_REQUEUE_AFTER,
            requeue_after_fatal: DEFAULT_REQUEUE_AFTER_FATAL,
            field_manager: DEFAULT_FIELD_MANAGER.to_string(),
        }
    }
}

impl ActuatorConfig {
    /// Defaults overridden by the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_env_source(&OsEnv)
    }

    /// Defaults overridden by `env`.
    ///
    /// Values are whole seconds; anything that does not parse as a positive
    /// integer is rejected.
    pub fn from_env_source(env: &dyn EnvSource) -> Result<Self> {
        let mut config = Self::default();
        if let Some(d) = seconds(env, INSTANCE_TIMEOUT_ENV)? {
            config.instance_timeout = d;
        }
        if let Some(d) = seconds(env, POLL_INTERVAL_ENV)? {
            config.poll_interval = d;
        }
        if let Some(d) = seconds(env, REQUEUE_AFTER_ENV)? {
            config.requeue_after = d;
        }
        if let Some(d) = seconds(env, REQUEUE_AFTER_FATAL_ENV)? {
            config.requeue_after_fatal = d;
        }
        Ok(config)
    }

    /// Poll options for instance status waits
    pub fn poll_options(&self) -> PollOptions {
        PollOptions::new(self.poll_interval, self.instance_timeout)
    }
}

fn seconds(env: &dyn EnvSource, key: &str) -> Result<Option<Duration>> {
    let Some(raw) = env.var(key) else {
        return Ok(None);
    };
    match raw.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Some(Duration::from_secs(secs))),
        _ => Err(Error::internal_with_context(
            "config",
            format!("{key} must be a positive number of seconds, got {raw:?}"),
        )),
    }
}
