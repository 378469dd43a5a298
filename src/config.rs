//! Settings resolved from command line flags and environment.

use std::time::Duration;

use anyhow::Result;

use crate::cli::{resolve_config_path, ConfigArgs};
use crate::startup::RetryPolicy;

/// Everything a startup run needs to know.
#[derive(Debug, Clone, Default)]
pub struct GuardSettings {
    /// Security configuration path; empty disables validation
    pub security_config: String,
    /// Artificial delay before the loader publishes the security manager
    pub init_delay: Duration,
    pub retry: RetryPolicy,
}

impl GuardSettings {
    pub fn from_args(config: &ConfigArgs, init_delay_ms: u64) -> Result<Self> {
        Ok(Self {
            security_config: resolve_config_path(&config.config)?,
            init_delay: Duration::from_millis(init_delay_ms),
            retry: RetryPolicy::default(),
        })
    }

    pub fn is_enabled(&self) -> bool {
        !self.security_config.is_empty()
    }
}
