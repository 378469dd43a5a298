//! Startup guard for the security configuration.
//!
//! Two phases, run once before the host admits traffic:
//! ```text
//! wait_until_ready()   // poll the registry until a manager with a session manager shows up
//! check_realms()       // reject [users] credentials mixed with other realms
//! ```
//!
//! ## Wait states
//!
//! `Waiting(0)` is the initial state. A failed check moves `Waiting(n)` to
//! `Waiting(n + 1)` while `n + 1` is within the retry budget, otherwise to
//! `TimedOut`. A successful check moves to `Ready`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::security::{Realm, SecurityManager, SecurityManagerRegistry};

/// Failed checks tolerated before giving up.
pub const DEFAULT_MAX_RETRIES: u32 = 10;

/// Pause between two checks.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Fatal startup errors. Any of them must abort the host's startup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The registry cannot be queried at all; never retried
    #[error("Security manager unavailable: {0}")]
    RegistryUnavailable(String),

    /// Readiness not reached within the retry budget
    #[error("Could not initialize security configuration, failed after {attempts} tries")]
    InitializationTimeout { attempts: u32 },

    /// A credential-file realm with users coexists with other realms
    #[error(
        "IniRealm/password based auth mechanisms should be exclusive. \
         Consider removing [users] block from the security configuration (found in realm '{realm}')"
    )]
    ConflictingAuthMechanisms { realm: String },

    /// The host cancelled the wait
    #[error("Security configuration validation cancelled after {attempts} tries")]
    Cancelled { attempts: u32 },
}

impl ConfigError {
    /// Short kind name, for operator-facing output.
    pub fn kind(&self) -> &'static str {
        match self {
            ConfigError::RegistryUnavailable(_) => "RegistryUnavailable",
            ConfigError::InitializationTimeout { .. } => "InitializationTimeout",
            ConfigError::ConflictingAuthMechanisms { .. } => "ConflictingAuthMechanisms",
            ConfigError::Cancelled { .. } => "Cancelled",
        }
    }
}

/// Result type for guard operations
pub type GuardResult<T> = std::result::Result<T, ConfigError>;

/// Bounded, fixed-interval retry schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            delay: DEFAULT_RETRY_DELAY,
        }
    }
}

/// Readiness wait state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitState {
    Waiting(u32),
    Ready,
    TimedOut(u32),
}

impl WaitState {
    /// Transition after a check that did not find a usable manager.
    pub fn on_failed_check(self, max_retries: u32) -> Self {
        match self {
            WaitState::Waiting(n) => {
                let attempts = n + 1;
                if attempts > max_retries {
                    WaitState::TimedOut(attempts)
                } else {
                    WaitState::Waiting(attempts)
                }
            }
            terminal => terminal,
        }
    }

    /// Transition after a successful check.
    pub fn on_ready(self) -> Self {
        match self {
            WaitState::Waiting(_) => WaitState::Ready,
            terminal => terminal,
        }
    }

    /// Failed checks so far; zero once ready.
    pub fn attempts(&self) -> u32 {
        match self {
            WaitState::Waiting(n) | WaitState::TimedOut(n) => *n,
            WaitState::Ready => 0,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, WaitState::Waiting(_))
    }
}

/// Suspension between two checks.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Real clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Structural check: `[users]` credentials must be the only mechanism.
///
/// Stops at the first credential-file realm with principals.
pub fn check_realms(realms: &[Realm]) -> GuardResult<()> {
    if realms.len() <= 1 {
        return Ok(());
    }

    match realms
        .iter()
        .find(|r| r.is_credential_file_backed() && r.principal_block().is_some())
    {
        Some(realm) => Err(ConfigError::ConflictingAuthMechanisms {
            realm: realm.name.clone(),
        }),
        None => Ok(()),
    }
}

/// Startup guard over a security manager registry.
///
/// # Example
/// ```ignore
/// let guard = InitGuard::new(registry::global());
/// guard.validate(&settings.security_config).await?;
/// // Now safe to admit traffic
/// ```
pub struct InitGuard<R, S = TokioSleeper> {
    registry: R,
    sleeper: S,
    policy: RetryPolicy,
    entry: Mutex<()>,
}

impl<R: SecurityManagerRegistry> InitGuard<R, TokioSleeper> {
    pub fn new(registry: R) -> Self {
        Self::with_policy(registry, TokioSleeper, RetryPolicy::default())
    }
}

impl<R: SecurityManagerRegistry, S: Sleeper> InitGuard<R, S> {
    pub fn with_policy(registry: R, sleeper: S, policy: RetryPolicy) -> Self {
        Self {
            registry,
            sleeper,
            policy,
            entry: Mutex::new(()),
        }
    }

    /// Validate the security configuration at `config_path`.
    ///
    /// An empty path means no security configuration and returns at once.
    pub async fn validate(&self, config_path: &str) -> GuardResult<()> {
        self.validate_with_cancel(config_path, &CancellationToken::new())
            .await
    }

    /// Like [`validate`](Self::validate), but gives up with
    /// [`ConfigError::Cancelled`] once `cancel` is cancelled.
    pub async fn validate_with_cancel(
        &self,
        config_path: &str,
        cancel: &CancellationToken,
    ) -> GuardResult<()> {
        info!("🔐 Security config validation initializing...");

        if config_path.is_empty() {
            debug!("No security config configured, skipping validation");
            info!("✅ Security config validation initialized");
            return Ok(());
        }

        debug!("   Security config: {}", config_path);

        let manager = self.wait_until_ready(cancel).await?;

        check_realms(manager.realms()).inspect_err(|e| {
            error!("❌ {}", e);
        })?;

        info!(
            "✅ Security config validation initialized ({} realm(s))",
            manager.realms().len()
        );
        Ok(())
    }

    async fn wait_until_ready(
        &self,
        cancel: &CancellationToken,
    ) -> GuardResult<Arc<SecurityManager>> {
        // One waiter at a time so attempt counters never interleave.
        let _entry = self.entry.lock().await;
        let mut state = WaitState::Waiting(0);

        loop {
            let observed = self.registry.current().map_err(|e| {
                error!("❌ Failed to initialise security configuration: {}", e);
                ConfigError::RegistryUnavailable(e.reason)
            })?;

            match observed {
                Some(manager) if manager.session_manager().is_some() => {
                    state = state.on_ready();
                    debug!("Security manager ready ({:?})", state);
                    return Ok(manager);
                }
                Some(_) => debug!("Security manager published without a session manager"),
                None => debug!("Security manager not published yet"),
            }

            state = state.on_failed_check(self.policy.max_retries);
            let attempts = state.attempts();
            if state.is_terminal() {
                let err = ConfigError::InitializationTimeout { attempts };
                error!("❌ {}", err);
                return Err(err);
            }

            debug!(
                "Waiting {:?} for security manager (attempt {}/{})",
                self.policy.delay, attempts, self.policy.max_retries
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    warn!("⚠️  Security config validation cancelled after {} tries", attempts);
                    return Err(ConfigError::Cancelled { attempts });
                }
                _ = self.sleeper.sleep(self.policy.delay) => {}
            }
        }
    }
}
