//! Startup gate for the security subsystem.
//!
//! The host calls [`InitGuard::validate`] once before admitting traffic:
//! - wait (bounded) for the security manager to be published
//! - reject configurations mixing `[users]` credentials with other realms
//!
//! Any error is fatal: the host stops and reports it so an operator can fix
//! the configuration before restarting.

mod guard;

pub use guard::{
    check_realms, ConfigError, GuardResult, InitGuard, RetryPolicy, Sleeper, TokioSleeper,
    WaitState, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY,
};
