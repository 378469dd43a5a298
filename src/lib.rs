//! Startup guard for a pluggable security subsystem.
//!
//! Hosts call [`startup::InitGuard::validate`] once at startup: it waits for
//! the security manager to be published and rejects configurations that mix
//! `[users]` credentials with other realms.

pub mod cli;
pub mod command;
pub mod config;
pub mod security;
pub mod startup;

pub use security::{SecurityManager, SecurityManagerRegistry};
pub use startup::{ConfigError, InitGuard};
