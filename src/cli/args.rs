use clap::{Args, Parser, Subcommand};

/// Environment variable naming the security configuration file
pub const SECURITY_CONFIG_ENV: &str = "REALM_GUARD_SECURITY_CONFIG";

/// Environment variable delaying the background security manager load
pub const INIT_DELAY_ENV: &str = "REALM_GUARD_INIT_DELAY_MS";

/// realm-guard - startup guard for security realm configuration
#[derive(Parser)]
#[command(name = "realm-guard")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Where the security configuration comes from.
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// Security configuration file (shiro.ini layout). Empty disables validation
    #[arg(short, long, env = SECURITY_CONFIG_ENV, default_value = "")]
    pub config: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Load the security configuration in the background and validate it
    Check {
        #[command(flatten)]
        config: ConfigArgs,

        /// Delay before the security manager is published, in milliseconds
        #[arg(long, env = INIT_DELAY_ENV, default_value_t = 0)]
        init_delay_ms: u64,
    },
    /// Show the realms a security configuration resolves to
    Inspect {
        #[command(flatten)]
        config: ConfigArgs,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}
