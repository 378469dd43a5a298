use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use realm_guard::cli::{Cli, Commands};
use realm_guard::command::{run_check, run_inspect};
use realm_guard::config::GuardSettings;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Some(Commands::Check {
            config,
            init_delay_ms,
        }) => {
            let settings = GuardSettings::from_args(&config, init_delay_ms)?;
            run_check(settings).await?;
        }
        Some(Commands::Inspect { config, json }) => {
            let settings = GuardSettings::from_args(&config, 0)?;
            run_inspect(settings, json).await?;
        }
        None => {
            // No command specified, show help
            eprintln!("No command specified. Use --help for usage information.");
            eprintln!("Use 'realm-guard check --config <FILE>' to validate a security configuration.");
        }
    }

    Ok(())
}
