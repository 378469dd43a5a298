use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tracing::debug;

use crate::config::GuardSettings;
use crate::security::{registry, spawn_loader, SharedRegistry};
use crate::startup::{InitGuard, TokioSleeper};

pub async fn run_check(settings: GuardSettings) -> Result<()> {
    check_with_registry(settings, registry::global()).await
}

async fn check_with_registry(
    settings: GuardSettings,
    registry: Arc<SharedRegistry>,
) -> Result<()> {
    let loader = settings.is_enabled().then(|| {
        spawn_loader(
            PathBuf::from(&settings.security_config),
            registry.clone(),
            settings.init_delay,
        )
    });

    let guard = InitGuard::with_policy(registry, TokioSleeper, settings.retry);
    let outcome = guard.validate(&settings.security_config).await;

    if let Some(loader) = loader {
        // Nothing left to wait for once the guard has decided.
        loader.abort();
        debug!("Security config loader stopped");
    }

    match outcome {
        Ok(()) if settings.is_enabled() => {
            println!("✅ Security configuration is valid");
            println!("   Config: {}", settings.security_config);
            Ok(())
        }
        Ok(()) => {
            println!("⚠️  No security configuration given, validation skipped.");
            Ok(())
        }
        Err(e) => {
            let kind = e.kind();
            Err(anyhow::Error::new(e)
                .context(format!("Security configuration validation failed ({})", kind)))
        }
    }
}
