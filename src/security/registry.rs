//! Process-wide security manager registry.
//!
//! The security framework publishes its manager here once it has finished
//! building it; everybody else only reads:
//!
//! ```ignore
//! // Framework side, whenever initialization completes:
//! registry::global().publish(manager);
//!
//! // Startup side:
//! let guard = InitGuard::new(registry::global());
//! guard.validate(&config_path).await?;
//! ```

use std::sync::{Arc, OnceLock, RwLock};

use tracing::{debug, warn};

use super::{RegistryUnavailable, SecurityManager, SecurityManagerRegistry};

#[derive(Debug, Default)]
enum Slot {
    #[default]
    Empty,
    Published(Arc<SecurityManager>),
    Unavailable(String),
}

/// Registry slot that can be shared between the framework and its observers.
#[derive(Debug, Default)]
pub struct SharedRegistry {
    slot: RwLock<Slot>,
}

impl SharedRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a security manager, replacing whatever was there.
    pub fn publish(&self, manager: SecurityManager) -> Arc<SecurityManager> {
        let manager = Arc::new(manager);
        match self.slot.write() {
            Ok(mut slot) => {
                if matches!(*slot, Slot::Published(_)) {
                    warn!("Replacing an already published security manager");
                }
                *slot = Slot::Published(manager.clone());
                debug!(
                    "Security manager published with {} realm(s)",
                    manager.realms().len()
                );
            }
            Err(e) => warn!("Registry lock poisoned, dropping publish: {}", e),
        }
        manager
    }

    /// Mark the registry as unusable; every later read fails fast.
    pub fn mark_unavailable(&self, reason: impl Into<String>) {
        let reason = reason.into();
        match self.slot.write() {
            Ok(mut slot) => *slot = Slot::Unavailable(reason),
            Err(e) => warn!("Registry lock poisoned, dropping unavailable marker: {}", e),
        }
    }

    /// Reset to "not yet published".
    #[cfg(test)]
    pub fn clear(&self) {
        if let Ok(mut slot) = self.slot.write() {
            *slot = Slot::Empty;
        }
    }

    #[cfg(test)]
    pub fn is_published(&self) -> bool {
        self.slot
            .read()
            .map(|slot| matches!(*slot, Slot::Published(_)))
            .unwrap_or(false)
    }
}

impl SecurityManagerRegistry for SharedRegistry {
    fn current(&self) -> Result<Option<Arc<SecurityManager>>, RegistryUnavailable> {
        let slot = self
            .slot
            .read()
            .map_err(|_| RegistryUnavailable::new("registry lock poisoned"))?;
        match &*slot {
            Slot::Empty => Ok(None),
            Slot::Published(manager) => Ok(Some(manager.clone())),
            Slot::Unavailable(reason) => Err(RegistryUnavailable::new(reason.clone())),
        }
    }
}

static GLOBAL: OnceLock<Arc<SharedRegistry>> = OnceLock::new();

/// The process-wide registry.
pub fn global() -> Arc<SharedRegistry> {
    GLOBAL
        .get_or_init(|| Arc::new(SharedRegistry::new()))
        .clone()
}
