//! Security manager model observed by the startup guard.
//!
//! The security manager, its session manager and its realms are owned by the
//! security framework side of the process. The guard only ever reads them
//! through [`SecurityManagerRegistry`].

pub mod ini;
pub mod loader;
pub mod registry;

use std::sync::Arc;

use serde::Serialize;

pub use loader::{build_security_manager, load_security_manager, spawn_loader, LoadError};
pub use registry::{global, SharedRegistry};

/// Class name of the session manager attached when the config declares none.
pub const DEFAULT_SESSION_MANAGER: &str = "DefaultWebSessionManager";

/// Name of the realm created implicitly from a `[users]`/`[roles]` block.
pub const IMPLICIT_INI_REALM: &str = "iniRealm";

/// The registry cannot be queried at all (framework absent or misconfigured).
///
/// This is distinct from `Ok(None)`, which means "not published yet".
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("security manager registry unavailable: {reason}")]
pub struct RegistryUnavailable {
    pub reason: String,
}

impl RegistryUnavailable {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Source of the process-wide security manager handle.
pub trait SecurityManagerRegistry: Send + Sync {
    /// Take a fresh look at the published security manager.
    fn current(&self) -> Result<Option<Arc<SecurityManager>>, RegistryUnavailable>;
}

impl<T: SecurityManagerRegistry + ?Sized> SecurityManagerRegistry for Arc<T> {
    fn current(&self) -> Result<Option<Arc<SecurityManager>>, RegistryUnavailable> {
        (**self).current()
    }
}

/// Session manager descriptor. Only its presence matters to the guard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionManager {
    pub class_name: String,
}

impl SessionManager {
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
        }
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_MANAGER)
    }
}

/// One `[users]` entry.
#[derive(Clone, PartialEq, Eq)]
pub struct Principal {
    pub username: String,
    password: String,
    pub roles: Vec<String>,
}

impl Principal {
    pub fn new(username: impl Into<String>, password: impl Into<String>, roles: Vec<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            roles,
        }
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

// Passwords stay out of logs.
impl std::fmt::Debug for Principal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Principal")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("roles", &self.roles)
            .finish()
    }
}

/// Principals defined inline in a credential file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrincipalBlock {
    principals: Vec<Principal>,
}

impl PrincipalBlock {
    pub fn new(principals: Vec<Principal>) -> Self {
        Self { principals }
    }

    pub fn is_empty(&self) -> bool {
        self.principals.is_empty()
    }

    pub fn len(&self) -> usize {
        self.principals.len()
    }

    pub fn usernames(&self) -> impl Iterator<Item = &str> {
        self.principals.iter().map(|p| p.username.as_str())
    }

    pub fn get(&self, username: &str) -> Option<&Principal> {
        self.principals.iter().find(|p| p.username == username)
    }
}

/// Realm discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RealmKind {
    /// Principals come from the configuration file itself.
    CredentialFile,
    /// Anything backed by an external directory or service (LDAP, JDBC, ...).
    External,
}

impl RealmKind {
    /// Classify a realm by its implementation class name.
    pub fn from_class_name(class_name: &str) -> Self {
        let simple = class_name.rsplit('.').next().unwrap_or(class_name);
        match simple {
            "IniRealm" | "TextConfigurationRealm" => RealmKind::CredentialFile,
            _ => RealmKind::External,
        }
    }
}

/// A configured authentication realm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Realm {
    pub name: String,
    pub class_name: String,
    kind: RealmKind,
    principals: Option<PrincipalBlock>,
}

impl Realm {
    /// Realm backed by something outside the config file.
    pub fn external(name: impl Into<String>, class_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            class_name: class_name.into(),
            kind: RealmKind::External,
            principals: None,
        }
    }

    /// Credential-file realm, optionally carrying its `[users]` block.
    pub fn credential_file(
        name: impl Into<String>,
        class_name: impl Into<String>,
        principals: Option<PrincipalBlock>,
    ) -> Self {
        Self {
            name: name.into(),
            class_name: class_name.into(),
            kind: RealmKind::CredentialFile,
            principals,
        }
    }

    pub fn kind(&self) -> RealmKind {
        self.kind
    }

    pub fn is_credential_file_backed(&self) -> bool {
        self.kind == RealmKind::CredentialFile
    }

    /// The `[users]` block, only when it defines at least one principal.
    pub fn principal_block(&self) -> Option<&PrincipalBlock> {
        self.principals.as_ref().filter(|block| !block.is_empty())
    }

    pub(crate) fn set_principals(&mut self, principals: PrincipalBlock) {
        self.principals = Some(principals);
    }
}

/// The security manager as published by the framework.
#[derive(Debug, Clone, Default)]
pub struct SecurityManager {
    session_manager: Option<SessionManager>,
    realms: Vec<Realm>,
}

impl SecurityManager {
    pub fn new(session_manager: Option<SessionManager>, realms: Vec<Realm>) -> Self {
        Self {
            session_manager,
            realms,
        }
    }

    pub fn session_manager(&self) -> Option<&SessionManager> {
        self.session_manager.as_ref()
    }

    pub fn realms(&self) -> &[Realm] {
        &self.realms
    }
}
