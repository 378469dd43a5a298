//! Builds a [`SecurityManager`] from a security configuration file and
//! publishes it into a registry.
//!
//! Realm resolution follows the framework's rules:
//! - a non-empty `[users]` or `[roles]` section creates an implicit
//!   credential-file realm named `iniRealm`, ahead of anything in `[main]`
//! - `securityManager.realms = $a, $b` selects and orders the realms
//! - otherwise every realm object is used, in declaration order
//! - `securityManager.sessionManager` may reference a declared object or be
//!   `null`; left unset, the built-in session manager is attached

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use super::ini::{self, SecurityConfig, MAIN_SECTION, ROLES_SECTION, USERS_SECTION};
use super::registry::SharedRegistry;
use super::{
    Principal, PrincipalBlock, Realm, RealmKind, SecurityManager, SessionManager,
    IMPLICIT_INI_REALM,
};

const INI_REALM_CLASS: &str = "org.apache.shiro.realm.text.IniRealm";
const REALMS_KEY: &str = "securityManager.realms";
const SESSION_MANAGER_KEY: &str = "securityManager.sessionManager";

/// Errors raised while loading a security configuration.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read security config {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("unknown object reference '{0}'")]
    UnknownReference(String),

    #[error("'{0}' is not a realm")]
    NotARealm(String),

    #[error("invalid [users] entry for '{username}': {message}")]
    InvalidUser { username: String, message: String },
}

#[derive(Debug)]
struct DeclaredObject {
    name: String,
    class_name: String,
}

impl DeclaredObject {
    fn is_realm(&self) -> bool {
        simple_name(&self.class_name).ends_with("Realm")
    }
}

fn simple_name(class_name: &str) -> &str {
    class_name.rsplit('.').next().unwrap_or(class_name)
}

fn parse_principals(config: &SecurityConfig) -> Result<PrincipalBlock, LoadError> {
    let Some(users) = config.section(USERS_SECTION) else {
        return Ok(PrincipalBlock::default());
    };

    // A repeated username keeps its first position and its last definition.
    let mut principals: Vec<Principal> = Vec::with_capacity(users.len());
    for (username, value) in users.entries() {
        let mut parts = ini::split_list(value).into_iter();
        let password = parts.next().ok_or_else(|| LoadError::InvalidUser {
            username: username.to_string(),
            message: "missing password".to_string(),
        })?;
        let principal = Principal::new(username, password, parts.collect());
        match principals.iter_mut().find(|p| p.username == username) {
            Some(existing) => *existing = principal,
            None => principals.push(principal),
        }
    }

    Ok(PrincipalBlock::new(principals))
}

fn declared_objects(config: &SecurityConfig) -> Vec<DeclaredObject> {
    let mut objects: Vec<DeclaredObject> = Vec::new();

    if config.has_entries(USERS_SECTION) || config.has_entries(ROLES_SECTION) {
        objects.push(DeclaredObject {
            name: IMPLICIT_INI_REALM.to_string(),
            class_name: INI_REALM_CLASS.to_string(),
        });
    }

    let Some(main) = config.section(MAIN_SECTION) else {
        return objects;
    };

    // Plain `name = Class` lines declare objects; dotted keys set properties.
    for (key, value) in main.entries() {
        if key.contains('.') || value.starts_with('$') {
            continue;
        }
        match objects.iter_mut().find(|o| o.name == key) {
            Some(existing) => existing.class_name = value.to_string(),
            None => objects.push(DeclaredObject {
                name: key.to_string(),
                class_name: value.to_string(),
            }),
        }
    }

    objects
}

fn lookup<'a>(objects: &'a [DeclaredObject], reference: &str) -> Result<&'a DeclaredObject, LoadError> {
    let name = reference.strip_prefix('$').unwrap_or(reference);
    objects
        .iter()
        .find(|o| o.name == name)
        .ok_or_else(|| LoadError::UnknownReference(reference.to_string()))
}

/// Resolve the security manager described by a parsed configuration.
pub fn build_security_manager(config: &SecurityConfig) -> Result<SecurityManager, LoadError> {
    let objects = declared_objects(config);
    let main = config.section(MAIN_SECTION);

    let selected: Vec<&DeclaredObject> = match main.and_then(|m| m.get(REALMS_KEY)) {
        Some(list) => ini::split_list(list)
            .iter()
            .map(|reference| {
                let object = lookup(&objects, reference)?;
                if object.is_realm() {
                    Ok(object)
                } else {
                    Err(LoadError::NotARealm(object.name.clone()))
                }
            })
            .collect::<Result<_, _>>()?,
        None => objects.iter().filter(|o| o.is_realm()).collect(),
    };

    let principals = parse_principals(config)?;
    let realms = selected
        .into_iter()
        .map(|object| match RealmKind::from_class_name(&object.class_name) {
            RealmKind::CredentialFile => {
                let mut realm = Realm::credential_file(&object.name, &object.class_name, None);
                if object.name == IMPLICIT_INI_REALM {
                    realm.set_principals(principals.clone());
                }
                realm
            }
            RealmKind::External => Realm::external(&object.name, &object.class_name),
        })
        .collect::<Vec<_>>();

    let session_manager = match main.and_then(|m| m.get(SESSION_MANAGER_KEY)) {
        None => Some(SessionManager::default()),
        Some("null") => None,
        Some(reference) => Some(SessionManager::new(
            lookup(&objects, reference)?.class_name.clone(),
        )),
    };

    debug!(
        "Resolved {} realm(s): {}",
        realms.len(),
        realms
            .iter()
            .map(|r| r.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );

    Ok(SecurityManager::new(session_manager, realms))
}

/// Read, parse and build in one go.
pub fn load_security_manager(path: &Path) -> Result<SecurityManager, LoadError> {
    let config = SecurityConfig::from_file(path)?;
    build_security_manager(&config)
}

/// Load the configuration in the background and publish the outcome.
///
/// `init_delay` postpones the load, the way a framework that initializes on
/// first request would.
pub fn spawn_loader(
    path: PathBuf,
    registry: Arc<SharedRegistry>,
    init_delay: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        if !init_delay.is_zero() {
            debug!("Delaying security manager load by {:?}", init_delay);
            tokio::time::sleep(init_delay).await;
        }

        match load_security_manager(&path) {
            Ok(manager) => {
                info!(
                    "Security manager loaded from {:?} ({} realm(s))",
                    path,
                    manager.realms().len()
                );
                registry.publish(manager);
            }
            Err(e) => {
                error!("Failed to load security config {:?}: {}", path, e);
                registry.mark_unavailable(e.to_string());
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::SecurityManagerRegistry;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn build(input: &str) -> Result<SecurityManager, LoadError> {
        build_security_manager(&SecurityConfig::parse(input).unwrap())
    }

    #[test]
    fn test_users_block_creates_implicit_realm() {
        let manager = build("[users]\nadmin = password1, admin\n").unwrap();
        assert_eq!(manager.realms().len(), 1);

        let realm = &manager.realms()[0];
        assert_eq!(realm.name, IMPLICIT_INI_REALM);
        assert!(realm.is_credential_file_backed());
        let block = realm.principal_block().unwrap();
        assert_eq!(block.usernames().collect::<Vec<_>>(), vec!["admin"]);
        assert_eq!(block.get("admin").unwrap().roles, vec!["admin"]);
        assert!(manager.session_manager().is_some());
    }

    #[test]
    fn test_implicit_realm_comes_first() {
        let manager = build(
            "[main]\nldapRealm = org.apache.zeppelin.realm.LdapRealm\n[users]\nadmin = pw\n",
        )
        .unwrap();
        let names: Vec<_> = manager.realms().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec![IMPLICIT_INI_REALM, "ldapRealm"]);
    }

    #[test]
    fn test_repeated_user_last_definition_wins() {
        let manager = build("[users]\nadmin = old, r1\nguest = pw\nadmin = new, r2\n").unwrap();
        let block = manager.realms()[0].principal_block().unwrap();

        assert_eq!(block.len(), 2);
        assert_eq!(block.usernames().collect::<Vec<_>>(), vec!["admin", "guest"]);
        let admin = block.get("admin").unwrap();
        assert_eq!(admin.password(), "new");
        assert_eq!(admin.roles, vec!["r2"]);
    }

    #[test]
    fn test_roles_only_creates_realm_without_principals() {
        let manager = build("[roles]\nadmin = *\n").unwrap();
        assert_eq!(manager.realms().len(), 1);

        let realm = &manager.realms()[0];
        assert_eq!(realm.name, IMPLICIT_INI_REALM);
        assert!(realm.is_credential_file_backed());
        assert!(realm.principal_block().is_none());
    }

    #[test]
    fn test_explicit_list_can_reference_implicit_realm() {
        let manager = build(
            "[main]\n\
             ldapRealm = org.apache.zeppelin.realm.LdapRealm\n\
             securityManager.realms = $iniRealm, $ldapRealm\n\
             [users]\n\
             admin = pw\n",
        )
        .unwrap();

        let names: Vec<_> = manager.realms().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec![IMPLICIT_INI_REALM, "ldapRealm"]);
        assert!(manager.realms()[0].principal_block().is_some());
        assert!(crate::startup::check_realms(manager.realms()).is_err());
    }

    #[test]
    fn test_explicit_realm_list_selects_and_orders() {
        let manager = build(
            "[main]\n\
             ldapRealm = org.apache.zeppelin.realm.LdapRealm\n\
             pamRealm = org.apache.zeppelin.realm.PamRealm\n\
             securityManager.realms = $pamRealm, $ldapRealm\n\
             [users]\n\
             admin = pw\n",
        )
        .unwrap();
        let names: Vec<_> = manager.realms().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["pamRealm", "ldapRealm"]);
    }

    #[test]
    fn test_non_realm_objects_are_ignored() {
        let manager = build(
            "[main]\n\
             sessionManager = org.apache.shiro.web.session.mgt.DefaultWebSessionManager\n\
             cookie = org.apache.shiro.web.servlet.SimpleCookie\n\
             securityManager.sessionManager = $sessionManager\n",
        )
        .unwrap();
        assert!(manager.realms().is_empty());
        assert_eq!(
            manager.session_manager().unwrap().class_name,
            "org.apache.shiro.web.session.mgt.DefaultWebSessionManager"
        );
    }

    #[test]
    fn test_null_session_manager() {
        let manager = build("[main]\nsecurityManager.sessionManager = null\n").unwrap();
        assert!(manager.session_manager().is_none());
    }

    #[test]
    fn test_reference_errors() {
        let err = build("[main]\nsecurityManager.realms = $missing\n").unwrap_err();
        assert!(matches!(err, LoadError::UnknownReference(ref r) if r == "$missing"));

        let err = build(
            "[main]\ncookie = org.apache.shiro.web.servlet.SimpleCookie\nsecurityManager.realms = $cookie\n",
        )
        .unwrap_err();
        assert!(matches!(err, LoadError::NotARealm(ref n) if n == "cookie"));
    }

    #[test]
    fn test_user_without_password_is_rejected() {
        let err = build("[users]\nadmin =\n").unwrap_err();
        assert!(matches!(err, LoadError::InvalidUser { ref username, .. } if username == "admin"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[users]\nadmin = pw, admin").unwrap();

        let manager = load_security_manager(file.path()).unwrap();
        assert_eq!(manager.realms().len(), 1);

        let err = load_security_manager(Path::new("/nonexistent/shiro.ini")).unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
    }

    #[tokio::test]
    async fn test_spawn_loader_publishes() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[main]\nldapRealm = org.apache.zeppelin.realm.LdapRealm").unwrap();

        let registry = Arc::new(SharedRegistry::new());
        spawn_loader(file.path().to_path_buf(), registry.clone(), Duration::ZERO)
            .await
            .unwrap();

        let manager = registry.current().unwrap().unwrap();
        assert_eq!(manager.realms()[0].name, "ldapRealm");
    }

    #[tokio::test]
    async fn test_spawn_loader_marks_unavailable_on_error() {
        let registry = Arc::new(SharedRegistry::new());
        spawn_loader(
            PathBuf::from("/nonexistent/shiro.ini"),
            registry.clone(),
            Duration::ZERO,
        )
        .await
        .unwrap();

        assert!(registry.current().is_err());
    }
}
