use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Serialize;

use crate::cli::SECURITY_CONFIG_ENV;
use crate::config::GuardSettings;
use crate::security::{load_security_manager, RealmKind, SecurityManager};
use crate::startup::check_realms;

#[derive(Debug, Serialize)]
pub struct RealmSummary {
    pub name: String,
    pub class_name: String,
    pub kind: RealmKind,
    /// Number of `[users]` entries; never the entries themselves
    pub principals: usize,
}

#[derive(Debug, Serialize)]
pub struct InspectReport {
    pub config: String,
    pub session_manager: Option<String>,
    pub realms: Vec<RealmSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conflict: Option<String>,
}

pub fn inspect_report(config: &str, manager: &SecurityManager) -> InspectReport {
    InspectReport {
        config: config.to_string(),
        session_manager: manager.session_manager().map(|s| s.class_name.clone()),
        realms: manager
            .realms()
            .iter()
            .map(|realm| RealmSummary {
                name: realm.name.clone(),
                class_name: realm.class_name.clone(),
                kind: realm.kind(),
                principals: realm.principal_block().map_or(0, |b| b.len()),
            })
            .collect(),
        conflict: check_realms(manager.realms()).err().map(|e| e.to_string()),
    }
}

pub async fn run_inspect(settings: GuardSettings, json: bool) -> Result<()> {
    if !settings.is_enabled() {
        bail!(
            "No security config given. Use --config or set {}",
            SECURITY_CONFIG_ENV
        );
    }

    let manager = load_security_manager(Path::new(&settings.security_config))
        .with_context(|| format!("Failed to load {}", settings.security_config))?;
    let report = inspect_report(&settings.security_config, &manager);

    if json {
        let rendered =
            serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
        println!("{}", rendered);
        return Ok(());
    }

    println!("Security config: {}", report.config);
    match &report.session_manager {
        Some(class_name) => println!("Session manager: {}", class_name),
        None => println!("Session manager: (none)"),
    }
    println!("Realms ({}):", report.realms.len());
    for realm in &report.realms {
        match realm.kind {
            RealmKind::CredentialFile => println!(
                "   - {} [{}] credential file, {} user(s)",
                realm.name, realm.class_name, realm.principals
            ),
            RealmKind::External => println!("   - {} [{}]", realm.name, realm.class_name),
        }
    }
    match &report.conflict {
        Some(conflict) => println!("\n❌ {}", conflict),
        None => println!("\n✅ No conflicting auth mechanisms"),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::ini::SecurityConfig;
    use crate::security::build_security_manager;

    fn report(input: &str) -> InspectReport {
        let manager = build_security_manager(&SecurityConfig::parse(input).unwrap()).unwrap();
        inspect_report("shiro.ini", &manager)
    }

    #[test]
    fn test_report_counts_users_without_passwords() {
        let report = report("[users]\nadmin = topsecret, admin\nuser1 = pw2\n");
        assert_eq!(report.realms.len(), 1);
        assert_eq!(report.realms[0].principals, 2);
        assert!(report.conflict.is_none());

        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"credential_file\""));
        assert!(!json.contains("topsecret"));
        assert!(!json.contains("conflict"));
    }

    #[test]
    fn test_report_flags_conflict() {
        let report = report(
            "[main]\nldapRealm = org.apache.zeppelin.realm.LdapRealm\n[users]\nadmin = pw\n",
        );
        assert_eq!(report.realms.len(), 2);
        assert!(report.conflict.unwrap().contains("should be exclusive"));
    }

    #[tokio::test]
    async fn test_run_inspect_requires_config() {
        let err = run_inspect(GuardSettings::default(), false).await.unwrap_err();
        assert!(err.to_string().contains(SECURITY_CONFIG_ENV));
    }
}
