//! INI parser for security configuration files.
//!
//! Understands the layout used by `shiro.ini` style files:
//!
//! ```text
//! [main]
//! ldapRealm = org.apache.zeppelin.realm.LdapRealm
//! securityManager.realms = $ldapRealm
//!
//! [users]
//! admin = password1, admin
//! ```
//!
//! Entries before the first header belong to `[main]`. Repeated headers are
//! merged into the first occurrence.

use std::path::Path;

use super::loader::LoadError;

pub const MAIN_SECTION: &str = "main";
pub const USERS_SECTION: &str = "users";
pub const ROLES_SECTION: &str = "roles";
pub const URLS_SECTION: &str = "urls";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Section {
    pub name: String,
    entries: Vec<(String, String)>,
}

impl Section {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Vec::new(),
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Last value for a key; later assignments win.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// A parsed security configuration document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecurityConfig {
    sections: Vec<Section>,
}

impl SecurityConfig {
    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.name == name)
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// True when the section exists and has at least one entry.
    pub fn has_entries(&self, name: &str) -> bool {
        self.section(name).is_some_and(|s| !s.is_empty())
    }

    fn section_mut(&mut self, name: &str) -> &mut Section {
        if let Some(idx) = self.sections.iter().position(|s| s.name == name) {
            &mut self.sections[idx]
        } else {
            self.sections.push(Section::new(name));
            let last = self.sections.len() - 1;
            &mut self.sections[last]
        }
    }

    pub fn parse(input: &str) -> Result<Self, LoadError> {
        let mut config = SecurityConfig::default();
        let mut current = MAIN_SECTION.to_string();

        for (idx, raw) in input.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw.trim();

            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }

            if let Some(rest) = line.strip_prefix('[') {
                let name = rest.strip_suffix(']').ok_or_else(|| LoadError::Parse {
                    line: line_no,
                    message: format!("unterminated section header: {}", line),
                })?;
                let name = name.trim();
                if name.is_empty() {
                    return Err(LoadError::Parse {
                        line: line_no,
                        message: "empty section name".to_string(),
                    });
                }
                current = name.to_string();
                config.section_mut(&current);
                continue;
            }

            let (key, value) = split_entry(line).ok_or_else(|| LoadError::Parse {
                line: line_no,
                message: format!("expected 'key = value', got: {}", line),
            })?;
            if key.is_empty() {
                return Err(LoadError::Parse {
                    line: line_no,
                    message: "missing key before separator".to_string(),
                });
            }

            config
                .section_mut(&current)
                .entries
                .push((key.to_string(), value.to_string()));
        }

        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, LoadError> {
        let content = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }
}

// Whichever of `=` or `:` comes first separates key and value.
fn split_entry(line: &str) -> Option<(&str, &str)> {
    let idx = line.find(['=', ':'])?;
    Some((line[..idx].trim(), line[idx + 1..].trim()))
}

/// Split a comma separated value, dropping blanks.
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
# leading comment
[main]
ldapRealm = org.apache.zeppelin.realm.LdapRealm
ldapRealm.contextFactory.url = ldap://localhost:389
securityManager.realms = $ldapRealm

[users]
admin = password1, admin
user1 = password2, role1, role2

[urls]
/api/version = anon
/** = authc
"#;

    #[test]
    fn test_parse_sections() {
        let config = SecurityConfig::parse(SAMPLE).unwrap();
        assert_eq!(config.sections().len(), 3);

        let main = config.section(MAIN_SECTION).unwrap();
        assert_eq!(
            main.get("ldapRealm"),
            Some("org.apache.zeppelin.realm.LdapRealm")
        );
        assert_eq!(
            main.get("ldapRealm.contextFactory.url"),
            Some("ldap://localhost:389")
        );

        let users = config.section(USERS_SECTION).unwrap();
        assert_eq!(users.len(), 2);
        assert_eq!(users.get("user1"), Some("password2, role1, role2"));

        let urls = config.section(URLS_SECTION).unwrap();
        assert_eq!(urls.get("/**"), Some("authc"));
    }

    #[test]
    fn test_entries_before_header_go_to_main() {
        let config = SecurityConfig::parse("a = b\n[users]\nx = y\n").unwrap();
        assert_eq!(config.section(MAIN_SECTION).unwrap().get("a"), Some("b"));
        assert!(config.has_entries(USERS_SECTION));
    }

    #[test]
    fn test_repeated_sections_merge() {
        let config = SecurityConfig::parse("[users]\na = 1\n[main]\n[users]\nb = 2\n").unwrap();
        assert_eq!(config.section(USERS_SECTION).unwrap().len(), 2);
    }

    #[test]
    fn test_empty_section_has_no_entries() {
        let config = SecurityConfig::parse("[users]\n; nobody here\n").unwrap();
        assert!(config.section(USERS_SECTION).is_some());
        assert!(!config.has_entries(USERS_SECTION));
    }

    #[test]
    fn test_parse_errors_carry_line() {
        let err = SecurityConfig::parse("[main]\nnot an entry\n").unwrap_err();
        match err {
            LoadError::Parse { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error: {other}"),
        }

        assert!(SecurityConfig::parse("[main\n").is_err());
        assert!(SecurityConfig::parse("[]\n").is_err());
        assert!(SecurityConfig::parse("= value\n").is_err());
    }

    #[test]
    fn test_first_separator_splits_entry() {
        let config = SecurityConfig::parse(
            "[users]\nadmin: pa=ss, admin\nguest = pw:1\n[urls]\n/api/** = authc\n",
        )
        .unwrap();

        let users = config.section(USERS_SECTION).unwrap();
        assert_eq!(users.get("admin"), Some("pa=ss, admin"));
        assert_eq!(users.get("guest"), Some("pw:1"));
        assert_eq!(
            config.section(URLS_SECTION).unwrap().get("/api/**"),
            Some("authc")
        );
    }

    #[test]
    fn test_split_list() {
        assert_eq!(split_list("a, b ,,c"), vec!["a", "b", "c"]);
        assert!(split_list("  ").is_empty());
    }
}
