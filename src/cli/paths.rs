use anyhow::{Context, Result};
use std::path::PathBuf;

/// Expand a leading `~/` to the home directory.
pub fn expand_home(path: &str) -> Result<PathBuf> {
    match path.strip_prefix("~/") {
        Some(rest) => Ok(dirs::home_dir()
            .context("Could not determine home directory")?
            .join(rest)),
        None => Ok(PathBuf::from(path)),
    }
}

/// Resolve the security configuration path given on the command line.
///
/// Only the empty string disables validation; anything else is a path.
/// Existing files are canonicalized; missing ones are kept as given so the
/// loader can report them.
pub fn resolve_config_path(config: &str) -> Result<String> {
    if config.is_empty() {
        return Ok(String::new());
    }

    let path = expand_home(config)?;
    if !path.exists() {
        return Ok(path.to_string_lossy().into_owned());
    }

    let canonical = path
        .canonicalize()
        .with_context(|| format!("Failed to canonicalize security config path: {}", config))?;
    Ok(canonical.to_string_lossy().into_owned())
}
