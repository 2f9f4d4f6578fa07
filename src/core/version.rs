//! Release version derivation from the manifest base version and git tags.
//!
//! The manifest `VERSION` holds the base (`1.2`); released versions append a
//! patch number (`1.2.0`, `1.2.1`, ...). The patch number continues from the
//! highest version tag when that tag shares the base, and restarts at zero
//! otherwise.

use serde::Serialize;

use crate::error::{Error, Result};
use crate::manifest::PluginPackage;
use crate::workspace::WorkRepo;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionPair {
    /// Latest released version (highest tag, `v` stripped).
    pub current: Option<String>,
    pub next: String,
}

impl VersionPair {
    /// HEAD is already the latest release.
    pub fn is_unchanged(&self) -> bool {
        self.current.as_deref() == Some(self.next.as_str())
    }
}

/// Compute `(current, next)` for `repo`.
///
/// When HEAD is the commit of the highest tag, both halves are the tag
/// version; callers decide whether to skip or release it again.
pub fn resolve(repo: &WorkRepo) -> Result<VersionPair> {
    let package = repo.manifest()?.ok_or_else(|| {
        Error::config_invalid_value(
            "manifest",
            Some(repo.manifest_path().display().to_string()),
            format!("[{}] There is not a manifest.yml", repo.name),
        )
    })?;
    let base = package.version();
    if base.is_empty() {
        return Err(Error::manifest_invalid(
            package.file_path().display().to_string(),
            format!("[{}] Require `VERSION` in the `manifest.yml`.", repo.name),
        ));
    }
    let git = repo.git();
    let head = git
        .current_commit()
        .ok_or_else(|| Error::git_status_error(&repo.name))?;
    let tag = git.max_version_tag()?;

    if let Some(tag) = &tag {
        if tag.oid == head {
            let current = tag.version().to_string();
            return Ok(VersionPair {
                current: Some(current.clone()),
                next: current,
            });
        }
    }

    let current = tag.as_ref().map(|tag| tag.version().to_string());
    let next = next_version(base, current.as_deref());
    Ok(VersionPair { current, next })
}

/// `<base>.<patch>` following the latest released version.
pub fn next_version(base: &str, latest: Option<&str>) -> String {
    let number = match latest {
        Some(latest) => {
            let (prefix, last) = latest.rsplit_once('.').unwrap_or(("", latest));
            let number = last.parse::<u64>().unwrap_or(0);
            if prefix == base {
                number + 1
            } else {
                0
            }
        }
        None => 0,
    };
    format!("{}.{}", base, number)
}

/// Overwrite the manifest base version. Returns false when it already matches.
///
/// The repo's cached manifest is reloaded after a write.
pub fn update_major_version(repo: &mut WorkRepo, version: &str) -> Result<bool> {
    if version.trim().is_empty() {
        return Err(Error::validation_invalid_argument(
            "new_version",
            "Version must not be empty.",
            None,
            None,
        ));
    }
    let mut package: PluginPackage = repo
        .manifest()?
        .cloned()
        .ok_or_else(|| {
            Error::config_invalid_value(
                "manifest",
                Some(repo.manifest_path().display().to_string()),
                format!("[{}] There is not a manifest.yml", repo.name),
            )
        })?;

    if package.version() == version {
        crate::log_status!("version", "Version is already {}.", version);
        return Ok(false);
    }

    crate::log_status!("version", "Update version {} -> {}.", package.version(), version);
    package.set_version(version);
    package.save()?;
    repo.reload_manifest();
    Ok(true)
}
