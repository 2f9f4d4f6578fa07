use crate::error::{Error, Result};
use std::env;
use std::path::{Path, PathBuf};

/// Workspace metadata directory name.
pub const WORKSPACE_DIR: &str = ".mbox";
/// Package/module manifest file name.
pub const MANIFEST_FILE: &str = "manifest.yml";
/// Repository settings file name.
pub const SETTINGS_FILE: &str = ".mboxconfig";
/// Per-module settings schema shipped with the product.
pub const SETTING_SCHEMA_FILE: &str = "setting.schema.json";

/// Base config directory (~/.config/mbox-dev/ on all platforms)
pub fn mbox_dev() -> Result<PathBuf> {
    #[cfg(windows)]
    {
        let appdata = env::var("APPDATA").map_err(|_| {
            Error::internal_unexpected("APPDATA environment variable not set on Windows")
        })?;
        Ok(PathBuf::from(appdata).join("mbox-dev"))
    }

    #[cfg(not(windows))]
    {
        let home = env::var("HOME").map_err(|_| {
            Error::internal_unexpected("HOME environment variable not set on Unix-like system")
        })?;
        Ok(PathBuf::from(home).join(".config").join("mbox-dev"))
    }
}

/// Global config file path
pub fn config_json() -> Result<PathBuf> {
    Ok(mbox_dev()?.join("config.json"))
}

/// Workspace repo list
pub fn workspace_config(root: &Path) -> PathBuf {
    root.join(WORKSPACE_DIR).join("config.json")
}

/// Default build output directory of a workspace
pub fn release_dir(root: &Path) -> PathBuf {
    root.join("release")
}

/// Expand `~` and resolve relative paths against `base`.
pub fn resolve(base: &Path, raw: &str) -> PathBuf {
    let expanded = shellexpand::tilde(raw);
    let path = Path::new(expanded.as_ref());
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// Render `path` relative to `base` for log lines, falling back to the full path.
pub fn display_relative(path: &Path, base: &Path) -> String {
    path.strip_prefix(base)
        .map(|p| p.display().to_string())
        .unwrap_or_else(|_| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_keeps_absolute_paths() {
        assert_eq!(resolve(Path::new("/ws"), "/abs/out"), PathBuf::from("/abs/out"));
    }

    #[test]
    fn resolve_joins_relative_paths() {
        assert_eq!(resolve(Path::new("/ws"), "repos/Foo"), PathBuf::from("/ws/repos/Foo"));
    }

    #[test]
    fn display_relative_strips_base() {
        assert_eq!(
            display_relative(Path::new("/ws/release/Foo"), Path::new("/ws")),
            "release/Foo"
        );
    }
}
