use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::config;
use crate::paths;

/// Root configuration structure for config.json
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DevConfig {
    #[serde(default)]
    pub defaults: Defaults,
}

/// All configurable defaults that can be overridden via config.json
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Defaults {
    /// Branches a non-forced build may release from.
    #[serde(default = "default_release_branches")]
    pub release_branches: Vec<String>,

    /// Value of `__mbox_latest_version__` when rendering templates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_runtime_version: Option<String>,

    /// Directory holding the bundled template sources (`<root>/Launcher`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub templates_root: Option<String>,

    /// Rakefile driving the plugin test suites.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_rakefile: Option<String>,

    /// Package every new manifest depends on.
    #[serde(default = "default_core_package")]
    pub core_package: String,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            release_branches: default_release_branches(),
            latest_runtime_version: None,
            templates_root: None,
            test_rakefile: None,
            core_package: default_core_package(),
        }
    }
}

/// Fallback for `__mbox_latest_version__` when nothing is configured.
pub const FALLBACK_RUNTIME_VERSION: &str = "2.4.0";

fn default_release_branches() -> Vec<String> {
    vec![
        "master".to_string(),
        "main".to_string(),
        "develop".to_string(),
    ]
}

fn default_core_package() -> String {
    "MBoxCore".to_string()
}

impl Defaults {
    pub fn runtime_version(&self) -> String {
        self.latest_runtime_version
            .clone()
            .unwrap_or_else(|| FALLBACK_RUNTIME_VERSION.to_string())
    }

    pub fn templates_root(&self) -> Option<PathBuf> {
        self.templates_root
            .as_deref()
            .map(|raw| PathBuf::from(shellexpand::tilde(raw).as_ref()))
    }

    pub fn test_rakefile(&self) -> Option<PathBuf> {
        self.test_rakefile
            .as_deref()
            .map(|raw| PathBuf::from(shellexpand::tilde(raw).as_ref()))
    }
}

/// Load config from file, or return defaults if not found or invalid.
pub fn load_config() -> DevConfig {
    match load_config_from_file() {
        Ok(config) => config.unwrap_or_default(),
        Err(err) => {
            crate::log_status!("config", "Ignoring config: {}", err);
            DevConfig::default()
        }
    }
}

fn load_config_from_file() -> crate::Result<Option<DevConfig>> {
    let path = paths::config_json()?;
    config::load_json_file(&path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config: DevConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(
            config.defaults.release_branches,
            vec!["master", "main", "develop"]
        );
        assert_eq!(config.defaults.runtime_version(), "2.4.0");
        assert_eq!(config.defaults.core_package, "MBoxCore");
    }

    #[test]
    fn configured_runtime_version_wins() {
        let config: DevConfig =
            serde_json::from_str(r#"{"defaults":{"latest_runtime_version":"3.1.0"}}"#).unwrap();
        assert_eq!(config.defaults.runtime_version(), "3.1.0");
    }
}
