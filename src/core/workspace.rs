//! Workspace discovery and the repositories of the current feature.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Serialize};

use crate::config;
use crate::defaults::{self, Defaults};
use crate::error::{Error, Result};
use crate::git::{GitAdapter, SystemGit};
use crate::manifest::{self, PluginPackage};
use crate::paths::{self, MANIFEST_FILE, WORKSPACE_DIR};

/// Feature used when `.mbox/config.json` names none.
pub const DEFAULT_FEATURE: &str = "FreeMode";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_feature: Option<String>,
    #[serde(default)]
    pub features: BTreeMap<String, FeatureConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeatureConfig {
    #[serde(default)]
    pub repos: Vec<RepoConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl WorkspaceConfig {
    pub fn current_feature_name(&self) -> &str {
        self.current_feature.as_deref().unwrap_or(DEFAULT_FEATURE)
    }

    pub fn current_repos(&self) -> &[RepoConfig] {
        self.features
            .get(self.current_feature_name())
            .map(|feature| feature.repos.as_slice())
            .unwrap_or(&[])
    }
}

/// A repository of the current feature.
///
/// The manifest is read once on first access and cached; call
/// [`WorkRepo::reload_manifest`] after writing it.
pub struct WorkRepo {
    pub name: String,
    pub path: PathBuf,
    url: Option<String>,
    git: Arc<dyn GitAdapter>,
    manifest: OnceLock<Option<PluginPackage>>,
}

impl fmt::Debug for WorkRepo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkRepo")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("url", &self.url)
            .finish()
    }
}

impl WorkRepo {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>, git: Arc<dyn GitAdapter>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            url: None,
            git,
            manifest: OnceLock::new(),
        }
    }

    /// Repository backed by the system `git` binary.
    pub fn open(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let git = Arc::new(SystemGit::new(path.clone()));
        Self::new(name, path, git)
    }

    pub fn with_url(mut self, url: Option<String>) -> Self {
        self.url = url;
        self
    }

    pub fn git(&self) -> &dyn GitAdapter {
        self.git.as_ref()
    }

    /// Configured URL, falling back to the `origin` remote.
    pub fn url(&self) -> Option<String> {
        self.url.clone().or_else(|| self.git.remote_url())
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.path.join(MANIFEST_FILE)
    }

    pub fn manifest(&self) -> Result<Option<&PluginPackage>> {
        if let Some(cached) = self.manifest.get() {
            return Ok(cached.as_ref());
        }
        let loaded = PluginPackage::load(&self.manifest_path())?;
        let _ = self.manifest.set(loaded);
        Ok(self.manifest.get().and_then(Option::as_ref))
    }

    /// Manifest, or a `manifest.missing` error naming this repo.
    pub fn require_manifest(&self) -> Result<&PluginPackage> {
        self.manifest()?.ok_or_else(|| {
            Error::manifest_missing(&self.name, Some(self.manifest_path().display().to_string()))
        })
    }

    pub fn reload_manifest(&mut self) {
        self.manifest = OnceLock::new();
    }

    /// Package name, or the repo name when there is no manifest.
    pub fn package_name(&self) -> String {
        match self.manifest() {
            Ok(Some(package)) => package.name().to_string(),
            _ => self.name.clone(),
        }
    }

    /// `<output_dir>/<package name>`.
    pub fn product_dir(&self, output_dir: &Path) -> PathBuf {
        manifest::product_dir(output_dir, &self.package_name())
    }

    /// Case-insensitive match on the repo name or the manifest name.
    pub fn is_name(&self, name: &str) -> bool {
        if self.name.eq_ignore_ascii_case(name) {
            return true;
        }
        matches!(self.manifest(), Ok(Some(package)) if package.name().eq_ignore_ascii_case(name))
    }
}

#[derive(Debug)]
pub struct Workspace {
    pub root: PathBuf,
    pub config: WorkspaceConfig,
    pub defaults: Defaults,
    repos: Vec<WorkRepo>,
}

impl Workspace {
    /// Nearest ancestor of `start` (inclusive) containing `.mbox/`.
    pub fn find_root(start: &Path) -> Option<PathBuf> {
        start
            .ancestors()
            .find(|dir| dir.join(WORKSPACE_DIR).is_dir())
            .map(Path::to_path_buf)
    }

    /// Discover the workspace around `start` with the user's dev config.
    pub fn discover(start: &Path) -> Result<Self> {
        let root = Self::find_root(start)
            .ok_or_else(|| Error::workspace_not_found(start.display().to_string()))?;
        Self::open(&root, defaults::load_config().defaults)
    }

    /// Open the workspace at `root`. Repos use the system `git` binary.
    pub fn open(root: &Path, defaults: Defaults) -> Result<Self> {
        let config: WorkspaceConfig =
            config::load_json_file(&paths::workspace_config(root))?.unwrap_or_default();
        let repos = config
            .current_repos()
            .iter()
            .map(|repo| {
                let path = match &repo.path {
                    Some(raw) => paths::resolve(root, raw),
                    None => root.join("repos").join(&repo.name),
                };
                WorkRepo::open(&repo.name, path).with_url(repo.url.clone())
            })
            .collect();

        Ok(Self {
            root: root.to_path_buf(),
            config,
            defaults,
            repos,
        })
    }

    /// Workspace with an explicit repo list.
    pub fn with_repos(root: &Path, defaults: Defaults, repos: Vec<WorkRepo>) -> Self {
        Self {
            root: root.to_path_buf(),
            config: WorkspaceConfig::default(),
            defaults,
            repos,
        }
    }

    pub fn repos(&self) -> &[WorkRepo] {
        &self.repos
    }

    pub fn find_repo(&self, name: &str) -> Option<&WorkRepo> {
        self.repos.iter().find(|repo| repo.is_name(name))
    }

    /// Remove the named repo so it can be mutated on its own.
    pub fn take_repo(&mut self, name: &str) -> Option<WorkRepo> {
        let index = self.repos.iter().position(|repo| repo.is_name(name))?;
        Some(self.repos.remove(index))
    }

    /// Repository whose directory contains `dir`.
    pub fn repo_containing(&self, dir: &Path) -> Result<&WorkRepo> {
        self.repos
            .iter()
            .filter(|repo| dir.starts_with(&repo.path))
            .max_by_key(|repo| repo.path.components().count())
            .ok_or_else(|| Error::repo_not_found(dir.display().to_string()))
    }

    pub fn release_dir(&self) -> PathBuf {
        paths::release_dir(&self.root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn workspace_with_config(config: &str) -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join(".mbox")).unwrap();
        fs::write(dir.path().join(".mbox/config.json"), config).unwrap();
        dir
    }

    #[test]
    fn find_root_walks_up_to_marker() {
        let dir = workspace_with_config("{}");
        let nested = dir.path().join("repos/MBoxFoo/Native");
        fs::create_dir_all(&nested).unwrap();
        assert_eq!(Workspace::find_root(&nested).unwrap(), dir.path());
    }

    #[test]
    fn open_reads_current_feature_repos() {
        let dir = workspace_with_config(
            r#"{
                "current_feature": "login",
                "features": {
                    "login": { "repos": [
                        { "name": "MBoxFoo" },
                        { "name": "MBoxBar", "path": "/elsewhere/MBoxBar", "url": "git@host:o/MBoxBar.git" }
                    ]},
                    "other": { "repos": [ { "name": "MBoxBaz" } ] }
                }
            }"#,
        );
        let workspace = Workspace::open(dir.path(), Defaults::default()).unwrap();

        let names: Vec<&str> = workspace.repos().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["MBoxFoo", "MBoxBar"]);
        assert_eq!(workspace.repos()[0].path, dir.path().join("repos/MBoxFoo"));
        assert_eq!(workspace.repos()[1].path, PathBuf::from("/elsewhere/MBoxBar"));
        assert_eq!(
            workspace.repos()[1].url().as_deref(),
            Some("git@host:o/MBoxBar.git")
        );
    }

    #[test]
    fn missing_feature_has_no_repos() {
        let dir = workspace_with_config(r#"{"features":{"login":{"repos":[{"name":"A"}]}}}"#);
        let workspace = Workspace::open(dir.path(), Defaults::default()).unwrap();
        assert!(workspace.repos().is_empty());
    }

    #[test]
    fn find_repo_matches_manifest_name_case_insensitively() {
        let dir = workspace_with_config(
            r#"{"current_feature":"f","features":{"f":{"repos":[{"name":"foo-repo"}]}}}"#,
        );
        let repo_dir = dir.path().join("repos/foo-repo");
        fs::create_dir_all(&repo_dir).unwrap();
        fs::write(repo_dir.join("manifest.yml"), "NAME: MBoxFoo\nVERSION: '1.0'\n").unwrap();

        let workspace = Workspace::open(dir.path(), Defaults::default()).unwrap();
        assert!(workspace.find_repo("mboxfoo").is_some());
        assert!(workspace.find_repo("FOO-REPO").is_some());
        assert!(workspace.find_repo("MBoxBar").is_none());
        assert_eq!(
            workspace.repos()[0].product_dir(Path::new("/out")),
            PathBuf::from("/out/MBoxFoo")
        );
    }

    #[test]
    fn repo_containing_picks_enclosing_repo() {
        let dir = workspace_with_config(
            r#"{"current_feature":"f","features":{"f":{"repos":[{"name":"MBoxFoo"}]}}}"#,
        );
        let workspace = Workspace::open(dir.path(), Defaults::default()).unwrap();
        let inside = dir.path().join("repos/MBoxFoo/Native/Sources");
        assert_eq!(workspace.repo_containing(&inside).unwrap().name, "MBoxFoo");

        let err = workspace.repo_containing(dir.path()).unwrap_err();
        assert_eq!(err.code.as_str(), "repo.not_found");
    }

    #[test]
    fn manifest_is_cached_until_reload() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("manifest.yml"), "NAME: MBoxFoo\nVERSION: '1.0'\n").unwrap();
        let mut repo = WorkRepo::open("MBoxFoo", dir.path());
        assert_eq!(repo.manifest().unwrap().unwrap().version(), "1.0");

        fs::write(dir.path().join("manifest.yml"), "NAME: MBoxFoo\nVERSION: '2.0'\n").unwrap();
        assert_eq!(repo.manifest().unwrap().unwrap().version(), "1.0");

        repo.reload_manifest();
        assert_eq!(repo.manifest().unwrap().unwrap().version(), "2.0");
    }
}
