//! `dev`: scaffold a plugin module from a template.

use std::path::{Path, PathBuf};

use heck::ToUpperCamelCase;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::manifest::{ManifestDocument, PluginPackage};
use crate::paths::{self, MANIFEST_FILE, SETTINGS_FILE};
use crate::template::{self, Template, TemplateContext};
use crate::utils::io;
use crate::workspace::{WorkRepo, Workspace};

const METADATA_FILES: [&str; 2] = ["README.md", "CHANGELOG.md"];

#[derive(Debug, Clone)]
pub struct DevOptions {
    pub template: String,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DevReport {
    pub module: String,
    pub package: String,
    pub template: Template,
    pub install_path: String,
    /// The repository had no manifest and one was created.
    pub package_created: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub created_files: Vec<String>,
}

/// Upper camel case per path segment with an `MBox` prefix.
///
/// Returns the name and whether the prefix had to be added.
pub fn module_name(raw: &str) -> (String, bool) {
    let mut name = raw
        .split('/')
        .filter(|segment| !segment.is_empty())
        .map(|segment| segment.to_upper_camel_case())
        .collect::<Vec<_>>()
        .join("/");

    if name
        .get(..4)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("mbox"))
    {
        name = format!("MBox{}", &name[4..]);
    }
    if name.starts_with("MBox") {
        (name, false)
    } else {
        (format!("MBox{}", name), true)
    }
}

/// Module name used when none is given on the command line.
///
/// Templates that support submodules target the current directory; the
/// others always target the repository root. A manifest in the target
/// directory wins over the directory name.
fn origin_name(template: Template, repo: &WorkRepo, cwd: &Path) -> Result<String> {
    let dir = if !template.supports_submodule() || cwd == repo.path {
        repo.path.as_path()
    } else {
        cwd
    };

    let manifest = dir.join(MANIFEST_FILE);
    if manifest.is_file() {
        let content = io::read_file(&manifest, "read manifest")?;
        return Ok(ManifestDocument::parse(&content, &manifest)?.name);
    }

    let relative = repo
        .path
        .parent()
        .and_then(|parent| dir.strip_prefix(parent).ok())
        .map(|path| path.display().to_string())
        .filter(|path| !path.is_empty() && path != ".");
    Ok(relative.unwrap_or_else(|| {
        dir.file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default()
    }))
}

/// Scaffold `options.template` into the repository containing `cwd`.
pub fn scaffold(workspace: &Workspace, cwd: &Path, options: &DevOptions) -> Result<DevReport> {
    let template = Template::parse(&options.template)?;
    let repo = workspace.repo_containing(cwd)?;
    let defaults = &workspace.defaults;

    let origin = match &options.name {
        Some(name) => name.clone(),
        None => origin_name(template, repo, cwd)?,
    };
    let (name, prefixed) = module_name(&origin);
    if prefixed {
        crate::log_status!(
            "dev",
            "MBox Plugin must has a prefix `MBox`, so we use the name `{}`.",
            name
        );
    }

    let existing = repo.manifest()?;
    let package_created = existing.is_none();
    let mut package = match existing {
        Some(package) => package.clone(),
        None => PluginPackage::create(
            &name,
            &repo.path,
            repo.git().author_info(),
            &defaults.core_package,
        ),
    };
    let module = package.create_module(&name)?.clone();

    let install_path = template.install_path(&module);
    if install_path.exists() {
        return Err(Error::dev_install_path_exists(
            template.name(),
            install_path.display().to_string(),
        ));
    }
    let source = template.source_dir(defaults);
    if let Some(source) = &source {
        if !source.is_dir() {
            return Err(Error::config_invalid_value(
                "defaults.templates_root",
                Some(source.display().to_string()),
                format!("Template `{}` not found", template.name()),
            ));
        }
    }
    crate::log_status!(
        "dev",
        "Create Plugin Module `{}` with Template `{}`",
        name,
        template.name()
    );

    template::copy(template, source.as_deref(), &install_path)?;
    template::clean_unused_files(template, &install_path);
    template::apply(&TemplateContext::new(&module, defaults), &install_path)?;
    template::merge_config(&install_path.join(SETTINGS_FILE), &repo.path)?;

    if let Some(module) = package.module_mut(&name) {
        template.update_manifest(module);
    }
    package.save_all()?;

    let created_files = create_metadata(&repo.path)?;
    crate::log_status!("dev", "Create Plugin `{}` Success!", name);

    Ok(DevReport {
        module: name,
        package: package.name().to_string(),
        template,
        install_path: paths::display_relative(&install_path, &workspace.root),
        package_created,
        created_files,
    })
}

/// Create empty README/CHANGELOG files that do not exist yet.
fn create_metadata(repo_dir: &Path) -> Result<Vec<String>> {
    let mut created = Vec::new();
    for file in METADATA_FILES {
        let path: PathBuf = repo_dir.join(file);
        if !path.exists() {
            io::write_file(&path, "", "create metadata file")?;
            created.push(file.to_string());
        }
    }
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defaults::Defaults;
    use crate::git::fake::FakeGit;
    use std::fs;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn workspace(root: &Path, defaults: Defaults) -> Workspace {
        let repo_dir = root.join("repos/MBoxFoo");
        fs::create_dir_all(&repo_dir).unwrap();
        let repo = WorkRepo::new("MBoxFoo", repo_dir, Arc::new(FakeGit::at("c1")));
        Workspace::with_repos(root, defaults, vec![repo])
    }

    #[test]
    fn module_name_normalizes_prefix() {
        assert_eq!(module_name("foo"), ("MBoxFoo".to_string(), true));
        assert_eq!(module_name("mbox-foo"), ("MBoxFoo".to_string(), false));
        assert_eq!(module_name("MBoxFoo/ui"), ("MBoxFoo/Ui".to_string(), false));
    }

    #[test]
    fn resource_template_creates_package_and_module() {
        let root = TempDir::new().unwrap();
        let workspace = workspace(root.path(), Defaults::default());
        let repo_dir = root.path().join("repos/MBoxFoo");

        let options = DevOptions {
            template: "resource".to_string(),
            name: None,
        };
        let report = scaffold(&workspace, &repo_dir, &options).unwrap();

        assert_eq!(report.module, "MBoxFoo");
        assert!(report.package_created);
        assert!(repo_dir.join("Resources").is_dir());
        assert!(repo_dir.join("README.md").is_file());
        assert!(repo_dir.join("CHANGELOG.md").is_file());

        let package = PluginPackage::from_directory(&repo_dir).unwrap().unwrap();
        assert_eq!(package.version(), "1.0");
        assert_eq!(package.document().authors, vec!["Jane Doe (jane@example.com)"]);
        assert_eq!(package.document().dependencies, vec!["MBoxCore"]);
    }

    #[test]
    fn existing_install_path_is_rejected() {
        let root = TempDir::new().unwrap();
        let workspace = workspace(root.path(), Defaults::default());
        let repo_dir = root.path().join("repos/MBoxFoo");
        fs::create_dir_all(repo_dir.join("Resources")).unwrap();

        let options = DevOptions {
            template: "Resource".to_string(),
            name: None,
        };
        let err = scaffold(&workspace, &repo_dir, &options).unwrap_err();
        assert_eq!(err.code.as_str(), "dev.install_path_exists");
        assert_eq!(err.message, "The directory `Resource` exists!");
    }

    #[test]
    fn launcher_template_renders_tokens_and_marks_manifest() {
        let root = TempDir::new().unwrap();
        let templates = root.path().join("templates/Launcher");
        fs::create_dir_all(&templates).unwrap();
        fs::write(
            templates.join("__mbox_module_name__.rb"),
            "require '__mbox-package-name__' # __mbox_latest_version__\n",
        )
        .unwrap();
        fs::write(templates.join(".mboxconfig"), r#"{"launcher":["__MBoxModuleName__"]}"#).unwrap();

        let defaults = Defaults {
            templates_root: Some(root.path().join("templates").display().to_string()),
            latest_runtime_version: Some("3.0.0".to_string()),
            ..Defaults::default()
        };
        let workspace = workspace(root.path(), defaults);
        let repo_dir = root.path().join("repos/MBoxFoo");

        let options = DevOptions {
            template: "launcher".to_string(),
            name: Some("foo".to_string()),
        };
        scaffold(&workspace, &repo_dir, &options).unwrap();

        let script = fs::read_to_string(repo_dir.join("Launcher/mbox_foo.rb")).unwrap();
        assert_eq!(script, "require 'mbox-foo' # 3.0.0\n");
        assert!(!repo_dir.join("Launcher/.mboxconfig").exists());
        let settings = fs::read_to_string(repo_dir.join(".mboxconfig")).unwrap();
        assert!(settings.contains("MBoxFoo"));

        let package = PluginPackage::from_directory(&repo_dir).unwrap().unwrap();
        assert!(package.document().has_launcher);
    }

    #[test]
    fn setting_template_targets_submodule_directory() {
        let root = TempDir::new().unwrap();
        let workspace = workspace(root.path(), Defaults::default());
        let repo_dir = root.path().join("repos/MBoxFoo");
        fs::write(repo_dir.join("manifest.yml"), "NAME: MBoxFoo\nVERSION: '1.0'\n").unwrap();
        let ui = repo_dir.join("Ui");
        fs::create_dir_all(&ui).unwrap();

        let options = DevOptions {
            template: "Setting".to_string(),
            name: None,
        };
        let report = scaffold(&workspace, &ui, &options).unwrap();

        assert_eq!(report.module, "MBoxFoo/Ui");
        assert!(!report.package_created);
        assert!(ui.join("Setting").is_dir());
        assert!(ui.join("manifest.yml").is_file());
        let package = PluginPackage::from_directory(&repo_dir).unwrap().unwrap();
        assert_eq!(package.document().modules, vec!["MBoxFoo/Ui"]);
    }

    #[test]
    fn name_outside_package_prefix_is_rejected() {
        let root = TempDir::new().unwrap();
        let workspace = workspace(root.path(), Defaults::default());
        let repo_dir = root.path().join("repos/MBoxFoo");
        fs::write(repo_dir.join("manifest.yml"), "NAME: MBoxFoo\nVERSION: '1.0'\n").unwrap();

        let options = DevOptions {
            template: "Setting".to_string(),
            name: Some("MBoxBar".to_string()),
        };
        let err = scaffold(&workspace, &repo_dir, &options).unwrap_err();
        assert_eq!(err.code.as_str(), "validation.invalid_argument");
    }
}
