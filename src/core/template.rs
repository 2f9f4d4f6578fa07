//! Plugin templates used by `dev`, and the token substitution applied to them.

use std::fs;
use std::path::{Path, PathBuf};

use heck::{ToKebabCase, ToSnakeCase};
use serde::Serialize;
use serde_json::Value;

use crate::config;
use crate::defaults::Defaults;
use crate::error::{Error, Result};
use crate::manifest::PluginModule;
use crate::paths::{self, SETTINGS_FILE};
use crate::utils::io;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Template {
    Launcher,
    Resource,
    Setting,
}

impl Template {
    pub const ALL: [Template; 3] = [Template::Launcher, Template::Resource, Template::Setting];

    pub fn name(self) -> &'static str {
        match self {
            Template::Launcher => "Launcher",
            Template::Resource => "Resource",
            Template::Setting => "Setting",
        }
    }

    /// Directory created inside the module.
    pub fn dir_name(self) -> &'static str {
        match self {
            Template::Launcher => "Launcher",
            Template::Resource => "Resources",
            Template::Setting => "Setting",
        }
    }

    /// Case-insensitive lookup by name.
    pub fn parse(name: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|template| template.name().eq_ignore_ascii_case(name))
            .ok_or_else(|| {
                Error::validation_invalid_argument(
                    "template",
                    format!("Unknown template `{}`", name),
                    Some(name.to_string()),
                    Some(Self::ALL.iter().map(|t| t.name().to_string()).collect()),
                )
            })
    }

    /// Bundled files to copy; templates without sources start as an empty directory.
    pub fn source_dir(self, defaults: &Defaults) -> Option<PathBuf> {
        match self {
            Template::Launcher => defaults
                .templates_root()
                .map(|root| root.join(self.dir_name())),
            Template::Resource | Template::Setting => None,
        }
    }

    /// Whether the template may target a submodule rather than the package root.
    pub fn supports_submodule(self) -> bool {
        matches!(self, Template::Setting)
    }

    /// Files removed from the installed copy. No bundled template ships any.
    pub fn unused_files(self) -> &'static [&'static str] {
        &[]
    }

    /// Manifest changes once the template is installed.
    pub fn update_manifest(self, module: &mut PluginModule) {
        if self == Template::Launcher && module.is_root() {
            module.document.has_launcher = true;
        }
    }

    pub fn install_path(self, module: &PluginModule) -> PathBuf {
        module.path().join(self.dir_name())
    }
}

/// Copy the template into `target`, or create it empty.
pub fn copy(template: Template, source: Option<&Path>, target: &Path) -> Result<()> {
    if let Some(parent) = target.parent() {
        io::ensure_dir(parent, "create template parent")?;
    }
    match source {
        Some(source) => {
            crate::log_status!("dev", "Copy `{}` -> `{}`", source.display(), target.display());
            io::copy_path(source, target, &format!("copy {} template", template.name()))
        }
        None => {
            crate::log_status!("dev", "Create `{}`", target.display());
            io::ensure_dir(target, "create template dir")
        }
    }
}

/// Remove the template's unused files. Failures are ignored.
pub fn clean_unused_files(template: Template, target: &Path) {
    for file in template.unused_files() {
        let path = target.join(file);
        if path.exists() {
            crate::log_status!("dev", "Removing file `{}` ...", file);
            io::remove_path_best_effort(&path);
        }
    }
}

/// Values substituted for the template tokens.
#[derive(Debug, Clone)]
pub struct TemplateContext<'a> {
    pub module: &'a PluginModule,
    pub latest_version: String,
}

impl<'a> TemplateContext<'a> {
    pub fn new(module: &'a PluginModule, defaults: &Defaults) -> Self {
        Self {
            module,
            latest_version: defaults.runtime_version(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    ModuleName,
    ModuleSnake,
    ModuleKebab,
    ModuleWithGroup,
    PackageName,
    PackageSnake,
    PackageKebab,
    ModuleDir,
    PackageDir,
    LatestVersion,
}

impl Token {
    pub const ALL: [Token; 10] = [
        Token::ModuleName,
        Token::ModuleSnake,
        Token::ModuleKebab,
        Token::ModuleWithGroup,
        Token::PackageName,
        Token::PackageSnake,
        Token::PackageKebab,
        Token::ModuleDir,
        Token::PackageDir,
        Token::LatestVersion,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Token::ModuleName => "__MBoxModuleName__",
            Token::ModuleSnake => "__mbox_module_name__",
            Token::ModuleKebab => "__mbox-module-name__",
            Token::ModuleWithGroup => "__MBox/Module/Name__",
            Token::PackageName => "__MBoxPackageName__",
            Token::PackageSnake => "__mbox_package_name__",
            Token::PackageKebab => "__mbox-package-name__",
            Token::ModuleDir => "__MBoxModuleDir(RelativePackage)__",
            Token::PackageDir => "__MBoxPackageDir(RelativeModule)__",
            Token::LatestVersion => "__mbox_latest_version__",
        }
    }

    pub fn value(self, ctx: &TemplateContext<'_>) -> String {
        let module = ctx.module;
        match self {
            Token::ModuleName => module.name().to_string(),
            Token::ModuleSnake => snake_case(module.name()),
            Token::ModuleKebab => kebab_case(module.name()),
            Token::ModuleWithGroup => module.name_with_group(),
            Token::PackageName => module.package_name.clone(),
            Token::PackageSnake => snake_case(&module.package_name),
            Token::PackageKebab => kebab_case(&module.package_name),
            Token::ModuleDir => {
                if module.relative_dir.is_empty() {
                    ".".to_string()
                } else {
                    module.relative_dir.clone()
                }
            }
            Token::PackageDir => {
                let depth = module.name().matches('/').count();
                if depth == 0 {
                    ".".to_string()
                } else {
                    vec![".."; depth].join("/")
                }
            }
            Token::LatestVersion => ctx.latest_version.clone(),
        }
    }
}

/// `MBox` counts as a single word: `MBoxFoo` -> `mbox_foo`.
fn mbox_word(name: &str) -> String {
    match name.strip_prefix("MBox") {
        Some(rest) => format!("Mbox{}", rest),
        None => name.to_string(),
    }
}

pub fn snake_case(name: &str) -> String {
    mbox_word(name).to_snake_case()
}

pub fn kebab_case(name: &str) -> String {
    mbox_word(name).to_kebab_case()
}

/// Substitute every token in `text`. None when no token occurs.
pub fn replace_tokens(text: &str, ctx: &TemplateContext<'_>) -> Option<String> {
    let mut content = text.to_string();
    let mut changed = false;
    for token in Token::ALL {
        if content.contains(token.key()) {
            content = content.replace(token.key(), &token.value(ctx));
            changed = true;
        }
    }
    changed.then_some(content)
}

/// Rewrite tokens in file contents and names below `dir`.
///
/// Entries are visited in sorted order. Directories are processed before
/// their own name is rewritten. Symlinks and non-UTF-8 files keep their
/// content.
pub fn apply(ctx: &TemplateContext<'_>, dir: &Path) -> Result<()> {
    let mut entries: Vec<PathBuf> = fs::read_dir(dir)
        .map_err(|e| Error::internal_io(e.to_string(), Some(format!("list {}", dir.display()))))?
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .collect();
    entries.sort();

    for path in entries {
        let Ok(meta) = fs::symlink_metadata(&path) else {
            continue;
        };
        if meta.file_type().is_symlink() {
            continue;
        }
        if meta.is_file() {
            if let Ok(content) = fs::read_to_string(&path) {
                if let Some(updated) = replace_tokens(&content, ctx) {
                    crate::log_status!(
                        "dev",
                        "Update File Content: `{}`",
                        paths::display_relative(&path, dir)
                    );
                    io::write_file(&path, &updated, "rewrite template file")?;
                }
            }
        } else if meta.is_dir() {
            apply(ctx, &path)?;
        }

        let renamed = path
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(|name| replace_tokens(name, ctx));
        if let Some(renamed) = renamed {
            let target = dir.join(&renamed);
            crate::log_status!(
                "dev",
                "Move `{}` -> `{}`",
                paths::display_relative(&path, dir),
                renamed
            );
            fs::rename(&path, &target).map_err(|e| {
                Error::internal_io(e.to_string(), Some(format!("rename {}", path.display())))
            })?;
        }
    }
    Ok(())
}

/// Merge the JSON settings at `from` into `<repo_dir>/.mboxconfig`, then delete `from`.
///
/// Returns false when `from` does not exist.
pub fn merge_config(from: &Path, repo_dir: &Path) -> Result<bool> {
    let Some(patch) = config::load_json_file::<Value>(from)? else {
        return Ok(false);
    };
    let target = repo_dir.join(SETTINGS_FILE);
    let mut settings: Value =
        config::load_json_file(&target)?.unwrap_or_else(|| Value::Object(Default::default()));
    config::deep_merge(&mut settings, patch);
    config::save_json_file(&target, &settings)?;
    io::remove_path_best_effort(from);
    Ok(true)
}
