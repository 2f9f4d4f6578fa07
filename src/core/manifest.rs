//! Package and module manifests (`manifest.yml`).
//!
//! A package is the root module of a repository plus the submodules listed
//! under `MODULES`. Each module lives in a directory derived from its name:
//! the package name prefix is dropped and the remainder is the directory
//! relative to the package root (`MBoxFooBar` in package `MBoxFoo` lives in
//! `Bar/`, `MBoxFoo/Ui` lives in `Ui/`).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Error, Result};
use crate::paths::{MANIFEST_FILE, SETTING_SCHEMA_FILE};
use crate::utils::io;

/// On-disk manifest document. Unknown keys survive a load/save cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManifestDocument {
    #[serde(rename = "NAME", default)]
    pub name: String,
    #[serde(
        rename = "VERSION",
        default,
        deserialize_with = "scalar_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub version: Option<String>,
    #[serde(rename = "AUTHORS", default, skip_serializing_if = "Vec::is_empty")]
    pub authors: Vec<String>,
    #[serde(rename = "ICON", default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(rename = "DEPENDENCIES", default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
    #[serde(rename = "MODULES", default, skip_serializing_if = "Vec::is_empty")]
    pub modules: Vec<String>,
    #[serde(rename = "BUILD_DATE", default, skip_serializing_if = "Option::is_none")]
    pub build_date: Option<String>,
    #[serde(rename = "BUILD_NUMBER", default, skip_serializing_if = "Option::is_none")]
    pub build_number: Option<String>,
    #[serde(rename = "COMMIT_ID", default, skip_serializing_if = "Option::is_none")]
    pub commit_id: Option<String>,
    #[serde(rename = "COMMIT_DATE", default, skip_serializing_if = "Option::is_none")]
    pub commit_date: Option<String>,
    #[serde(rename = "PUBLISHER", default, skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
    #[serde(rename = "GIT_URL", default, skip_serializing_if = "Option::is_none")]
    pub git_url: Option<String>,
    #[serde(rename = "HOMEPAGE", default, skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,
    #[serde(rename = "HAS_LAUNCHER", default, skip_serializing_if = "is_false")]
    pub has_launcher: bool,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yml::Value>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Accept `VERSION: 1.2` as well as `VERSION: '1.2'`.
///
/// A plain number loses its source text here (`1.10` reads as `1.1`);
/// [`ManifestDocument::parse`] restores it from [`plain_version`].
fn scalar_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<serde_yml::Value>::deserialize(deserializer)? {
        None | Some(serde_yml::Value::Null) => Ok(None),
        Some(serde_yml::Value::String(value)) => Ok(Some(value)),
        Some(serde_yml::Value::Number(value)) => Ok(Some(value.to_string())),
        Some(other) => Err(D::Error::custom(format!(
            "expected a version string, found {:?}",
            other
        ))),
    }
}

/// Unquoted dotted-number `VERSION` exactly as written.
fn plain_version(content: &str) -> Option<&str> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| {
        Regex::new(r"(?m)^VERSION:[ \t]+([0-9][0-9.]*)[ \t]*(?:#.*)?\r?$")
            .expect("valid version regex")
    });
    pattern
        .captures(content)
        .and_then(|captures| captures.get(1))
        .map(|version| version.as_str())
}

impl ManifestDocument {
    pub fn parse(content: &str, path: &Path) -> Result<Self> {
        let mut document: ManifestDocument = serde_yml::from_str(content)
            .map_err(|e| Error::manifest_invalid(path.display().to_string(), e.to_string()))?;
        if let Some(version) = plain_version(content) {
            document.version = Some(version.to_string());
        }
        if document.name.trim().is_empty() {
            return Err(Error::manifest_invalid(
                path.display().to_string(),
                "NAME is required",
            ));
        }
        Ok(document)
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yml::to_string(self).map_err(|e| {
            Error::internal_json(e.to_string(), Some("serialize manifest".to_string()))
        })
    }
}

/// A module document bound to its location inside a package.
#[derive(Debug, Clone, PartialEq)]
pub struct PluginModule {
    pub document: ManifestDocument,
    /// Owning package name (back-reference by name only).
    pub package_name: String,
    /// Root directory of the owning package.
    pub package_path: PathBuf,
    /// Module directory relative to the package root, empty for the root module.
    pub relative_dir: String,
}

impl PluginModule {
    fn new(document: ManifestDocument, package_name: &str, package_path: &Path) -> Self {
        let relative_dir = relative_dir_for(&document.name, package_name);
        Self {
            document,
            package_name: package_name.to_string(),
            package_path: package_path.to_path_buf(),
            relative_dir,
        }
    }

    pub fn name(&self) -> &str {
        &self.document.name
    }

    pub fn is_root(&self) -> bool {
        self.relative_dir.is_empty()
    }

    pub fn path(&self) -> PathBuf {
        if self.relative_dir.is_empty() {
            self.package_path.clone()
        } else {
            self.package_path.join(&self.relative_dir)
        }
    }

    pub fn file_path(&self) -> PathBuf {
        self.path().join(MANIFEST_FILE)
    }

    /// Module name with the `MBox` prefix split off as a group:
    /// `MBoxFoo/Ui` becomes `MBox/Foo/Ui`.
    pub fn name_with_group(&self) -> String {
        let name = self.name();
        match name.strip_prefix("MBox") {
            Some(rest) if !rest.is_empty() => format!("MBox/{}", rest.trim_start_matches('/')),
            _ => name.to_string(),
        }
    }

    /// Case-insensitive match on the full name or its last path segment.
    pub fn is_name(&self, name: &str) -> bool {
        let own = self.name();
        own.eq_ignore_ascii_case(name)
            || own
                .rsplit('/')
                .next()
                .is_some_and(|last| last.eq_ignore_ascii_case(name))
    }

    pub fn setting_file(&self) -> PathBuf {
        self.path().join(SETTING_SCHEMA_FILE)
    }

    pub fn has_setting_file(&self) -> bool {
        self.setting_file().is_file()
    }

    /// Write this module's document, overwriting the existing file.
    pub fn save(&self) -> Result<()> {
        let content = self.document.to_yaml()?;
        io::write_file_atomic(&self.file_path(), &content, "save manifest")
    }
}

/// Directory of module `name` relative to the root of `package_name`.
pub fn relative_dir_for(name: &str, package_name: &str) -> String {
    name.strip_prefix(package_name)
        .unwrap_or(name)
        .trim_start_matches('/')
        .to_string()
}

/// A package manifest: the root module and all nested submodules.
#[derive(Debug, Clone, PartialEq)]
pub struct PluginPackage {
    pub root: PluginModule,
    pub submodules: Vec<PluginModule>,
}

impl PluginPackage {
    /// Load the package whose root manifest is `file`. A missing file is not an error.
    pub fn load(file: &Path) -> Result<Option<Self>> {
        if !file.is_file() {
            return Ok(None);
        }
        let package_path = file
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let content = io::read_file(file, "read manifest")?;
        let document = ManifestDocument::parse(&content, file)?;
        let package_name = document.name.clone();
        let root = PluginModule::new(document, &package_name, &package_path);

        let mut package = Self {
            root,
            submodules: Vec::new(),
        };
        let declared = package.root.document.modules.clone();
        package.load_submodules(&declared)?;
        Ok(Some(package))
    }

    /// Load the package rooted at `dir`.
    pub fn from_directory(dir: &Path) -> Result<Option<Self>> {
        Self::load(&dir.join(MANIFEST_FILE))
    }

    fn load_submodules(&mut self, names: &[String]) -> Result<()> {
        for name in names {
            if self.module(name).is_some() {
                continue;
            }
            let relative_dir = relative_dir_for(name, self.name());
            let file = self.path().join(&relative_dir).join(MANIFEST_FILE);
            if !file.is_file() {
                crate::log_status!(
                    "manifest",
                    "[{}] Module `{}` has no {}, skip.",
                    self.name(),
                    name,
                    MANIFEST_FILE
                );
                continue;
            }
            let content = io::read_file(&file, "read module manifest")?;
            let mut document = ManifestDocument::parse(&content, &file)?;
            if document.name != *name {
                document.name = name.clone();
            }
            let nested = document.modules.clone();
            let module = PluginModule::new(document, &self.root.package_name, &self.root.package_path);
            self.submodules.push(module);
            self.load_submodules(&nested)?;
        }
        Ok(())
    }

    /// New package named `name` at `dir` (not saved).
    pub fn create(name: &str, dir: &Path, author: Option<String>, core_package: &str) -> Self {
        let document = ManifestDocument {
            name: name.to_string(),
            version: Some("1.0".to_string()),
            authors: author.into_iter().collect(),
            dependencies: vec![core_package.to_string()],
            ..ManifestDocument::default()
        };
        Self {
            root: PluginModule::new(document, name, dir),
            submodules: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        self.root.name()
    }

    /// Declared base version, empty when unset.
    pub fn version(&self) -> &str {
        self.root.document.version.as_deref().unwrap_or("")
    }

    pub fn set_version(&mut self, version: &str) {
        self.root.document.version = Some(version.to_string());
    }

    pub fn path(&self) -> &Path {
        &self.root.package_path
    }

    pub fn file_path(&self) -> PathBuf {
        self.root.file_path()
    }

    pub fn document(&self) -> &ManifestDocument {
        &self.root.document
    }

    pub fn document_mut(&mut self) -> &mut ManifestDocument {
        &mut self.root.document
    }

    /// Root module first, then submodules in declaration order.
    pub fn all_modules(&self) -> impl Iterator<Item = &PluginModule> {
        std::iter::once(&self.root).chain(self.submodules.iter())
    }

    pub fn module(&self, name: &str) -> Option<&PluginModule> {
        self.all_modules().find(|m| m.name() == name)
    }

    /// Find or create the module `name`, registering new submodules with
    /// the closest existing parent module.
    pub fn create_module(&mut self, name: &str) -> Result<&PluginModule> {
        if name == self.name() {
            return Ok(&self.root);
        }
        if !name.starts_with(self.name()) {
            return Err(Error::validation_invalid_argument(
                "name",
                format!("NAME({}) must have a prefix `{}`.", name, self.name()),
                Some(name.to_string()),
                None,
            ));
        }
        if let Some(index) = self.submodules.iter().position(|m| m.name() == name) {
            return Ok(&self.submodules[index]);
        }

        let parent_name = self
            .all_modules()
            .filter(|m| name.starts_with(m.name()) && name != m.name())
            .max_by_key(|m| m.name().len())
            .map(|m| m.name().to_string())
            .unwrap_or_else(|| self.name().to_string());
        if let Some(parent) = self.module_mut(&parent_name) {
            parent.document.modules.push(name.to_string());
        }

        let document = ManifestDocument {
            name: name.to_string(),
            ..ManifestDocument::default()
        };
        let module = PluginModule::new(document, &self.root.package_name, &self.root.package_path);
        self.submodules.push(module);
        Ok(&self.submodules[self.submodules.len() - 1])
    }

    pub fn module_mut(&mut self, name: &str) -> Option<&mut PluginModule> {
        if self.root.name() == name {
            return Some(&mut self.root);
        }
        self.submodules.iter_mut().find(|m| m.name() == name)
    }

    /// Write the root manifest only.
    pub fn save(&self) -> Result<()> {
        self.root.save()
    }

    /// Write every module manifest of the package.
    pub fn save_all(&self) -> Result<()> {
        for module in self.all_modules() {
            module.save()?;
        }
        Ok(())
    }
}

/// Product directory of a package inside a build output directory.
pub fn product_dir(output_dir: &Path, package_name: &str) -> PathBuf {
    output_dir.join(package_name)
}

/// Load the package copied into the build output (`<output>/<name>/manifest.yml`).
pub fn product_manifest(output_dir: &Path, package_name: &str) -> Result<PluginPackage> {
    let file = product_dir(output_dir, package_name).join(MANIFEST_FILE);
    PluginPackage::load(&file)?.ok_or_else(|| {
        Error::manifest_missing(package_name, Some(file.display().to_string()))
    })
}
