use std::path::{Path, PathBuf};

use super::{BuildStage, BuildStep, ReleaseRepo};
use crate::error::Result;
use crate::paths::SETTING_SCHEMA_FILE;
use crate::utils::io;
use crate::workspace::WorkRepo;

/// Copies each module's `setting.schema.json` into the product tree.
#[derive(Debug, Clone)]
pub struct SettingStage {
    output_dir: PathBuf,
}

impl SettingStage {
    pub fn new(output_dir: &Path) -> Self {
        Self {
            output_dir: output_dir.to_path_buf(),
        }
    }

    pub fn create(output_dir: &Path) -> Box<dyn BuildStage> {
        Box::new(Self::new(output_dir))
    }
}

impl BuildStage for SettingStage {
    fn name(&self) -> &'static str {
        "Setting"
    }

    fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    fn build_steps(&self, repo: &WorkRepo) -> Vec<BuildStep> {
        let has_setting = match repo.manifest() {
            Ok(Some(package)) => package.all_modules().any(|m| m.has_setting_file()),
            _ => false,
        };
        if has_setting {
            vec![BuildStep::Build]
        } else {
            Vec::new()
        }
    }

    fn build(&self, release: &ReleaseRepo<'_>) -> Result<()> {
        let repo = release.repo;
        let product_dir = repo.product_dir(&self.output_dir);
        let package = repo.require_manifest()?;

        for module in package.all_modules().filter(|m| m.has_setting_file()) {
            let target = product_dir.join(&module.relative_dir).join(SETTING_SCHEMA_FILE);
            crate::log_status!("build", "[{}] Copy `{}`", module.name(), SETTING_SCHEMA_FILE);
            io::replace_path(&module.setting_file(), &target, "copy setting schema")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::fake::FakeGit;
    use std::fs;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[test]
    fn copies_schema_of_every_module() {
        let dir = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        fs::write(
            dir.path().join("manifest.yml"),
            "NAME: MBoxFoo\nVERSION: '1.0'\nMODULES:\n  - MBoxFoo/Ui\n",
        )
        .unwrap();
        fs::create_dir_all(dir.path().join("Ui")).unwrap();
        fs::write(dir.path().join("Ui/manifest.yml"), "NAME: MBoxFoo/Ui\n").unwrap();
        fs::write(dir.path().join("Ui/setting.schema.json"), "{}").unwrap();

        let repo = WorkRepo::new("MBoxFoo", dir.path(), Arc::new(FakeGit::at("c1")));
        let stage = SettingStage::new(out.path());
        assert_eq!(stage.build_steps(&repo), vec![BuildStep::Build]);

        let release = ReleaseRepo {
            repo: &repo,
            current: None,
            next: "1.0.0".to_string(),
        };
        stage.build(&release).unwrap();

        assert!(out.path().join("MBoxFoo/Ui/setting.schema.json").is_file());
        assert!(!out.path().join("MBoxFoo/setting.schema.json").exists());
    }

    #[test]
    fn no_schema_means_no_steps() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("manifest.yml"), "NAME: MBoxFoo\nVERSION: '1.0'\n").unwrap();
        let repo = WorkRepo::new("MBoxFoo", dir.path(), Arc::new(FakeGit::at("c1")));
        assert!(SettingStage::new(Path::new("/out")).build_steps(&repo).is_empty());
    }
}
