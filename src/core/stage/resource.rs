use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, TimeZone};

use super::{BuildStage, BuildStep, ReleaseRepo};
use crate::error::{Error, Result};
use crate::git::http_style_url;
use crate::manifest::PluginPackage;
use crate::utils::io;
use crate::workspace::WorkRepo;

const RESOURCES_DIR: &str = "Resources";
const DATE_FORMAT: &str = "%Y/%m/%d %H:%M:%S";
const BUILD_NUMBER_FORMAT: &str = "%y%m%d%H%M%S";

/// Validates manifests, stamps build metadata and copies the icon and `Resources/`.
#[derive(Debug, Clone)]
pub struct ResourceStage {
    output_dir: PathBuf,
}

impl ResourceStage {
    pub fn new(output_dir: &Path) -> Self {
        Self {
            output_dir: output_dir.to_path_buf(),
        }
    }

    pub fn create(output_dir: &Path) -> Box<dyn BuildStage> {
        Box::new(Self::new(output_dir))
    }

    fn has_resource(repo: &WorkRepo) -> bool {
        let has_icon = matches!(repo.manifest(), Ok(Some(package)) if package.document().icon.is_some());
        has_icon || repo.path.join(RESOURCES_DIR).exists()
    }
}

fn format_time<Tz: TimeZone>(time: &DateTime<Tz>, format: &str) -> String
where
    Tz::Offset: std::fmt::Display,
{
    time.format(format).to_string()
}

impl BuildStage for ResourceStage {
    fn name(&self) -> &'static str {
        "Resource"
    }

    fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    fn build_steps(&self, repo: &WorkRepo) -> Vec<BuildStep> {
        let mut steps = vec![BuildStep::Validate, BuildStep::UpdateManifest];
        if Self::has_resource(repo) {
            steps.push(BuildStep::Build);
        }
        steps
    }

    fn validate(&self, release: &ReleaseRepo<'_>) -> Result<()> {
        let repo = release.repo;
        let package = repo.require_manifest()?;
        if package.document().authors.is_empty() {
            return Err(Error::validation_invalid_argument(
                "AUTHORS",
                format!("[{}] Require `AUTHORS` in the `manifest.yml`.", repo.name),
                Some(repo.name.clone()),
                None,
            ));
        }
        Ok(())
    }

    fn update_manifest(&self, release: &ReleaseRepo<'_>, product: &mut PluginPackage) -> Result<()> {
        let repo = release.repo;
        let git = repo.git();
        let head = git.head_commit()?;
        let authored = head.author.time.with_timezone(&Local);

        let document = product.document_mut();
        document.build_date = Some(format_time(&Local::now(), DATE_FORMAT));
        document.commit_id = Some(head.short_id(7));
        document.commit_date = Some(format_time(&authored, DATE_FORMAT));
        document.build_number = Some(format_time(&authored, BUILD_NUMBER_FORMAT));
        document.publisher = git.author_info();

        let url = repo.url();
        if document.git_url.is_none() {
            document.git_url = url.clone();
        }
        if document.homepage.is_none() {
            document.homepage = url.as_deref().map(http_style_url);
        }
        Ok(())
    }

    fn build(&self, release: &ReleaseRepo<'_>) -> Result<()> {
        let repo = release.repo;
        let product_dir = repo.product_dir(&self.output_dir);
        let package = repo.require_manifest()?;

        if let Some(icon) = &package.document().icon {
            let source = repo.path.join(icon);
            if source.is_file() {
                let target = product_dir.join(icon);
                crate::log_status!("build", "[{}] Copy `{}`", repo.name, icon);
                io::replace_path(&source, &target, "copy icon")?;
            }
        }

        let resources = repo.path.join(RESOURCES_DIR);
        if resources.exists() {
            let target = product_dir.join(RESOURCES_DIR);
            crate::log_status!("build", "[{}] Copy `{}/`", repo.name, RESOURCES_DIR);
            io::replace_path(&resources, &target, "copy resources")?;
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

    fn repo(dir: &Path, manifest: &str) -> WorkRepo {
        fs::write(dir.join("manifest.yml"), manifest).unwrap();
        WorkRepo::new("MBoxFoo", dir, Arc::new(FakeGit::at("0123456789abcdef")))
    }

    fn release(repo: &WorkRepo) -> ReleaseRepo<'_> {
        ReleaseRepo {
            repo,
            current: None,
            next: "1.0.0".to_string(),
        }
    }

    #[test]
    fn validate_requires_authors() {
        let dir = TempDir::new().unwrap();
        let repo = repo(dir.path(), "NAME: MBoxFoo\nVERSION: '1.0'\n");
        let err = ResourceStage::new(Path::new("/out"))
            .validate(&release(&repo))
            .unwrap_err();
        assert_eq!(err.message, "[MBoxFoo] Require `AUTHORS` in the `manifest.yml`.");
    }

    #[test]
    fn validate_requires_manifest() {
        let dir = TempDir::new().unwrap();
        let repo = WorkRepo::new("MBoxFoo", dir.path(), Arc::new(FakeGit::at("c1")));
        let err = ResourceStage::new(Path::new("/out"))
            .validate(&release(&repo))
            .unwrap_err();
        assert_eq!(err.message, "[MBoxFoo] `manifest.yml` missing.");
    }

    #[test]
    fn build_step_only_with_resources() {
        let dir = TempDir::new().unwrap();
        let repo = repo(dir.path(), "NAME: MBoxFoo\nVERSION: '1.0'\n");
        let stage = ResourceStage::new(Path::new("/out"));
        assert_eq!(
            stage.build_steps(&repo),
            vec![BuildStep::Validate, BuildStep::UpdateManifest]
        );

        fs::create_dir_all(dir.path().join("Resources")).unwrap();
        assert!(stage.build_steps(&repo).contains(&BuildStep::Build));
    }

    #[test]
    fn update_manifest_stamps_build_metadata() {
        let dir = TempDir::new().unwrap();
        let repo = repo(dir.path(), "NAME: MBoxFoo\nVERSION: '1.0'\nHOMEPAGE: https://mbox.dev\n");
        let mut product = repo.manifest().unwrap().unwrap().clone();

        ResourceStage::new(Path::new("/out"))
            .update_manifest(&release(&repo), &mut product)
            .unwrap();

        let document = product.document();
        assert_eq!(document.commit_id.as_deref(), Some("0123456"));
        assert_eq!(document.publisher.as_deref(), Some("Jane Doe (jane@example.com)"));
        assert_eq!(document.git_url.as_deref(), Some("git@github.com:MBox/MBoxFoo.git"));
        assert_eq!(document.homepage.as_deref(), Some("https://mbox.dev"));
        assert_eq!(document.build_number.as_ref().unwrap().len(), 12);
        assert_eq!(document.commit_date.as_ref().unwrap().len(), 19);
    }

    #[test]
    fn build_copies_icon_and_resources() {
        let dir = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let repo = repo(dir.path(), "NAME: MBoxFoo\nVERSION: '1.0'\nICON: icon.png\n");
        fs::write(dir.path().join("icon.png"), "png").unwrap();
        fs::create_dir_all(dir.path().join("Resources/images")).unwrap();
        fs::write(dir.path().join("Resources/images/a.png"), "a").unwrap();

        ResourceStage::new(out.path()).build(&release(&repo)).unwrap();

        assert!(out.path().join("MBoxFoo/icon.png").is_file());
        assert!(out.path().join("MBoxFoo/Resources/images/a.png").is_file());
    }
}
