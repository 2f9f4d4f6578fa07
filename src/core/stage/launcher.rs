use std::path::{Path, PathBuf};

use super::{BuildStage, BuildStep, ReleaseRepo};
use crate::error::Result;
use crate::utils::io;
use crate::workspace::WorkRepo;

const LAUNCHER_DIR: &str = "Launcher";

/// Ships the repository's `Launcher/` directory with the product.
#[derive(Debug, Clone)]
pub struct LauncherStage {
    output_dir: PathBuf,
}

impl LauncherStage {
    pub fn new(output_dir: &Path) -> Self {
        Self {
            output_dir: output_dir.to_path_buf(),
        }
    }

    pub fn create(output_dir: &Path) -> Box<dyn BuildStage> {
        Box::new(Self::new(output_dir))
    }
}

impl BuildStage for LauncherStage {
    fn name(&self) -> &'static str {
        "Launcher"
    }

    fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    fn build_steps(&self, repo: &WorkRepo) -> Vec<BuildStep> {
        if repo.path.join(LAUNCHER_DIR).exists() {
            vec![BuildStep::Build]
        } else {
            Vec::new()
        }
    }

    fn build(&self, release: &ReleaseRepo<'_>) -> Result<()> {
        let source = release.repo.path.join(LAUNCHER_DIR);
        let product_dir = release.repo.product_dir(&self.output_dir);
        io::ensure_dir(&product_dir, "create product dir")?;

        let target = product_dir.join(LAUNCHER_DIR);
        crate::log_status!(
            "build",
            "[{}] Copy `{}` -> `{}`",
            release.repo.name,
            source.display(),
            target.display()
        );
        io::replace_path(&source, &target, "copy launcher")
    }
}
