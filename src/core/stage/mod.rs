//! Build stages and the phase runner.
//!
//! A stage opts into phases per repository through [`BuildStage::build_steps`]
//! and implements only the steps it takes part in. Within a phase each stage
//! runs its repositories in parallel; every failure is collected before the
//! phase reports an error.

mod launcher;
mod resource;
mod setting;

use std::path::Path;

use rayon::prelude::*;
use serde::Serialize;

use crate::error::{Error, Result, StageFailure};
use crate::manifest::PluginPackage;
use crate::workspace::WorkRepo;

pub use launcher::LauncherStage;
pub use resource::ResourceStage;
pub use setting::SettingStage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildStep {
    Validate,
    Upgrade,
    UpdateManifest,
    Build,
}

impl BuildStep {
    pub fn label(self) -> &'static str {
        match self {
            BuildStep::Validate => "Validate",
            BuildStep::Upgrade => "Upgrade Version",
            BuildStep::UpdateManifest => "Update Manifest",
            BuildStep::Build => "Build Product",
        }
    }
}

/// A repository selected for release with its version pair.
#[derive(Debug, Clone)]
pub struct ReleaseRepo<'a> {
    pub repo: &'a WorkRepo,
    pub current: Option<String>,
    pub next: String,
}

pub trait BuildStage: Send + Sync {
    fn name(&self) -> &'static str;

    fn output_dir(&self) -> &Path;

    /// Phases this stage takes part in for `repo`.
    fn build_steps(&self, _repo: &WorkRepo) -> Vec<BuildStep> {
        Vec::new()
    }

    fn validate(&self, _release: &ReleaseRepo<'_>) -> Result<()> {
        Ok(())
    }

    fn upgrade(&self, _release: &ReleaseRepo<'_>) -> Result<()> {
        Ok(())
    }

    /// Amend the product manifest copied into the output directory.
    fn update_manifest(&self, _release: &ReleaseRepo<'_>, _product: &mut PluginPackage) -> Result<()> {
        Ok(())
    }

    fn build(&self, _release: &ReleaseRepo<'_>) -> Result<()> {
        Ok(())
    }

    fn should_run(&self, step: BuildStep, repo: &WorkRepo) -> bool {
        self.build_steps(repo).contains(&step)
    }
}

/// Registered stage constructor.
#[derive(Clone, Copy)]
pub struct StageEntry {
    pub name: &'static str,
    pub create: fn(&Path) -> Box<dyn BuildStage>,
}

pub static BUILTIN_STAGES: &[StageEntry] = &[
    StageEntry {
        name: "Launcher",
        create: LauncherStage::create,
    },
    StageEntry {
        name: "Resource",
        create: ResourceStage::create,
    },
    StageEntry {
        name: "Setting",
        create: SettingStage::create,
    },
];

pub fn stage_names() -> Vec<String> {
    BUILTIN_STAGES.iter().map(|entry| entry.name.to_string()).collect()
}

/// Instantiate the built-in stages for `output_dir`.
pub fn stages(output_dir: &Path, selected: &[String]) -> Result<Vec<Box<dyn BuildStage>>> {
    stages_from(BUILTIN_STAGES, output_dir, selected)
}

/// Instantiate `selected` stages from `registry` (all when empty), sorted by name.
///
/// Names match case-insensitively; an unknown name is an error.
pub fn stages_from(
    registry: &[StageEntry],
    output_dir: &Path,
    selected: &[String],
) -> Result<Vec<Box<dyn BuildStage>>> {
    let mut entries: Vec<&StageEntry> = if selected.is_empty() {
        registry.iter().collect()
    } else {
        let mut picked = Vec::new();
        for name in selected {
            let entry = registry
                .iter()
                .find(|entry| entry.name.eq_ignore_ascii_case(name))
                .ok_or_else(|| {
                    Error::validation_invalid_argument(
                        "stage",
                        format!("No stage named `{}`.", name),
                        Some(name.clone()),
                        Some(registry.iter().map(|e| e.name.to_string()).collect()),
                    )
                })?;
            if !picked.iter().any(|p: &&StageEntry| p.name == entry.name) {
                picked.push(entry);
            }
        }
        picked
    };
    entries.sort_by_key(|entry| entry.name);

    Ok(entries
        .into_iter()
        .map(|entry| (entry.create)(output_dir))
        .collect())
}

fn failure(stage: &dyn BuildStage, release: &ReleaseRepo<'_>, err: Error) -> StageFailure {
    StageFailure {
        stage: stage.name().to_string(),
        repo: release.repo.name.clone(),
        code: err.code.as_str().to_string(),
        message: err.message,
    }
}

/// Run `step` (validate, upgrade or build) for every stage in order.
///
/// Stops after the first stage whose phase had a failure.
pub fn run_phase(
    step: BuildStep,
    stages: &[Box<dyn BuildStage>],
    releases: &[ReleaseRepo<'_>],
) -> Result<()> {
    for stage in stages {
        let stage = stage.as_ref();
        let targets: Vec<&ReleaseRepo<'_>> = releases
            .iter()
            .filter(|release| stage.should_run(step, release.repo))
            .collect();
        if targets.is_empty() {
            continue;
        }
        crate::log_status!("build", "[{}] {} ({} repos)", stage.name(), step.label(), targets.len());

        let failures: Vec<StageFailure> = targets
            .into_par_iter()
            .filter_map(|release| {
                let result = match step {
                    BuildStep::Validate => stage.validate(release),
                    BuildStep::Upgrade => stage.upgrade(release),
                    BuildStep::Build => stage.build(release),
                    BuildStep::UpdateManifest => Err(Error::internal_unexpected(
                        "update-manifest runs through run_update_manifest",
                    )),
                };
                result.err().map(|err| failure(stage, release, err))
            })
            .collect();

        if !failures.is_empty() {
            return Err(Error::stage_failed(step.label(), failures));
        }
    }
    Ok(())
}

/// Update-manifest phase. `products[i]` is the product manifest of `releases[i]`.
pub fn run_update_manifest(
    stages: &[Box<dyn BuildStage>],
    releases: &[ReleaseRepo<'_>],
    products: &mut [PluginPackage],
) -> Result<()> {
    let step = BuildStep::UpdateManifest;
    for stage in stages {
        let stage = stage.as_ref();
        crate::log_status!("build", "[{}] {}", stage.name(), step.label());

        let failures: Vec<StageFailure> = releases
            .par_iter()
            .zip(products.par_iter_mut())
            .filter(|(release, _)| stage.should_run(step, release.repo))
            .filter_map(|(release, product)| {
                stage
                    .update_manifest(release, product)
                    .err()
                    .map(|err| failure(stage, release, err))
            })
            .collect();

        if !failures.is_empty() {
            return Err(Error::stage_failed(step.label(), failures));
        }
    }
    Ok(())
}
