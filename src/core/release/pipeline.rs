use std::path::Path;

use rayon::prelude::*;

use crate::error::{Error, Result};
use crate::manifest::{self, PluginPackage};
use crate::paths::{self, MANIFEST_FILE};
use crate::stage::{self, BuildStage, BuildStep, ReleaseRepo};
use crate::utils::io;
use crate::version;
use crate::workspace::{WorkRepo, Workspace};

use super::types::{BuildOptions, BuildReport, NextVersionReport, ReleasedRepo, SkippedRepo};

/// Build the selected repositories into the release layout.
///
/// Phases run in a fixed order (validate, upgrade, copy manifests, update
/// manifests, build) and the product manifests are saved last. A failed phase
/// aborts the remaining ones. The output directory is untouched until
/// validation has passed.
pub fn build(workspace: &Workspace, options: &BuildOptions) -> Result<BuildReport> {
    let output_dir = options
        .output_dir
        .clone()
        .unwrap_or_else(|| workspace.release_dir());
    let stages = stage::stages(&output_dir, &options.stages)?;

    let repos = select_repos(workspace, &options.names);
    let mut skipped = Vec::new();
    let releases = list_upgrades(
        &repos,
        &workspace.defaults.release_branches,
        options.force,
        &mut skipped,
    )?;

    let mut report = BuildReport {
        output_dir: output_dir.display().to_string(),
        stages: stages.iter().map(|s| s.name().to_string()).collect(),
        force: options.force,
        released: Vec::new(),
        skipped,
    };

    if releases.is_empty() {
        crate::log_status!("build", "No plugin to upgrade.");
        return Ok(report);
    }

    stage::run_phase(BuildStep::Validate, &stages, &releases)?;
    prepare_output_dir(&output_dir, options.should_clean())?;

    stage::run_phase(BuildStep::Upgrade, &stages, &releases)?;
    copy_manifests(&releases, &output_dir)?;

    let mut products = load_products(&releases, &output_dir)?;
    stage::run_update_manifest(&stages, &releases, &mut products)?;
    stage::run_phase(BuildStep::Build, &stages, &releases)?;
    save_products(&products)?;

    report.released = releases
        .iter()
        .zip(&products)
        .map(|(release, product)| ReleasedRepo {
            repo: release.repo.name.clone(),
            package: product.name().to_string(),
            current: release.current.clone(),
            next: release.next.clone(),
        })
        .collect();
    crate::log_status!(
        "build",
        "Built {} plugin(s) into {}",
        report.released.len(),
        paths::display_relative(&output_dir, &workspace.root)
    );
    Ok(report)
}

/// Named repos (unknown names are skipped), or every repo; sorted by name.
fn select_repos<'a>(workspace: &'a Workspace, names: &[String]) -> Vec<&'a WorkRepo> {
    let mut repos: Vec<&WorkRepo> = if names.is_empty() {
        workspace.repos().iter().collect()
    } else {
        names
            .iter()
            .filter_map(|name| {
                let repo = workspace.find_repo(name);
                if repo.is_none() {
                    crate::log_status!("build", "Could not find the repo: {}", name);
                }
                repo
            })
            .collect()
    };
    repos.sort_by(|a, b| a.name.cmp(&b.name));
    repos.dedup_by(|a, b| a.name == b.name);
    repos
}

fn list_upgrades<'a>(
    repos: &[&'a WorkRepo],
    allowed_branches: &[String],
    force: bool,
    skipped: &mut Vec<SkippedRepo>,
) -> Result<Vec<ReleaseRepo<'a>>> {
    let mut releases = Vec::new();

    for &repo in repos {
        if repo.manifest()?.is_none() {
            crate::log_status!("build", "[{}] There is not a manifest.yml, skip!", repo.name);
            skipped.push(SkippedRepo {
                repo: repo.name.clone(),
                reason: "There is not a manifest.yml".to_string(),
            });
            continue;
        }

        if !force {
            let branch = repo.git().current_branch();
            let allowed = branch
                .as_ref()
                .is_some_and(|branch| allowed_branches.iter().any(|b| b == branch));
            if !allowed {
                return Err(Error::release_branch_not_allowed(
                    &repo.name,
                    branch,
                    allowed_branches,
                ));
            }
        }

        let pair = version::resolve(repo)?;
        if pair.is_unchanged() && !force {
            crate::log_status!("build", "[{}] v{} is already released, skip.", repo.name, pair.next);
            skipped.push(SkippedRepo {
                repo: repo.name.clone(),
                reason: format!("v{} is already released", pair.next),
            });
            continue;
        }

        let mut info = format!("Will upgrade to v{}", pair.next);
        if let Some(current) = &pair.current {
            info.push_str(&format!(" from v{}", current));
        }
        if force {
            info.push_str(" (Force)");
        }
        crate::log_status!("build", "[{}] {}", repo.name, info);

        releases.push(ReleaseRepo {
            repo,
            current: pair.current,
            next: pair.next,
        });
    }

    Ok(releases)
}

fn prepare_output_dir(output_dir: &Path, clean: bool) -> Result<()> {
    if clean && output_dir.exists() {
        io::remove_path(output_dir, "clean output dir")?;
    }
    io::ensure_dir(output_dir, "create output dir")
}

/// Copy every module manifest into `<output>/<package>/<relative dir>/`.
fn copy_manifests(releases: &[ReleaseRepo<'_>], output_dir: &Path) -> Result<()> {
    releases
        .par_iter()
        .map(|release| -> Result<()> {
            let repo = release.repo;
            let package = repo.require_manifest()?;
            let product_dir = repo.product_dir(output_dir);
            for module in package.all_modules() {
                let target = product_dir.join(&module.relative_dir).join(MANIFEST_FILE);
                io::replace_path(&module.file_path(), &target, "copy manifest")?;
            }
            Ok(())
        })
        .collect::<Result<Vec<()>>>()?;
    Ok(())
}

/// Product manifests with `VERSION` set to the release version.
fn load_products(releases: &[ReleaseRepo<'_>], output_dir: &Path) -> Result<Vec<PluginPackage>> {
    releases
        .iter()
        .map(|release| -> Result<PluginPackage> {
            let mut product = manifest::product_manifest(output_dir, &release.repo.package_name())?;
            product.set_version(&release.next);
            Ok(product)
        })
        .collect()
}

fn save_products(products: &[PluginPackage]) -> Result<()> {
    products
        .par_iter()
        .map(PluginPackage::save_all)
        .collect::<Result<Vec<()>>>()?;
    Ok(())
}

/// Compute the next version of `repo`, optionally rewriting the base version first,
/// then run every stage's upgrade step for it.
pub fn next_version(repo: &mut WorkRepo, new_version: Option<&str>) -> Result<NextVersionReport> {
    repo.require_manifest()?;

    let major_updated = match new_version {
        Some(version) => version::update_major_version(repo, version)?,
        None => false,
    };

    let pair = version::resolve(repo)?;
    match &pair.current {
        Some(current) => crate::log_status!("version", "Update version {} from {}.", pair.next, current),
        None => crate::log_status!("version", "Update version {}.", pair.next),
    }

    let repo: &WorkRepo = repo;
    let release = ReleaseRepo {
        repo,
        current: pair.current.clone(),
        next: pair.next.clone(),
    };
    let stages: Vec<Box<dyn BuildStage>> = stage::stages(&repo.path, &[])?;
    for stage in &stages {
        stage.upgrade(&release)?;
    }

    Ok(NextVersionReport {
        repo: repo.name.clone(),
        package: repo.package_name(),
        current: pair.current,
        next: pair.next,
        major_updated,
    })
}
