//! Runs the Ruby test suites of workspace plugin modules.
//!
//! Each module gets its own `bundle exec rake test` invocation with an
//! environment describing which plugin packages to load and where the test
//! cases live.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{Error, Result};
use crate::manifest::{PluginModule, PluginPackage};
use crate::utils::command;
use crate::workspace::Workspace;

pub const ENV_PLUGIN_PATHS: &str = "MBOX_PLUGIN_PATHS";
pub const ENV_TEST_CASE_PATHS: &str = "MBOX_TEST_CASE_PATHS";
pub const ENV_TEST_PLUGIN_NAME: &str = "MBOX_TEST_PLUGIN_NAME";
pub const ENV_DEV_ROOT: &str = "MBOX_DEV_ROOT";
const ENV_CLI_PATH: &str = "MBOX_CLI_PATH";
const TEST_CASE_DIR: &str = "Native/Tests";

#[derive(Debug, Clone, Default)]
pub struct TestOptions {
    /// Module names (full name or last path segment); empty tests every module.
    pub names: Vec<String>,
    pub file: Option<String>,
    pub method: Option<String>,
}

/// One module's test invocation.
#[derive(Debug, Clone, Serialize)]
pub struct TestPlan {
    pub module: String,
    pub env: BTreeMap<String, String>,
    pub command: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TestReport {
    pub passed: Vec<String>,
}

/// Inherited variables passed through to the test process.
pub fn keep_inherited_env(key: &str) -> bool {
    !key.starts_with("MBOX_") || key == ENV_CLI_PATH
}

/// Development packages of the workspace (repos with a manifest).
fn develop_packages(workspace: &Workspace) -> Result<Vec<PluginPackage>> {
    let mut packages = Vec::new();
    for repo in workspace.repos() {
        if let Some(package) = repo.manifest()? {
            packages.push(package.clone());
        }
    }
    Ok(packages)
}

fn find_module<'a>(packages: &'a [PluginPackage], name: &str) -> Option<&'a PluginModule> {
    packages.iter().find_map(|package| package.module(name))
}

/// Environment for testing `module`: its package plus the packages of its direct dependencies.
pub fn test_env(
    packages: &[PluginPackage],
    module: &PluginModule,
    dev_root: Option<&str>,
) -> BTreeMap<String, String> {
    let mut modules: Vec<&PluginModule> = module
        .document
        .dependencies
        .iter()
        .filter_map(|dependency| find_module(packages, dependency))
        .collect();
    modules.push(module);

    let mut plugin_paths: Vec<PathBuf> = Vec::new();
    for dependency in &modules {
        if !plugin_paths.contains(&dependency.package_path) {
            plugin_paths.push(dependency.package_path.clone());
        }
    }
    let test_case_paths: Vec<PathBuf> = modules
        .iter()
        .map(|m| m.path().join(TEST_CASE_DIR))
        .filter(|path| path.is_dir())
        .collect();

    let mut env = BTreeMap::new();
    env.insert(ENV_PLUGIN_PATHS.to_string(), join_paths(&plugin_paths));
    env.insert(ENV_TEST_CASE_PATHS.to_string(), join_paths(&test_case_paths));
    env.insert(ENV_TEST_PLUGIN_NAME.to_string(), module.name().to_string());
    if let Some(dev_root) = dev_root {
        env.insert(ENV_DEV_ROOT.to_string(), dev_root.to_string());
    }
    env
}

fn join_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|path| path.display().to_string())
        .collect::<Vec<_>>()
        .join(":")
}

/// `bundle exec rake test` command line for the given filters.
pub fn rake_command(rakefile: &Path, file: Option<&str>, method: Option<&str>) -> String {
    let mut line = String::from("bundle exec rake test");
    if let Some(file) = file {
        line.push_str(&format!(" TEST={}", command::shell_quote(file)));
    }
    if let Some(method) = method {
        line.push_str(&format!(" TESTOPTS={}", command::shell_quote(&format!("--name={}", method))));
    }
    line.push_str(&format!(" -f {}", command::shell_quote(&rakefile.display().to_string())));
    line
}

/// Plan a test run for every selected module, in workspace order.
pub fn plan(workspace: &Workspace, options: &TestOptions, rakefile: &Path) -> Result<Vec<TestPlan>> {
    let packages = develop_packages(workspace)?;
    let dev_root = std::env::var(ENV_DEV_ROOT).ok();
    let command_line = rake_command(rakefile, options.file.as_deref(), options.method.as_deref());

    Ok(packages
        .iter()
        .flat_map(|package| package.all_modules())
        .filter(|module| options.names.is_empty() || options.names.iter().any(|n| module.is_name(n)))
        .map(|module| TestPlan {
            module: module.name().to_string(),
            env: test_env(&packages, module, dev_root.as_deref()),
            command: command_line.clone(),
        })
        .collect())
}

/// Run each planned module's tests; the first failing module aborts the run.
pub fn run(workspace: &Workspace, options: &TestOptions) -> Result<TestReport> {
    let rakefile = workspace.defaults.test_rakefile().ok_or_else(|| {
        Error::config_invalid_value(
            "defaults.test_rakefile",
            None,
            "No test rakefile configured",
        )
        .with_hint("Set defaults.test_rakefile in ~/.config/mbox-dev/config.json")
    })?;
    let plans = plan(workspace, options, &rakefile)?;
    crate::log_status!(
        "test",
        "Test Plugins: {}",
        plans.iter().map(|p| p.module.as_str()).collect::<Vec<_>>().join(", ")
    );

    let mut passed = Vec::new();
    for plan in plans {
        crate::log_status!("test", "Test {}", plan.module);
        let code = command::run_streaming(&workspace.root, &plan.command, &plan.env, keep_inherited_env)?;
        if code != Some(0) {
            return Err(Error::test_failed(&plan.module, code));
        }
        passed.push(plan.module);
    }
    Ok(TestReport { passed })
}
