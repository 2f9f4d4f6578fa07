use std::path::PathBuf;

use serde::Serialize;

#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Repo or package names; empty selects every repo of the current feature.
    pub names: Vec<String>,
    /// Stage names; empty runs every registered stage.
    pub stages: Vec<String>,
    /// Defaults to `<workspace>/release`.
    pub output_dir: Option<PathBuf>,
    /// Skip the branch check and release unchanged commits again.
    pub force: bool,
    /// Explicit clean flag; see [`BuildOptions::should_clean`].
    pub clean: Option<bool>,
}

impl BuildOptions {
    /// Clean the output directory unless told otherwise or running selected stages.
    pub fn should_clean(&self) -> bool {
        self.clean.unwrap_or(self.stages.is_empty())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReleasedRepo {
    pub repo: String,
    pub package: String,
    pub current: Option<String>,
    pub next: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedRepo {
    pub repo: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    pub output_dir: String,
    pub stages: Vec<String>,
    pub force: bool,
    pub released: Vec<ReleasedRepo>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<SkippedRepo>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NextVersionReport {
    pub repo: String,
    pub package: String,
    pub current: Option<String>,
    pub next: String,
    /// Manifest base version was rewritten.
    pub major_updated: bool,
}
