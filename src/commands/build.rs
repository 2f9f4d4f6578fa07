use std::path::PathBuf;

use clap::Args;
use mbox_dev::paths;
use mbox_dev::release::{self, BuildOptions, BuildReport};

use crate::commands::CmdResult;

#[derive(Args)]
pub struct BuildArgs {
    /// Plugin names, otherwise every plugin of the current feature
    pub names: Vec<String>,

    /// Only run this stage (repeatable)
    #[arg(long = "stage", value_name = "STAGE")]
    pub stages: Vec<String>,

    /// Output directory (default: <workspace>/release)
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Release from any branch and rebuild already released versions
    #[arg(long)]
    pub force: bool,

    /// Clean the output directory first (default: true unless --stage is given)
    #[arg(long, value_name = "BOOL", num_args = 0..=1, default_missing_value = "true")]
    pub clean: Option<bool>,
}

pub fn run(args: BuildArgs, _global: &crate::commands::GlobalArgs) -> CmdResult<BuildReport> {
    let (cwd, workspace) = crate::commands::current_workspace()?;

    let output_dir = args
        .output_dir
        .map(|dir| paths::resolve(&cwd, &dir.to_string_lossy()));
    let options = BuildOptions {
        names: args.names,
        stages: args.stages,
        output_dir,
        force: args.force,
        clean: args.clean,
    };

    let report = release::build(&workspace, &options)?;
    Ok((report, 0))
}
