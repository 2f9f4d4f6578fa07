use clap::Args;
use mbox_dev::release::{self, NextVersionReport};

use crate::commands::CmdResult;

#[derive(Args)]
pub struct NextVersionArgs {
    /// Set this base version instead of keeping the manifest's
    pub new_version: Option<String>,
}

pub fn run(
    args: NextVersionArgs,
    _global: &crate::commands::GlobalArgs,
) -> CmdResult<NextVersionReport> {
    let (cwd, mut workspace) = crate::commands::current_workspace()?;
    let name = workspace.repo_containing(&cwd)?.name.clone();
    let mut repo = workspace
        .take_repo(&name)
        .ok_or_else(|| mbox_dev::Error::repo_not_found(cwd.display().to_string()))?;

    let report = release::next_version(&mut repo, args.new_version.as_deref())?;
    Ok((report, 0))
}
