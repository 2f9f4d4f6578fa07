use clap::Args;
use mbox_dev::dev::{self, DevOptions, DevReport};

use crate::commands::CmdResult;

#[derive(Args)]
pub struct DevArgs {
    /// Plugin template: Launcher, Resource or Setting
    pub template: String,

    /// Plugin name (eg: MBoxFoo), defaults to the current module
    pub name: Option<String>,
}

pub fn run(args: DevArgs, _global: &crate::commands::GlobalArgs) -> CmdResult<DevReport> {
    let (cwd, workspace) = crate::commands::current_workspace()?;
    let options = DevOptions {
        template: args.template,
        name: args.name,
    };
    Ok((dev::scaffold(&workspace, &cwd, &options)?, 0))
}
