use std::path::PathBuf;

use mbox_dev::Workspace;

pub type CmdResult<T> = mbox_dev::Result<(T, i32)>;

pub(crate) struct GlobalArgs {}

pub mod build;
pub mod dev;
pub mod next_version;

/// Directory the command was started from.
pub(crate) fn current_dir() -> mbox_dev::Result<PathBuf> {
    std::env::current_dir().map_err(|e| {
        mbox_dev::Error::internal_io(e.to_string(), Some("resolve current dir".to_string()))
    })
}

/// Workspace around the current directory.
pub(crate) fn current_workspace() -> mbox_dev::Result<(PathBuf, Workspace)> {
    let cwd = current_dir()?;
    let workspace = Workspace::discover(&cwd)?;
    Ok((cwd, workspace))
}

/// Dispatch a command to its handler and map result to JSON.
macro_rules! dispatch {
    ($args:expr, $global:expr, $module:ident) => {
        crate::output::map_cmd_result_to_json($module::run($args, $global))
    };
}

pub(crate) fn run_json(
    command: crate::Commands,
    global: &GlobalArgs,
) -> (mbox_dev::Result<serde_json::Value>, i32) {
    crate::tty::status("mbox-dev is working...");

    match command {
        crate::Commands::Dev(args) => dispatch!(args, global, dev),
        crate::Commands::Build(args) => dispatch!(args, global, build),
        crate::Commands::NextVersion(args) => dispatch!(args, global, next_version),
        crate::Commands::Test(args) => dispatch!(args, global, test),
    }
}
