mod pipeline;
mod types;

pub use pipeline::{build, next_version};
pub use types::{BuildOptions, BuildReport, NextVersionReport, ReleasedRepo, SkippedRepo};
