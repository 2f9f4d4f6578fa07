// Public modules
pub mod defaults;
pub mod dev;
pub mod error;
pub mod git;
pub mod manifest;
pub mod paths;
pub mod release;
pub mod stage;
pub mod template;
pub mod test_runner;
pub mod version;
pub mod workspace;

// Internal modules - not part of public API
pub(crate) mod config;

// Re-export common types for convenience
pub use error::{Error, ErrorCode, Result};
pub use manifest::{ManifestDocument, PluginModule, PluginPackage};
pub use workspace::{WorkRepo, Workspace};
