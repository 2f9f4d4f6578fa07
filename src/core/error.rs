use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigInvalidJson,
    ConfigInvalidValue,

    ValidationMissingArgument,
    ValidationInvalidArgument,

    WorkspaceNotFound,
    RepoNotFound,

    ManifestMissing,
    ManifestInvalid,

    GitStatusError,
    GitCommandFailed,

    ReleaseBranchNotAllowed,
    DevInstallPathExists,
    StageFailed,
    TestFailed,

    InternalIoError,
    InternalJsonError,
    InternalUnexpected,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ConfigInvalidJson => "config.invalid_json",
            ErrorCode::ConfigInvalidValue => "config.invalid_value",

            ErrorCode::ValidationMissingArgument => "validation.missing_argument",
            ErrorCode::ValidationInvalidArgument => "validation.invalid_argument",

            ErrorCode::WorkspaceNotFound => "workspace.not_found",
            ErrorCode::RepoNotFound => "repo.not_found",

            ErrorCode::ManifestMissing => "manifest.missing",
            ErrorCode::ManifestInvalid => "manifest.invalid",

            ErrorCode::GitStatusError => "git.status_error",
            ErrorCode::GitCommandFailed => "git.command_failed",

            ErrorCode::ReleaseBranchNotAllowed => "release.branch_not_allowed",
            ErrorCode::DevInstallPathExists => "dev.install_path_exists",
            ErrorCode::StageFailed => "stage.failed",
            ErrorCode::TestFailed => "test.failed",

            ErrorCode::InternalIoError => "internal.io_error",
            ErrorCode::InternalJsonError => "internal.json_error",
            ErrorCode::InternalUnexpected => "internal.unexpected",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hint {
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct Error {
    pub code: ErrorCode,
    pub message: String,
    pub details: Value,
    pub hints: Vec<Hint>,
}

pub type Result<T> = std::result::Result<T, Error>;

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for Error {}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MissingArgumentDetails {
    pub args: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidArgumentDetails {
    pub field: String,
    pub problem: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tried: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigInvalidValueDetails {
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub problem: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalIoErrorDetails {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoDetails {
    pub repo: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// One failed unit of work inside a stage phase.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageFailure {
    pub stage: String,
    pub repo: String,
    pub code: String,
    pub message: String,
}

fn to_details<T: Serialize>(details: T) -> Value {
    serde_json::to_value(details).unwrap_or_else(|_| Value::Object(serde_json::Map::new()))
}

impl Error {
    pub fn new(code: ErrorCode, message: impl Into<String>, details: Value) -> Self {
        Self {
            code,
            message: message.into(),
            details,
            hints: Vec::new(),
        }
    }

    pub fn validation_missing_argument(args: Vec<String>) -> Self {
        Self::new(
            ErrorCode::ValidationMissingArgument,
            "Missing required argument",
            to_details(MissingArgumentDetails { args }),
        )
    }

    pub fn validation_invalid_argument(
        field: impl Into<String>,
        problem: impl Into<String>,
        id: Option<String>,
        tried: Option<Vec<String>>,
    ) -> Self {
        let problem = problem.into();
        let details = to_details(InvalidArgumentDetails {
            field: field.into(),
            problem: problem.clone(),
            id,
            tried,
        });

        Self::new(ErrorCode::ValidationInvalidArgument, problem, details)
    }

    pub fn workspace_not_found(start: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::WorkspaceNotFound,
            "Not inside an MBox workspace",
            serde_json::json!({ "searchedFrom": start.into() }),
        )
        .with_hint("Run the command from a directory below a folder containing `.mbox/`")
    }

    pub fn repo_not_found(path: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::RepoNotFound,
            "Must run in a repo directory",
            serde_json::json!({ "path": path.into() }),
        )
    }

    /// A repository has no `manifest.yml` where one is required.
    pub fn manifest_missing(repo: impl Into<String>, path: Option<String>) -> Self {
        let repo = repo.into();
        Self::new(
            ErrorCode::ManifestMissing,
            format!("[{}] `manifest.yml` missing.", repo),
            to_details(RepoDetails { repo, path }),
        )
    }

    pub fn manifest_invalid(path: impl Into<String>, problem: impl Into<String>) -> Self {
        let path = path.into();
        Self::new(
            ErrorCode::ManifestInvalid,
            format!("Invalid manifest `{}`", path),
            serde_json::json!({ "path": path, "error": problem.into() }),
        )
    }

    pub fn git_status_error(repo: impl Into<String>) -> Self {
        let repo = repo.into();
        Self::new(
            ErrorCode::GitStatusError,
            format!("[{}] Git status error, HEAD commit could not be resolved.", repo),
            to_details(RepoDetails { repo, path: None }),
        )
    }

    pub fn git_command_failed(message: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::GitCommandFailed,
            message,
            Value::Object(serde_json::Map::new()),
        )
    }

    pub fn release_branch_not_allowed(
        repo: impl Into<String>,
        branch: Option<String>,
        allowed: &[String],
    ) -> Self {
        Self::new(
            ErrorCode::ReleaseBranchNotAllowed,
            format!("The HEAD is NOT {}!", allowed.join("/")),
            serde_json::json!({
                "repo": repo.into(),
                "branch": branch,
                "allowed": allowed,
            }),
        )
        .with_hint("Checkout an allowed branch or pass --force")
    }

    pub fn dev_install_path_exists(template: &str, path: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::DevInstallPathExists,
            format!("The directory `{}` exists!", template),
            serde_json::json!({ "path": path.into() }),
        )
    }

    /// Collected failures of a stage phase, raised after the phase barrier.
    pub fn stage_failed(phase: &str, failures: Vec<StageFailure>) -> Self {
        let message = match failures.as_slice() {
            [only] => format!("[{}] {} failed: {}", only.stage, phase, only.message),
            _ => format!("{} failed for {} repositories", phase, failures.len()),
        };
        Self::new(
            ErrorCode::StageFailed,
            message,
            serde_json::json!({ "phase": phase, "failures": failures }),
        )
    }

    pub fn test_failed(module: impl Into<String>, exit_code: Option<i32>) -> Self {
        let module = module.into();
        Self::new(
            ErrorCode::TestFailed,
            format!("[{}] Test Failed!", module),
            serde_json::json!({ "module": module, "exitCode": exit_code }),
        )
    }

    pub fn config_invalid_json(path: impl Into<String>, err: serde_json::Error) -> Self {
        Self::new(
            ErrorCode::ConfigInvalidJson,
            "Invalid JSON in configuration",
            serde_json::json!({ "path": path.into(), "error": err.to_string() }),
        )
    }

    pub fn config_invalid_value(
        key: impl Into<String>,
        value: Option<String>,
        problem: impl Into<String>,
    ) -> Self {
        let problem = problem.into();
        let details = to_details(ConfigInvalidValueDetails {
            key: key.into(),
            value,
            problem: problem.clone(),
        });

        Self::new(ErrorCode::ConfigInvalidValue, problem, details)
    }

    pub fn internal_io(error: impl Into<String>, context: Option<String>) -> Self {
        let error = error.into();
        let message = match &context {
            Some(ctx) => format!("IO error ({}): {}", ctx, error),
            None => format!("IO error: {}", error),
        };
        Self::new(
            ErrorCode::InternalIoError,
            message,
            to_details(InternalIoErrorDetails { error, context }),
        )
    }

    pub fn internal_json(error: impl Into<String>, context: Option<String>) -> Self {
        Self::new(
            ErrorCode::InternalJsonError,
            "JSON error",
            to_details(InternalIoErrorDetails {
                error: error.into(),
                context,
            }),
        )
    }

    pub fn internal_unexpected(error: impl Into<String>) -> Self {
        let error = error.into();
        Self::new(
            ErrorCode::InternalUnexpected,
            error.clone(),
            serde_json::json!({ "error": error }),
        )
    }

    pub fn with_hint(mut self, message: impl Into<String>) -> Self {
        self.hints.push(Hint {
            message: message.into(),
        });
        self
    }

    /// True for errors caused by bad input rather than the environment.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self.code,
            ErrorCode::ValidationMissingArgument
                | ErrorCode::ValidationInvalidArgument
                | ErrorCode::ManifestMissing
                | ErrorCode::ReleaseBranchNotAllowed
                | ErrorCode::DevInstallPathExists
                | ErrorCode::TestFailed
        )
    }
}
