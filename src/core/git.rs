//! Read-only git access for release versioning.
//!
//! Everything goes through the system `git` binary. [`GitAdapter`] is the seam
//! the version resolver and the build stages depend on, so tests can swap in
//! a fixed repository state.

use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::utils::command;

/// A `v<dotted numbers>` tag and the commit it points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionTag {
    pub name: String,
    pub oid: String,
}

impl VersionTag {
    /// Tag name without the leading `v`.
    pub fn version(&self) -> &str {
        self.name.strip_prefix('v').unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitAuthor {
    pub name: String,
    pub email: String,
    pub time: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Commit {
    pub oid: String,
    pub author: CommitAuthor,
}

impl Commit {
    pub fn short_id(&self, len: usize) -> String {
        self.oid.chars().take(len).collect()
    }
}

pub trait GitAdapter: Send + Sync {
    /// Checked-out branch, None when detached or not a repository.
    fn current_branch(&self) -> Option<String>;
    /// Full hash of HEAD.
    fn current_commit(&self) -> Option<String>;
    /// Highest-numbered `vX.Y.Z[.N]` tag, compared component-wise.
    fn max_version_tag(&self) -> Result<Option<VersionTag>>;
    /// HEAD commit with its author.
    fn head_commit(&self) -> Result<Commit>;
    fn author_name(&self) -> Option<String>;
    fn author_email(&self) -> Option<String>;
    /// URL of the `origin` remote.
    fn remote_url(&self) -> Option<String>;

    /// `"Name (email)"`, or just the name when no email is configured.
    fn author_info(&self) -> Option<String> {
        let name = self.author_name()?;
        match self.author_email() {
            Some(email) => Some(format!("{} ({})", name, email)),
            None => Some(name),
        }
    }
}

/// [`GitAdapter`] backed by the `git` executable.
#[derive(Debug, Clone)]
pub struct SystemGit {
    path: PathBuf,
}

impl SystemGit {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn optional(&self, args: &[&str]) -> Option<String> {
        command::run_in_optional(&self.path, "git", args)
    }

    fn required(&self, args: &[&str], context: &str) -> Result<String> {
        command::run_in(&self.path, "git", args, context)
            .map_err(|e| Error::git_command_failed(e.message))
    }
}

impl GitAdapter for SystemGit {
    fn current_branch(&self) -> Option<String> {
        self.optional(&["symbolic-ref", "--short", "-q", "HEAD"])
    }

    fn current_commit(&self) -> Option<String> {
        self.optional(&["rev-parse", "--verify", "-q", "HEAD"])
    }

    fn max_version_tag(&self) -> Result<Option<VersionTag>> {
        if !command::succeeded_in(&self.path, "git", &["rev-parse", "--git-dir"]) {
            return Ok(None);
        }
        let listing = self.required(
            &[
                "for-each-ref",
                "--format=%(refname:short)%09%(objectname)%09%(*objectname)",
                "refs/tags",
            ],
            "git for-each-ref",
        )?;
        Ok(pick_max_version_tag(&listing))
    }

    fn head_commit(&self) -> Result<Commit> {
        let line = self.required(&["log", "-1", "--format=%H%x09%an%x09%ae%x09%at"], "git log")?;
        parse_commit_line(&line)
            .ok_or_else(|| Error::git_command_failed(format!("Unexpected git log output: {}", line)))
    }

    fn author_name(&self) -> Option<String> {
        self.optional(&["config", "user.name"])
    }

    fn author_email(&self) -> Option<String> {
        self.optional(&["config", "user.email"])
    }

    fn remote_url(&self) -> Option<String> {
        self.optional(&["config", "--get", "remote.origin.url"])
    }
}

fn version_tag_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^v(\d+(?:\.\d+)*)$").expect("valid tag regex"))
}

/// Numeric components of a `v`-prefixed tag name, None if it is not a version tag.
pub fn parse_version_tag(name: &str) -> Option<Vec<u64>> {
    let captures = version_tag_pattern().captures(name)?;
    captures
        .get(1)?
        .as_str()
        .split('.')
        .map(|part| part.parse::<u64>().ok())
        .collect()
}

/// Compare dotted version components numerically. `1.2` sorts before `1.2.0`.
pub fn compare_versions(a: &[u64], b: &[u64]) -> Ordering {
    a.iter().cmp(b.iter())
}

/// Choose the highest version tag from `for-each-ref` output.
///
/// Each line is `name<TAB>object<TAB>peeled`; annotated tags carry the commit
/// in the peeled column.
pub fn pick_max_version_tag(listing: &str) -> Option<VersionTag> {
    let mut best: Option<(Vec<u64>, VersionTag)> = None;

    for line in listing.lines() {
        let mut columns = line.split('\t');
        let Some(name) = columns.next().map(str::trim) else {
            continue;
        };
        let object = columns.next().unwrap_or("").trim();
        let peeled = columns.next().unwrap_or("").trim();
        let Some(numbers) = parse_version_tag(name) else {
            continue;
        };
        let oid = if peeled.is_empty() { object } else { peeled };

        let replace = match &best {
            Some((current, _)) => compare_versions(&numbers, current) == Ordering::Greater,
            None => true,
        };
        if replace {
            best = Some((
                numbers,
                VersionTag {
                    name: name.to_string(),
                    oid: oid.to_string(),
                },
            ));
        }
    }

    best.map(|(_, tag)| tag)
}

fn parse_commit_line(line: &str) -> Option<Commit> {
    let mut columns = line.trim().splitn(4, '\t');
    let oid = columns.next()?.to_string();
    let name = columns.next()?.to_string();
    let email = columns.next()?.to_string();
    let timestamp: i64 = columns.next()?.trim().parse().ok()?;
    let time = DateTime::<Utc>::from_timestamp(timestamp, 0)?;

    Some(Commit {
        oid,
        author: CommitAuthor { name, email, time },
    })
}

/// Convert a git remote URL into a browsable https URL.
///
/// `git@host:org/repo.git` and `ssh://git@host:22/org/repo.git` both become
/// `https://host/org/repo`.
pub fn http_style_url(url: &str) -> String {
    let url = url.trim();
    let trimmed = url.strip_suffix(".git").unwrap_or(url);

    if let Some(rest) = trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"))
    {
        let scheme = if trimmed.starts_with("https://") {
            "https"
        } else {
            "http"
        };
        let rest = rest.split_once('@').map(|(_, host)| host).unwrap_or(rest);
        return format!("{}://{}", scheme, rest);
    }

    if let Some(rest) = trimmed.strip_prefix("ssh://") {
        let rest = rest.split_once('@').map(|(_, host)| host).unwrap_or(rest);
        let (host, path) = rest.split_once('/').unwrap_or((rest, ""));
        let host = host.split(':').next().unwrap_or(host);
        return format!("https://{}/{}", host, path);
    }

    if let Some((user_host, path)) = trimmed.split_once(':') {
        if !user_host.contains('/') {
            let host = user_host
                .split_once('@')
                .map(|(_, host)| host)
                .unwrap_or(user_host);
            return format!("https://{}/{}", host, path.trim_start_matches('/'));
        }
    }

    trimmed.to_string()
}

/// Fixed repository state for unit tests.
#[cfg(test)]
pub(crate) mod fake {
    use super::*;

    #[derive(Debug, Clone)]
    pub(crate) struct FakeGit {
        pub branch: Option<String>,
        pub head: Option<String>,
        pub tag: Option<VersionTag>,
        pub author: Option<(String, String)>,
        pub remote: Option<String>,
        pub time: i64,
    }

    impl FakeGit {
        /// On `master` at commit `head`, no tags.
        pub(crate) fn at(head: &str) -> Self {
            Self {
                branch: Some("master".to_string()),
                head: Some(head.to_string()),
                tag: None,
                author: Some(("Jane Doe".to_string(), "jane@example.com".to_string())),
                remote: Some("git@github.com:MBox/MBoxFoo.git".to_string()),
                time: 1_700_000_000,
            }
        }

        pub(crate) fn tagged(mut self, name: &str, oid: &str) -> Self {
            self.tag = Some(VersionTag {
                name: name.to_string(),
                oid: oid.to_string(),
            });
            self
        }

        pub(crate) fn on_branch(mut self, branch: Option<&str>) -> Self {
            self.branch = branch.map(str::to_string);
            self
        }
    }

    impl GitAdapter for FakeGit {
        fn current_branch(&self) -> Option<String> {
            self.branch.clone()
        }

        fn current_commit(&self) -> Option<String> {
            self.head.clone()
        }

        fn max_version_tag(&self) -> Result<Option<VersionTag>> {
            Ok(self.tag.clone())
        }

        fn head_commit(&self) -> Result<Commit> {
            let oid = self
                .head
                .clone()
                .ok_or_else(|| Error::git_command_failed("no HEAD"))?;
            let (name, email) = self.author.clone().unwrap_or_default();
            Ok(Commit {
                oid,
                author: CommitAuthor {
                    name,
                    email,
                    time: DateTime::<Utc>::from_timestamp(self.time, 0).unwrap(),
                },
            })
        }

        fn author_name(&self) -> Option<String> {
            self.author.as_ref().map(|(name, _)| name.clone())
        }

        fn author_email(&self) -> Option<String> {
            self.author.as_ref().map(|(_, email)| email.clone())
        }

        fn remote_url(&self) -> Option<String> {
            self.remote.clone()
        }
    }
}
