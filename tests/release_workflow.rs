use std::fs;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use mbox_dev::defaults::Defaults;
use mbox_dev::dev::{self, DevOptions};
use mbox_dev::git::{Commit, CommitAuthor, GitAdapter, VersionTag};
use mbox_dev::release::{self, BuildOptions};
use mbox_dev::{PluginPackage, Result, WorkRepo, Workspace};
use tempfile::TempDir;

struct StaticGit {
    head: &'static str,
    tag: Option<(&'static str, &'static str)>,
}

impl GitAdapter for StaticGit {
    fn current_branch(&self) -> Option<String> {
        Some("develop".to_string())
    }

    fn current_commit(&self) -> Option<String> {
        Some(self.head.to_string())
    }

    fn max_version_tag(&self) -> Result<Option<VersionTag>> {
        Ok(self.tag.map(|(name, oid)| VersionTag {
            name: name.to_string(),
            oid: oid.to_string(),
        }))
    }

    fn head_commit(&self) -> Result<Commit> {
        Ok(Commit {
            oid: self.head.to_string(),
            author: CommitAuthor {
                name: "Ada".to_string(),
                email: "ada@example.com".to_string(),
                time: DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap(),
            },
        })
    }

    fn author_name(&self) -> Option<String> {
        Some("Ada".to_string())
    }

    fn author_email(&self) -> Option<String> {
        Some("ada@example.com".to_string())
    }

    fn remote_url(&self) -> Option<String> {
        Some("git@github.com:mbox/MBoxFoo.git".to_string())
    }
}

fn write(path: &Path, content: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn foo_repo(root: &Path, git: StaticGit) -> WorkRepo {
    let dir = root.join("repos/MBoxFoo");
    write(
        &dir.join("manifest.yml"),
        "NAME: MBoxFoo\nVERSION: 1.2\nAUTHORS:\n  - Ada\nICON: icon.png\nMODULES:\n  - MBoxFoo/Ui\n",
    );
    write(&dir.join("icon.png"), "png");
    write(&dir.join("Resources/strings.json"), "{}");
    write(&dir.join("Launcher/launch.rb"), "puts 'hi'\n");
    write(&dir.join("Ui/manifest.yml"), "NAME: MBoxFoo/Ui\n");
    write(&dir.join("Ui/setting.schema.json"), r#"{"type":"object"}"#);
    WorkRepo::new("MBoxFoo", dir, Arc::new(git))
}

#[test]
fn build_writes_complete_product() {
    let root = TempDir::new().unwrap();
    let git = StaticGit {
        head: "abcdef0123456789",
        tag: Some(("v1.2.4", "0000000")),
    };
    let workspace =
        Workspace::with_repos(root.path(), Defaults::default(), vec![foo_repo(root.path(), git)]);

    let report = release::build(&workspace, &BuildOptions::default()).unwrap();
    assert_eq!(report.stages, vec!["Launcher", "Resource", "Setting"]);
    assert_eq!(report.released.len(), 1);
    assert_eq!(report.released[0].current.as_deref(), Some("1.2.4"));
    assert_eq!(report.released[0].next, "1.2.5");

    let product_dir = root.path().join("release/MBoxFoo");
    assert!(product_dir.join("icon.png").is_file());
    assert!(product_dir.join("Resources/strings.json").is_file());
    assert!(product_dir.join("Launcher/launch.rb").is_file());
    assert!(product_dir.join("Ui/setting.schema.json").is_file());
    assert!(product_dir.join("Ui/manifest.yml").is_file());

    let product = PluginPackage::from_directory(&product_dir).unwrap().unwrap();
    let document = product.document();
    assert_eq!(product.version(), "1.2.5");
    assert_eq!(document.commit_id.as_deref(), Some("abcdef0"));
    assert_eq!(document.publisher.as_deref(), Some("Ada (ada@example.com)"));
    assert_eq!(
        document.git_url.as_deref(),
        Some("git@github.com:mbox/MBoxFoo.git")
    );
    assert!(document.build_number.is_some());

    let source = PluginPackage::from_directory(&root.path().join("repos/MBoxFoo"))
        .unwrap()
        .unwrap();
    assert_eq!(source.version(), "1.2");
    assert!(source.document().commit_id.is_none());
}

#[test]
fn failed_validation_leaves_previous_release_alone() {
    let root = TempDir::new().unwrap();
    let dir = root.path().join("repos/MBoxBar");
    write(&dir.join("manifest.yml"), "NAME: MBoxBar\nVERSION: '1.0'\n");
    let git = StaticGit {
        head: "c1",
        tag: None,
    };
    let repo = WorkRepo::new("MBoxBar", dir, Arc::new(git));
    let workspace = Workspace::with_repos(root.path(), Defaults::default(), vec![repo]);
    let previous = root.path().join("release/MBoxBar/manifest.yml");
    write(&previous, "NAME: MBoxBar\nVERSION: '0.9'\n");

    let err = release::build(&workspace, &BuildOptions::default()).unwrap_err();
    assert_eq!(err.code.as_str(), "stage.failed");
    assert_eq!(err.details["phase"], "Validate");
    assert_eq!(
        fs::read_to_string(&previous).unwrap(),
        "NAME: MBoxBar\nVERSION: '0.9'\n"
    );
}

#[test]
fn next_version_rewrites_base_version() {
    let root = TempDir::new().unwrap();
    let git = StaticGit {
        head: "c9",
        tag: Some(("v1.2.4", "c1")),
    };
    let mut repo = foo_repo(root.path(), git);

    let report = release::next_version(&mut repo, Some("2.0")).unwrap();
    assert!(report.major_updated);
    assert_eq!(report.next, "2.0.0");
    assert_eq!(repo.require_manifest().unwrap().version(), "2.0");
}

#[test]
fn dev_then_build_round_trip() {
    let root = TempDir::new().unwrap();
    let dir = root.path().join("repos/MBoxBaz");
    fs::create_dir_all(&dir).unwrap();
    let git = StaticGit {
        head: "c1",
        tag: None,
    };
    let repo = WorkRepo::new("MBoxBaz", &dir, Arc::new(git));
    let workspace = Workspace::with_repos(root.path(), Defaults::default(), vec![repo]);

    let options = DevOptions {
        template: "Resource".to_string(),
        name: Some("baz".to_string()),
    };
    let created = dev::scaffold(&workspace, &dir, &options).unwrap();
    assert_eq!(created.module, "MBoxBaz");
    assert!(created.package_created);

    // The workspace caches manifests, so reopen the repo after scaffolding.
    let repo = WorkRepo::new(
        "MBoxBaz",
        &dir,
        Arc::new(StaticGit {
            head: "c1",
            tag: None,
        }),
    );
    let workspace = Workspace::with_repos(root.path(), Defaults::default(), vec![repo]);
    let report = release::build(&workspace, &BuildOptions::default()).unwrap();
    assert_eq!(report.released[0].next, "1.0.0");
    assert!(root.path().join("release/MBoxBaz/Resources").is_dir());
}
