//! File I/O primitives with consistent error handling.

use crate::error::{Error, Result};
use std::fs;
use std::path::Path;

/// Read file contents with standardized error handling.
///
/// Wraps `fs::read_to_string` with consistent `Error::internal_io` formatting.
pub fn read_file(path: &Path, operation: &str) -> Result<String> {
    fs::read_to_string(path)
        .map_err(|e| Error::internal_io(e.to_string(), Some(operation.to_string())))
}

/// Write content to file with standardized error handling.
///
/// Wraps `fs::write` with consistent `Error::internal_io` formatting.
pub fn write_file(path: &Path, content: &str, operation: &str) -> Result<()> {
    fs::write(path, content)
        .map_err(|e| Error::internal_io(e.to_string(), Some(operation.to_string())))
}

/// Write content to file atomically (write to .tmp, then rename).
///
/// Readers always see either the old content or the new content, never a
/// partial write. Missing parent directories are created.
pub fn write_file_atomic(path: &Path, content: &str, operation: &str) -> Result<()> {
    let parent = path.parent().ok_or_else(|| {
        Error::internal_io(
            format!("Invalid path: {}", path.display()),
            Some(operation.to_string()),
        )
    })?;

    let filename = path.file_name().ok_or_else(|| {
        Error::internal_io(
            format!("Invalid path: {}", path.display()),
            Some(operation.to_string()),
        )
    })?;

    ensure_dir(parent, operation)?;

    let tmp_path = parent.join(format!("{}.tmp", filename.to_string_lossy()));

    fs::write(&tmp_path, content).map_err(|e| {
        Error::internal_io(e.to_string(), Some(format!("{} (write temp)", operation)))
    })?;

    fs::rename(&tmp_path, path)
        .map_err(|e| Error::internal_io(e.to_string(), Some(format!("{} (rename)", operation))))?;

    Ok(())
}

/// Create a directory and all of its parents if missing.
pub fn ensure_dir(dir: &Path, operation: &str) -> Result<()> {
    if !dir.is_dir() {
        fs::create_dir_all(dir).map_err(|e| {
            Error::internal_io(
                format!("{}: {}", dir.display(), e),
                Some(operation.to_string()),
            )
        })?;
    }
    Ok(())
}

/// Remove a file, symlink or directory tree.
pub fn remove_path(path: &Path, operation: &str) -> Result<()> {
    let meta = match fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(Error::internal_io(e.to_string(), Some(operation.to_string()))),
    };

    let result = if meta.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    result.map_err(|e| {
        Error::internal_io(
            format!("{}: {}", path.display(), e),
            Some(operation.to_string()),
        )
    })
}

/// Remove a path, ignoring any failure.
pub fn remove_path_best_effort(path: &Path) {
    let _ = remove_path(path, "remove");
}

/// Copy a file or directory tree. Symlinks are recreated, not followed.
pub fn copy_path(from: &Path, to: &Path, operation: &str) -> Result<()> {
    let io_err = |e: std::io::Error, path: &Path| {
        Error::internal_io(
            format!("{}: {}", path.display(), e),
            Some(operation.to_string()),
        )
    };

    let meta = fs::symlink_metadata(from).map_err(|e| io_err(e, from))?;

    if meta.file_type().is_symlink() {
        let target = fs::read_link(from).map_err(|e| io_err(e, from))?;
        return symlink(&target, to).map_err(|e| io_err(e, to));
    }

    if meta.is_dir() {
        fs::create_dir_all(to).map_err(|e| io_err(e, to))?;
        let mut entries: Vec<_> = fs::read_dir(from)
            .map_err(|e| io_err(e, from))?
            .flatten()
            .map(|entry| entry.file_name())
            .collect();
        entries.sort();
        for name in entries {
            copy_path(&from.join(&name), &to.join(&name), operation)?;
        }
        return Ok(());
    }

    if let Some(parent) = to.parent() {
        ensure_dir(parent, operation)?;
    }
    fs::copy(from, to).map_err(|e| io_err(e, from))?;
    Ok(())
}

/// Copy `from` to `to`, replacing whatever is already at `to`.
///
/// Removing the old copy is best-effort; a leftover surfaces as a copy error.
pub fn replace_path(from: &Path, to: &Path, operation: &str) -> Result<()> {
    remove_path_best_effort(to);
    if let Some(parent) = to.parent() {
        ensure_dir(parent, operation)?;
    }
    copy_path(from, to, operation)
}

#[cfg(unix)]
fn symlink(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(not(unix))]
fn symlink(target: &Path, link: &Path) -> std::io::Result<()> {
    fs::copy(target, link).map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn read_file_returns_error_for_missing_file() {
        let result = read_file(Path::new("/nonexistent/path.txt"), "test read");
        let err = result.unwrap_err();
        assert_eq!(err.code.as_str(), "internal.io_error");
    }

    #[test]
    fn write_file_atomic_creates_parents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a/b/manifest.yml");
        write_file_atomic(&path, "NAME: Foo\n", "test write").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "NAME: Foo\n");
        assert!(!dir.path().join("a/b/manifest.yml.tmp").exists());
    }

    #[test]
    fn copy_path_copies_directory_tree() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        fs::create_dir_all(src.join("nested")).unwrap();
        fs::write(src.join("a.txt"), "a").unwrap();
        fs::write(src.join("nested/b.txt"), "b").unwrap();

        let dst = dir.path().join("out/dst");
        copy_path(&src, &dst, "test copy").unwrap();

        assert_eq!(fs::read_to_string(dst.join("a.txt")).unwrap(), "a");
        assert_eq!(fs::read_to_string(dst.join("nested/b.txt")).unwrap(), "b");
    }

    #[test]
    fn replace_path_drops_stale_files() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("new.txt"), "new").unwrap();

        let dst = dir.path().join("dst");
        fs::create_dir_all(&dst).unwrap();
        fs::write(dst.join("stale.txt"), "stale").unwrap();

        replace_path(&src, &dst, "test replace").unwrap();

        assert!(dst.join("new.txt").exists());
        assert!(!dst.join("stale.txt").exists());
    }

    #[test]
    fn remove_path_ignores_missing() {
        assert!(remove_path(Path::new("/nonexistent/xyz"), "test remove").is_ok());
    }
}
