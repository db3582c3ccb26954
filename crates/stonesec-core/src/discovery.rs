use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::ScanError;

/// Directory names never descended into: VCS metadata, virtualenvs,
/// dependency trees, caches and build output.
pub const DEFAULT_EXCLUDES: &[&str] = &[
    ".git",
    ".hg",
    ".svn",
    ".venv",
    "venv",
    "env",
    ".tox",
    ".nox",
    "__pycache__",
    ".mypy_cache",
    ".pytest_cache",
    "node_modules",
    "site-packages",
    "build",
    "dist",
];

const PYTHON_PATTERN: &str = "*.py";

/// Collect the Python files under `target`.
///
/// A file target is returned as-is when it has a `.py` extension. A
/// directory is walked recursively, skipping [`DEFAULT_EXCLUDES`], hidden
/// directories and any name in `extra_excludes`. The result holds canonical
/// paths in lexicographic order without duplicates.
pub fn discover_python_files(
    target: &Path,
    extra_excludes: &[String],
) -> Result<Vec<PathBuf>, ScanError> {
    if !target.exists() {
        return Err(ScanError::PathNotFound(target.to_path_buf()));
    }

    let root = target.canonicalize().map_err(|source| ScanError::Io {
        path: target.to_path_buf(),
        source,
    })?;

    if root.is_file() {
        return Ok(if is_python_file(&root) {
            vec![root]
        } else {
            Vec::new()
        });
    }

    // The root itself must be readable; nested failures are only logged.
    std::fs::read_dir(&root).map_err(|source| ScanError::Io {
        path: root.clone(),
        source,
    })?;

    let mut files = Vec::new();
    walk_dir(&root, extra_excludes, &mut files);

    files.sort();
    files.dedup();
    debug!(root = %root.display(), count = files.len(), "discovered python files");
    Ok(files)
}

pub fn is_python_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "py")
}

fn is_excluded(name: &str, extra_excludes: &[String]) -> bool {
    name.starts_with('.')
        || DEFAULT_EXCLUDES.contains(&name)
        || extra_excludes.iter().any(|extra| extra == name)
}

fn walk_dir(dir: &Path, extra_excludes: &[String], files: &mut Vec<PathBuf>) {
    collect_matches(dir, files);

    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            debug!(dir = %dir.display(), error = %err, "skipping unreadable directory");
            return;
        }
    };

    for entry in entries.flatten() {
        // Symlinked directories are not followed.
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        if !file_type.is_dir() {
            continue;
        }

        let name = entry.file_name();
        if is_excluded(&name.to_string_lossy(), extra_excludes) {
            continue;
        }
        walk_dir(&entry.path(), extra_excludes, files);
    }
}

fn collect_matches(dir: &Path, files: &mut Vec<PathBuf>) {
    let pattern = format!(
        "{}/{}",
        glob::Pattern::escape(&dir.display().to_string()),
        PYTHON_PATTERN
    );
    let Ok(entries) = glob::glob(&pattern) else {
        debug!(pattern = %pattern, "invalid glob pattern");
        return;
    };

    for entry in entries.flatten() {
        if !entry.is_file() {
            continue;
        }
        match entry.canonicalize() {
            Ok(path) => files.push(path),
            Err(err) => debug!(file = %entry.display(), error = %err, "skipping file"),
        }
    }
}
