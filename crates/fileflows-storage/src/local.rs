//! Local filesystem actions used by the dispatcher.

use fileflows_core::{FileOpsError, FileOpsResult};
use std::path::{Component, Path, PathBuf};
use tokio::fs;

/// Create `path` and any missing parents. No-op when it already exists.
pub async fn ensure_dir(path: &Path) -> FileOpsResult<()> {
    fs::create_dir_all(path).await.map_err(|e| {
        FileOpsError::Backend(format!(
            "Failed to create directory {}: {}",
            path.display(),
            e
        ))
    })?;

    tracing::debug!(path = %path.display(), "Local directory ensured");
    Ok(())
}

/// Ensure the parent directory of `path` exists.
pub async fn ensure_parent_dir(path: &Path) -> FileOpsResult<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => ensure_dir(parent).await,
        _ => Ok(()),
    }
}

/// Copy bytes from `src` to `dst`, creating the parent of `dst` first.
/// Returns the number of bytes copied.
pub async fn copy_file(src: &Path, dst: &Path) -> FileOpsResult<u64> {
    let start = std::time::Instant::now();

    if !is_file(src).await? {
        return Err(FileOpsError::NotFound(src.display().to_string()));
    }
    ensure_parent_dir(dst).await?;

    let size = fs::copy(src, dst).await.map_err(|e| {
        FileOpsError::from_io(
            e,
            format!("Failed to copy {} to {}", src.display(), dst.display()),
        )
    })?;

    tracing::info!(
        from_path = %src.display(),
        to_path = %dst.display(),
        size_bytes = size,
        duration_ms = start.elapsed().as_secs_f64() * 1000.0,
        "Local copy successful"
    );

    Ok(size)
}

/// Remove a file, or a directory with everything below it.
pub async fn remove(path: &Path, if_missing_ok: bool) -> FileOpsResult<()> {
    let metadata = match fs::symlink_metadata(path).await {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound && if_missing_ok => return Ok(()),
        Err(e) => return Err(FileOpsError::from_io(e, path.display())),
    };

    let result = if metadata.is_dir() {
        fs::remove_dir_all(path).await
    } else {
        fs::remove_file(path).await
    };

    match result {
        Ok(()) => {}
        // raced with another remover
        Err(e) if e.kind() == std::io::ErrorKind::NotFound && if_missing_ok => return Ok(()),
        Err(e) => return Err(FileOpsError::from_io(e, path.display())),
    }

    tracing::info!(
        path = %path.display(),
        directory = metadata.is_dir(),
        "Local delete successful"
    );

    Ok(())
}

pub async fn exists(path: &Path) -> FileOpsResult<bool> {
    fs::try_exists(path)
        .await
        .map_err(|e| FileOpsError::Backend(format!("{}: {}", path.display(), e)))
}

pub async fn is_dir(path: &Path) -> FileOpsResult<bool> {
    match fs::metadata(path).await {
        Ok(metadata) => Ok(metadata.is_dir()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(FileOpsError::from_io(e, path.display())),
    }
}

async fn is_file(path: &Path) -> FileOpsResult<bool> {
    match fs::metadata(path).await {
        Ok(metadata) => Ok(metadata.is_file()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(FileOpsError::from_io(e, path.display())),
    }
}

/// Size in bytes. For a directory, the total size of the files below it.
pub async fn size(path: &Path) -> FileOpsResult<u64> {
    let metadata = fs::metadata(path)
        .await
        .map_err(|e| FileOpsError::from_io(e, path.display()))?;

    if !metadata.is_dir() {
        return Ok(metadata.len());
    }

    let mut total = 0;
    for file in walk_files(path).await? {
        total += fs::metadata(&file)
            .await
            .map_err(|e| FileOpsError::from_io(e, file.display()))?
            .len();
    }
    Ok(total)
}

/// Direct children of `dir`, files and directories alike.
pub async fn list_children(dir: &Path) -> FileOpsResult<Vec<PathBuf>> {
    let mut entries = fs::read_dir(dir)
        .await
        .map_err(|e| FileOpsError::from_io(e, dir.display()))?;

    let mut children = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| FileOpsError::from_io(e, dir.display()))?
    {
        children.push(entry.path());
    }

    Ok(children)
}

/// Paths in `dir` matching the glob `pattern` (relative to `dir`).
pub async fn glob_in(dir: &Path, pattern: &str) -> FileOpsResult<Vec<PathBuf>> {
    if !is_dir(dir).await? {
        return Err(FileOpsError::NotFound(dir.display().to_string()));
    }

    let dir_str = dir.to_str().ok_or_else(|| {
        FileOpsError::InvalidLocation(format!("{} is not valid UTF-8", dir.display()))
    })?;
    let full_pattern = format!(
        "{}/{}",
        glob::Pattern::escape(dir_str.trim_end_matches('/')),
        pattern.trim_start_matches('/')
    );

    tokio::task::spawn_blocking(move || -> FileOpsResult<Vec<PathBuf>> {
        let paths = glob::glob(&full_pattern).map_err(|e| {
            FileOpsError::InvalidLocation(format!("Invalid pattern {}: {}", full_pattern, e))
        })?;
        paths
            .map(|entry| entry.map_err(|e| FileOpsError::Backend(e.to_string())))
            .collect()
    })
    .await
    .map_err(|e| FileOpsError::Backend(format!("glob task failed: {}", e)))?
}

/// Every regular file below `root`, recursively.
pub async fn walk_files(root: &Path) -> FileOpsResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        for child in list_children(&dir).await? {
            let file_type = fs::symlink_metadata(&child)
                .await
                .map_err(|e| FileOpsError::from_io(e, child.display()))?
                .file_type();
            if file_type.is_dir() {
                pending.push(child);
            } else {
                files.push(child);
            }
        }
    }

    Ok(files)
}

/// Absolute form of `path` with symlinks and `..` resolved. The longest
/// existing ancestor is canonicalised; the missing tail is applied lexically.
pub async fn resolve(path: &Path) -> FileOpsResult<PathBuf> {
    let absolute =
        std::path::absolute(path).map_err(|e| FileOpsError::from_io(e, path.display()))?;
    let mut existing = absolute.as_path();
    let mut tail = Vec::new();

    let mut resolved = loop {
        match fs::canonicalize(existing).await {
            Ok(resolved) => break resolved,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                match (existing.parent(), existing.components().next_back()) {
                    (Some(parent), Some(last)) => {
                        tail.push(last);
                        existing = parent;
                    }
                    _ => return Err(FileOpsError::from_io(e, path.display())),
                }
            }
            Err(e) => return Err(FileOpsError::from_io(e, path.display())),
        }
    };

    for component in tail.into_iter().rev() {
        match component {
            Component::ParentDir => {
                resolved.pop();
            }
            Component::Normal(name) => resolved.push(name),
            _ => {}
        }
    }
    Ok(resolved)
}

/// `path` relative to `root`, with `/` separators.
pub fn relative_key(root: &Path, path: &Path) -> FileOpsResult<String> {
    let relative = path.strip_prefix(root).map_err(|_| {
        FileOpsError::InvalidLocation(format!(
            "{} is not below {}",
            path.display(),
            root.display()
        ))
    })?;

    Ok(relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_ensure_dir_is_idempotent() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("a/b/c");

        ensure_dir(&nested).await.unwrap();
        ensure_dir(&nested).await.unwrap();
        assert!(is_dir(&nested).await.unwrap());
    }

    #[tokio::test]
    async fn test_copy_file_creates_parent() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src.txt");
        let dst = dir.path().join("out/dst.txt");
        fs::write(&src, b"payload").await.unwrap();

        assert_eq!(copy_file(&src, &dst).await.unwrap(), 7);
        assert_eq!(fs::read(&dst).await.unwrap(), b"payload");
    }

    #[tokio::test]
    async fn test_copy_missing_source_is_not_found() {
        let dir = tempdir().unwrap();
        let result = copy_file(&dir.path().join("nope"), &dir.path().join("dst")).await;
        assert!(matches!(result, Err(FileOpsError::NotFound(_))));
        assert!(!exists(&dir.path().join("dst")).await.unwrap());
    }

    #[tokio::test]
    async fn test_remove_missing() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("missing.txt");

        assert!(matches!(
            remove(&missing, false).await,
            Err(FileOpsError::NotFound(_))
        ));
        assert!(remove(&missing, true).await.is_ok());
    }

    #[tokio::test]
    async fn test_remove_directory_recursively() {
        let dir = tempdir().unwrap();
        let tree = dir.path().join("tree");
        fs::create_dir_all(tree.join("sub")).await.unwrap();
        fs::write(tree.join("sub/file.txt"), b"x").await.unwrap();

        remove(&tree, false).await.unwrap();
        assert!(!exists(&tree).await.unwrap());
    }

    #[tokio::test]
    async fn test_size_of_directory_sums_files() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("sub")).await.unwrap();
        fs::write(dir.path().join("a"), b"12345").await.unwrap();
        fs::write(dir.path().join("sub/b"), b"123").await.unwrap();

        assert_eq!(size(&dir.path().join("a")).await.unwrap(), 5);
        assert_eq!(size(dir.path()).await.unwrap(), 8);
        assert!(matches!(
            size(&dir.path().join("nope")).await,
            Err(FileOpsError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_glob_is_not_recursive_by_default() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("sub")).await.unwrap();
        fs::write(dir.path().join("a.parquet"), b"").await.unwrap();
        fs::write(dir.path().join("b.csv"), b"").await.unwrap();
        fs::write(dir.path().join("sub/c.parquet"), b"").await.unwrap();

        let matches = glob_in(dir.path(), "*.parquet").await.unwrap();
        assert_eq!(matches, vec![dir.path().join("a.parquet")]);

        let mut deep = glob_in(dir.path(), "**/*.parquet").await.unwrap();
        deep.sort();
        assert_eq!(
            deep,
            vec![dir.path().join("a.parquet"), dir.path().join("sub/c.parquet")]
        );
    }

    #[tokio::test]
    async fn test_resolve_aliases_and_missing_tail() {
        let dir = tempdir().unwrap();
        let root = fs::canonicalize(dir.path()).await.unwrap();
        fs::create_dir_all(dir.path().join("d")).await.unwrap();
        fs::write(dir.path().join("d/a.txt"), b"x").await.unwrap();

        assert_eq!(
            resolve(&dir.path().join("d/../d/a.txt")).await.unwrap(),
            root.join("d/a.txt")
        );
        assert_eq!(
            resolve(&dir.path().join("d/./new/b.txt")).await.unwrap(),
            root.join("d/new/b.txt")
        );
        assert_eq!(
            resolve(&dir.path().join("missing/../d/")).await.unwrap(),
            root.join("d")
        );
    }

    #[tokio::test]
    async fn test_walk_and_relative_key() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("x/y")).await.unwrap();
        fs::write(dir.path().join("x/y/z.txt"), b"").await.unwrap();

        let files = walk_files(dir.path()).await.unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(relative_key(dir.path(), &files[0]).unwrap(), "x/y/z.txt");
    }
}
