//! Working-tree materialization for checkout, reset and fast-forward.
//!
//! Materializing a commit replaces every top-level file in the working tree
//! with the commit's snapshot and makes the staging area a copy of its tree.
//! Before anything is touched, the untracked-file guard makes sure no file
//! the user never staged would be destroyed.

use tracing::{debug, info};

use crate::commit::Tree;
use crate::errors::RepoError;
use crate::repository::Repository;
use crate::worktree::{normalize_path, WorkTree};

// ---------------------------------------------------------------------------
// Untracked-file guard
// ---------------------------------------------------------------------------

/// Whether the guard treats `path` as untracked.
///
/// A file counts as tracked when the staging area has an entry for it; the
/// head commit's tree is not consulted.
pub fn is_untracked(path: &str, staging: &Tree) -> bool {
    !staging.contains_key(path)
}

/// Top-level working files the guard treats as untracked, sorted.
pub fn untracked_files(worktree: &WorkTree, staging: &Tree) -> Result<Vec<String>, RepoError> {
    Ok(worktree
        .plain_files()?
        .into_iter()
        .filter(|name| is_untracked(name, staging))
        .collect())
}

/// Fail with `UntrackedFileWouldBeOverwritten` if any untracked file exists.
pub fn check_untracked(worktree: &WorkTree, staging: &Tree) -> Result<(), RepoError> {
    match untracked_files(worktree, staging)?.into_iter().next() {
        Some(path) => Err(RepoError::UntrackedFileWouldBeOverwritten(path)),
        None => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// Materialization
// ---------------------------------------------------------------------------

/// Make commit `target` the working state.
///
/// 1. Run the untracked-file guard.
/// 2. Delete every top-level working file.
/// 3. Write every file of `target`'s tree.
/// 4. Point head at `target` and replace the staging area with its tree.
///
/// Branch pointers are left to the caller.
pub fn materialize(repo: &mut Repository, target: &str) -> Result<(), RepoError> {
    check_untracked(&repo.worktree, &repo.state.staging)?;

    let commit = repo.state.commits.get(target)?;
    // Look up every blob first so a corrupt store fails before any deletion.
    let files = commit
        .tree
        .iter()
        .map(|(path, blob)| repo.state.blobs.get(blob).map(|bytes| (path.as_str(), bytes)))
        .collect::<Result<Vec<_>, _>>()?;

    let mut removed = 0usize;
    for name in repo.worktree.plain_files()? {
        if repo.worktree.remove(&name)? {
            removed += 1;
        }
    }
    for (path, bytes) in &files {
        repo.worktree.write(path, bytes)?;
    }

    let tree = commit.tree.clone();
    debug!(removed, written = files.len(), commit = target, "materialized tree");

    repo.state.head = target.to_string();
    repo.state.staging = tree;
    info!(head = target, "working tree reconciled");
    Ok(())
}

/// Overwrite one working file with its version in commit `hash`.
///
/// Head, branches and the staging area are not touched and the guard does
/// not run.
pub fn restore_file(repo: &Repository, hash: &str, path: &str) -> Result<(), RepoError> {
    let commit = repo.state.commits.get(hash)?;
    let path = normalize_path(path).ok_or_else(|| RepoError::FileNotInCommit(path.to_string()))?;
    let blob = commit
        .tree
        .get(&path)
        .ok_or_else(|| RepoError::FileNotInCommit(path.clone()))?;

    let bytes = repo.state.blobs.get(blob)?;
    repo.worktree.write(&path, bytes)?;
    debug!(path = %path, commit = hash, "restored file");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo_with_file(dir: &std::path::Path, name: &str, content: &str) -> Repository {
        let mut repo = Repository::init(dir).unwrap();
        std::fs::write(dir.join(name), content).unwrap();
        repo.add(name).unwrap();
        repo.commit("c1").unwrap();
        repo
    }

    #[test]
    fn test_guard_uses_staging() {
        let mut staging = Tree::new();
        staging.insert("a.txt".into(), "h".into());
        assert!(!is_untracked("a.txt", &staging));
        assert!(is_untracked("b.txt", &staging));
    }

    #[test]
    fn test_check_untracked_reports_first_offender() {
        let dir = tempfile::tempdir().unwrap();
        let tree = WorkTree::new(dir.path());
        std::fs::write(dir.path().join("z.txt"), "z").unwrap();
        std::fs::write(dir.path().join("m.txt"), "m").unwrap();

        let err = check_untracked(&tree, &Tree::new()).unwrap_err();
        assert!(matches!(
            err,
            RepoError::UntrackedFileWouldBeOverwritten(ref p) if p == "m.txt"
        ));
    }

    #[test]
    fn test_materialize_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut repo = repo_with_file(dir.path(), "a.txt", "v1");
        let c1 = repo.head().to_string();

        std::fs::write(dir.path().join("a.txt"), "v2").unwrap();
        std::fs::write(dir.path().join("b.txt"), "new").unwrap();
        repo.add("a.txt").unwrap();
        repo.add("b.txt").unwrap();
        repo.commit("c2").unwrap();

        materialize(&mut repo, &c1).unwrap();
        assert_eq!(std::fs::read_to_string(dir.path().join("a.txt")).unwrap(), "v1");
        assert!(!dir.path().join("b.txt").exists());
        assert_eq!(repo.head(), c1);
        assert_eq!(repo.staging(), &repo.commits().get(&c1).unwrap().tree);
    }

    #[test]
    fn test_materialize_blocked_by_untracked_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut repo = repo_with_file(dir.path(), "a.txt", "v1");
        let root = repo.commits().first_parent_history(repo.head()).unwrap()[1]
            .hash
            .clone();
        let head_before = repo.head().to_string();
        std::fs::write(dir.path().join("stray.txt"), "mine").unwrap();

        let err = materialize(&mut repo, &root).unwrap_err();
        assert!(matches!(err, RepoError::UntrackedFileWouldBeOverwritten(_)));
        assert_eq!(repo.head(), head_before);
        assert!(dir.path().join("a.txt").exists());
        assert!(dir.path().join("stray.txt").exists());
    }

    #[test]
    fn test_materialize_writes_nested_paths() {
        let dir = tempfile::tempdir().unwrap();
        let mut repo = Repository::init(dir.path()).unwrap();
        let root = repo.head().to_string();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/lib.rs"), "fn x() {}").unwrap();
        repo.add("src/lib.rs").unwrap();
        let c1 = repo.commit("nested").unwrap();

        materialize(&mut repo, &root).unwrap();
        assert!(repo.staging().is_empty());
        std::fs::remove_dir_all(dir.path().join("src")).unwrap();

        materialize(&mut repo, &c1).unwrap();
        assert_eq!(
            std::fs::read_to_string(dir.path().join("src/lib.rs")).unwrap(),
            "fn x() {}"
        );
    }

    #[test]
    fn test_restore_file() {
        let dir = tempfile::tempdir().unwrap();
        let repo = repo_with_file(dir.path(), "a.txt", "v1");
        std::fs::write(dir.path().join("a.txt"), "scribbled").unwrap();

        restore_file(&repo, repo.head(), "a.txt").unwrap();
        assert_eq!(std::fs::read_to_string(dir.path().join("a.txt")).unwrap(), "v1");

        let err = restore_file(&repo, repo.head(), "missing.txt").unwrap_err();
        assert!(matches!(err, RepoError::FileNotInCommit(_)));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_materialize_blocked_by_non_utf8_file() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = tempfile::tempdir().unwrap();
        let mut repo = repo_with_file(dir.path(), "a.txt", "v1");
        let root = repo.commits().first_parent_history(repo.head()).unwrap()[1]
            .hash
            .clone();
        let stray = dir.path().join(OsStr::from_bytes(b"bad\xff.txt"));
        std::fs::write(&stray, "mine").unwrap();

        let err = materialize(&mut repo, &root).unwrap_err();
        assert!(matches!(err, RepoError::UntrackedFileWouldBeOverwritten(_)));
        assert!(stray.exists());
        assert!(dir.path().join("a.txt").exists());
    }
}
