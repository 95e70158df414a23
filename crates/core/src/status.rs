//! Repository status: how the staging area differs from head and how the
//! working tree differs from the staging area.

use std::fmt;

use crate::commit::Tree;
use crate::errors::RepoError;
use crate::objects::digest;
use crate::reconcile;
use crate::repository::Repository;

/// How a staged file differs from its working copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modification {
    Modified,
    Deleted,
}

impl fmt::Display for Modification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Modified => write!(f, "modified"),
            Self::Deleted => write!(f, "deleted"),
        }
    }
}

/// Snapshot of the repository's pending changes. Every list is sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Status {
    /// Branch names with a flag marking the current one.
    pub branches: Vec<(String, bool)>,
    /// Staged paths that are new or differ from head.
    pub staged: Vec<String>,
    /// Paths tracked by head but no longer staged.
    pub removed: Vec<String>,
    /// Staged paths whose working copy changed or vanished.
    pub unstaged: Vec<(String, Modification)>,
    /// Top-level working files with no staging entry.
    pub untracked: Vec<String>,
}

impl Status {
    pub fn is_clean(&self) -> bool {
        self.staged.is_empty()
            && self.removed.is_empty()
            && self.unstaged.is_empty()
            && self.untracked.is_empty()
    }
}

/// Whether committing `staging` on top of `head` would record anything.
pub fn has_staged_changes(staging: &Tree, head: &Tree) -> bool {
    staging != head
}

pub(crate) fn compute(repo: &Repository) -> Result<Status, RepoError> {
    let head = &repo.head_commit()?.tree;
    let staging = repo.staging();

    let branches = repo
        .branches()
        .keys()
        .map(|name| (name.clone(), name == repo.current_branch()))
        .collect();

    let staged = staging
        .iter()
        .filter(|(path, blob)| head.get(*path) != Some(*blob))
        .map(|(path, _)| path.clone())
        .collect();

    let removed = head
        .keys()
        .filter(|path| !staging.contains_key(*path))
        .cloned()
        .collect();

    let mut unstaged = Vec::new();
    for (path, blob) in staging {
        if !repo.worktree.is_file(path) {
            unstaged.push((path.clone(), Modification::Deleted));
        } else if digest(&repo.worktree.read(path)?) != *blob {
            unstaged.push((path.clone(), Modification::Modified));
        }
    }

    let untracked = reconcile::untracked_files(&repo.worktree, staging)?;

    Ok(Status {
        branches,
        staged,
        removed,
        unstaged,
        untracked,
    })
}
