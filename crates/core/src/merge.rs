//! Merge-base discovery and whole-file three-way merge.
//!
//! A merge compares three trees per path: the split point (merge base), the
//! current head and the other branch's tip. Each path is classified into a
//! [`FileAction`]; paths changed differently on both sides become conflicts
//! whose content wraps both versions in `<<<<<<<` / `=======` / `>>>>>>>`
//! markers. Conflicts do not abort the merge, they are committed as is and
//! reported back to the caller.

use std::collections::{HashSet, VecDeque};

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::commit::{Commit, CommitGraph};
use crate::config::BaseStrategy;
use crate::errors::{ObjectError, RepoError};
use crate::reconcile;
use crate::repository::Repository;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// What a merge did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The other branch is already an ancestor of head. Nothing changed.
    AlreadyUpToDate,
    /// Head was an ancestor of the other tip and now points at it.
    FastForwarded { head: String },
    /// A merge commit was created.
    Merged {
        commit: String,
        /// Paths that received conflict markers, sorted.
        conflicts: Vec<String>,
    },
    /// The branches diverged but no path needed any action; no commit.
    NothingToMerge,
}

impl MergeOutcome {
    pub fn has_conflicts(&self) -> bool {
        matches!(self, Self::Merged { conflicts, .. } if !conflicts.is_empty())
    }
}

/// Per-path decision of the three-way merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileAction {
    /// Take the other branch's version.
    TakeOther,
    /// The other branch deleted a file head left untouched.
    Delete,
    /// Both sides changed the file differently.
    Conflict,
    /// Keep whatever is currently staged.
    Keep,
}

impl std::fmt::Display for FileAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TakeOther => write!(f, "take_other"),
            Self::Delete => write!(f, "delete"),
            Self::Conflict => write!(f, "conflict"),
            Self::Keep => write!(f, "keep"),
        }
    }
}

/// Classify one path given its blob id at the split point, in head and in
/// the other tip (`None` = absent).
///
/// Only meaningful for paths present in the split tree or the other tree.
pub fn classify(split: Option<&str>, head: Option<&str>, other: Option<&str>) -> FileAction {
    if head == split {
        match other {
            None if split.is_some() => FileAction::Delete,
            Some(o) if Some(o) != split => FileAction::TakeOther,
            _ => FileAction::Keep,
        }
    } else if other != split && other != head {
        FileAction::Conflict
    } else {
        FileAction::Keep
    }
}

/// Conflict file content: head's bytes then other's bytes between markers.
/// A missing side contributes nothing.
pub fn conflict_content(head: Option<&[u8]>, other: Option<&[u8]>) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"<<<<<<< HEAD\n");
    out.extend_from_slice(head.unwrap_or_default());
    out.extend_from_slice(b"=======\n");
    out.extend_from_slice(other.unwrap_or_default());
    out.extend_from_slice(b">>>>>>>\n");
    out
}

// ---------------------------------------------------------------------------
// Merge base
// ---------------------------------------------------------------------------

/// Every commit reachable from `tip` through parent links, `tip` included.
pub fn ancestors(graph: &CommitGraph, tip: &str) -> Result<HashSet<String>, ObjectError> {
    reachable(graph, [tip.to_string()])
}

/// Every commit reachable from any of `starts`, each visited once.
fn reachable(
    graph: &CommitGraph,
    starts: impl IntoIterator<Item = String>,
) -> Result<HashSet<String>, ObjectError> {
    let mut seen = HashSet::new();
    let mut stack: Vec<String> = starts.into_iter().collect();
    while let Some(hash) = stack.pop() {
        if seen.contains(&hash) {
            continue;
        }
        let commit = graph.get(&hash)?;
        stack.extend(commit.parents.iter().cloned());
        seen.insert(hash);
    }
    Ok(seen)
}

/// Breadth-first walk from `start` along parent lists in order, calling
/// `stop` on each commit the first time it is reached.
fn breadth_first(
    graph: &CommitGraph,
    start: &str,
    mut stop: impl FnMut(&str) -> bool,
) -> Result<Option<String>, ObjectError> {
    let mut queue = VecDeque::from([start.to_string()]);
    let mut seen = HashSet::new();
    while let Some(hash) = queue.pop_front() {
        if !seen.insert(hash.clone()) {
            continue;
        }
        if stop(&hash) {
            return Ok(Some(hash));
        }
        queue.extend(graph.get(&hash)?.parents.iter().cloned());
    }
    Ok(None)
}

/// Split point of `head` and `other`.
///
/// [`BaseStrategy::FirstCommon`] returns the first commit reached
/// breadth-first from `head` that is an ancestor of `other`. In criss-cross
/// histories that may not be a lowest common ancestor;
/// [`BaseStrategy::LowestCommon`] skips common ancestors that are ancestors
/// of other common ancestors.
pub fn merge_base(
    graph: &CommitGraph,
    head: &str,
    other: &str,
    strategy: BaseStrategy,
) -> Result<String, RepoError> {
    let other_ancestors = ancestors(graph, other)?;

    let found = match strategy {
        BaseStrategy::FirstCommon => {
            breadth_first(graph, head, |hash| other_ancestors.contains(hash))?
        }
        BaseStrategy::LowestCommon => {
            let head_ancestors = ancestors(graph, head)?;
            let common: HashSet<&String> = head_ancestors.intersection(&other_ancestors).collect();

            let mut parents = Vec::new();
            for hash in &common {
                parents.extend(graph.get(hash)?.parents.iter().cloned());
            }
            // Common ancestors of other common ancestors.
            let shadowed = reachable(graph, parents)?;
            breadth_first(graph, head, |hash| {
                other_ancestors.contains(hash) && !shadowed.contains(hash)
            })?
        }
    };

    let base = found.ok_or_else(|| {
        RepoError::StateCorrupt(format!("no common ancestor of {} and {}", head, other))
    })?;
    debug!(head, other, base = %base, ?strategy, "found merge base");
    Ok(base)
}

// ---------------------------------------------------------------------------
// Merge
// ---------------------------------------------------------------------------

/// A planned change to one path, with all bytes already fetched.
#[derive(Debug)]
enum Change {
    Take { blob: String, bytes: Vec<u8> },
    Delete,
    Conflict { bytes: Vec<u8> },
}

/// Decide every path's fate without touching the repository.
fn plan(
    repo: &Repository,
    base: &str,
    head: &str,
    other: &str,
) -> Result<Vec<(String, Change)>, RepoError> {
    let commits = &repo.state.commits;
    let blobs = &repo.state.blobs;
    let split = &commits.get(base)?.tree;
    let head_tree = &commits.get(head)?.tree;
    let other_tree = &commits.get(other)?.tree;

    let paths = split
        .keys()
        .chain(other_tree.keys().filter(|p| !split.contains_key(*p)));

    let mut changes = Vec::new();
    for path in paths {
        let sh = split.get(path).map(String::as_str);
        let hh = head_tree.get(path).map(String::as_str);
        let oh = other_tree.get(path).map(String::as_str);

        let action = classify(sh, hh, oh);
        debug!(path = %path, %action, "classified path");

        let change = match (action, oh) {
            (FileAction::TakeOther, Some(blob)) => Change::Take {
                blob: blob.to_string(),
                bytes: blobs.get(blob)?.to_vec(),
            },
            (FileAction::Delete, _) => Change::Delete,
            (FileAction::Conflict, _) => {
                let head_bytes = hh.map(|h| blobs.get(h)).transpose()?;
                let other_bytes = oh.map(|o| blobs.get(o)).transpose()?;
                Change::Conflict {
                    bytes: conflict_content(head_bytes, other_bytes),
                }
            }
            _ => continue,
        };
        changes.push((path.clone(), change));
    }
    Ok(changes)
}

/// Merge branch `other` into the current branch.
///
/// Preconditions, checked in this order before anything is modified:
/// staged paths equal head's paths, `other` is not the current branch,
/// `other` exists, and the untracked-file guard passes.
pub(crate) fn merge(repo: &mut Repository, other: &str) -> Result<MergeOutcome, RepoError> {
    let head = repo.state.head.clone();
    let head_commit = repo.state.commits.get(&head)?;
    if !repo.state.staging.keys().eq(head_commit.tree.keys()) {
        return Err(RepoError::UncommittedChanges);
    }
    if other == repo.state.current_branch {
        return Err(RepoError::CannotMergeSelf);
    }
    let other_tip = repo
        .state
        .branches
        .get(other)
        .cloned()
        .ok_or_else(|| RepoError::BranchNotFound(other.to_string()))?;
    reconcile::check_untracked(&repo.worktree, &repo.state.staging)?;

    let base = merge_base(
        &repo.state.commits,
        &head,
        &other_tip,
        repo.config().merge.base_strategy,
    )?;

    if base == other_tip {
        info!(branch = other, "given branch is an ancestor of head");
        return Ok(MergeOutcome::AlreadyUpToDate);
    }
    if base == head {
        reconcile::materialize(repo, &other_tip)?;
        repo.move_head(&other_tip);
        info!(branch = other, head = %other_tip, "fast-forwarded");
        return Ok(MergeOutcome::FastForwarded { head: other_tip });
    }

    let changes = plan(repo, &base, &head, &other_tip)?;
    if changes.is_empty() {
        info!(branch = other, base = %base, "nothing to merge");
        return Ok(MergeOutcome::NothingToMerge);
    }

    let mut conflicts = Vec::new();
    for (path, change) in changes {
        match change {
            Change::Take { blob, bytes } => {
                repo.worktree.write(&path, &bytes)?;
                repo.state.staging.insert(path, blob);
            }
            Change::Delete => {
                repo.worktree.remove(&path)?;
                repo.state.staging.remove(&path);
            }
            Change::Conflict { bytes } => {
                let blob = repo.state.blobs.put(&bytes);
                repo.worktree.write(&path, &bytes)?;
                repo.state.staging.insert(path.clone(), blob);
                conflicts.push(path);
            }
        }
    }
    conflicts.sort();

    let message = format!("Merged {} into {}.", other, repo.state.current_branch);
    let commit = Commit::new(
        message,
        Utc::now(),
        vec![head, other_tip],
        repo.state.staging.clone(),
    );
    let hash = repo.record_commit(commit);

    if conflicts.is_empty() {
        info!(branch = other, commit = %hash, "merged");
    } else {
        warn!(branch = other, commit = %hash, count = conflicts.len(), "merged with conflicts");
    }
    Ok(MergeOutcome::Merged {
        commit: hash,
        conflicts,
    })
}
