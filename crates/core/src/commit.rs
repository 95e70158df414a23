//! Immutable commits and the commit graph.
//!
//! A commit's id is derived from its tree and its ordered parent list only.
//! The tree is a `BTreeMap`, so the encoding fed to the digest is always in
//! path order no matter how the snapshot was assembled.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::{ObjectError, RepoError};
use crate::objects::{digest, HASH_LEN};

/// Snapshot of the working tree: repository-relative path to blob id.
pub type Tree = BTreeMap<String, String>;

/// Message of the root commit created by `init`.
pub const INITIAL_MESSAGE: &str = "initial commit";

// ---------------------------------------------------------------------------
// Commit
// ---------------------------------------------------------------------------

/// A node in the commit graph.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Commit {
    pub hash: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    /// Ordered parents; the first one is the mainline side.
    pub parents: Vec<String>,
    pub tree: Tree,
}

impl Commit {
    /// Build a commit, computing its id from `tree` and `parents`.
    pub fn new(
        message: impl Into<String>,
        timestamp: DateTime<Utc>,
        parents: Vec<String>,
        tree: Tree,
    ) -> Self {
        let hash = commit_hash(&tree, &parents);
        Self {
            hash,
            message: message.into(),
            timestamp,
            parents,
            tree,
        }
    }

    /// The root commit: no parents, empty tree, dated at the epoch.
    pub fn initial() -> Self {
        Self::new(
            INITIAL_MESSAGE,
            DateTime::<Utc>::UNIX_EPOCH,
            Vec::new(),
            Tree::new(),
        )
    }

    pub fn is_merge(&self) -> bool {
        self.parents.len() > 1
    }

    pub fn first_parent(&self) -> Option<&str> {
        self.parents.first().map(String::as_str)
    }

    /// Abbreviated id used in merge log lines.
    pub fn short_hash(hash: &str) -> &str {
        &hash[..hash.len().min(7)]
    }
}

/// Digest over the canonical encoding of a tree and its parent list.
///
/// Each entry contributes `path NUL blob LF`, followed by `parent <id> LF`
/// per parent in order.
pub fn commit_hash(tree: &Tree, parents: &[String]) -> String {
    let mut buf = Vec::new();
    for (path, blob) in tree {
        buf.extend_from_slice(path.as_bytes());
        buf.push(0);
        buf.extend_from_slice(blob.as_bytes());
        buf.push(b'\n');
    }
    for parent in parents {
        buf.extend_from_slice(b"parent ");
        buf.extend_from_slice(parent.as_bytes());
        buf.push(b'\n');
    }
    digest(&buf)
}

// ---------------------------------------------------------------------------
// CommitGraph
// ---------------------------------------------------------------------------

/// Result of resolving a possibly-abbreviated commit id.
#[derive(Debug, Clone, Copy)]
pub struct PrefixMatch<'a> {
    pub commit: &'a Commit,
    /// Number of commits whose id starts with the prefix.
    pub candidates: usize,
}

impl PrefixMatch<'_> {
    pub fn is_ambiguous(&self) -> bool {
        self.candidates > 1
    }
}

/// Every commit ever created, keyed by id. Nothing is ever removed.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommitGraph {
    commits: BTreeMap<String, Commit>,
}

impl CommitGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a commit and return its id. A stored commit with the same id
    /// (same tree and parents) is replaced, so the newest message and
    /// timestamp win.
    pub fn insert(&mut self, commit: Commit) -> String {
        let hash = commit.hash.clone();
        if let Some(previous) = self.commits.insert(hash.clone(), commit) {
            debug!(hash = %hash, previous = %previous.message, "replaced commit with same id");
        }
        hash
    }

    pub fn get(&self, hash: &str) -> Result<&Commit, ObjectError> {
        self.commits
            .get(hash)
            .ok_or_else(|| ObjectError::missing_commit(hash))
    }

    pub fn contains(&self, hash: &str) -> bool {
        self.commits.contains_key(hash)
    }

    pub fn len(&self) -> usize {
        self.commits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commits.is_empty()
    }

    /// All commits in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Commit> {
        self.commits.values()
    }

    /// Resolve a full or abbreviated commit id.
    ///
    /// A full-length id must match exactly. A shorter one matches by prefix;
    /// when several commits share the prefix, the lowest id wins and the
    /// match reports how many candidates there were so callers that need
    /// determinism can reject it.
    pub fn resolve_prefix(&self, prefix: &str) -> Result<PrefixMatch<'_>, RepoError> {
        if prefix.is_empty() {
            return Err(RepoError::CommitNotFound(String::new()));
        }

        if prefix.len() >= HASH_LEN {
            return self
                .commits
                .get(prefix)
                .map(|commit| PrefixMatch {
                    commit,
                    candidates: 1,
                })
                .ok_or_else(|| RepoError::CommitNotFound(prefix.to_string()));
        }

        let mut matches = self
            .commits
            .range(prefix.to_string()..)
            .take_while(|(hash, _)| hash.starts_with(prefix))
            .map(|(_, commit)| commit);

        let commit = matches
            .next()
            .ok_or_else(|| RepoError::CommitNotFound(prefix.to_string()))?;
        let candidates = 1 + matches.count();
        if candidates > 1 {
            warn!(prefix, candidates, chosen = %commit.hash, "ambiguous commit prefix");
        }

        Ok(PrefixMatch { commit, candidates })
    }

    /// Commits whose message equals `message` exactly, in id order.
    pub fn find_by_message(&self, message: &str) -> Vec<&Commit> {
        self.commits
            .values()
            .filter(|c| c.message == message)
            .collect()
    }

    /// First-parent history from `start` back to the root, newest first.
    pub fn first_parent_history(&self, start: &str) -> Result<Vec<&Commit>, ObjectError> {
        let mut history = Vec::new();
        let mut next = Some(start);
        while let Some(hash) = next {
            let commit = self.get(hash)?;
            history.push(commit);
            next = commit.first_parent();
        }
        Ok(history)
    }
}
