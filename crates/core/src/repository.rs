//! The repository aggregate and its persistence.
//!
//! All state lives in one record (`.gitlite/state.json`) that is loaded in
//! full when a [`Repository`] is opened and rewritten in full by
//! [`Repository::save`]. Commands mutate the in-memory copy and the caller
//! saves once the command has succeeded, so a command that fails a
//! precondition never reaches disk.
//!
//! There is no locking between processes: two concurrent commands against
//! the same repository race and the last `save` wins.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::commit::{Commit, CommitGraph, Tree};
use crate::config::RepoConfig;
use crate::errors::RepoError;
use crate::merge::{self, MergeOutcome};
use crate::objects::BlobStore;
use crate::reconcile;
use crate::status::{self, Status};
use crate::worktree::{normalize_path, WorkTree};

/// Name of the metadata directory at the repository root.
pub const META_DIR: &str = ".gitlite";
const STATE_FILE: &str = "state.json";
const CONFIG_FILE: &str = "config.toml";

/// Location of the configuration file of the repository rooted at `root`.
pub fn config_path(root: &Path) -> PathBuf {
    root.join(META_DIR).join(CONFIG_FILE)
}

// ---------------------------------------------------------------------------
// Persisted state
// ---------------------------------------------------------------------------

/// The persisted repository tuple.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub(crate) struct RepoState {
    pub(crate) commits: CommitGraph,
    pub(crate) branches: BTreeMap<String, String>,
    pub(crate) current_branch: String,
    pub(crate) head: String,
    /// What the next commit will contain.
    pub(crate) staging: Tree,
    pub(crate) blobs: BlobStore,
}

impl RepoState {
    fn initial(default_branch: &str) -> Self {
        let mut commits = CommitGraph::new();
        let root = commits.insert(Commit::initial());
        let mut branches = BTreeMap::new();
        branches.insert(default_branch.to_string(), root.clone());
        Self {
            commits,
            branches,
            current_branch: default_branch.to_string(),
            head: root,
            staging: Tree::new(),
            blobs: BlobStore::new(),
        }
    }

    /// Check that every live pointer references something that exists.
    fn validate(&self) -> Result<(), RepoError> {
        if !self.commits.contains(&self.head) {
            return Err(RepoError::StateCorrupt(format!(
                "head {} is not a known commit",
                self.head
            )));
        }
        if !self.branches.contains_key(&self.current_branch) {
            return Err(RepoError::StateCorrupt(format!(
                "current branch '{}' does not exist",
                self.current_branch
            )));
        }
        for (name, hash) in &self.branches {
            if !self.commits.contains(hash) {
                return Err(RepoError::StateCorrupt(format!(
                    "branch '{}' points at unknown commit {}",
                    name, hash
                )));
            }
        }
        for (path, blob) in &self.staging {
            if !self.blobs.contains(blob) {
                return Err(RepoError::StateCorrupt(format!(
                    "staged '{}' references missing blob {}",
                    path, blob
                )));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Repository
// ---------------------------------------------------------------------------

/// A loaded repository: persisted state plus the working tree it governs.
#[derive(Debug)]
pub struct Repository {
    pub(crate) state: RepoState,
    pub(crate) worktree: WorkTree,
    config: RepoConfig,
    meta_dir: PathBuf,
}

impl Repository {
    /// Create a new repository at `root` with the default configuration.
    pub fn init<P: AsRef<Path>>(root: P) -> Result<Self, RepoError> {
        Self::init_with_config(root, RepoConfig::default())
    }

    /// Create a new repository at `root`.
    ///
    /// Writes the metadata directory, the configuration and a state record
    /// holding the root commit on `config.core.default_branch`.
    pub fn init_with_config<P: AsRef<Path>>(root: P, config: RepoConfig) -> Result<Self, RepoError> {
        let root = root.as_ref();
        let meta_dir = root.join(META_DIR);
        if meta_dir.exists() {
            return Err(RepoError::AlreadyInitialized);
        }
        config.validate()?;

        std::fs::create_dir_all(&meta_dir)?;
        config.save(meta_dir.join(CONFIG_FILE))?;

        let repo = Self {
            state: RepoState::initial(&config.core.default_branch),
            worktree: WorkTree::new(root),
            config,
            meta_dir,
        };
        repo.save()?;

        info!(
            root = %root.display(),
            branch = %repo.state.current_branch,
            head = %repo.state.head,
            "initialized repository"
        );
        Ok(repo)
    }

    /// Open the repository whose root is `root`.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self, RepoError> {
        let root = root.as_ref();
        let meta_dir = root.join(META_DIR);
        if !meta_dir.is_dir() {
            return Err(RepoError::NotInitialized);
        }

        let config = RepoConfig::load_and_validate(meta_dir.join(CONFIG_FILE))?;
        let bytes = std::fs::read(meta_dir.join(STATE_FILE))?;
        let state: RepoState = serde_json::from_slice(&bytes)?;
        state.validate()?;

        debug!(
            root = %root.display(),
            commits = state.commits.len(),
            blobs = state.blobs.len(),
            "opened repository"
        );
        Ok(Self {
            state,
            worktree: WorkTree::new(root),
            config,
            meta_dir,
        })
    }

    /// Rewrite the full state record.
    ///
    /// The record is written to a temporary file in the metadata directory
    /// and renamed over the old one, so readers never see a partial record.
    pub fn save(&self) -> Result<(), RepoError> {
        let mut tmp = tempfile::NamedTempFile::new_in(&self.meta_dir)?;
        serde_json::to_writer(&mut tmp, &self.state).map_err(io::Error::from)?;
        tmp.as_file().sync_all()?;
        tmp.persist(self.meta_dir.join(STATE_FILE))
            .map_err(|e| e.error)?;
        debug!(head = %self.state.head, "saved repository state");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn root(&self) -> &Path {
        self.worktree.root()
    }

    pub fn config(&self) -> &RepoConfig {
        &self.config
    }

    pub fn head(&self) -> &str {
        &self.state.head
    }

    pub fn head_commit(&self) -> Result<&Commit, RepoError> {
        Ok(self.state.commits.get(&self.state.head)?)
    }

    pub fn current_branch(&self) -> &str {
        &self.state.current_branch
    }

    /// Branch name to commit id, sorted by name.
    pub fn branches(&self) -> &BTreeMap<String, String> {
        &self.state.branches
    }

    pub fn staging(&self) -> &Tree {
        &self.state.staging
    }

    pub fn commits(&self) -> &CommitGraph {
        &self.state.commits
    }

    pub fn blobs(&self) -> &BlobStore {
        &self.state.blobs
    }

    /// Resolve a full or abbreviated commit id, honouring
    /// `merge.strict_prefix`.
    pub fn resolve_commit(&self, prefix: &str) -> Result<&Commit, RepoError> {
        let found = self.state.commits.resolve_prefix(prefix)?;
        if found.is_ambiguous() && self.config.merge.strict_prefix {
            return Err(RepoError::AmbiguousCommit {
                prefix: prefix.to_string(),
                count: found.candidates,
            });
        }
        Ok(found.commit)
    }

    // -----------------------------------------------------------------------
    // Staging
    // -----------------------------------------------------------------------

    /// Snapshot the file at `path` into the blob store and stage it.
    pub fn add(&mut self, path: &str) -> Result<String, RepoError> {
        let path = normalize_path(path).ok_or_else(|| RepoError::FileNotFound(path.to_string()))?;
        if !self.worktree.is_file(&path) {
            return Err(RepoError::FileNotFound(path));
        }

        let bytes = self.worktree.read(&path)?;
        let blob = self.state.blobs.put(&bytes);
        debug!(path = %path, blob = %blob, "staged file");
        self.state.staging.insert(path, blob.clone());
        Ok(blob)
    }

    /// Unstage `path`; if the head commit tracks it, delete it from disk too.
    pub fn rm(&mut self, path: &str) -> Result<(), RepoError> {
        let path =
            normalize_path(path).ok_or_else(|| RepoError::NoReasonToRemove(path.to_string()))?;
        let tracked = self.head_commit()?.tree.contains_key(&path);

        if tracked {
            self.state.staging.remove(&path);
            self.worktree.remove(&path)?;
            info!(path = %path, "removed tracked file");
        } else if self.state.staging.remove(&path).is_some() {
            debug!(path = %path, "unstaged file");
        } else {
            return Err(RepoError::NoReasonToRemove(path));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Commits
    // -----------------------------------------------------------------------

    /// Record the staging area as a new commit on the current branch.
    pub fn commit(&mut self, message: &str) -> Result<String, RepoError> {
        if !status::has_staged_changes(&self.state.staging, &self.head_commit()?.tree) {
            return Err(RepoError::NothingToCommit);
        }
        if message.is_empty() {
            return Err(RepoError::EmptyMessage);
        }

        let commit = Commit::new(
            message,
            Utc::now(),
            vec![self.state.head.clone()],
            self.state.staging.clone(),
        );
        let hash = self.record_commit(commit);
        info!(hash = %hash, branch = %self.state.current_branch, "created commit");
        Ok(hash)
    }

    /// Insert `commit` and advance head and the current branch to it.
    pub(crate) fn record_commit(&mut self, commit: Commit) -> String {
        let hash = self.state.commits.insert(commit);
        self.move_head(&hash);
        hash
    }

    /// Point head and the current branch at `hash`.
    pub(crate) fn move_head(&mut self, hash: &str) {
        self.state.head = hash.to_string();
        self.state
            .branches
            .insert(self.state.current_branch.clone(), hash.to_string());
    }

    /// First-parent history of head, newest first.
    pub fn log(&self) -> Result<Vec<&Commit>, RepoError> {
        Ok(self.state.commits.first_parent_history(&self.state.head)?)
    }

    /// Every commit ever made, in id order.
    pub fn global_log(&self) -> Vec<&Commit> {
        self.state.commits.iter().collect()
    }

    /// Commits whose message is exactly `message`, in id order.
    pub fn find(&self, message: &str) -> Vec<&Commit> {
        self.state.commits.find_by_message(message)
    }

    // -----------------------------------------------------------------------
    // Branches
    // -----------------------------------------------------------------------

    /// Create a branch pointing at head.
    pub fn branch(&mut self, name: &str) -> Result<(), RepoError> {
        if self.state.branches.contains_key(name) {
            return Err(RepoError::BranchAlreadyExists(name.to_string()));
        }
        self.state
            .branches
            .insert(name.to_string(), self.state.head.clone());
        info!(branch = name, head = %self.state.head, "created branch");
        Ok(())
    }

    /// Delete a branch pointer. Its commits stay in the graph.
    pub fn remove_branch(&mut self, name: &str) -> Result<(), RepoError> {
        if !self.state.branches.contains_key(name) {
            return Err(RepoError::BranchNotFound(name.to_string()));
        }
        if name == self.state.current_branch {
            return Err(RepoError::CannotRemoveCurrentBranch);
        }
        self.state.branches.remove(name);
        info!(branch = name, "removed branch");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Checkout / reset
    // -----------------------------------------------------------------------

    /// Switch to `name`, materializing its tip in the working tree.
    pub fn checkout_branch(&mut self, name: &str) -> Result<(), RepoError> {
        if name == self.state.current_branch {
            return Err(RepoError::AlreadyOnBranch);
        }
        let target = self
            .state
            .branches
            .get(name)
            .cloned()
            .ok_or_else(|| RepoError::BranchNotFound(name.to_string()))?;

        reconcile::materialize(self, &target)?;
        self.state.current_branch = name.to_string();
        info!(branch = name, head = %target, "checked out branch");
        Ok(())
    }

    /// Overwrite `path` in the working tree with its version in head.
    pub fn checkout_file(&self, path: &str) -> Result<(), RepoError> {
        reconcile::restore_file(self, &self.state.head, path)
    }

    /// Overwrite `path` in the working tree with its version in `commit`.
    pub fn checkout_file_from(&self, commit: &str, path: &str) -> Result<(), RepoError> {
        let hash = self.resolve_commit(commit)?.hash.clone();
        reconcile::restore_file(self, &hash, path)
    }

    /// Materialize `commit` and move the current branch to it.
    pub fn reset(&mut self, commit: &str) -> Result<(), RepoError> {
        let target = self.resolve_commit(commit)?.hash.clone();
        reconcile::materialize(self, &target)?;
        self.move_head(&target);
        info!(branch = %self.state.current_branch, head = %target, "reset");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Merge / status
    // -----------------------------------------------------------------------

    /// Merge branch `other` into the current branch.
    pub fn merge(&mut self, other: &str) -> Result<MergeOutcome, RepoError> {
        merge::merge(self, other)
    }

    /// Compare staging, head and the working tree.
    pub fn status(&self) -> Result<Status, RepoError> {
        status::compute(self)
    }
}
