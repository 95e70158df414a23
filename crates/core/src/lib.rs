//! Gitlite core library.
//!
//! A small content-addressed version-control engine: blob storage, an
//! immutable commit graph, branches, a staging area, working-tree
//! reconciliation and whole-file three-way merge. All state is persisted as
//! one record under the repository's `.gitlite` directory.

pub mod commit;
pub mod config;
pub mod errors;
pub mod merge;
pub mod objects;
pub mod reconcile;
pub mod repository;
pub mod status;
pub mod worktree;

// Re-exports for convenience.
pub use commit::{Commit, CommitGraph, Tree};
pub use config::{BaseStrategy, RepoConfig};
pub use errors::{ConfigError, CoreError, ObjectError, RepoError};
pub use merge::MergeOutcome;
pub use repository::{config_path, Repository, META_DIR};
pub use status::{Modification, Status};
