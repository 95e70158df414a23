//! Error types for the gitlite core library.
//!
//! Each subsystem has its own error type derived with `thiserror`, and a
//! top-level [`CoreError`] enum unifies them all for callers that want a
//! single error type.
//!
//! The `Display` text of every [`RepoError`] is the single line the command
//! line tool prints on failure.

use thiserror::Error;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Unified error type for the entire core library.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Object(#[from] ObjectError),

    #[error(transparent)]
    Repo(#[from] RepoError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

// ---------------------------------------------------------------------------
// Object store errors
// ---------------------------------------------------------------------------

/// Errors from the blob store and commit graph.
///
/// These only occur when a live pointer references an object that was never
/// written, i.e. the persisted state is corrupt.
#[derive(Debug, Error)]
pub enum ObjectError {
    /// A referenced blob or commit is missing.
    #[error("{kind} object not found: {id}")]
    ObjectNotFound { kind: ObjectKind, id: String },
}

/// Kind of object named in an [`ObjectError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Blob,
    Commit,
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Blob => write!(f, "blob"),
            Self::Commit => write!(f, "commit"),
        }
    }
}

impl ObjectError {
    pub fn missing_blob(id: impl Into<String>) -> Self {
        Self::ObjectNotFound {
            kind: ObjectKind::Blob,
            id: id.into(),
        }
    }

    pub fn missing_commit(id: impl Into<String>) -> Self {
        Self::ObjectNotFound {
            kind: ObjectKind::Commit,
            id: id.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Repository errors
// ---------------------------------------------------------------------------

/// Errors from repository commands.
///
/// Precondition failures are raised before any state is touched, so a failed
/// command leaves both the working tree and the persisted state unchanged.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("A Gitlite version-control system already exists in the current directory.")]
    AlreadyInitialized,

    #[error("Not in an initialized Gitlite directory.")]
    NotInitialized,

    #[error("File does not exist.")]
    FileNotFound(String),

    #[error("No changes added to the commit.")]
    NothingToCommit,

    #[error("Please enter a commit message.")]
    EmptyMessage,

    #[error("No reason to remove the file.")]
    NoReasonToRemove(String),

    #[error("A branch with that name does not exist.")]
    BranchNotFound(String),

    #[error("A branch with that name already exists.")]
    BranchAlreadyExists(String),

    #[error("Cannot remove the current branch.")]
    CannotRemoveCurrentBranch,

    #[error("No need to checkout the current branch.")]
    AlreadyOnBranch,

    #[error("No commit with that id exists.")]
    CommitNotFound(String),

    #[error("Commit id '{prefix}' is ambiguous ({count} matches).")]
    AmbiguousCommit { prefix: String, count: usize },

    #[error("File does not exist in that commit.")]
    FileNotInCommit(String),

    #[error("There is an untracked file in the way; delete it or add it first.")]
    UntrackedFileWouldBeOverwritten(String),

    #[error("Cannot merge a branch with itself.")]
    CannotMergeSelf,

    #[error("You have uncommitted changes.")]
    UncommittedChanges,

    /// The persisted state record could not be decoded.
    #[error("repository state is corrupt: {0}")]
    StateCorrupt(String),

    #[error(transparent)]
    Object(#[from] ObjectError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Generic I/O wrapper.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<serde_json::Error> for RepoError {
    fn from(err: serde_json::Error) -> Self {
        Self::StateCorrupt(err.to_string())
    }
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// TOML parse error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// TOML serialization error.
    #[error("configuration serialize error: {0}")]
    SerializeError(String),

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue { field: String, detail: String },

    /// Generic I/O error reading the config file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_messages() {
        let err = RepoError::NothingToCommit;
        assert_eq!(err.to_string(), "No changes added to the commit.");

        let err = RepoError::UntrackedFileWouldBeOverwritten("a.txt".into());
        assert_eq!(
            err.to_string(),
            "There is an untracked file in the way; delete it or add it first."
        );

        let err = ObjectError::missing_blob("abc123");
        assert_eq!(err.to_string(), "blob object not found: abc123");

        let err = ConfigError::InvalidValue {
            field: "core.default_branch".into(),
            detail: "must not be empty".into(),
        };
        assert!(err.to_string().contains("core.default_branch"));
    }

    #[test]
    fn test_core_error_from_subsystem() {
        let core_err: CoreError = RepoError::CannotMergeSelf.into();
        assert!(matches!(core_err, CoreError::Repo(_)));

        let core_err: CoreError = ObjectError::missing_commit("deadbeef").into();
        assert!(matches!(core_err, CoreError::Object(_)));
    }

    #[test]
    fn test_object_error_wraps_into_repo_error() {
        let err: RepoError = ObjectError::missing_commit("feed").into();
        assert_eq!(err.to_string(), "commit object not found: feed");
    }
}
