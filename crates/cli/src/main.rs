//! Gitlite command-line tool.
//!
//! Every subcommand opens the repository in the target directory, performs
//! one operation and, if the operation changed anything, saves the state
//! record before exiting.

mod output;
mod style;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use gitlite_core::{config_path, RepoConfig, Repository};

/// Environment variable that overrides the configured log filter.
const LOG_ENV: &str = "GITLITE_LOG";

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// A small content-addressed version-control system.
#[derive(Parser, Debug)]
#[command(name = "gitlite", version, about)]
struct Cli {
    /// Repository root to operate on.
    #[arg(short = 'C', long = "repo", global = true, default_value = ".")]
    repo: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a new repository in the target directory.
    Init,

    /// Stage the current contents of a file.
    Add {
        file: String,
    },

    /// Record the staged snapshot as a new commit.
    Commit {
        #[arg(default_value = "")]
        message: String,
    },

    /// Unstage a file, deleting it if the head commit tracks it.
    Rm {
        file: String,
    },

    /// Show first-parent history from head.
    Log,

    /// Show every commit ever made.
    GlobalLog,

    /// Print the ids of commits with the given message.
    Find {
        message: String,
    },

    /// Show branches, staged, removed, modified and untracked files.
    Status,

    /// Switch branches or restore a file.
    ///
    /// `checkout <branch>`, `checkout -- <file>` or
    /// `checkout <commit> -- <file>`.
    Checkout {
        /// Branch name, or commit id when a file follows `--`.
        target: Option<String>,

        /// File to restore.
        #[arg(last = true)]
        file: Option<String>,
    },

    /// Create a branch at head.
    Branch {
        name: String,
    },

    /// Delete a branch pointer.
    RmBranch {
        name: String,
    },

    /// Move the current branch to a commit and check it out.
    Reset {
        commit: String,
    },

    /// Merge a branch into the current branch.
    Merge {
        branch: String,
    },
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    init_logging(&cli.repo);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// `GITLITE_LOG` wins, then the repository's `core.log_level`, then `warn`.
fn init_logging(root: &Path) {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| {
        let level = RepoConfig::load(config_path(root))
            .map(|config| config.core.log_level)
            .unwrap_or_else(|_| "warn".to_string());
        EnvFilter::new(level)
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

fn run(cli: Cli) -> Result<()> {
    if let Commands::Init = cli.command {
        Repository::init(&cli.repo)?;
        return Ok(());
    }

    let mut repo = Repository::open(&cli.repo)?;
    let changed = dispatch(&mut repo, cli.command)?;
    if changed {
        repo.save().context("failed to save repository state")?;
    }
    Ok(())
}

/// Run one command against an open repository. Returns whether the state
/// record needs saving.
fn dispatch(repo: &mut Repository, command: Commands) -> Result<bool> {
    match command {
        Commands::Init => unreachable!("handled before the repository is opened"),
        Commands::Add { file } => {
            repo.add(&file)?;
            Ok(true)
        }
        Commands::Commit { message } => {
            repo.commit(&message)?;
            Ok(true)
        }
        Commands::Rm { file } => {
            repo.rm(&file)?;
            Ok(true)
        }
        Commands::Log => {
            for commit in repo.log()? {
                print!("{}", output::format_commit(commit, &Local));
            }
            Ok(false)
        }
        Commands::GlobalLog => {
            for commit in repo.global_log() {
                print!("{}", output::format_commit(commit, &Local));
            }
            Ok(false)
        }
        Commands::Find { message } => {
            let found = repo.find(&message);
            if found.is_empty() {
                bail!("Found no commit with that message.");
            }
            for commit in found {
                println!("{}", commit.hash);
            }
            Ok(false)
        }
        Commands::Status => {
            print!("{}", output::format_status(&repo.status()?));
            Ok(false)
        }
        Commands::Checkout { target, file } => match (target, file) {
            (Some(branch), None) => {
                repo.checkout_branch(&branch)?;
                Ok(true)
            }
            (None, Some(file)) => {
                repo.checkout_file(&file)?;
                Ok(false)
            }
            (Some(commit), Some(file)) => {
                repo.checkout_file_from(&commit, &file)?;
                Ok(false)
            }
            (None, None) => bail!("Incorrect operands."),
        },
        Commands::Branch { name } => {
            repo.branch(&name)?;
            Ok(true)
        }
        Commands::RmBranch { name } => {
            repo.remove_branch(&name)?;
            Ok(true)
        }
        Commands::Reset { commit } => {
            repo.reset(&commit)?;
            Ok(true)
        }
        Commands::Merge { branch } => {
            let outcome = repo.merge(&branch)?;
            if let Some(message) = output::merge_message(&outcome) {
                println!("{}", message);
            }
            Ok(true)
        }
    }
}
