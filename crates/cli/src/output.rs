//! Text rendering of log entries, status reports and merge outcomes.

use std::fmt::{self, Write};

use chrono::TimeZone;

use gitlite_core::{Commit, MergeOutcome, Status};

use crate::style;

const DATE_FORMAT: &str = "%a %b %d %H:%M:%S %Y %z";

/// One log entry followed by a blank line.
pub fn format_commit<Tz>(commit: &Commit, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    let mut out = String::new();
    let _ = writeln!(out, "===");
    let _ = writeln!(out, "commit {}", style::dim(&commit.hash));
    if commit.is_merge() {
        let parents: Vec<&str> = commit
            .parents
            .iter()
            .take(2)
            .map(|p| Commit::short_hash(p))
            .collect();
        let _ = writeln!(out, "Merge: {}", parents.join(" "));
    }
    let date = commit.timestamp.with_timezone(tz).format(DATE_FORMAT);
    let _ = writeln!(out, "Date: {}", date);
    let _ = writeln!(out, "{}", commit.message);
    out.push('\n');
    out
}

/// The five status sections, each followed by a blank line.
pub fn format_status(status: &Status) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "{}", style::header("=== Branches ==="));
    for (name, is_current) in &status.branches {
        if *is_current {
            let _ = writeln!(out, "*{}", style::current(name));
        } else {
            let _ = writeln!(out, "{}", name);
        }
    }

    section(&mut out, "=== Staged Files ===", &status.staged);
    section(&mut out, "=== Removed Files ===", &status.removed);

    let modifications: Vec<String> = status
        .unstaged
        .iter()
        .map(|(path, kind)| format!("{} ({})", path, kind))
        .collect();
    section(
        &mut out,
        "=== Modifications Not Staged For Commit ===",
        &modifications,
    );

    section(&mut out, "=== Untracked Files ===", &status.untracked);
    out.push('\n');
    out
}

fn section(out: &mut String, title: &str, lines: &[String]) {
    let _ = writeln!(out);
    let _ = writeln!(out, "{}", style::header(title));
    for line in lines {
        let _ = writeln!(out, "{}", line);
    }
}

/// The line printed after a merge, if any.
pub fn merge_message(outcome: &MergeOutcome) -> Option<String> {
    match outcome {
        MergeOutcome::AlreadyUpToDate => {
            Some("Given branch is an ancestor of the current branch.".to_string())
        }
        MergeOutcome::FastForwarded { .. } => Some("Current branch fast-forwarded.".to_string()),
        MergeOutcome::Merged { .. } if outcome.has_conflicts() => {
            Some(style::warn("Encountered a merge conflict."))
        }
        MergeOutcome::Merged { .. } | MergeOutcome::NothingToMerge => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use gitlite_core::{Modification, Tree};

    #[test]
    fn test_format_initial_commit() {
        let text = format_commit(&Commit::initial(), &Utc);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "===");
        assert!(lines[1].starts_with("commit "));
        assert_eq!(lines[2], "Date: Thu Jan 01 00:00:00 1970 +0000");
        assert_eq!(lines[3], "initial commit");
        assert!(text.ends_with("\n\n"));
    }

    #[test]
    fn test_format_merge_commit_lists_short_parents() {
        let a = "a".repeat(64);
        let b = "b".repeat(64);
        let commit = Commit::new("Merged x into y.", Utc::now(), vec![a, b], Tree::new());
        let text = format_commit(&commit, &Utc);
        assert!(text.contains("\nMerge: aaaaaaa bbbbbbb\n"));
    }

    #[test]
    fn test_format_status_sections() {
        let status = Status {
            branches: vec![("dev".into(), false), ("master".into(), true)],
            staged: vec!["a.txt".into()],
            removed: vec!["b.txt".into()],
            unstaged: vec![("c.txt".into(), Modification::Deleted)],
            untracked: vec!["d.txt".into()],
        };
        let expected = "=== Branches ===\n\
                        dev\n\
                        *master\n\
                        \n\
                        === Staged Files ===\n\
                        a.txt\n\
                        \n\
                        === Removed Files ===\n\
                        b.txt\n\
                        \n\
                        === Modifications Not Staged For Commit ===\n\
                        c.txt (deleted)\n\
                        \n\
                        === Untracked Files ===\n\
                        d.txt\n\
                        \n";
        console::set_colors_enabled(false);
        assert_eq!(format_status(&status), expected);
    }

    #[test]
    fn test_merge_messages() {
        console::set_colors_enabled(false);
        assert_eq!(
            merge_message(&MergeOutcome::AlreadyUpToDate).as_deref(),
            Some("Given branch is an ancestor of the current branch.")
        );
        assert_eq!(
            merge_message(&MergeOutcome::FastForwarded { head: "h".into() }).as_deref(),
            Some("Current branch fast-forwarded.")
        );
        let conflicted = MergeOutcome::Merged {
            commit: "c".into(),
            conflicts: vec!["f.txt".into()],
        };
        assert_eq!(
            merge_message(&conflicted).as_deref(),
            Some("Encountered a merge conflict.")
        );
        assert_eq!(merge_message(&MergeOutcome::NothingToMerge), None);
    }
}
