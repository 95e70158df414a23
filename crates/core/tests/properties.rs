//! Property-based tests for content addressing, commit ids and merge
//! classification.

use std::collections::BTreeMap;

use proptest::prelude::*;

use gitlite_core::commit::commit_hash;
use gitlite_core::merge::{classify, conflict_content, FileAction};
use gitlite_core::objects::{digest, BlobStore, HASH_LEN};
use gitlite_core::{Repository, Tree};

/// Strategy for top-level file names.
fn file_name() -> impl Strategy<Value = String> {
    "[a-z]{1,8}\\.txt"
}

/// Strategy for an optional blob id at one side of a merge.
fn side() -> impl Strategy<Value = Option<String>> {
    prop::option::of(prop_oneof![Just("1"), Just("2"), Just("3")].prop_map(String::from))
}

proptest! {
    /// Stored bytes come back unchanged under their digest.
    #[test]
    fn blob_put_get_returns_same_bytes(bytes in prop::collection::vec(any::<u8>(), 0..512)) {
        let mut store = BlobStore::new();
        let id = store.put(&bytes);
        prop_assert_eq!(id.len(), HASH_LEN);
        prop_assert_eq!(&id, &digest(&bytes));
        prop_assert_eq!(store.get(&id).unwrap(), bytes.as_slice());
    }

    /// Different contents get different ids.
    #[test]
    fn distinct_bytes_distinct_digests(
        a in prop::collection::vec(any::<u8>(), 0..64),
        b in prop::collection::vec(any::<u8>(), 0..64),
    ) {
        prop_assume!(a != b);
        prop_assert_ne!(digest(&a), digest(&b));
    }

    /// A tree built in any insertion order hashes the same.
    #[test]
    fn commit_hash_ignores_insertion_order(
        entries in prop::collection::btree_map(file_name(), "[0-9a-f]{8}", 0..16),
        parents in prop::collection::vec("[0-9a-f]{8}", 0..3),
    ) {
        let forward: Tree = entries.iter().map(|(p, b)| (p.clone(), b.clone())).collect();
        let mut backward = BTreeMap::new();
        for (p, b) in entries.iter().rev() {
            backward.insert(p.clone(), b.clone());
        }
        prop_assert_eq!(commit_hash(&forward, &parents), commit_hash(&backward, &parents));
    }

    /// Identical changes on both sides never conflict.
    #[test]
    fn same_change_never_conflicts(split in side(), both in side()) {
        let action = classify(split.as_deref(), both.as_deref(), both.as_deref());
        prop_assert_eq!(action, FileAction::Keep);
    }

    /// A side that did not change never causes a conflict.
    #[test]
    fn unchanged_head_never_conflicts(split in side(), other in side()) {
        let action = classify(split.as_deref(), split.as_deref(), other.as_deref());
        prop_assert_ne!(action, FileAction::Conflict);
    }

    /// Head's bytes precede the separator, the other side's follow it.
    #[test]
    fn conflict_content_orders_sides(head in "[a-z\n]{0,32}", other in "[a-z\n]{0,32}") {
        let content = conflict_content(Some(head.as_bytes()), Some(other.as_bytes()));
        let expected = format!("<<<<<<< HEAD\n{}=======\n{}>>>>>>>\n", head, other);
        prop_assert_eq!(String::from_utf8(content).unwrap(), expected);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// Checking out a commit restores every file it tracks byte for byte and
    /// removes every file it does not.
    #[test]
    fn checkout_restores_committed_tree(
        first in prop::collection::btree_map(file_name(), prop::collection::vec(any::<u8>(), 0..64), 1..6),
        second in prop::collection::btree_map(file_name(), prop::collection::vec(any::<u8>(), 0..64), 1..6),
    ) {
        let dir = tempfile::tempdir().unwrap();
        let mut repo = Repository::init(dir.path()).unwrap();

        for (name, bytes) in &first {
            std::fs::write(dir.path().join(name), bytes).unwrap();
            repo.add(name).unwrap();
        }
        repo.commit("first").unwrap();
        repo.branch("snapshot").unwrap();

        for name in first.keys() {
            repo.rm(name).unwrap();
        }
        for (name, bytes) in &second {
            std::fs::write(dir.path().join(name), bytes).unwrap();
            repo.add(name).unwrap();
        }
        // Identical trees leave nothing to commit.
        if first != second {
            repo.commit("second").unwrap();
        }

        repo.checkout_branch("snapshot").unwrap();
        for (name, bytes) in &first {
            prop_assert_eq!(&std::fs::read(dir.path().join(name)).unwrap(), bytes);
        }
        for name in second.keys().filter(|n| !first.contains_key(*n)) {
            prop_assert!(!dir.path().join(name).exists());
        }
    }
}
