//! Detach/re-attach round trips through the mmap-backed store.

use cairn::{error_kind, BTreeIndex, IndexError, MmapStore};
use tempfile::tempdir;

fn key(i: usize) -> Vec<u8> {
    format!("{:04}", i).into_bytes()
}

fn value(i: usize) -> Vec<u8> {
    format!("val{:05}", i).into_bytes()
}

#[test]
fn tree_survives_detach_and_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("index.cairn");

    {
        let store = MmapStore::create(&path, 512, 256).unwrap();
        let mut index = BTreeIndex::new(store, 4, 8, true);
        index.attach(0, true).unwrap();

        for i in 0..300 {
            index.insert(&key(i), &value(i)).unwrap();
        }

        let init_block = index.detach().unwrap();
        assert_eq!(init_block, 0);
    }

    let store = MmapStore::open(&path).unwrap();
    let mut index = BTreeIndex::new(store, 4, 8, true);
    index.attach(0, false).unwrap();

    index.sanity_check().unwrap();
    assert_eq!(index.key_count().unwrap(), 300);
    for i in 0..300 {
        assert_eq!(index.lookup(&key(i)).unwrap(), value(i));
    }

    // The mounted tree keeps working.
    index.insert(b"zzzz", b"lastone!").unwrap();
    assert_eq!(index.lookup(b"zzzz").unwrap(), b"lastone!");
}

#[test]
fn mount_is_read_only_on_the_tree() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("index.cairn");

    {
        let store = MmapStore::create(&path, 512, 64).unwrap();
        let mut index = BTreeIndex::new(store, 4, 8, true);
        index.attach(0, true).unwrap();
        index.insert(b"AAAA", b"xxxxxxxx").unwrap();
        index.detach().unwrap();
    }

    let before = std::fs::read(&path).unwrap();

    {
        let store = MmapStore::open(&path).unwrap();
        let mut index = BTreeIndex::new(store, 4, 8, true);
        index.attach(0, false).unwrap();
        assert_eq!(index.lookup(b"AAAA").unwrap(), b"xxxxxxxx");
        index.detach().unwrap();
    }

    let after = std::fs::read(&path).unwrap();
    assert_eq!(before, after);
}

#[test]
fn formatting_twice_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("index.cairn");

    {
        let store = MmapStore::create(&path, 512, 64).unwrap();
        let mut index = BTreeIndex::new(store, 4, 8, true);
        index.attach(0, true).unwrap();
        index.detach().unwrap();
    }

    let store = MmapStore::open(&path).unwrap();
    let mut index = BTreeIndex::new(store, 4, 8, true);
    let result = index.attach(0, true);

    assert!(result.is_err());
    assert!(result
        .unwrap_err()
        .to_string()
        .contains("already contains a formatted index"));
}

#[test]
fn mount_with_wrong_widths_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("index.cairn");

    {
        let store = MmapStore::create(&path, 512, 64).unwrap();
        let mut index = BTreeIndex::new(store, 4, 8, true);
        index.attach(0, true).unwrap();
        index.detach().unwrap();
    }

    let store = MmapStore::open(&path).unwrap();
    let mut index = BTreeIndex::new(store, 16, 8, true);

    assert!(index.attach(0, false).is_err());
}

#[test]
fn unformatted_store_does_not_mount() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("blank.cairn");

    let store = MmapStore::create(&path, 512, 64).unwrap();
    let mut index = BTreeIndex::new(store, 4, 8, true);
    let result = index.attach(0, false);

    assert_eq!(
        error_kind(&result.unwrap_err()),
        Some(IndexError::BadKind)
    );
}

#[test]
fn nospace_state_survives_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("tiny.cairn");
    let mut stored = Vec::new();

    {
        let store = MmapStore::create(&path, 512, 8).unwrap();
        let mut index = BTreeIndex::new(store, 4, 8, true);
        index.attach(0, true).unwrap();

        for i in 0..500 {
            match index.insert(&key(i), &value(i)) {
                Ok(()) => stored.push(i),
                Err(e) => {
                    assert_eq!(error_kind(&e), Some(IndexError::NoSpace));
                    break;
                }
            }
        }
        index.detach().unwrap();
    }

    let store = MmapStore::open(&path).unwrap();
    let mut index = BTreeIndex::new(store, 4, 8, true);
    index.attach(0, false).unwrap();

    index.sanity_check().unwrap();
    for &i in &stored {
        assert_eq!(index.lookup(&key(i)).unwrap(), value(i));
    }
}
