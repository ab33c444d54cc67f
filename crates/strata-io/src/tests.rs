//! Integration tests for the blob store backends.

use bytes::Bytes;

use crate::{BlobStore, FsBlobStore, IoError, MemoryBlobStore};

fn exercise_backend(store: &dyn BlobStore) {
    store
        .put("bronze/a/2026/01/01/00/one.parquet", Bytes::from_static(b"one"))
        .unwrap();
    store
        .put("bronze/a/2026/01/01/01/two.parquet", Bytes::from_static(b"two!"))
        .unwrap();
    store
        .put("bronze/b/2026/01/01/00/three.parquet", Bytes::from_static(b"3"))
        .unwrap();
    store
        .put("silver/a/2026/01/01/four.parquet", Bytes::from_static(b"4"))
        .unwrap();

    assert_eq!(&store.get("bronze/a/2026/01/01/01/two.parquet").unwrap()[..], b"two!");

    let head = store.head("bronze/a/2026/01/01/01/two.parquet").unwrap().unwrap();
    assert_eq!(head.size_bytes, 4);
    assert!(store.head("bronze/missing.parquet").unwrap().is_none());

    let bronze_a: Vec<_> = store
        .list("bronze/a/")
        .unwrap()
        .into_iter()
        .map(|m| m.key)
        .collect();
    assert_eq!(
        bronze_a,
        vec![
            "bronze/a/2026/01/01/00/one.parquet",
            "bronze/a/2026/01/01/01/two.parquet",
        ]
    );
    assert_eq!(store.list("bronze/").unwrap().len(), 3);
    assert_eq!(store.list("").unwrap().len(), 4);
    assert!(store.list("gold/").unwrap().is_empty());

    // Prefix ending mid-segment.
    assert_eq!(store.list("bronze/a/2026/01/01/0").unwrap().len(), 2);
}

#[test]
fn memory_backend_contract() {
    exercise_backend(&MemoryBlobStore::new());
}

#[test]
fn fs_backend_contract() {
    let dir = tempfile::tempdir().unwrap();
    let store = FsBlobStore::open(dir.path()).unwrap();
    exercise_backend(&store);
}

#[test]
fn objects_are_write_once() {
    let dir = tempfile::tempdir().unwrap();
    let fs_store = FsBlobStore::open(dir.path()).unwrap();
    let mem_store = MemoryBlobStore::new();
    for store in [&fs_store as &dyn BlobStore, &mem_store] {
        store.put("k/v.parquet", Bytes::from_static(b"first")).unwrap();
        let err = store.put("k/v.parquet", Bytes::from_static(b"second")).unwrap_err();
        assert!(matches!(err, IoError::AlreadyExists { .. }));
        assert_eq!(&store.get("k/v.parquet").unwrap()[..], b"first");
    }
}

#[test]
fn missing_object_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let store = FsBlobStore::open(dir.path()).unwrap();
    assert!(matches!(store.get("nope/x.parquet"), Err(IoError::NotFound { .. })));
}

#[test]
fn invalid_keys_rejected() {
    let store = MemoryBlobStore::new();
    for key in ["", "/abs", "a//b", "a/../b", "a\\b", "./a"] {
        let err = store.put(key, Bytes::new()).unwrap_err();
        assert!(matches!(err, IoError::InvalidKey { .. }), "key {key:?}");
    }
}

#[test]
fn injected_failures_leave_store_unchanged() {
    let store = MemoryBlobStore::new();
    store.set_fail_writes(true);
    assert!(matches!(
        store.put("a/b.parquet", Bytes::from_static(b"x")),
        Err(IoError::Injected(_))
    ));
    assert!(store.is_empty());
    store.set_fail_writes(false);
    store.put("a/b.parquet", Bytes::from_static(b"x")).unwrap();
    assert_eq!(store.len(), 1);
}

#[test]
fn fs_list_ignores_temporary_files() {
    let dir = tempfile::tempdir().unwrap();
    let store = FsBlobStore::open(dir.path()).unwrap();
    store.put("a/b.parquet", Bytes::from_static(b"x")).unwrap();
    std::fs::write(dir.path().join("a").join(".put-1-1.tmp"), b"partial").unwrap();
    let keys: Vec<_> = store.list("a/").unwrap().into_iter().map(|m| m.key).collect();
    assert_eq!(keys, vec!["a/b.parquet"]);
}
