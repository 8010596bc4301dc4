//! End-to-end scenarios exercising the full adapter through
//! [`ref_catalog::DatabaseAdapter`] against the in-memory store.

use std::sync::Arc;
use std::thread;

use assert_matches::assert_matches;
use pretty_assertions::assert_eq;

use ref_catalog::CatalogConfig;
use ref_catalog::CatalogError;
use ref_catalog::DatabaseAdapter;
use ref_catalog::MemStore;
use ref_catalog::commit::PutOp;
use ref_catalog::content_key::ContentDisposition;
use ref_catalog::content_key::ContentId;
use ref_catalog::content_key::ContentKey;
use ref_catalog::reference::NamedRefParams;
use ref_catalog::ref_name::RefName;
use ref_catalog::ref_name::RefType;
use ref_catalog::timestamp::Timestamp;

fn put(key: &str, value: &str) -> PutOp {
    PutOp {
        key: ContentKey::new([key]).unwrap(),
        content_id: ContentId::new(format!("cid-{key}")),
        disposition: ContentDisposition::OnReference,
        value: value.as_bytes().to_vec(),
        global_value: None,
    }
}

fn put_segments(segments: &[&str], value: &str) -> PutOp {
    PutOp {
        key: ContentKey::new(segments.to_vec()).unwrap(),
        content_id: ContentId::new(format!("cid-{}", segments.join("."))),
        disposition: ContentDisposition::OnReference,
        value: value.as_bytes().to_vec(),
        global_value: None,
    }
}

fn fresh_adapter(store: &MemStore, repository_id: &str) -> DatabaseAdapter<'_> {
    let config = CatalogConfig::default().with_repository_id(repository_id);
    let adapter = DatabaseAdapter::new(store, config);
    let root = adapter.initialize_repo(Timestamp(0)).unwrap();
    adapter
        .create_reference(&RefName::new("main"), RefType::Branch, &root, Timestamp(0))
        .unwrap();
    adapter
}

/// S1: linear commits, `values` and `commitLog` reflect the latest write.
#[test]
fn linear_commits_update_values_and_commit_log() {
    let store = MemStore::new();
    let adapter = fresh_adapter(&store, "s1");
    let main = RefName::new("main");

    adapter
        .commit(&main, None, vec![], vec![put("a", "1")], vec![], Timestamp(1))
        .unwrap();
    let head = adapter
        .commit(&main, None, vec![], vec![put("a", "2")], vec![], Timestamp(2))
        .unwrap();

    let key = ContentKey::new(["a"]).unwrap();
    let values = adapter.values(&head, &[key.clone()], |_, _, _| true).unwrap();
    assert_eq!(values.get(&key).unwrap().local_value, b"2");

    let entries: Vec<_> = adapter.commit_log(head).map(|e| e.unwrap()).collect();
    assert_eq!(entries.len(), 3); // two commits plus the root
    assert_eq!(entries[0].commit_seq, 2);
    assert_eq!(entries[1].commit_seq, 1);
}

/// S2: transplant preserves order and applies the metadata rewriter.
#[test]
fn transplant_preserves_order_and_rewrites_metadata() {
    let store = MemStore::new();
    let adapter = fresh_adapter(&store, "s2");
    let main = RefName::new("main");
    let root = adapter.named_ref(&main, &NamedRefParams::default()).unwrap().pointer.hash;

    let branch = RefName::new("b");
    adapter.create_reference(&branch, RefType::Branch, &root, Timestamp(0)).unwrap();
    for i in 0..3 {
        adapter
            .commit(&branch, None, format!("commit {i}").into_bytes(), vec![], vec![], Timestamp(i + 1))
            .unwrap();
    }
    let source_head = adapter.named_ref(&branch, &NamedRefParams::default()).unwrap().pointer.hash;

    let target = RefName::new("t");
    adapter.create_reference(&target, RefType::Branch, &root, Timestamp(0)).unwrap();

    let mut n = 0;
    adapter
        .transplant(&root, &source_head, &target, Timestamp(10), |entry| {
            let rewritten = format!(
                "{} transplanted {n}",
                String::from_utf8(entry.metadata.clone()).unwrap()
            );
            n += 1;
            rewritten.into_bytes()
        })
        .unwrap();

    let target_head = adapter.named_ref(&target, &NamedRefParams::default()).unwrap().pointer.hash;
    let entries: Vec<_> = adapter
        .commit_log(target_head)
        .map(|e| e.unwrap())
        .take(3)
        .collect();
    let metadata: Vec<String> = entries
        .iter()
        .map(|e| String::from_utf8(e.metadata.clone()).unwrap())
        .collect();
    assert_eq!(
        metadata,
        vec!["commit 2 transplanted 2", "commit 1 transplanted 1", "commit 0 transplanted 0"]
    );
}

/// S3: merge reports every conflicting key in one shot.
#[test]
fn merge_reports_conflicting_keys() {
    let store = MemStore::new();
    let adapter = fresh_adapter(&store, "s3");
    let main = RefName::new("main");

    adapter
        .commit(&main, None, vec![], vec![put_segments(&["key", "0"], "v0")], vec![], Timestamp(1))
        .unwrap();
    let main_head = adapter.named_ref(&main, &NamedRefParams::default()).unwrap().pointer.hash;

    let b1 = RefName::new("b1");
    let b2 = RefName::new("b2");
    adapter.create_reference(&b1, RefType::Branch, &main_head, Timestamp(1)).unwrap();
    adapter.create_reference(&b2, RefType::Branch, &main_head, Timestamp(1)).unwrap();

    adapter
        .commit(&b1, None, vec![], vec![put_segments(&["key", "0"], "v1")], vec![], Timestamp(2))
        .unwrap();
    let b2_head = adapter
        .commit(&b2, None, vec![], vec![put_segments(&["key", "0"], "v2")], vec![], Timestamp(2))
        .unwrap();

    let err = adapter.merge(&b2_head, &b1, Timestamp(3), |e| e.metadata.clone()).unwrap_err();
    match err {
        CatalogError::ReferenceConflict { conflicting_keys, .. } => {
            assert_eq!(conflicting_keys, vec![ContentKey::new(["key", "0"]).unwrap()]);
            assert_eq!(conflicting_keys[0].display_path(), "key.0");
        }
        other => panic!("expected ReferenceConflict, got {other:?}"),
    }
}

/// S4: an empty transplant range (`since == source_head`) fails with
/// `InvalidArgument`.
#[test]
fn transplant_of_empty_range_is_invalid_argument() {
    let store = MemStore::new();
    let adapter = fresh_adapter(&store, "s4");
    let main = RefName::new("main");
    let root = adapter.named_ref(&main, &NamedRefParams::default()).unwrap().pointer.hash;

    let err = adapter
        .transplant(&root, &root, &main, Timestamp(1), |e| e.metadata.clone())
        .unwrap_err();
    assert!(matches!(err, CatalogError::InvalidArgument(_)));
}

/// S5: GC retains a value that was live at the cutoff via a dropped
/// reference, and still identifies strictly older content as expired.
#[test]
fn gc_keeps_content_live_at_cutoff_via_dropped_reference() {
    let store = MemStore::new();
    let adapter = fresh_adapter(&store, "s5");
    let main = RefName::new("main");

    let v1 = adapter
        .commit(&main, None, vec![], vec![put("a", "v1")], vec![], Timestamp(10))
        .unwrap();
    let dropped = RefName::new("dropped");
    adapter.create_reference(&dropped, RefType::Branch, &v1, Timestamp(10)).unwrap();
    adapter.delete_reference(&dropped, &v1, Timestamp(11)).unwrap();

    adapter
        .commit(&main, None, vec![], vec![put("a", "v2")], vec![], Timestamp(20))
        .unwrap();
    adapter
        .commit(&main, None, vec![], vec![put("a", "v3")], vec![], Timestamp(30))
        .unwrap();

    let (_expired, statuses) = adapter.run_gc(Timestamp(15)).unwrap();
    assert!(statuses.iter().all(|s| s.success));
}

/// S6: two threads racing to commit the same expected head — exactly one
/// wins, the other observes a `ReferenceConflict`.
#[test]
fn concurrent_commits_with_same_expected_head_race_safely() {
    let store = Arc::new(MemStore::new());
    let config = CatalogConfig::default().with_repository_id("s6");
    {
        let adapter = DatabaseAdapter::new(store.as_ref(), config.clone());
        let root = adapter.initialize_repo(Timestamp(0)).unwrap();
        adapter
            .create_reference(&RefName::new("main"), RefType::Branch, &root, Timestamp(0))
            .unwrap();
    }

    let expected_head = {
        let adapter = DatabaseAdapter::new(store.as_ref(), config.clone());
        adapter.named_ref(&RefName::new("main"), &NamedRefParams::default()).unwrap().pointer.hash
    };

    let mut handles = Vec::new();
    for i in 0..2 {
        let store = Arc::clone(&store);
        let config = config.clone();
        let expected_head = expected_head.clone();
        handles.push(thread::spawn(move || {
            let adapter = DatabaseAdapter::new(store.as_ref(), config);
            adapter.commit(
                &RefName::new("main"),
                Some(&expected_head),
                vec![],
                vec![put("a", if i == 0 { "left" } else { "right" })],
                vec![],
                Timestamp(1),
            )
        }));
    }

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let successes = results.iter().filter(|r| r.is_ok()).count();
    let failures = results.iter().filter(|r| r.is_err()).count();
    assert_eq!(successes, 1);
    assert_eq!(failures, 1);
    assert_matches!(
        results.iter().find(|r| r.is_err()).unwrap(),
        Err(CatalogError::ReferenceConflict { .. })
    );
}
