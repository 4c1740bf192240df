use super::helpers::*;
use crate::Error;
use std::thread;
use std::time::Duration;
use tempfile::tempdir;

// --------------------- Visibility ---------------------

#[test]
fn staged_operations_are_invisible_until_commit() {
    let dir = tempdir().unwrap();
    let db = open_db(&dir);

    let mut batch = db.batch();
    batch.put("c", "k1", b"v1", Duration::ZERO);
    batch.put("c", "k2", b"v2", Duration::ZERO);

    assert!(matches!(db.get("c", "k1"), Err(Error::NotFound)));
    assert!(matches!(db.get("c", "k2"), Err(Error::NotFound)));

    batch.commit().unwrap();

    assert_eq!(db.get("c", "k1").unwrap(), b"v1");
    assert_eq!(db.get("c", "k2").unwrap(), b"v2");
}

#[test]
fn commit_applies_puts_and_deletes_in_order() {
    let dir = tempdir().unwrap();
    let db = open_db(&dir);

    let mut batch = db.batch();
    batch.put("c", "k1", b"v1", Duration::ZERO);
    batch.put("c", "k2", b"v2", Duration::ZERO);
    batch.delete("c", "k1");
    batch.commit().unwrap();

    assert!(matches!(db.get("c", "k1"), Err(Error::NotFound)));
    assert_eq!(db.get("c", "k2").unwrap(), b"v2");
}

#[test]
fn batch_delete_of_a_preexisting_key_applies() {
    let dir = tempdir().unwrap();
    let db = open_db(&dir);

    db.put("c", "old", b"v").unwrap();

    let mut batch = db.batch();
    batch.delete("c", "old");
    batch.commit().unwrap();

    assert!(matches!(db.get("c", "old"), Err(Error::NotFound)));
}

#[test]
fn empty_commit_is_a_noop() {
    let dir = tempdir().unwrap();
    let db = open_db(&dir);

    let size_before = std::fs::metadata(db_path(&dir)).unwrap().len();
    let mut batch = db.batch();
    assert!(batch.is_empty());
    batch.commit().unwrap();
    assert_eq!(
        std::fs::metadata(db_path(&dir)).unwrap().len(),
        size_before
    );
}

#[test]
fn batch_is_reusable_after_commit() {
    let dir = tempdir().unwrap();
    let db = open_db(&dir);

    let mut batch = db.batch();
    batch.put("c", "k1", b"v1", Duration::ZERO);
    batch.commit().unwrap();
    assert!(batch.is_empty());

    batch.put("c", "k2", b"v2", Duration::ZERO);
    batch.commit().unwrap();

    assert_eq!(db.get("c", "k1").unwrap(), b"v1");
    assert_eq!(db.get("c", "k2").unwrap(), b"v2");
}

// --------------------- Semantics shared with direct writes ---------------------

#[test]
fn all_batched_puts_share_one_timestamp() {
    let dir = tempdir().unwrap();
    let db = open_db(&dir);

    let mut batch = db.batch();
    batch.put("c", "k1", b"v1", Duration::ZERO);
    batch.put("c", "k2", b"v2", Duration::ZERO);
    batch.put("c", "k3", b"v3", Duration::ZERO);
    batch.commit().unwrap();

    let entries = db.scan_prefix("c:").unwrap();
    assert_eq!(entries.len(), 3);
    assert!(
        entries.windows(2).all(|w| w[0].timestamp == w[1].timestamp),
        "batched puts must carry the commit timestamp"
    );
}

#[test]
fn batched_ttl_expires_like_a_direct_put() {
    let dir = tempdir().unwrap();
    let db = open_db(&dir);

    let mut batch = db.batch();
    batch.put("c", "flash", b"v", Duration::from_millis(50));
    batch.put("c", "stay", b"v", Duration::ZERO);
    batch.commit().unwrap();

    assert_eq!(db.get("c", "flash").unwrap(), b"v");
    thread::sleep(Duration::from_millis(100));
    assert!(matches!(db.get("c", "flash"), Err(Error::NotFound)));
    assert_eq!(db.get("c", "stay").unwrap(), b"v");
}

#[test]
fn batched_large_values_compress_and_round_trip() {
    let dir = tempdir().unwrap();
    let db = open_db(&dir);

    let value = vec![b'Q'; 2048];
    let mut batch = db.batch();
    batch.put("c", "big", &value, Duration::ZERO);
    batch.commit().unwrap();

    assert_eq!(db.get("c", "big").unwrap(), value);
}

#[test]
fn committed_batch_survives_reopen() {
    let dir = tempdir().unwrap();

    let db = open_db(&dir);
    let mut batch = db.batch();
    batch.put("c", "k1", b"v1", Duration::ZERO);
    batch.delete("c", "k1");
    batch.put("c", "k2", b"v2", Duration::ZERO);
    batch.commit().unwrap();
    db.close().unwrap();

    let db = open_db(&dir);
    assert!(matches!(db.get("c", "k1"), Err(Error::NotFound)));
    assert_eq!(db.get("c", "k2").unwrap(), b"v2");
}
