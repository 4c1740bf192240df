use super::helpers::*;
use crate::{Db, Error, FILE_HEADER_SIZE};
use record::{Op, Record, NONCE_SIZE};
use std::fs::OpenOptions;
use std::io::Write;
use tempfile::tempdir;

fn hint_path(dir: &tempfile::TempDir) -> std::path::PathBuf {
    let mut os = db_path(dir).into_os_string();
    os.push(".hint");
    os.into()
}

// --------------------- Hint snapshot ---------------------

#[test]
fn close_writes_a_hint_and_reopen_uses_it() {
    let dir = tempdir().unwrap();

    let db = open_db(&dir);
    db.put("col", "k1", b"v1").unwrap();
    db.put("col", "k2", b"v2").unwrap();
    db.close().unwrap();

    assert!(hint_path(&dir).exists());

    // Corrupt a byte in the first record's region. If the reopen re-scanned
    // the covered portion of the log this would fail the open; the hint
    // makes it invisible.
    corrupt_byte(&dir, FILE_HEADER_SIZE as u64 + 5);

    let db = open_db(&dir);
    assert_eq!(db.get("col", "k2").unwrap(), b"v2");
    // The corrupted record itself is only noticed when actually read.
    assert!(matches!(db.get("col", "k1"), Err(Error::ChecksumMismatch)));
}

#[test]
fn corruption_past_the_hint_offset_fails_the_open() {
    let dir = tempdir().unwrap();

    let db = open_db(&dir);
    db.put("col", "k1", b"v1").unwrap();
    db.close().unwrap();

    // Append a full frame's worth of garbage past the hinted offset. It
    // parses as a complete (but corrupt) frame, which is not tolerable.
    let mut f = OpenOptions::new()
        .append(true)
        .open(db_path(&dir))
        .unwrap();
    f.write_all(&[0x5A; 128]).unwrap();
    drop(f);

    assert!(matches!(
        Db::open(db_path(&dir), PASSWORD),
        Err(Error::ChecksumMismatch)
    ));
}

#[test]
fn missing_hint_falls_back_to_a_full_scan() {
    let dir = tempdir().unwrap();

    let db = open_db(&dir);
    db.put("col", "k1", b"v1").unwrap();
    db.put("col", "k2", b"v2").unwrap();
    db.close().unwrap();

    std::fs::remove_file(hint_path(&dir)).unwrap();

    let db = open_db(&dir);
    assert_eq!(db.get("col", "k1").unwrap(), b"v1");
    assert_eq!(db.get("col", "k2").unwrap(), b"v2");
}

#[test]
fn broken_hint_is_treated_as_a_cache_miss() {
    let dir = tempdir().unwrap();

    let db = open_db(&dir);
    db.put("col", "k1", b"v1").unwrap();
    db.close().unwrap();

    // Garble the hint body; the magic survives, the payload does not.
    std::fs::write(hint_path(&dir), b"NOKHAL_HINTgarbage").unwrap();

    let db = open_db(&dir);
    assert_eq!(db.get("col", "k1").unwrap(), b"v1");
}

#[test]
fn truncated_hint_is_treated_as_a_cache_miss() {
    let dir = tempdir().unwrap();

    let db = open_db(&dir);
    db.put("col", "k1", b"v1").unwrap();
    db.close().unwrap();

    let hint = std::fs::read(hint_path(&dir)).unwrap();
    std::fs::write(hint_path(&dir), &hint[..hint.len() / 2]).unwrap();

    let db = open_db(&dir);
    assert_eq!(db.get("col", "k1").unwrap(), b"v1");
}

// --------------------- Torn tail ---------------------

#[test]
fn torn_final_frame_is_dropped_on_recovery() {
    let dir = tempdir().unwrap();

    let db = open_db(&dir);
    db.put("col", "whole", b"intact").unwrap();
    db.close().unwrap();
    std::fs::remove_file(hint_path(&dir)).unwrap();

    // Simulate a crash mid-append: a valid frame missing its last bytes.
    let torn = Record {
        timestamp: 1,
        expires_at: 0,
        flags: 0,
        collection: b"col".to_vec(),
        key: b"torn".to_vec(),
        nonce: [9u8; NONCE_SIZE],
        value: vec![0u8; 40],
        op: Op::Put,
    }
    .encode();
    let mut f = OpenOptions::new()
        .append(true)
        .open(db_path(&dir))
        .unwrap();
    f.write_all(&torn[..torn.len() - 7]).unwrap();
    drop(f);

    let db = open_db(&dir);
    assert_eq!(db.get("col", "whole").unwrap(), b"intact");
    assert!(matches!(db.get("col", "torn"), Err(Error::NotFound)));
    assert_eq!(db.len(), 1);
}

#[test]
fn appends_continue_cleanly_after_recovery() {
    let dir = tempdir().unwrap();

    let db = open_db(&dir);
    db.put("col", "k1", b"v1").unwrap();
    db.close().unwrap();

    let db = open_db(&dir);
    db.put("col", "k2", b"v2").unwrap();
    db.close().unwrap();

    let db = open_db(&dir);
    assert_eq!(db.get("col", "k1").unwrap(), b"v1");
    assert_eq!(db.get("col", "k2").unwrap(), b"v2");
}

// --------------------- Tombstones across restarts ---------------------

#[test]
fn deletes_survive_a_restart() {
    let dir = tempdir().unwrap();

    let db = open_db(&dir);
    db.put("col", "gone", b"v").unwrap();
    db.put("col", "kept", b"v").unwrap();
    db.delete("col", "gone").unwrap();
    db.close().unwrap();
    // Force the tombstone to be replayed from the log, not the hint.
    std::fs::remove_file(hint_path(&dir)).unwrap();

    let db = open_db(&dir);
    assert!(matches!(db.get("col", "gone"), Err(Error::NotFound)));
    assert_eq!(db.get("col", "kept").unwrap(), b"v");
}
