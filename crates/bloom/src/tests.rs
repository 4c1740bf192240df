use super::*;
use std::io::Cursor;

// -------------------- Membership --------------------

#[test]
fn inserted_keys_are_always_found() {
    let mut bf = BloomFilter::default();
    let keys: Vec<String> = (0..1000).map(|i| format!("users:key{}", i)).collect();

    for k in &keys {
        bf.insert(k.as_bytes());
    }

    // No false negatives, ever.
    for k in &keys {
        assert!(bf.may_contain(k.as_bytes()), "false negative for {}", k);
    }
}

#[test]
fn fresh_filter_contains_nothing() {
    let bf = BloomFilter::default();
    assert!(!bf.may_contain(b"users:alice"));
    assert!(!bf.may_contain(b""));
}

#[test]
fn small_filter_saturates_without_breaking() {
    // With 8 bits and many keys every probe eventually answers "maybe".
    let mut bf = BloomFilter::new(8);
    for i in 0..100u32 {
        bf.insert(format!("k{}", i).as_bytes());
    }
    for i in 0..100u32 {
        assert!(bf.may_contain(format!("k{}", i).as_bytes()));
    }
}

#[test]
#[should_panic(expected = "num_bits must be > 0")]
fn zero_bits_panics() {
    let _ = BloomFilter::new(0);
}

// -------------------- Serialization --------------------

#[test]
fn round_trips_through_serialization() {
    let mut bf = BloomFilter::new(4096);
    for i in 0..200u32 {
        bf.insert(format!("col:k{}", i).as_bytes());
    }

    let mut buf = Vec::new();
    bf.write_to(&mut buf).unwrap();

    let restored = BloomFilter::read_from(&mut Cursor::new(buf)).unwrap();
    assert_eq!(restored.num_bits(), 4096);
    for i in 0..200u32 {
        assert!(restored.may_contain(format!("col:k{}", i).as_bytes()));
    }
}

#[test]
fn rejects_disagreeing_size_fields() {
    let mut buf = Vec::new();
    buf.extend_from_slice(&100u32.to_be_bytes()); // 100 bits -> 13 bytes
    buf.extend_from_slice(&5u32.to_be_bytes()); // claims 5 bytes
    buf.extend_from_slice(&[0u8; 5]);

    assert!(BloomFilter::read_from(&mut Cursor::new(buf)).is_err());
}

#[test]
fn rejects_truncated_input() {
    let mut bf = BloomFilter::new(64);
    bf.insert(b"k");

    let mut buf = Vec::new();
    bf.write_to(&mut buf).unwrap();
    buf.truncate(buf.len() - 3);

    assert!(BloomFilter::read_from(&mut Cursor::new(buf)).is_err());
}
