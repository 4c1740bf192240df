//! Streaming scans: `scan_prefix()`, `filter()`, and `filter_prefix()`.
//!
//! Scans replay the entire log from the first frame after the header,
//! reducing records per composite key in encounter order: a put replaces the
//! surviving entry, a delete removes it, an expired put drops it. Only
//! records whose composite key matches the caller's predicate are decrypted.
//!
//! Each scan opens its own read handle, so concurrent scans never contend on
//! a shared file cursor. The scan is bounded by the append offset observed
//! under the shared lock.

use record::{FramePrefix, Op, Record, FLAG_COMPRESSED, PREFIX_SIZE};
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};

use crate::{decompress, now_nanos, record_aad, split_key, Core, Db, Error, Result, FILE_HEADER_SIZE};

/// One live, decrypted record produced by a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Wall-clock write time, nanoseconds since the epoch.
    pub timestamp: i64,
    /// Expiration time; zero means none.
    pub expires_at: i64,
    /// Collection name.
    pub collection: String,
    /// Key within the collection.
    pub key: String,
    /// Decrypted (and decompressed) value bytes.
    pub value: Vec<u8>,
}

impl Db {
    /// Returns every live record whose composite key starts with `prefix`.
    ///
    /// # Errors
    ///
    /// [`Error::ChecksumMismatch`] aborts the scan on the first corrupt
    /// frame; [`Error::Decryption`] on the first AEAD failure.
    pub fn scan_prefix(&self, prefix: &str) -> Result<Vec<Entry>> {
        let core = self.core.read();
        let live = core.scan_live(|composite| composite.starts_with(prefix), |_, _| true)?;
        Ok(live.into_values().collect())
    }

    /// Scans `collection` and returns the decrypted values for which
    /// `predicate` last returned `true`. The predicate receives the bare key
    /// (without the collection prefix) and the decrypted value.
    pub fn filter<F>(&self, collection: &str, mut predicate: F) -> Result<Vec<Vec<u8>>>
    where
        F: FnMut(&str, &[u8]) -> bool,
    {
        let core = self.core.read();
        let live = core.scan_live(
            |composite| split_key(composite).0 == collection,
            |composite, value| predicate(split_key(composite).1, value),
        )?;
        Ok(live.into_values().map(|e| e.value).collect())
    }

    /// Like [`filter`](Db::filter) but matches a general prefix over
    /// composite keys; the predicate receives the full composite key.
    pub fn filter_prefix<F>(&self, prefix: &str, mut predicate: F) -> Result<Vec<Vec<u8>>>
    where
        F: FnMut(&str, &[u8]) -> bool,
    {
        let core = self.core.read();
        let live = core.scan_live(
            |composite| composite.starts_with(prefix),
            |composite, value| predicate(composite, value),
        )?;
        Ok(live.into_values().map(|e| e.value).collect())
    }
}

impl Core {
    /// Replays the log once, keeping the surviving entry per matching
    /// composite key. `key_match` gates which records are decrypted at all;
    /// `accept` decides, per decrypted record, whether the entry stays in
    /// the result (mirroring the last-predicate-wins reduction).
    pub(crate) fn scan_live<M, A>(&self, key_match: M, mut accept: A) -> Result<HashMap<String, Entry>>
    where
        M: Fn(&str) -> bool,
        A: FnMut(&str, &[u8]) -> bool,
    {
        let mut results: HashMap<String, Entry> = HashMap::new();

        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(FILE_HEADER_SIZE as u64))?;
        let section = file.take(self.offset - FILE_HEADER_SIZE as u64);
        let mut reader = BufReader::with_capacity(128 * 1024, section);

        let now = now_nanos();
        let mut frame = Vec::with_capacity(4096);

        loop {
            let mut prefix_buf = [0u8; PREFIX_SIZE];
            match reader.read_exact(&mut prefix_buf) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e.into()),
            }

            let prefix = FramePrefix::decode(&prefix_buf)?;
            frame.clear();
            frame.resize(prefix.frame_len(), 0);
            frame[..PREFIX_SIZE].copy_from_slice(&prefix_buf);
            match reader.read_exact(&mut frame[PREFIX_SIZE..]) {
                Ok(()) => {}
                // Truncated tail — everything before it already reduced.
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e.into()),
            }

            let rec = Record::decode(&frame)?;

            let composite = format!(
                "{}:{}",
                String::from_utf8_lossy(&rec.collection),
                String::from_utf8_lossy(&rec.key)
            );
            if !key_match(&composite) {
                continue;
            }

            if rec.op == Op::Delete {
                results.remove(&composite);
                continue;
            }
            if rec.expires_at > 0 && rec.expires_at < now {
                // An expired put also cancels any earlier surviving version.
                results.remove(&composite);
                continue;
            }

            let aad = record_aad(&rec.collection, &rec.key, rec.timestamp);
            let plaintext = self
                .sealer
                .open(&rec.nonce, &rec.value, &aad)
                .map_err(|_| Error::Decryption)?;
            let value = if rec.flags & FLAG_COMPRESSED != 0 {
                decompress(&plaintext)?
            } else {
                plaintext
            };

            if accept(&composite, &value) {
                let (collection, key) = split_key(&composite);
                results.insert(
                    composite.clone(),
                    Entry {
                        timestamp: rec.timestamp,
                        expires_at: rec.expires_at,
                        collection: collection.to_owned(),
                        key: key.to_owned(),
                        value,
                    },
                );
            } else {
                results.remove(&composite);
            }
        }

        Ok(results)
    }
}
