//! Write path: `put()`, `put_with_ttl()`, and `delete()`.
//!
//! Every mutation becomes one record frame appended to the log under the
//! exclusive lock. The value is (optionally) compressed, then sealed with
//! associated data derived from the composite key and the write timestamp,
//! so a frame moved to a different key or timestamp fails AEAD verification
//! on read.

use record::{Op, Record, FLAG_COMPRESSED, NONCE_SIZE};

use crate::{
    composite_key, compress, now_nanos, record_aad, Core, Db, Error, Result,
    COMPRESSION_THRESHOLD,
};
use std::time::Duration;

impl Db {
    /// Stores `value` under `(collection, key)`, overwriting any previous
    /// value. Never fails because of prior existence.
    pub fn put(&self, collection: &str, key: &str, value: &[u8]) -> Result<()> {
        self.put_with_ttl(collection, key, value, Duration::ZERO)
    }

    /// Stores `value` with a time-to-live. A zero `ttl` means no expiration;
    /// otherwise the record expires `ttl` after now, after which `get`
    /// reports it as absent and scans elide it.
    pub fn put_with_ttl(
        &self,
        collection: &str,
        key: &str,
        value: &[u8],
        ttl: Duration,
    ) -> Result<()> {
        let mut core = self.core.write();
        core.put_with_ttl(collection, key, value, ttl)
    }

    /// Deletes `(collection, key)` by appending a tombstone. Deleting an
    /// absent key is a successful no-op. The bloom filter keeps the key's
    /// bit — only the index forgets it.
    pub fn delete(&self, collection: &str, key: &str) -> Result<()> {
        let mut core = self.core.write();
        core.delete(collection, key)
    }
}

impl Core {
    pub(crate) fn put_with_ttl(
        &mut self,
        collection: &str,
        key: &str,
        value: &[u8],
        ttl: Duration,
    ) -> Result<()> {
        let now = now_nanos();
        let expires_at = expiry_for(now, ttl);

        let (final_value, flags) = maybe_compress(value);

        let nonce = crypto::generate_nonce();
        let aad = record_aad(collection.as_bytes(), key.as_bytes(), now);
        let sealed = self
            .sealer
            .seal(&nonce, &final_value, &aad)
            .map_err(Error::Crypto)?;

        let rec = Record {
            timestamp: now,
            expires_at,
            flags,
            collection: collection.as_bytes().to_vec(),
            key: key.as_bytes().to_vec(),
            nonce,
            value: sealed,
            op: Op::Put,
        };

        self.append_record(&rec)?;
        self.bloom.insert(composite_key(collection, key).as_bytes());
        Ok(())
    }

    pub(crate) fn delete(&mut self, collection: &str, key: &str) -> Result<()> {
        let composite = composite_key(collection, key);
        if !self.index.contains_key(&composite) {
            return Ok(());
        }

        let rec = Record {
            timestamp: now_nanos(),
            expires_at: 0,
            flags: 0,
            collection: collection.as_bytes().to_vec(),
            key: key.as_bytes().to_vec(),
            nonce: [0u8; NONCE_SIZE],
            value: Vec::new(),
            op: Op::Delete,
        };

        self.append_record(&rec)?;
        self.index.remove(&composite);
        Ok(())
    }

    /// Appends one frame in a single contiguous write and advances the
    /// offset. For puts, the index learns the frame's pre-write offset.
    pub(crate) fn append_record(&mut self, rec: &Record) -> Result<()> {
        use std::io::Write;

        self.scratch.clear();
        rec.encode_into(&mut self.scratch);
        self.file.write_all(&self.scratch)?;

        if rec.op == Op::Put {
            let composite = composite_key(
                &String::from_utf8_lossy(&rec.collection),
                &String::from_utf8_lossy(&rec.key),
            );
            self.index.insert(composite, self.offset);
        }

        self.offset += self.scratch.len() as u64;
        Ok(())
    }
}

/// Absolute expiration time for a TTL, or zero when the TTL is zero.
pub(crate) fn expiry_for(now: i64, ttl: Duration) -> i64 {
    if ttl.is_zero() {
        0
    } else {
        now.saturating_add(ttl.as_nanos() as i64)
    }
}

/// Compresses values above the threshold when that actually helps. Returns
/// the bytes to seal and the flags for the frame. A compression failure
/// falls back to the raw value with no flag set.
pub(crate) fn maybe_compress(value: &[u8]) -> (std::borrow::Cow<'_, [u8]>, u8) {
    use std::borrow::Cow;

    if value.len() > COMPRESSION_THRESHOLD {
        if let Ok(compressed) = compress(value) {
            if compressed.len() < value.len() {
                return (Cow::Owned(compressed), FLAG_COMPRESSED);
            }
        }
    }
    (Cow::Borrowed(value), 0)
}
