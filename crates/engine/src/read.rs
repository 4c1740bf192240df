//! Read path: `get()`, `list()`, and positioned frame reads.
//!
//! A point lookup consults the bloom filter (free negatives), then the
//! index, then performs one positioned read of the frame. The CRC is
//! validated before anything else is trusted; the AEAD is verified with the
//! associated data rebuilt from the frame's own collection, key, and
//! timestamp.

use record::{FramePrefix, Record, FLAG_COMPRESSED, PREFIX_SIZE};

use crate::{
    composite_key, decompress, now_nanos, read_exact_at, record_aad, Core, Db, Error, Result,
};

impl Db {
    /// Returns the value stored under `(collection, key)`.
    ///
    /// # Errors
    ///
    /// * [`Error::NotFound`] — the key is absent or its record has expired.
    /// * [`Error::ChecksumMismatch`] — the frame failed its CRC.
    /// * [`Error::Decryption`] — AEAD verification failed.
    pub fn get(&self, collection: &str, key: &str) -> Result<Vec<u8>> {
        let core = self.core.read();
        core.get(collection, key)
    }

    /// Returns the keys of `collection`, without the collection prefix.
    /// Order is unspecified.
    pub fn list(&self, collection: &str) -> Result<Vec<String>> {
        let core = self.core.read();
        let prefix = composite_key(collection, "");
        Ok(core
            .index
            .keys()
            .filter_map(|k| k.strip_prefix(&prefix))
            .map(str::to_owned)
            .collect())
    }
}

impl Core {
    pub(crate) fn get(&self, collection: &str, key: &str) -> Result<Vec<u8>> {
        let composite = composite_key(collection, key);

        if !self.bloom.may_contain(composite.as_bytes()) {
            return Err(Error::NotFound);
        }
        let offset = *self.index.get(&composite).ok_or(Error::NotFound)?;

        let rec = self.read_record_at(offset)?;

        if rec.expires_at > 0 && rec.expires_at < now_nanos() {
            return Err(Error::NotFound);
        }

        // Rebuild the associated data from the *requested* key and the
        // stored timestamp; a frame swapped under a different key fails
        // verification here even though its CRC is intact.
        let aad = record_aad(collection.as_bytes(), key.as_bytes(), rec.timestamp);
        let plaintext = self
            .sealer
            .open(&rec.nonce, &rec.value, &aad)
            .map_err(|_| Error::Decryption)?;

        if rec.flags & FLAG_COMPRESSED != 0 {
            Ok(decompress(&plaintext)?)
        } else {
            Ok(plaintext)
        }
    }

    /// Reads and decodes the frame at `offset`, returning the record (value
    /// still sealed) and the frame's total size.
    pub(crate) fn read_frame_at(&self, offset: u64) -> Result<(Record, u64)> {
        let mut prefix_buf = [0u8; PREFIX_SIZE];
        read_exact_at(&self.file, &mut prefix_buf, offset)?;
        let prefix = FramePrefix::decode(&prefix_buf)?;

        let mut frame = vec![0u8; prefix.frame_len()];
        read_exact_at(&self.file, &mut frame, offset)?;

        let rec = Record::decode(&frame)?;
        Ok((rec, frame.len() as u64))
    }

    /// Reads the frame at `offset`, discarding the size.
    pub(crate) fn read_record_at(&self, offset: u64) -> Result<Record> {
        self.read_frame_at(offset).map(|(rec, _)| rec)
    }
}
