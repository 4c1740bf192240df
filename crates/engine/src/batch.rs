//! Atomically committed write batches.
//!
//! A batch stages puts and deletes in memory. `commit()` seals and frames
//! every staged operation into one contiguous buffer, writes it with a
//! single syscall, fsyncs once, and only then updates the index and bloom
//! filter — so a failure before the write completes leaves the in-memory
//! state untouched, and a reader never observes half a batch.
//!
//! All staged puts share the commit's single timestamp.

use record::{Op, Record, NONCE_SIZE};
use std::time::Duration;

use crate::write::{expiry_for, maybe_compress};
use crate::{composite_key, now_nanos, record_aad, Db, Error, Result};

struct Staged {
    collection: String,
    key: String,
    value: Vec<u8>,
    ttl: Duration,
    op: Op,
}

/// A staging buffer of put/delete operations committed as one unit.
pub struct Batch<'db> {
    db: &'db Db,
    staged: Vec<Staged>,
}

impl Db {
    /// Creates an empty batch bound to this database.
    pub fn batch(&self) -> Batch<'_> {
        Batch {
            db: self,
            staged: Vec::new(),
        }
    }
}

impl Batch<'_> {
    /// Stages a put. A zero `ttl` means no expiration.
    pub fn put(&mut self, collection: &str, key: &str, value: &[u8], ttl: Duration) {
        self.staged.push(Staged {
            collection: collection.to_owned(),
            key: key.to_owned(),
            value: value.to_vec(),
            ttl,
            op: Op::Put,
        });
    }

    /// Stages a delete tombstone.
    pub fn delete(&mut self, collection: &str, key: &str) {
        self.staged.push(Staged {
            collection: collection.to_owned(),
            key: key.to_owned(),
            value: Vec::new(),
            ttl: Duration::ZERO,
            op: Op::Delete,
        });
    }

    /// Number of staged operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.staged.len()
    }

    /// Returns `true` when nothing is staged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.staged.is_empty()
    }

    /// Commits the staged operations: one contiguous write, one fsync, then
    /// the index/bloom update. An empty batch commits as a no-op.
    pub fn commit(&mut self) -> Result<()> {
        use std::io::Write;

        if self.staged.is_empty() {
            return Ok(());
        }

        let mut core = self.db.core.write();

        let now = now_nanos();
        let mut buffer: Vec<u8> = Vec::new();
        let mut updates: Vec<(String, u64, Op)> = Vec::with_capacity(self.staged.len());
        let mut next_offset = core.offset;

        for staged in &self.staged {
            let rec = match staged.op {
                Op::Put => {
                    let (final_value, flags) = maybe_compress(&staged.value);
                    let nonce = crypto::generate_nonce();
                    let aad = record_aad(
                        staged.collection.as_bytes(),
                        staged.key.as_bytes(),
                        now,
                    );
                    let sealed = core
                        .sealer
                        .seal(&nonce, &final_value, &aad)
                        .map_err(Error::Crypto)?;
                    Record {
                        timestamp: now,
                        expires_at: expiry_for(now, staged.ttl),
                        flags,
                        collection: staged.collection.as_bytes().to_vec(),
                        key: staged.key.as_bytes().to_vec(),
                        nonce,
                        value: sealed,
                        op: Op::Put,
                    }
                }
                Op::Delete => Record {
                    timestamp: now,
                    expires_at: 0,
                    flags: 0,
                    collection: staged.collection.as_bytes().to_vec(),
                    key: staged.key.as_bytes().to_vec(),
                    nonce: [0u8; NONCE_SIZE],
                    value: Vec::new(),
                    op: Op::Delete,
                },
            };

            let before = buffer.len();
            rec.encode_into(&mut buffer);

            let composite = composite_key(&staged.collection, &staged.key);
            updates.push((composite, next_offset, staged.op));
            next_offset += (buffer.len() - before) as u64;
        }

        // One write, one fsync. Nothing in memory has changed yet.
        core.file.write_all(&buffer)?;
        core.file.sync_all()?;

        for (composite, offset, op) in updates {
            match op {
                Op::Put => {
                    core.bloom.insert(composite.as_bytes());
                    core.index.insert(composite, offset);
                }
                Op::Delete => {
                    core.index.remove(&composite);
                }
            }
        }
        core.offset = next_offset;

        self.staged.clear();
        Ok(())
    }
}
