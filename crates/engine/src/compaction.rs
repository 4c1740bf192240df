//! Compaction: rewrites the log to contain only live records, then
//! secure-erases and replaces the old file.
//!
//! The whole operation runs under the exclusive lock. The envelope header is
//! copied byte-for-byte into the temp file, so the compacted database still
//! decrypts with the same password — the salt, KEK nonce, and sealed DEK
//! never change for the lifetime of a file. Superseded versions, tombstoned
//! keys, and expired records are simply not carried over.
//!
//! Before the temp file is renamed into place, every byte of the old file is
//! overwritten with CSPRNG output in 64 KiB chunks and the file deleted, so
//! freed blocks do not keep ciphertext (or the sealed DEK) around. The hint
//! file is removed because all of its offsets are stale.

use bloom::BloomFilter;
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io;
use std::path::Path;
use tracing::{info, warn};

use crate::{now_nanos, read_exact_at, sibling_path, Core, Db, Result, FILE_HEADER_SIZE};

impl Db {
    /// Compacts the log file, reclaiming the space held by overwritten,
    /// deleted, and expired records. Blocks all other operations while it
    /// runs. Offsets change wholesale, so the hint snapshot is discarded.
    pub fn compact(&self) -> Result<()> {
        let mut core = self.core.write();
        core.compact()
    }
}

impl Core {
    pub(crate) fn compact(&mut self) -> Result<()> {
        let temp_path = sibling_path(&self.path, ".compact");

        let (new_index, new_offset) = match self.write_compacted(&temp_path) {
            Ok(built) => built,
            Err(e) => {
                let _ = fs::remove_file(&temp_path);
                return Err(e);
            }
        };

        // Hold a handle to the temp file so the old one can be closed before
        // it is erased (required on platforms that refuse to remove open
        // files).
        let replacement = match OpenOptions::new().read(true).append(true).open(&temp_path) {
            Ok(f) => f,
            Err(e) => {
                let _ = fs::remove_file(&temp_path);
                return Err(e.into());
            }
        };
        let old = std::mem::replace(&mut self.file, replacement);
        drop(old);

        // Overwrite the old file's bytes before the rename frees them.
        if let Err(e) = secure_erase(&self.path) {
            warn!(error = %e, "secure erase of old log failed");
        }

        fs::rename(&temp_path, &self.path)?;

        // Every offset the hint knew is now wrong.
        let _ = fs::remove_file(self.hint_path());

        self.file = OpenOptions::new().read(true).append(true).open(&self.path)?;

        let mut bloom = BloomFilter::default();
        for key in new_index.keys() {
            bloom.insert(key.as_bytes());
        }

        let reclaimed = self.offset.saturating_sub(new_offset);
        self.offset = new_offset;
        self.index = new_index;
        self.bloom = bloom;

        info!(
            live_keys = self.index.len(),
            reclaimed_bytes = reclaimed,
            "compacted database"
        );
        Ok(())
    }

    /// Writes the compacted image: the original header followed by every
    /// live, unexpired record, re-encoded unchanged at its new offset.
    fn write_compacted(&self, temp_path: &Path) -> Result<(HashMap<String, u64>, u64)> {
        use std::io::Write;

        let mut temp = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(temp_path)?;

        let mut header = [0u8; FILE_HEADER_SIZE];
        read_exact_at(&self.file, &mut header, 0)?;
        temp.write_all(&header)?;

        let mut new_index = HashMap::with_capacity(self.index.len());
        let mut new_offset = FILE_HEADER_SIZE as u64;
        let now = now_nanos();
        let mut scratch = Vec::with_capacity(4096);

        for (composite, &old_offset) in &self.index {
            // An unreadable record cannot be carried over; skip it rather
            // than fail the whole compaction.
            let rec = match self.read_record_at(old_offset) {
                Ok(rec) => rec,
                Err(_) => continue,
            };

            if rec.expires_at > 0 && rec.expires_at < now {
                continue;
            }

            scratch.clear();
            rec.encode_into(&mut scratch);
            temp.write_all(&scratch)?;

            new_index.insert(composite.clone(), new_offset);
            new_offset += scratch.len() as u64;
        }

        temp.sync_all()?;
        Ok((new_index, new_offset))
    }
}

/// Overwrites every byte of `path` with CSPRNG output (64 KiB chunks),
/// syncs, and deletes the file. Falls back to a plain delete when the
/// overwrite cannot proceed; a missing file is fine.
fn secure_erase(path: &Path) -> io::Result<()> {
    use std::io::Write;

    let mut file = match OpenOptions::new().write(true).open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(_) => return fs::remove_file(path),
    };

    let size = match file.metadata() {
        Ok(meta) => meta.len(),
        Err(_) => {
            drop(file);
            return fs::remove_file(path);
        }
    };

    let mut chunk = vec![0u8; 64 * 1024];
    crypto::fill_random(&mut chunk);

    let mut written = 0u64;
    while written < size {
        if file.write_all(&chunk).is_err() {
            break;
        }
        written += chunk.len() as u64;
    }

    let _ = file.sync_all();
    drop(file);
    fs::remove_file(path)
}
