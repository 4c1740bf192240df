//! # Engine — Nokhal Storage Engine
//!
//! An embedded, single-file, password-protected key-value store. Values are
//! opaque bytes addressed by a `(collection, key)` pair, persisted to one
//! append-only log, and encrypted at rest with a two-level key hierarchy.
//!
//! ## Architecture
//!
//! ```text
//! Caller
//!   |
//!   v
//! ┌──────────────────────────────────────────────────┐
//! │                 Db (RwLock<Core>)                │
//! │                                                  │
//! │ write.rs → seal value → append frame → index     │
//! │ read.rs  → bloom → index → read_at → open value  │
//! │ scan.rs  → stream whole log, reduce per key      │
//! │ batch.rs → stage, one write + one fsync          │
//! │ compaction.rs → rewrite live records,            │
//! │                 secure-erase the old file        │
//! │ recovery.rs → hint snapshot, tail scan on open   │
//! └──────────────────────────────────────────────────┘
//! ```
//!
//! ## On-Disk Layout
//!
//! One file: a 99-byte envelope header followed by record frames.
//!
//! ```text
//! [magic "NOKHAL": 6][version = 4: 1][salt: 32][kek nonce: 12][sealed DEK: 48]
//! [frame][frame][frame]...
//! ```
//!
//! The DEK (data-encryption key) is sealed under a KEK derived from the
//! password with Argon2id. Every record value is sealed under the DEK with
//! associated data binding the record to its composite key and timestamp, so
//! frames cannot be swapped between keys without detection.
//!
//! ## Module Responsibilities
//!
//! | Module          | Purpose                                            |
//! |-----------------|----------------------------------------------------|
//! | [`lib.rs`]      | `Db` handle, envelope header, create/open/close    |
//! | [`write`]       | `put()`, `put_with_ttl()`, `delete()`              |
//! | [`read`]        | `get()`, `list()`, random frame reads              |
//! | [`scan`]        | `scan_prefix()`, `filter()`, `filter_prefix()`     |
//! | [`iter`]        | sorted index-snapshot iterator                     |
//! | [`batch`]       | staged writes, atomic single-fsync commit          |
//! | [`compaction`]  | live-record rewrite + secure erase of the old file |
//! | [`hint`]        | index/bloom snapshot sibling file                  |
//! | [`recovery`]    | index rebuild on open (hint + tail scan)           |
//!
//! ## Concurrency
//!
//! One `parking_lot::RwLock` guards the mutable core (file, append offset,
//! index, bloom). Readers share, writers exclude, nothing runs in the
//! background. A reader observes the state before or after a writer's
//! commit, never in between.
//!
//! ## Caveat
//!
//! The composite key is `collection:key` and the `:` delimiter is not
//! escaped — collection names must not contain `:` or two distinct pairs can
//! collide on the same composite key.

mod batch;
mod compaction;
mod error;
mod hint;
mod iter;
mod read;
mod recovery;
mod scan;
mod write;

pub use batch::Batch;
pub use error::{Error, Result};
pub use iter::Iter;
pub use scan::Entry;

use bloom::BloomFilter;
use crypto::{Sealer, KEY_SIZE, NONCE_SIZE, SALT_SIZE, TAG_SIZE};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::ffi::OsString;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::info;

/// File magic, the first six bytes of every database file.
pub const MAGIC: &[u8; 6] = b"NOKHAL";

/// Current on-disk format version. Older versions are rejected.
pub const VERSION: u8 = 4;

/// Size of the sealed DEK in the header: 32-byte key + 16-byte AEAD tag.
const SEALED_DEK_SIZE: usize = KEY_SIZE + TAG_SIZE;

/// Total size of the envelope header:
/// magic(6) + version(1) + salt(32) + KEK nonce(12) + sealed DEK(48) = 99.
pub const FILE_HEADER_SIZE: usize = MAGIC.len() + 1 + SALT_SIZE + NONCE_SIZE + SEALED_DEK_SIZE;

/// Associated data binding the sealed DEK to its purpose.
const DEK_AAD: &[u8] = b"NOKHAL_DEK";

/// Values longer than this are candidates for deflate compression.
pub(crate) const COMPRESSION_THRESHOLD: usize = 128;

/// The database handle. Cheap to share by reference across threads; all
/// operations take `&self` and synchronize internally.
pub struct Db {
    pub(crate) core: RwLock<Core>,
}

/// Everything the readers-writer lock protects.
pub(crate) struct Core {
    pub(crate) file: File,
    pub(crate) path: PathBuf,
    /// Next append position; equals the file size at quiescence.
    pub(crate) offset: u64,
    /// composite key → absolute offset of the latest put frame for that key.
    pub(crate) index: HashMap<String, u64>,
    pub(crate) bloom: BloomFilter,
    /// Data AEAD, keyed by the DEK.
    pub(crate) sealer: Sealer,
    /// Reusable frame-encode buffer for the write path.
    pub(crate) scratch: Vec<u8>,
    /// Set once `close` has written the hint, so `Drop` does not redo it.
    pub(crate) hint_saved: bool,
}

impl Db {
    /// Opens the database at `path`, creating it if it does not exist (or is
    /// empty). The password both derives the KEK for new files and unwraps
    /// the DEK of existing ones.
    ///
    /// # Errors
    ///
    /// * [`Error::InvalidFile`] — the file exists but its magic or version
    ///   does not match.
    /// * [`Error::InvalidPassword`] — the password does not unwrap the DEK.
    /// * [`Error::ChecksumMismatch`] — a complete frame failed its CRC while
    ///   the index was being rebuilt.
    pub fn open<P: AsRef<Path>>(path: P, password: &str) -> Result<Db> {
        let path = path.as_ref().to_path_buf();

        let existing_len = match std::fs::metadata(&path) {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => 0,
            Err(e) => return Err(e.into()),
        };

        let file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&path)?;

        let core = if existing_len == 0 {
            Core::create(file, path, password)?
        } else {
            Core::open_existing(file, path, password)?
        };

        Ok(Db {
            core: RwLock::new(core),
        })
    }

    /// Closes the database, writing the hint snapshot so the next open can
    /// skip rescanning the log.
    pub fn close(self) -> Result<()> {
        let mut core = self.core.into_inner();
        core.save_hint()?;
        core.hint_saved = true;
        Ok(())
    }

    /// Number of live keys in the index.
    #[must_use]
    pub fn len(&self) -> usize {
        self.core.read().index.len()
    }

    /// Returns `true` when no live keys exist.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The canonical path of the database file.
    #[must_use]
    pub fn path(&self) -> PathBuf {
        self.core.read().path.clone()
    }
}

impl std::fmt::Debug for Db {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let core = self.core.read();
        f.debug_struct("Db")
            .field("path", &core.path)
            .field("offset", &core.offset)
            .field("live_keys", &core.index.len())
            .finish()
    }
}

impl Core {
    /// Initialises a brand-new database file: generates the salt and DEK,
    /// wraps the DEK under the password-derived KEK, and writes the header.
    fn create(mut file: File, path: PathBuf, password: &str) -> Result<Core> {
        use std::io::Write;

        let salt = crypto::generate_salt();
        let kek = crypto::derive_key(password, &salt).map_err(Error::Crypto)?;

        let dek = crypto::generate_key();
        let kek_nonce = crypto::generate_nonce();
        let sealed_dek = Sealer::new(&kek)
            .seal(&kek_nonce, &dek, DEK_AAD)
            .map_err(Error::Crypto)?;

        let mut header = Vec::with_capacity(FILE_HEADER_SIZE);
        header.extend_from_slice(MAGIC);
        header.push(VERSION);
        header.extend_from_slice(&salt);
        header.extend_from_slice(&kek_nonce);
        header.extend_from_slice(&sealed_dek);
        debug_assert_eq!(header.len(), FILE_HEADER_SIZE);

        file.write_all(&header)?;

        info!(path = %path.display(), "created database");

        Ok(Core {
            file,
            path,
            offset: FILE_HEADER_SIZE as u64,
            index: HashMap::new(),
            bloom: BloomFilter::default(),
            sealer: Sealer::new(&dek),
            scratch: Vec::with_capacity(4096),
            hint_saved: false,
        })
    }

    /// Opens an existing file: validates the envelope, unwraps the DEK with
    /// the supplied password, and rebuilds the in-memory index.
    fn open_existing(file: File, path: PathBuf, password: &str) -> Result<Core> {
        let mut header = [0u8; FILE_HEADER_SIZE];
        read_exact_at(&file, &mut header, 0).map_err(|e| {
            // A file too short to hold the envelope is not a database.
            if e.kind() == io::ErrorKind::UnexpectedEof {
                Error::InvalidFile
            } else {
                Error::Io(e)
            }
        })?;

        if &header[..MAGIC.len()] != MAGIC {
            return Err(Error::InvalidFile);
        }
        if header[MAGIC.len()] != VERSION {
            return Err(Error::InvalidFile);
        }

        let mut at = MAGIC.len() + 1;
        let mut salt = [0u8; SALT_SIZE];
        salt.copy_from_slice(&header[at..at + SALT_SIZE]);
        at += SALT_SIZE;
        let mut kek_nonce = [0u8; NONCE_SIZE];
        kek_nonce.copy_from_slice(&header[at..at + NONCE_SIZE]);
        at += NONCE_SIZE;
        let sealed_dek = &header[at..at + SEALED_DEK_SIZE];

        let kek = crypto::derive_key(password, &salt).map_err(Error::Crypto)?;
        let dek_bytes = Sealer::new(&kek)
            .open(&kek_nonce, sealed_dek, DEK_AAD)
            .map_err(|_| Error::InvalidPassword)?;
        let mut dek = [0u8; KEY_SIZE];
        dek.copy_from_slice(&dek_bytes);

        let mut core = Core {
            file,
            path,
            offset: FILE_HEADER_SIZE as u64,
            index: HashMap::new(),
            bloom: BloomFilter::default(),
            sealer: Sealer::new(&dek),
            scratch: Vec::with_capacity(4096),
            hint_saved: false,
        };

        core.rebuild_index()?;

        info!(
            path = %core.path.display(),
            live_keys = core.index.len(),
            "opened database"
        );

        Ok(core)
    }
}

/// Best-effort hint snapshot on drop, so a handle that was not explicitly
/// closed still leaves a usable snapshot behind. Errors are ignored — the
/// hint is a cache and the log remains the source of truth.
impl Drop for Core {
    fn drop(&mut self) {
        if !self.hint_saved {
            let _ = self.save_hint();
        }
    }
}

// ---- Composite keys and associated data ----

/// Joins a collection and key into the composite index key.
pub(crate) fn composite_key(collection: &str, key: &str) -> String {
    let mut s = String::with_capacity(collection.len() + 1 + key.len());
    s.push_str(collection);
    s.push(':');
    s.push_str(key);
    s
}

/// Splits a composite key back into `(collection, key)` at the first `:`.
/// A composite with no delimiter is treated as a bare key.
#[must_use]
pub fn split_key(full: &str) -> (&str, &str) {
    match full.split_once(':') {
        Some((collection, key)) => (collection, key),
        None => ("", full),
    }
}

/// Builds the associated data that binds a sealed value to its record:
/// `collection ":" key big_endian_u64(timestamp)`.
pub(crate) fn record_aad(collection: &[u8], key: &[u8], timestamp: i64) -> Vec<u8> {
    let mut aad = Vec::with_capacity(collection.len() + 1 + key.len() + 8);
    aad.extend_from_slice(collection);
    aad.push(b':');
    aad.extend_from_slice(key);
    aad.extend_from_slice(&(timestamp as u64).to_be_bytes());
    aad
}

/// Current wall-clock time in nanoseconds since the epoch.
pub(crate) fn now_nanos() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as i64)
        .unwrap_or(0)
}

/// Builds a sibling path by appending `suffix` to the full file name
/// (`db` → `db.hint`, not `db` with its extension replaced).
pub(crate) fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    let mut os: OsString = path.as_os_str().to_owned();
    os.push(suffix);
    PathBuf::from(os)
}

// ---- Value compression ----

/// Deflate-compresses `data` at the fastest level.
pub(crate) fn compress(data: &[u8]) -> io::Result<Vec<u8>> {
    use flate2::write::DeflateEncoder;
    use flate2::Compression;
    use std::io::Write;

    let mut enc = DeflateEncoder::new(Vec::new(), Compression::fast());
    enc.write_all(data)?;
    enc.finish()
}

/// Inflates a deflate-compressed value.
pub(crate) fn decompress(data: &[u8]) -> io::Result<Vec<u8>> {
    use flate2::read::DeflateDecoder;
    use std::io::Read;

    let mut out = Vec::with_capacity(data.len() * 2);
    DeflateDecoder::new(data).read_to_end(&mut out)?;
    Ok(out)
}

// ---- Positioned reads ----

/// Reads `buf.len()` bytes at `offset` without moving the file cursor, so
/// concurrent readers never race on a shared seek position.
#[cfg(unix)]
pub(crate) fn read_exact_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.read_exact_at(buf, offset)
}

#[cfg(windows)]
pub(crate) fn read_exact_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<()> {
    use std::os::windows::fs::FileExt;
    let mut read = 0usize;
    while read < buf.len() {
        let n = file.seek_read(&mut buf[read..], offset + read as u64)?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "short read past end of file",
            ));
        }
        read += n;
    }
    Ok(())
}

#[cfg(test)]
mod tests;
