//! Sorted iteration over a snapshot of the index.
//!
//! Construction copies the matching composite keys out of the index under
//! the shared lock and sorts them; iteration itself holds no lock. `value()`
//! is a point get against the live database, so a key returned by `next()`
//! may have been deleted or overwritten in the meantime — the iterator
//! surfaces [`Error::NotFound`](crate::Error::NotFound) then, rather than
//! repairing its snapshot.

use crate::{split_key, Db, Error, Result};

/// Cursor over the composite keys matching a prefix, in lexicographic order.
pub struct Iter<'db> {
    db: &'db Db,
    keys: Vec<String>,
    /// Index of the next key `next()` will move to.
    pos: usize,
    /// Index of the current key, once `next()` has succeeded.
    current: Option<usize>,
}

impl Db {
    /// Creates an iterator over the composite keys starting with `prefix`,
    /// sorted lexicographically. The key set is a snapshot; later writes do
    /// not change it.
    pub fn iter(&self, prefix: &str) -> Iter<'_> {
        let core = self.core.read();
        let mut keys: Vec<String> = core
            .index
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort_unstable();

        Iter {
            db: self,
            keys,
            pos: 0,
            current: None,
        }
    }
}

impl Iter<'_> {
    /// Advances to the next key. Returns `false` once the snapshot is
    /// exhausted (and stays `false`).
    pub fn next(&mut self) -> bool {
        if self.pos < self.keys.len() {
            self.current = Some(self.pos);
            self.pos += 1;
            true
        } else {
            self.current = None;
            false
        }
    }

    /// The current composite key, or `None` before the first `next()` /
    /// after exhaustion.
    #[must_use]
    pub fn key(&self) -> Option<&str> {
        self.current.map(|i| self.keys[i].as_str())
    }

    /// Reads the current key's value from the live database. May observe
    /// concurrent deletion or expiry as [`Error::NotFound`].
    pub fn value(&self) -> Result<Vec<u8>> {
        let composite = self.key().ok_or(Error::NotFound)?;
        let (collection, key) = split_key(composite);
        self.db.get(collection, key)
    }

    /// Releases the snapshot.
    pub fn close(self) {}
}
