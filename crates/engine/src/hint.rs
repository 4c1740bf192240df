//! Hint snapshot: `<db>.hint`, a cache of the index, bloom filter, and
//! last-known-good append offset.
//!
//! The hint is written on close and read on open so a restart can skip
//! rescanning the portion of the log it already covers. It is strictly a
//! cache: a missing, truncated, or garbled hint file is treated as a miss
//! and the index is rebuilt from the log. Compaction deletes the hint
//! because every offset in it goes stale.
//!
//! ## File Format
//!
//! All integers big-endian:
//!
//! ```text
//! [magic "NOKHAL_HINT": 11][append offset: u64]
//! [entry count: u32] then per entry: [key_len: u32][key][offset: u64]
//! [bloom filter, see bloom::BloomFilter::write_to]
//! ```

use bloom::BloomFilter;
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::PathBuf;

use crate::{sibling_path, Core, Result};

/// Magic prefix of the hint file.
pub(crate) const HINT_MAGIC: &[u8; 11] = b"NOKHAL_HINT";

/// Upper bound on the hint's entry count; anything larger is corruption.
const MAX_HINT_ENTRIES: u32 = 1 << 26;

/// Upper bound on one composite key's length inside the hint.
const MAX_HINT_KEY_LEN: u32 = 1 << 20;

impl Core {
    /// The hint file path for this database.
    pub(crate) fn hint_path(&self) -> PathBuf {
        sibling_path(&self.path, ".hint")
    }

    /// Serialises the current offset, index, and bloom filter to the hint
    /// file, replacing whatever was there.
    pub(crate) fn save_hint(&self) -> Result<()> {
        let mut w = BufWriter::new(File::create(self.hint_path())?);

        w.write_all(HINT_MAGIC)?;
        w.write_u64::<BigEndian>(self.offset)?;

        w.write_u32::<BigEndian>(self.index.len() as u32)?;
        for (key, &offset) in &self.index {
            w.write_u32::<BigEndian>(key.len() as u32)?;
            w.write_all(key.as_bytes())?;
            w.write_u64::<BigEndian>(offset)?;
        }

        self.bloom.write_to(&mut w)?;
        w.flush()?;
        Ok(())
    }

    /// Loads the hint file, installing its index and bloom filter and
    /// returning the snapshot's append offset. Any failure is reported as an
    /// `io::Error`; the caller treats it as a cache miss.
    pub(crate) fn load_hint(&mut self) -> io::Result<u64> {
        let mut r = BufReader::new(File::open(self.hint_path())?);

        let mut magic = [0u8; HINT_MAGIC.len()];
        r.read_exact(&mut magic)?;
        if &magic != HINT_MAGIC {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "bad hint magic",
            ));
        }

        let offset = r.read_u64::<BigEndian>()?;

        let count = r.read_u32::<BigEndian>()?;
        if count > MAX_HINT_ENTRIES {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "hint entry count out of range",
            ));
        }

        let mut index = HashMap::with_capacity(count as usize);
        for _ in 0..count {
            let key_len = r.read_u32::<BigEndian>()?;
            if key_len > MAX_HINT_KEY_LEN {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "hint key length out of range",
                ));
            }
            let mut key = vec![0u8; key_len as usize];
            r.read_exact(&mut key)?;
            let key = String::from_utf8(key)
                .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "hint key not UTF-8"))?;
            let entry_offset = r.read_u64::<BigEndian>()?;
            index.insert(key, entry_offset);
        }

        let bloom = BloomFilter::read_from(&mut r)?;

        self.index = index;
        self.bloom = bloom;
        Ok(offset)
    }
}
