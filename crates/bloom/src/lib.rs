//! # Bloom Filter
//!
//! A space-efficient probabilistic set used to short-circuit point lookups.
//!
//! The filter can say with certainty that a key was **never** inserted (no
//! false negatives), but may occasionally claim membership for a key that was
//! not (false positives). Nokhal checks the filter before touching the index
//! or the log file — a negative answer ends a `get` without any I/O.
//!
//! ## Design
//!
//! A fixed-size bit array with a single FNV-1a 32-bit hash projecting each
//! key onto one bit. Insertions are permanent: deleting a key from the
//! database does not clear its bit, so a deleted key may still cost an index
//! probe. That is the accepted trade-off for a filter this cheap.
//!
//! ## Example
//!
//! ```rust
//! use bloom::BloomFilter;
//!
//! let mut bf = BloomFilter::default();
//! bf.insert(b"users:alice");
//! assert!(bf.may_contain(b"users:alice"));
//! ```

use std::io::{self, Read, Write};

/// Default filter size in bits.
pub const DEFAULT_BITS: u32 = 100_000;

/// A bloom filter backed by a bit vector with one FNV-1a hash function.
pub struct BloomFilter {
    /// The bit vector storing the filter state.
    bits: Vec<u8>,
    /// Number of addressable bits.
    num_bits: u32,
}

impl Default for BloomFilter {
    fn default() -> Self {
        Self::new(DEFAULT_BITS)
    }
}

impl BloomFilter {
    /// Creates a filter with `num_bits` addressable bits.
    ///
    /// # Panics
    ///
    /// Panics if `num_bits` is 0.
    pub fn new(num_bits: u32) -> Self {
        assert!(num_bits > 0, "num_bits must be > 0");
        let byte_len = ((num_bits as usize) + 7) / 8;
        Self {
            bits: vec![0u8; byte_len],
            num_bits,
        }
    }

    /// Creates a filter from raw parts (used during deserialization).
    fn from_raw(bits: Vec<u8>, num_bits: u32) -> Self {
        Self { bits, num_bits }
    }

    /// Marks a key as present. Permanent — there is no removal.
    pub fn insert(&mut self, key: &[u8]) {
        let idx = fnv1a_32(key) % self.num_bits;
        self.set_bit(idx);
    }

    /// Returns `true` if the key **might** have been inserted, `false` if it
    /// **definitely** was not.
    #[must_use]
    pub fn may_contain(&self, key: &[u8]) -> bool {
        let idx = fnv1a_32(key) % self.num_bits;
        self.get_bit(idx)
    }

    /// Returns the number of addressable bits.
    #[must_use]
    pub fn num_bits(&self) -> u32 {
        self.num_bits
    }

    /// Serializes the filter to a writer.
    ///
    /// Wire format (big-endian, like every other nokhal on-disk structure):
    /// ```text
    /// [num_bits: u32][bits_len: u32][bits: bytes]
    /// ```
    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(&self.num_bits.to_be_bytes())?;
        w.write_all(&(self.bits.len() as u32).to_be_bytes())?;
        w.write_all(&self.bits)?;
        Ok(())
    }

    /// Deserializes a filter from a reader.
    pub fn read_from<R: Read>(r: &mut R) -> io::Result<Self> {
        let mut buf4 = [0u8; 4];

        r.read_exact(&mut buf4)?;
        let num_bits = u32::from_be_bytes(buf4);

        r.read_exact(&mut buf4)?;
        let bits_len = u32::from_be_bytes(buf4) as usize;

        // Safety cap: a serialized filter should never exceed 16 MiB.
        const MAX_BLOOM_BYTES: usize = 16 * 1024 * 1024;
        if bits_len > MAX_BLOOM_BYTES {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("bloom filter too large: {} bytes", bits_len),
            ));
        }
        if num_bits == 0 || bits_len != ((num_bits as usize) + 7) / 8 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "bloom filter size fields disagree",
            ));
        }

        let mut bits = vec![0u8; bits_len];
        r.read_exact(&mut bits)?;

        Ok(Self::from_raw(bits, num_bits))
    }

    // ---- Internal helpers ----

    fn set_bit(&mut self, idx: u32) {
        let byte_idx = (idx / 8) as usize;
        let bit_offset = (idx % 8) as u8;
        self.bits[byte_idx] |= 1 << bit_offset;
    }

    fn get_bit(&self, idx: u32) -> bool {
        let byte_idx = (idx / 8) as usize;
        let bit_offset = (idx % 8) as u8;
        (self.bits[byte_idx] >> bit_offset) & 1 == 1
    }
}

impl std::fmt::Debug for BloomFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BloomFilter")
            .field("num_bits", &self.num_bits)
            .field("bytes", &self.bits.len())
            .finish()
    }
}

/// FNV-1a 32-bit hash.
fn fnv1a_32(data: &[u8]) -> u32 {
    const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
    const FNV_PRIME: u32 = 0x0100_0193;
    let mut hash = FNV_OFFSET_BASIS;
    for &byte in data {
        hash ^= byte as u32;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

#[cfg(test)]
mod tests;
