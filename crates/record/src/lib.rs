//! # Record — On-Disk Frame Codec
//!
//! Every mutation (`PUT` or `DELETE`) is serialized into one binary frame and
//! appended to the log file. Frames are self-delimiting: a fixed-size prefix
//! carries the three variable lengths, so a reader can size the remainder of
//! the frame from the prefix alone.
//!
//! ## Binary Frame Format
//!
//! All integers big-endian:
//!
//! ```text
//! [crc32: u32][timestamp: i64][expires_at: i64][flags: u8]
//! [coll_len: u32][key_len: u32][value_len: u32]
//! [op: u8][collection][key][nonce: 12 bytes][value]
//! ```
//!
//! The CRC-32/IEEE covers everything after the CRC word and is written last.
//! `value` holds ciphertext on disk (the AEAD tag included); the codec never
//! looks inside it.
//!
//! ## Example
//!
//! ```rust
//! use record::{Op, Record};
//!
//! let rec = Record {
//!     timestamp: 1,
//!     expires_at: 0,
//!     flags: 0,
//!     collection: b"users".to_vec(),
//!     key: b"alice".to_vec(),
//!     nonce: [0u8; record::NONCE_SIZE],
//!     value: b"ciphertext".to_vec(),
//!     op: Op::Put,
//! };
//! let frame = rec.encode();
//! assert_eq!(Record::decode(&frame).unwrap(), rec);
//! ```

use byteorder::{BigEndian, ByteOrder};
use crc32fast::Hasher as Crc32;
use thiserror::Error;

/// Width of the CRC word at the start of every frame.
pub const CRC_SIZE: usize = 4;

/// Size of the fixed frame prefix: CRC + timestamp + expires_at + flags +
/// three length fields. The op byte and the variable parts follow.
pub const PREFIX_SIZE: usize = CRC_SIZE + 8 + 8 + 1 + 4 + 4 + 4;

/// Width of the op byte.
pub const OP_SIZE: usize = 1;

/// Width of the per-record AEAD nonce stored in the frame.
pub const NONCE_SIZE: usize = 12;

/// Flag bit 0: the value was deflate-compressed before encryption.
pub const FLAG_COMPRESSED: u8 = 0b0000_0001;

/// Upper bound on any single variable-length field. A length above this is
/// treated as corruption rather than an allocation request.
pub const MAX_PART_SIZE: u32 = 64 * 1024 * 1024;

/// Errors produced by the frame codec.
#[derive(Debug, Error)]
pub enum RecordError {
    /// The stored CRC does not match the frame contents.
    #[error("checksum mismatch")]
    ChecksumMismatch,

    /// The buffer ends before the frame does.
    #[error("truncated frame")]
    Truncated,

    /// A length field exceeds [`MAX_PART_SIZE`].
    #[error("frame part too large: {0} bytes")]
    PartTooLarge(u32),

    /// The op byte is neither put nor delete.
    #[error("unknown op code: {0}")]
    UnknownOp(u8),
}

/// Record operation discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Op {
    /// A key-value insertion (or overwrite).
    Put = 0,
    /// A deletion tombstone.
    Delete = 1,
}

impl Op {
    /// Decodes an op byte.
    pub fn from_byte(b: u8) -> Result<Self, RecordError> {
        match b {
            0 => Ok(Op::Put),
            1 => Ok(Op::Delete),
            other => Err(RecordError::UnknownOp(other)),
        }
    }
}

/// One decoded log record. `value` is whatever the frame carried — for live
/// databases that means sealed ciphertext.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Wall-clock write time, nanoseconds since the epoch.
    pub timestamp: i64,
    /// Expiration time in nanoseconds since the epoch; zero means no TTL.
    pub expires_at: i64,
    /// Flag bits; see [`FLAG_COMPRESSED`].
    pub flags: u8,
    /// Collection name bytes.
    pub collection: Vec<u8>,
    /// Key bytes.
    pub key: Vec<u8>,
    /// Per-record AEAD nonce (all zero for tombstones).
    pub nonce: [u8; NONCE_SIZE],
    /// Sealed value bytes, AEAD tag included. Empty for tombstones.
    pub value: Vec<u8>,
    /// Put or delete.
    pub op: Op,
}

/// The decoded fixed prefix of a frame. Lets a reader size the rest of the
/// frame before reading it.
#[derive(Debug, Clone, Copy)]
pub struct FramePrefix {
    pub timestamp: i64,
    pub expires_at: i64,
    pub flags: u8,
    pub collection_len: u32,
    pub key_len: u32,
    pub value_len: u32,
}

impl FramePrefix {
    /// Decodes the fixed prefix from the first [`PREFIX_SIZE`] bytes of a
    /// frame. Validates the length fields, not the CRC — the CRC can only be
    /// checked once the whole frame is in memory.
    pub fn decode(buf: &[u8]) -> Result<Self, RecordError> {
        if buf.len() < PREFIX_SIZE {
            return Err(RecordError::Truncated);
        }
        let prefix = Self {
            timestamp: BigEndian::read_i64(&buf[CRC_SIZE..]),
            expires_at: BigEndian::read_i64(&buf[CRC_SIZE + 8..]),
            flags: buf[CRC_SIZE + 16],
            collection_len: BigEndian::read_u32(&buf[CRC_SIZE + 17..]),
            key_len: BigEndian::read_u32(&buf[CRC_SIZE + 21..]),
            value_len: BigEndian::read_u32(&buf[CRC_SIZE + 25..]),
        };
        for len in [prefix.collection_len, prefix.key_len, prefix.value_len] {
            if len > MAX_PART_SIZE {
                return Err(RecordError::PartTooLarge(len));
            }
        }
        Ok(prefix)
    }

    /// Number of frame bytes following the fixed prefix.
    #[must_use]
    pub fn data_len(&self) -> usize {
        OP_SIZE
            + self.collection_len as usize
            + self.key_len as usize
            + NONCE_SIZE
            + self.value_len as usize
    }

    /// Total frame size including the prefix.
    #[must_use]
    pub fn frame_len(&self) -> usize {
        PREFIX_SIZE + self.data_len()
    }
}

impl Record {
    /// Total encoded size of this record's frame.
    #[must_use]
    pub fn frame_len(&self) -> usize {
        PREFIX_SIZE
            + OP_SIZE
            + self.collection.len()
            + self.key.len()
            + NONCE_SIZE
            + self.value.len()
    }

    /// Encodes the record into a fresh buffer.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.frame_len());
        self.encode_into(&mut buf);
        buf
    }

    /// Appends the encoded frame to `buf`. The CRC is computed over
    /// everything after the CRC word and patched in last.
    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        let start = buf.len();

        // Reserve the CRC word, filled in below.
        buf.extend_from_slice(&[0u8; CRC_SIZE]);

        buf.extend_from_slice(&self.timestamp.to_be_bytes());
        buf.extend_from_slice(&self.expires_at.to_be_bytes());
        buf.push(self.flags);
        buf.extend_from_slice(&(self.collection.len() as u32).to_be_bytes());
        buf.extend_from_slice(&(self.key.len() as u32).to_be_bytes());
        buf.extend_from_slice(&(self.value.len() as u32).to_be_bytes());
        buf.push(self.op as u8);
        buf.extend_from_slice(&self.collection);
        buf.extend_from_slice(&self.key);
        buf.extend_from_slice(&self.nonce);
        buf.extend_from_slice(&self.value);

        let mut hasher = Crc32::new();
        hasher.update(&buf[start + CRC_SIZE..]);
        let crc = hasher.finalize();
        BigEndian::write_u32(&mut buf[start..start + CRC_SIZE], crc);
    }

    /// Decodes one complete frame, validating the CRC first.
    ///
    /// `frame` must contain exactly the frame bytes (as sized by
    /// [`FramePrefix::frame_len`]).
    pub fn decode(frame: &[u8]) -> Result<Self, RecordError> {
        verify_crc(frame)?;

        let prefix = FramePrefix::decode(frame)?;
        if frame.len() < prefix.frame_len() {
            return Err(RecordError::Truncated);
        }

        let mut at = PREFIX_SIZE;
        let op = Op::from_byte(frame[at])?;
        at += OP_SIZE;

        let collection = frame[at..at + prefix.collection_len as usize].to_vec();
        at += prefix.collection_len as usize;

        let key = frame[at..at + prefix.key_len as usize].to_vec();
        at += prefix.key_len as usize;

        let mut nonce = [0u8; NONCE_SIZE];
        nonce.copy_from_slice(&frame[at..at + NONCE_SIZE]);
        at += NONCE_SIZE;

        let value = frame[at..at + prefix.value_len as usize].to_vec();

        Ok(Self {
            timestamp: prefix.timestamp,
            expires_at: prefix.expires_at,
            flags: prefix.flags,
            collection,
            key,
            nonce,
            value,
            op,
        })
    }
}

/// Validates the CRC word of a complete frame against its contents.
pub fn verify_crc(frame: &[u8]) -> Result<(), RecordError> {
    if frame.len() < PREFIX_SIZE + OP_SIZE + NONCE_SIZE {
        return Err(RecordError::Truncated);
    }
    let stored = BigEndian::read_u32(&frame[..CRC_SIZE]);
    let mut hasher = Crc32::new();
    hasher.update(&frame[CRC_SIZE..]);
    if hasher.finalize() != stored {
        return Err(RecordError::ChecksumMismatch);
    }
    Ok(())
}
