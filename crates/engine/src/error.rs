//! Error taxonomy exposed at the engine boundary.

use thiserror::Error;

/// Result type alias using the engine [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Every failure mode a caller can observe.
#[derive(Debug, Error)]
pub enum Error {
    /// The key is absent from the database, or its record has expired.
    /// Recoverable — the caller decides what absence means.
    #[error("key not found")]
    NotFound,

    /// A record frame's CRC does not match its contents. The current scan or
    /// point read is aborted; the handle remains usable for other records.
    #[error("checksum mismatch")]
    ChecksumMismatch,

    /// The file header's magic or version is wrong. Fatal for this handle.
    #[error("invalid file format")]
    InvalidFile,

    /// AEAD verification failed on a data record: tampering, or associated
    /// data that no longer matches the frame. Fatal for the request.
    #[error("decryption failed")]
    Decryption,

    /// AEAD verification failed while unwrapping the data key at open —
    /// the supplied password does not match the file. Fatal for open.
    #[error("invalid password")]
    InvalidPassword,

    /// Key derivation or sealing failed inside the crypto layer.
    #[error("crypto error: {0}")]
    Crypto(#[source] crypto::CryptoError),

    /// An operating-system I/O error, propagated as-is.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<record::RecordError> for Error {
    fn from(_: record::RecordError) -> Self {
        // Any codec failure means the frame cannot be trusted.
        Error::ChecksumMismatch
    }
}
