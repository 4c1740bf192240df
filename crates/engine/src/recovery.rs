//! Index rebuild on open.
//!
//! The rebuild first tries the hint snapshot; when present and intact, the
//! scan starts at the hint's offset instead of the first frame. The
//! remaining log tail is then replayed frame by frame, applying puts and
//! tombstones to the index and bloom filter.
//!
//! A clean EOF or a short read ends the scan — a torn final frame from a
//! crash costs only that frame. A CRC mismatch on a fully readable frame is
//! real corruption and fails the open: frames past it cannot be trusted.

use bloom::BloomFilter;
use record::Op;
use std::collections::HashMap;
use std::io;
use tracing::{debug, warn};

use crate::{Core, Error, Result, FILE_HEADER_SIZE};

impl Core {
    /// Rebuilds the in-memory index and bloom filter from the hint snapshot
    /// plus the uncovered log tail, leaving `offset` at the end of the last
    /// complete frame.
    pub(crate) fn rebuild_index(&mut self) -> Result<()> {
        match self.load_hint() {
            Ok(snapshot_offset) => {
                self.offset = snapshot_offset;
                debug!(
                    offset = snapshot_offset,
                    entries = self.index.len(),
                    "loaded index hint"
                );
            }
            Err(e) => {
                if e.kind() != io::ErrorKind::NotFound {
                    warn!(error = %e, "discarding unreadable hint, rescanning log");
                }
                self.offset = FILE_HEADER_SIZE as u64;
                self.index = HashMap::new();
                self.bloom = BloomFilter::default();
            }
        }

        let file_size = self.file.metadata()?.len();
        let mut offset = self.offset;

        while offset < file_size {
            let (rec, frame_len) = match self.read_frame_at(offset) {
                Ok(frame) => frame,
                // Torn tail: the final frame was never completely written.
                Err(Error::Io(e)) if e.kind() == io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e),
            };

            let composite = format!(
                "{}:{}",
                String::from_utf8_lossy(&rec.collection),
                String::from_utf8_lossy(&rec.key)
            );
            match rec.op {
                Op::Put => {
                    self.index.insert(composite.clone(), offset);
                    self.bloom.insert(composite.as_bytes());
                }
                Op::Delete => {
                    // The bloom filter cannot forget; only the index does.
                    self.index.remove(&composite);
                }
            }

            offset += frame_len;
        }

        // Drop a torn tail so the append offset equals the file size again;
        // an append must never land after half a frame.
        if offset < file_size {
            warn!(
                torn_bytes = file_size - offset,
                "truncating incomplete tail frame"
            );
            self.file.set_len(offset)?;
        }

        self.offset = offset;
        Ok(())
    }
}
