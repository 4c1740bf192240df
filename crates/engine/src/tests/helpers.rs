use crate::Db;
use std::path::PathBuf;
use tempfile::TempDir;

pub const PASSWORD: &str = "correct horse battery staple";

pub fn db_path(dir: &TempDir) -> PathBuf {
    dir.path().join("nokhal.db")
}

pub fn open_db(dir: &TempDir) -> Db {
    Db::open(db_path(dir), PASSWORD).unwrap()
}

/// Flips one byte of the database file at `offset`.
pub fn corrupt_byte(dir: &TempDir, offset: u64) {
    use std::fs::OpenOptions;
    use std::io::{Seek, SeekFrom, Write};

    let mut f = OpenOptions::new()
        .read(true)
        .write(true)
        .open(db_path(dir))
        .unwrap();
    f.seek(SeekFrom::Start(offset)).unwrap();
    let mut b = [0u8; 1];
    {
        use std::io::Read;
        f.read_exact(&mut b).unwrap();
    }
    f.seek(SeekFrom::Start(offset)).unwrap();
    f.write_all(&[b[0] ^ 0xFF]).unwrap();
}
