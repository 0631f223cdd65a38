//! Index entry representation
//!
//! Each entry in the index records one staged file:
//! - File path (relative to the worktree root, `/`-separated)
//! - Content hash (blob id)
//! - File metadata (mode, size, timestamps)
//!
//! ## Entry Format
//!
//! ```text
//!   0..40   ten big-endian u32 stat fields
//!  40..60   blob id (20 raw bytes)
//!  60..62   flags, holding min(path length, 0xFFF)
//!  62..     path bytes, NUL, zero padding to a multiple of 8
//! ```

use crate::artifacts::index::entry_mode::EntryMode;
use crate::artifacts::objects::object_id::ObjectId;
use crate::errors::Error;
use byteorder::{ByteOrder, WriteBytesExt};
use bytes::Bytes;
use derive_new::new;
use std::cmp::min;
use std::fs::Metadata;
use std::io::Write;
use std::os::unix::prelude::MetadataExt;

/// Largest path length the flags field can record
const MAX_PATH_SIZE: usize = 0xFFF;

/// Block size for entry alignment (8 bytes)
pub const ENTRY_BLOCK: usize = 8;

/// Offset of the path inside an entry
pub const PATH_OFFSET: usize = 62;

/// Minimum size of an index entry in bytes (one-byte path plus NUL)
pub const ENTRY_MIN_SIZE: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct IndexEntry {
    pub path: String,
    pub oid: ObjectId,
    pub metadata: EntryMetadata,
}

/// Stat information recorded next to each staged path
///
/// Only `mode` and `size` are relied upon. Times and device numbers are
/// carried through when known and are zero otherwise.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryMetadata {
    pub ctime: u32,
    pub ctime_nsec: u32,
    pub mtime: u32,
    pub mtime_nsec: u32,
    pub dev: u32,
    pub ino: u32,
    pub mode: EntryMode,
    pub uid: u32,
    pub gid: u32,
    pub size: u32,
}

impl EntryMetadata {
    /// Metadata carrying only the size, as recorded for clones and tests
    pub fn with_size(size: u32) -> Self {
        EntryMetadata {
            size,
            ..Default::default()
        }
    }
}

impl From<&Metadata> for EntryMetadata {
    fn from(metadata: &Metadata) -> Self {
        // Modes other than 100644 are never recorded
        EntryMetadata {
            ctime: metadata.ctime() as u32,
            ctime_nsec: metadata.ctime_nsec() as u32,
            mtime: metadata.mtime() as u32,
            mtime_nsec: metadata.mtime_nsec() as u32,
            dev: metadata.dev() as u32,
            ino: metadata.ino() as u32,
            mode: EntryMode::default(),
            uid: metadata.uid(),
            gid: metadata.gid(),
            size: metadata.size() as u32,
        }
    }
}

impl IndexEntry {
    pub fn basename(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    pub fn serialize(&self) -> anyhow::Result<Bytes> {
        let flags = min(self.path.len(), MAX_PATH_SIZE) as u16;

        let mut entry_bytes = Vec::with_capacity(PATH_OFFSET + self.path.len() + ENTRY_BLOCK);
        for field in [
            self.metadata.ctime,
            self.metadata.ctime_nsec,
            self.metadata.mtime,
            self.metadata.mtime_nsec,
            self.metadata.dev,
            self.metadata.ino,
            self.metadata.mode.as_u32(),
            self.metadata.uid,
            self.metadata.gid,
            self.metadata.size,
        ] {
            entry_bytes.write_u32::<byteorder::NetworkEndian>(field)?;
        }
        self.oid.write_h40_to(&mut entry_bytes)?;
        entry_bytes.write_u16::<byteorder::NetworkEndian>(flags)?;
        entry_bytes.write_all(self.path.as_bytes())?;

        // at least one NUL, then pad to the block size
        entry_bytes.push(0);
        while entry_bytes.len() % ENTRY_BLOCK != 0 {
            entry_bytes.push(0);
        }

        Ok(Bytes::from(entry_bytes))
    }

    pub fn deserialize(bytes: &[u8]) -> anyhow::Result<Self> {
        if bytes.len() < ENTRY_MIN_SIZE {
            return Err(Error::corrupt_index("truncated entry").into());
        }

        let field = |index: usize| byteorder::NetworkEndian::read_u32(&bytes[index * 4..index * 4 + 4]);
        let mode = EntryMode::try_from(field(6))
            .map_err(|err| Error::corrupt_index(err.to_string()))?;

        let oid = ObjectId::read_h40_from(&mut &bytes[40..60])?;

        let path_end = bytes[PATH_OFFSET..]
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| Error::corrupt_index("missing NUL after entry path"))?;
        let path = std::str::from_utf8(&bytes[PATH_OFFSET..PATH_OFFSET + path_end])
            .map_err(|_| Error::corrupt_index("entry path is not valid UTF-8"))?
            .to_string();

        Ok(IndexEntry {
            path,
            oid,
            metadata: EntryMetadata {
                ctime: field(0),
                ctime_nsec: field(1),
                mtime: field(2),
                mtime_nsec: field(3),
                dev: field(4),
                ino: field(5),
                mode,
                uid: field(7),
                gid: field(8),
                size: field(9),
            },
        })
    }
}

impl PartialOrd for IndexEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for IndexEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.path.as_bytes().cmp(other.path.as_bytes())
    }
}
