//! Pack stream ingestion
//!
//! Layout: `PACK`, a big-endian version (2 or 3), a big-endian object count,
//! the entries, then a SHA-1 of everything before it. Each entry starts with
//! a type and inflated-size varint followed by zlib data; delta entries also
//! carry their base (an offset varint for `OFS_DELTA`, a raw id for
//! `REF_DELTA`) before the compressed delta.

use crate::areas::database::Database;
use crate::artifacts::objects::RAW_OBJECT_ID_LENGTH;
use crate::artifacts::objects::object_type::ObjectType;
use crate::errors::Error;
use byteorder::{ByteOrder, NetworkEndian};
use sha1::{Digest, Sha1};
use std::io::Read;

pub const PACK_SIGNATURE: &[u8; 4] = b"PACK";
const PACK_HEADER_SIZE: usize = 12;
const PACK_CHECKSUM_SIZE: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryKind {
    Commit,
    Tree,
    Blob,
    Tag,
    OfsDelta,
    RefDelta,
}

impl TryFrom<u8> for EntryKind {
    type Error = anyhow::Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(EntryKind::Commit),
            2 => Ok(EntryKind::Tree),
            3 => Ok(EntryKind::Blob),
            4 => Ok(EntryKind::Tag),
            6 => Ok(EntryKind::OfsDelta),
            7 => Ok(EntryKind::RefDelta),
            other => Err(Error::protocol_error(format!("unknown pack entry type {other}")).into()),
        }
    }
}

/// What a pack contained and what was kept from it
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PackSummary {
    pub version: u32,
    pub declared: u32,
    pub stored: u32,
    /// Delta entries consumed without reconstruction
    pub deltas: u32,
    /// Entries of kinds the store does not hold (annotated tags)
    pub skipped: u32,
}

/// Validate a pack and write its full (non-delta) objects into the store
pub fn ingest_pack(data: &[u8], database: &Database) -> anyhow::Result<PackSummary> {
    if data.len() < PACK_HEADER_SIZE + PACK_CHECKSUM_SIZE {
        return Err(Error::protocol_error(format!("pack stream too short ({} bytes)", data.len())).into());
    }
    if &data[..4] != PACK_SIGNATURE {
        return Err(Error::protocol_error("pack stream does not start with PACK").into());
    }

    let version = NetworkEndian::read_u32(&data[4..8]);
    if version != 2 && version != 3 {
        return Err(Error::protocol_error(format!("unsupported pack version {version}")).into());
    }
    let declared = NetworkEndian::read_u32(&data[8..12]);

    let (body, trailer) = data.split_at(data.len() - PACK_CHECKSUM_SIZE);
    if Sha1::digest(body).as_slice() != trailer {
        return Err(Error::protocol_error("pack checksum mismatch").into());
    }

    let mut summary = PackSummary {
        version,
        declared,
        ..PackSummary::default()
    };
    let mut pos = PACK_HEADER_SIZE;

    for index in 0..declared {
        let (kind, size, header_len) = read_entry_header(&body[pos..])
            .map_err(|err| err.context(format!("pack entry {index} at offset {pos}")))?;
        pos += header_len;

        match kind {
            EntryKind::OfsDelta => pos += read_offset_varint(&body[pos..])?,
            EntryKind::RefDelta => {
                if body.len() < pos + RAW_OBJECT_ID_LENGTH {
                    return Err(Error::protocol_error("truncated REF_DELTA base id").into());
                }
                pos += RAW_OBJECT_ID_LENGTH;
            }
            _ => {}
        }

        let (content, consumed) = inflate(&body[pos..], size)
            .map_err(|err| err.context(format!("pack entry {index} at offset {pos}")))?;
        pos += consumed;

        let object_type = match kind {
            EntryKind::Commit => ObjectType::Commit,
            EntryKind::Tree => ObjectType::Tree,
            EntryKind::Blob => ObjectType::Blob,
            EntryKind::Tag => {
                summary.skipped += 1;
                continue;
            }
            EntryKind::OfsDelta | EntryKind::RefDelta => {
                summary.deltas += 1;
                continue;
            }
        };

        database.write(object_type, &content)?;
        summary.stored += 1;
    }

    if pos != body.len() {
        return Err(Error::protocol_error(format!(
            "{} unexpected bytes after the last pack entry",
            body.len() - pos
        ))
        .into());
    }

    tracing::info!(
        version,
        declared,
        stored = summary.stored,
        deltas = summary.deltas,
        skipped = summary.skipped,
        "pack ingested"
    );

    Ok(summary)
}

/// Type and inflated size; low four size bits share the first byte with the type
fn read_entry_header(data: &[u8]) -> anyhow::Result<(EntryKind, usize, usize)> {
    let truncated = || Error::protocol_error("truncated pack entry header");

    let first = *data.first().ok_or_else(truncated)?;
    let kind = EntryKind::try_from((first >> 4) & 0x07)?;
    let mut size = (first & 0x0f) as usize;
    let mut shift = 4;
    let mut len = 1;
    let mut byte = first;

    while byte & 0x80 != 0 {
        byte = *data.get(len).ok_or_else(truncated)?;
        if shift > usize::BITS - 7 {
            return Err(Error::protocol_error("pack entry size overflows").into());
        }
        size |= ((byte & 0x7f) as usize) << shift;
        shift += 7;
        len += 1;
    }

    Ok((kind, size, len))
}

/// Length of an `OFS_DELTA` base offset; each continuation adds one before shifting
fn read_offset_varint(data: &[u8]) -> anyhow::Result<usize> {
    let truncated = || Error::protocol_error("truncated OFS_DELTA offset");

    let mut byte = *data.first().ok_or_else(truncated)?;
    let mut offset = (byte & 0x7f) as u64;
    let mut len = 1;

    while byte & 0x80 != 0 {
        byte = *data.get(len).ok_or_else(truncated)?;
        offset = offset
            .checked_add(1)
            .and_then(|offset| offset.checked_mul(1 << 7))
            .ok_or_else(|| Error::protocol_error("OFS_DELTA offset overflows"))?
            | (byte & 0x7f) as u64;
        len += 1;
    }
    tracing::trace!(offset, "skipping OFS_DELTA base");

    Ok(len)
}

/// Inflate one zlib stream from the front of `data`, returning it and the compressed length
fn inflate(data: &[u8], expected_size: usize) -> anyhow::Result<(Vec<u8>, usize)> {
    let mut decoder = flate2::bufread::ZlibDecoder::new(data);
    let mut content = Vec::new();
    // one byte past the declared size is enough to detect a mismatch
    (&mut decoder)
        .take(expected_size as u64 + 1)
        .read_to_end(&mut content)
        .map_err(|err| Error::protocol_error(format!("corrupt zlib data in pack: {err}")))?;

    if content.len() != expected_size {
        return Err(Error::protocol_error(format!(
            "pack entry inflated to {} bytes, header declared {expected_size}",
            content.len()
        ))
        .into());
    }

    Ok((content, decoder.total_in() as usize))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::objects::object::hash_object;
    use crate::artifacts::objects::object_id::ObjectId;
    use flate2::write::ZlibEncoder;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    fn entry_header(kind: u8, mut size: usize) -> Vec<u8> {
        let mut header = vec![(kind << 4) | (size & 0x0f) as u8];
        size >>= 4;
        while size > 0 {
            if let Some(last) = header.last_mut() {
                *last |= 0x80;
            }
            header.push((size & 0x7f) as u8);
            size >>= 7;
        }
        header
    }

    fn deflate(data: &[u8]) -> Vec<u8> {
        let mut encoder = ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn build_pack(entries: &[Vec<u8>]) -> Vec<u8> {
        let mut pack = PACK_SIGNATURE.to_vec();
        pack.extend_from_slice(&2u32.to_be_bytes());
        pack.extend_from_slice(&(entries.len() as u32).to_be_bytes());
        for entry in entries {
            pack.extend_from_slice(entry);
        }
        let checksum = Sha1::digest(&pack);
        pack.extend_from_slice(&checksum);
        pack
    }

    fn full_entry(kind: u8, content: &[u8]) -> Vec<u8> {
        let mut entry = entry_header(kind, content.len());
        entry.extend(deflate(content));
        entry
    }

    fn database() -> (assert_fs::TempDir, Database) {
        let dir = assert_fs::TempDir::new().unwrap();
        let database = Database::new(dir.path().join("objects").into_boxed_path());
        (dir, database)
    }

    #[test]
    fn full_objects_are_stored_and_deltas_counted() {
        let (_dir, database) = database();
        let large = "x".repeat(300);

        let mut ref_delta = entry_header(7, 3);
        ref_delta.extend_from_slice(&[0u8; 20]);
        ref_delta.extend(deflate(b"abc"));

        let mut ofs_delta = entry_header(6, 2);
        ofs_delta.extend_from_slice(&[0x81, 0x05]);
        ofs_delta.extend(deflate(b"de"));

        let pack = build_pack(&[
            full_entry(3, b"hello"),
            full_entry(3, large.as_bytes()),
            ref_delta,
            ofs_delta,
            full_entry(4, b"object 0000\n"),
        ]);

        let summary = ingest_pack(&pack, &database).unwrap();

        assert_eq!(
            summary,
            PackSummary {
                version: 2,
                declared: 5,
                stored: 2,
                deltas: 2,
                skipped: 1,
            }
        );
        let hello = ObjectId::try_parse("b6fc4c620b67d95f953a5c1c1230aaab5db5a1b0".into()).unwrap();
        assert!(database.exists(&hello));
        assert!(database.exists(&hash_object(ObjectType::Blob, large.as_bytes()).unwrap()));
    }

    #[test]
    fn empty_pack_is_valid() {
        let (_dir, database) = database();

        let summary = ingest_pack(&build_pack(&[]), &database).unwrap();

        assert_eq!(summary.declared, 0);
        assert_eq!(summary.stored, 0);
    }

    #[test]
    fn bad_signature_version_and_checksum_are_rejected() {
        let (_dir, database) = database();
        let valid = build_pack(&[full_entry(3, b"hello")]);

        let mut bad_magic = valid.clone();
        bad_magic[0] = b'K';
        let mut bad_version = build_pack(&[]);
        bad_version[7] = 9;
        let mut bad_checksum = valid.clone();
        let last = bad_checksum.len() - 1;
        bad_checksum[last] ^= 0xff;

        for pack in [bad_magic, bad_version, bad_checksum, b"PACK".to_vec()] {
            let err = ingest_pack(&pack, &database).unwrap_err();
            assert!(matches!(
                err.downcast_ref::<Error>(),
                Some(Error::ProtocolError { .. })
            ));
        }
    }

    #[test]
    fn declared_count_must_match_entries() {
        let (_dir, database) = database();
        let mut pack = PACK_SIGNATURE.to_vec();
        pack.extend_from_slice(&2u32.to_be_bytes());
        pack.extend_from_slice(&2u32.to_be_bytes());
        pack.extend(full_entry(3, b"only one"));
        let checksum = Sha1::digest(&pack);
        pack.extend_from_slice(&checksum);

        assert!(ingest_pack(&pack, &database).is_err());
    }

    fn is_protocol_error(err: &anyhow::Error) -> bool {
        matches!(
            err.downcast_ref::<Error>(),
            Some(Error::ProtocolError { .. })
        )
    }

    #[test]
    fn overlong_size_varint_is_rejected() {
        let (_dir, database) = database();
        let mut entry = vec![0xb0];
        entry.extend_from_slice(&[0x81; 12]);
        entry.push(0x01);
        entry.extend(deflate(b"x"));

        let err = ingest_pack(&build_pack(&[entry]), &database).unwrap_err();

        assert!(is_protocol_error(&err));
    }

    #[test]
    fn huge_declared_size_is_rejected_without_allocating_it() {
        let (_dir, database) = database();
        let mut entry = vec![0xb0, 0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x7f];
        entry.extend(deflate(b"tiny"));

        let err = ingest_pack(&build_pack(&[entry]), &database).unwrap_err();

        assert!(is_protocol_error(&err));
        assert!(err.root_cause().to_string().contains("inflated to 4 bytes"));
    }

    #[test]
    fn overlong_delta_offset_is_rejected() {
        let (_dir, database) = database();
        let mut entry = entry_header(6, 1);
        entry.extend_from_slice(&[0xff; 12]);
        entry.push(0x01);
        entry.extend(deflate(b"d"));

        let err = ingest_pack(&build_pack(&[entry]), &database).unwrap_err();

        assert!(is_protocol_error(&err));
    }

    #[test]
    fn size_mismatch_is_rejected() {
        let (_dir, database) = database();
        let mut entry = entry_header(3, 10);
        entry.extend(deflate(b"short"));

        let err = ingest_pack(&build_pack(&[entry]), &database).unwrap_err();

        assert!(err.root_cause().to_string().contains("declared 10"));
    }
}
