//! Object store
//!
//! Objects live under `objects/<id[0..2]>/<id[2..]>`, each one the zlib
//! compressed form of `<kind> <len>\0<payload>`. An object file is written at
//! most once: if its path already exists the write is skipped, otherwise the
//! content goes to a temporary file in the same directory and is renamed into
//! place.

use crate::artifacts::objects::blob::Blob;
use crate::artifacts::objects::commit::Commit;
use crate::artifacts::objects::object::{
    Object, ObjectBox, RawObject, Unpackable, frame, hash_object,
};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::artifacts::objects::tree::Tree;
use crate::errors::Error;
use anyhow::Context;
use bytes::Bytes;
use fake::rand;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct Database {
    path: Box<Path>,
}

impl Database {
    pub fn new(path: Box<Path>) -> Self {
        Database { path }
    }

    pub fn objects_path(&self) -> &Path {
        &self.path
    }

    /// Compute the id of a payload without writing anything
    pub fn hash(&self, object_type: ObjectType, payload: &[u8]) -> anyhow::Result<ObjectId> {
        hash_object(object_type, payload)
    }

    pub fn exists(&self, object_id: &ObjectId) -> bool {
        self.path.join(object_id.to_path()).exists()
    }

    /// Write a payload of the given kind, returning its id
    pub fn write(&self, object_type: ObjectType, payload: &[u8]) -> anyhow::Result<ObjectId> {
        let object_id = hash_object(object_type, payload)?;
        let object_path = self.path.join(object_id.to_path());

        if object_path.exists() {
            tracing::debug!(oid = %object_id, kind = %object_type, "object already stored");
            return Ok(object_id);
        }

        std::fs::create_dir_all(
            object_path
                .parent()
                .context(format!("Invalid object path {}", object_path.display()))?,
        )
        .context(format!(
            "Unable to create object directory {}",
            object_path.display()
        ))?;

        self.write_object(object_path, frame(object_type, payload))?;
        tracing::debug!(oid = %object_id, kind = %object_type, size = payload.len(), "object written");

        Ok(object_id)
    }

    pub fn store(&self, object: &impl Object) -> anyhow::Result<ObjectId> {
        self.write(object.object_type(), &object.serialize()?)
    }

    /// Read an object back as its kind and payload
    pub fn read(&self, object_id: &ObjectId) -> anyhow::Result<RawObject> {
        let object_path = self.path.join(object_id.to_path());
        let compressed = match std::fs::read(&object_path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::object_not_found(object_id.as_ref()).into());
            }
            Err(err) => {
                return Err(err).context(format!(
                    "Unable to read object file {}",
                    object_path.display()
                ));
            }
        };

        let content = Self::decompress(&compressed)
            .map_err(|err| Error::malformed_object(object_id.as_ref(), err.to_string()))?;

        let (kind, size, payload) = ObjectType::parse_header(&content)
            .map_err(|err| Error::malformed_object(object_id.as_ref(), err.to_string()))?;

        if size != payload.len() {
            return Err(Error::malformed_object(
                object_id.as_ref(),
                format!("declared length {size} but payload has {}", payload.len()),
            )
            .into());
        }

        Ok(RawObject {
            kind,
            payload: Bytes::copy_from_slice(payload),
        })
    }

    pub fn object_type(&self, object_id: &ObjectId) -> anyhow::Result<ObjectType> {
        Ok(self.read(object_id)?.kind)
    }

    pub fn parse_object(&self, object_id: &ObjectId) -> anyhow::Result<ObjectBox> {
        let RawObject { kind, payload } = self.read(object_id)?;

        let object = match kind {
            ObjectType::Blob => ObjectBox::Blob(Box::new(Blob::deserialize(payload)?)),
            ObjectType::Tree => ObjectBox::Tree(Box::new(Self::decode(object_id, payload)?)),
            ObjectType::Commit => ObjectBox::Commit(Box::new(Self::decode(object_id, payload)?)),
        };

        Ok(object)
    }

    pub fn parse_object_as_blob(&self, object_id: &ObjectId) -> anyhow::Result<Option<Blob>> {
        let RawObject { kind, payload } = self.read(object_id)?;

        match kind {
            ObjectType::Blob => Ok(Some(Blob::deserialize(payload)?)),
            _ => Ok(None),
        }
    }

    pub fn parse_object_as_tree(&self, object_id: &ObjectId) -> anyhow::Result<Option<Tree>> {
        let RawObject { kind, payload } = self.read(object_id)?;

        match kind {
            ObjectType::Tree => Ok(Some(Self::decode(object_id, payload)?)),
            _ => Ok(None),
        }
    }

    pub fn parse_object_as_commit(&self, object_id: &ObjectId) -> anyhow::Result<Option<Commit>> {
        let RawObject { kind, payload } = self.read(object_id)?;

        match kind {
            ObjectType::Commit => Ok(Some(Self::decode(object_id, payload)?)),
            _ => Ok(None),
        }
    }

    /// Resolve a commit or tree id to the id of a tree
    pub fn peel_to_tree(&self, object_id: &ObjectId) -> anyhow::Result<ObjectId> {
        match self.object_type(object_id)? {
            ObjectType::Tree => Ok(object_id.clone()),
            ObjectType::Commit => Ok(self
                .parse_object_as_commit(object_id)?
                .context(format!("{object_id} is not a commit"))?
                .tree_oid()
                .clone()),
            ObjectType::Blob => Err(Error::malformed_object(
                object_id.as_ref(),
                "expected a commit or a tree, found a blob",
            )
            .into()),
        }
    }

    fn decode<T: Unpackable>(object_id: &ObjectId, payload: Bytes) -> anyhow::Result<T> {
        T::deserialize(payload)
            .map_err(|err| Error::malformed_object(object_id.as_ref(), err.to_string()).into())
    }

    fn write_object(&self, object_path: PathBuf, object_content: Bytes) -> anyhow::Result<()> {
        let object_dir = object_path
            .parent()
            .context(format!("Invalid object path {}", object_path.display()))?;
        let temp_object_path = object_dir.join(Self::generate_temp_name());

        let object_content = Self::compress(&object_content)?;

        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp_object_path)
            .context(format!(
                "Unable to open object file {}",
                temp_object_path.display()
            ))?;

        file.write_all(&object_content).context(format!(
            "Unable to write object file {}",
            temp_object_path.display()
        ))?;

        // rename the temp file to the object file to make it atomic
        std::fs::rename(&temp_object_path, &object_path).context(format!(
            "Unable to rename object file to {}",
            object_path.display()
        ))?;

        Ok(())
    }

    fn compress(data: &[u8]) -> anyhow::Result<Bytes> {
        let mut encoder =
            flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        encoder
            .write_all(data)
            .context("Unable to compress object content")?;

        encoder
            .finish()
            .map(|compressed_content| compressed_content.into())
            .context("Unable to finish compressing object content")
    }

    fn decompress(data: &[u8]) -> anyhow::Result<Bytes> {
        let mut decoder = flate2::read::ZlibDecoder::new(data);
        let mut decompressed_content = Vec::new();
        decoder
            .read_to_end(&mut decompressed_content)
            .context("Unable to decompress object content")?;

        Ok(decompressed_content.into())
    }

    fn generate_temp_name() -> String {
        format!("tmp-obj-{}-{}", std::process::id(), rand::random::<u32>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn database() -> (assert_fs::TempDir, Database) {
        let dir = assert_fs::TempDir::new().unwrap();
        let database = Database::new(dir.path().join("objects").into_boxed_path());
        (dir, database)
    }

    #[rstest]
    fn written_objects_read_back_unchanged(database: (assert_fs::TempDir, Database)) {
        let (_dir, database) = database;

        for kind in [ObjectType::Blob, ObjectType::Tree, ObjectType::Commit] {
            let oid = database.write(kind, b"payload\0with nul").unwrap();
            let raw = database.read(&oid).unwrap();

            assert_eq!(raw.kind, kind);
            assert_eq!(raw.payload.as_ref(), b"payload\0with nul");
        }
    }

    #[rstest]
    fn writing_twice_is_idempotent(database: (assert_fs::TempDir, Database)) {
        let (_dir, database) = database;

        let first = database.write(ObjectType::Blob, b"hello").unwrap();
        let second = database.write(ObjectType::Blob, b"hello").unwrap();

        assert_eq!(first, second);
        assert_eq!(first.as_ref(), "b6fc4c620b67d95f953a5c1c1230aaab5db5a1b0");
        assert!(database.exists(&first));

        let fan_out = database.objects_path().join("b6");
        assert_eq!(std::fs::read_dir(fan_out).unwrap().count(), 1);
    }

    #[rstest]
    fn missing_object_is_reported(database: (assert_fs::TempDir, Database)) {
        let (_dir, database) = database;
        let oid = database.hash(ObjectType::Blob, b"never written").unwrap();

        let err = database.read(&oid).unwrap_err();

        assert!(!database.exists(&oid));
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::ObjectNotFound { .. })
        ));
    }

    #[rstest]
    #[case::not_zlib(b"definitely not deflate".to_vec())]
    #[case::no_terminator(Database::compress(b"blob 5 hello").unwrap().to_vec())]
    #[case::wrong_length(Database::compress(b"blob 9\0hello").unwrap().to_vec())]
    fn corrupt_object_is_malformed(
        database: (assert_fs::TempDir, Database),
        #[case] content: Vec<u8>,
    ) {
        let (_dir, database) = database;
        let oid = database.write(ObjectType::Blob, b"hello").unwrap();
        let path = database.objects_path().join(oid.to_path());
        std::fs::write(&path, content).unwrap();

        let err = database.read(&oid).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::MalformedObject { .. })
        ));
    }

    #[rstest]
    fn commits_peel_to_their_tree(database: (assert_fs::TempDir, Database)) {
        let (_dir, database) = database;
        let tree_oid = database.store(&Tree::empty()).unwrap();
        let author =
            crate::artifacts::objects::commit::Author::try_from("A <a@b> 0 +0000").unwrap();
        let commit = Commit::new(None, tree_oid.clone(), author.clone(), author, "m".into());
        let commit_oid = database.store(&commit).unwrap();

        assert_eq!(database.peel_to_tree(&commit_oid).unwrap(), tree_oid);
        assert_eq!(database.peel_to_tree(&tree_oid).unwrap(), tree_oid);
    }

    proptest! {
        #[test]
        fn ids_are_deterministic(content in proptest::collection::vec(any::<u8>(), 0..256)) {
            let dir = assert_fs::TempDir::new().unwrap();
            let database = Database::new(dir.path().join("objects").into_boxed_path());

            let hashed = database.hash(ObjectType::Blob, &content).unwrap();
            let written = database.write(ObjectType::Blob, &content).unwrap();

            prop_assert_eq!(&hashed, &written);
            prop_assert_eq!(database.read(&written).unwrap().payload.to_vec(), content);
        }
    }
}
