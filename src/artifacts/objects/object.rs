use crate::artifacts::objects::blob::Blob;
use crate::artifacts::objects::commit::Commit;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::artifacts::objects::tree::Tree;
use anyhow::Result;
use bytes::Bytes;
use sha1::{Digest, Sha1};

/// Encode an object into its payload bytes (without the `<kind> <len>\0` header)
pub trait Packable {
    fn serialize(&self) -> Result<Bytes>;
}

/// Decode an object from its payload bytes
pub trait Unpackable {
    fn deserialize(payload: Bytes) -> Result<Self>
    where
        Self: Sized;
}

pub trait Object: Packable {
    fn object_type(&self) -> ObjectType;

    fn display(&self) -> String;

    fn object_id(&self) -> Result<ObjectId> {
        hash_object(self.object_type(), &self.serialize()?)
    }
}

/// Prefix a payload with its `<kind> <len>\0` header
pub fn frame(object_type: ObjectType, payload: &[u8]) -> Bytes {
    let header = format!("{} {}\0", object_type.as_str(), payload.len());

    let mut framed = Vec::with_capacity(header.len() + payload.len());
    framed.extend_from_slice(header.as_bytes());
    framed.extend_from_slice(payload);

    Bytes::from(framed)
}

/// Compute the id of a payload without storing it
pub fn hash_object(object_type: ObjectType, payload: &[u8]) -> Result<ObjectId> {
    let mut hasher = Sha1::new();
    hasher.update(frame(object_type, payload));

    ObjectId::from_digest(hasher.finalize().as_slice())
}

/// An object as read back from the store, before any typed decoding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawObject {
    pub kind: ObjectType,
    pub payload: Bytes,
}

pub enum ObjectBox {
    Blob(Box<Blob>),
    Tree(Box<Tree>),
    Commit(Box<Commit>),
}

impl ObjectBox {
    pub fn display(&self) -> String {
        match self {
            ObjectBox::Blob(blob) => blob.display(),
            ObjectBox::Tree(tree) => tree.display(),
            ObjectBox::Commit(commit) => commit.display(),
        }
    }
}
