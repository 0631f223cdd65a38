//! Blob object
//!
//! Blobs store file content only. Names and modes live in the trees that
//! reference them.
//!
//! ## Format
//!
//! On disk: `blob <size>\0<content>`

use crate::artifacts::objects::object::{Object, Packable, Unpackable};
use crate::artifacts::objects::object_type::ObjectType;
use bytes::Bytes;
use derive_new::new;

#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct Blob {
    data: Bytes,
}

impl Blob {
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Content split into lines, without a trailing empty segment
    /// Content split on every `\n`; a trailing newline yields a final empty line
    pub fn lines(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.data)
            .split('\n')
            .map(str::to_string)
            .collect()
    }
}

impl Packable for Blob {
    fn serialize(&self) -> anyhow::Result<Bytes> {
        Ok(self.data.clone())
    }
}

impl Unpackable for Blob {
    fn deserialize(payload: Bytes) -> anyhow::Result<Self> {
        Ok(Self::new(payload))
    }
}

impl Object for Blob {
    fn object_type(&self) -> ObjectType {
        ObjectType::Blob
    }

    fn display(&self) -> String {
        String::from_utf8_lossy(&self.data).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("", vec![""])]
    #[case("one", vec!["one"])]
    #[case("one\n", vec!["one", ""])]
    #[case("one\ntwo\n\n", vec!["one", "two", "", ""])]
    fn splits_content_into_lines(#[case] content: &'static str, #[case] expected: Vec<&str>) {
        let blob = Blob::new(Bytes::from_static(content.as_bytes()));

        assert_eq!(blob.lines(), expected);
    }
}
