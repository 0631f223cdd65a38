#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectType {
    Blob,
    Tree,
    Commit,
}

impl ObjectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectType::Blob => "blob",
            ObjectType::Tree => "tree",
            ObjectType::Commit => "commit",
        }
    }

    /// Split a decompressed object into its kind, declared length and payload
    ///
    /// The header is `<kind> <len>` terminated by the first NUL byte.
    pub fn parse_header(data: &[u8]) -> anyhow::Result<(ObjectType, usize, &[u8])> {
        let nul = data
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| anyhow::anyhow!("missing header terminator"))?;

        let header = std::str::from_utf8(&data[..nul])
            .map_err(|_| anyhow::anyhow!("header is not valid UTF-8"))?;
        let (kind, size) = header
            .split_once(' ')
            .ok_or_else(|| anyhow::anyhow!("invalid header '{header}'"))?;

        let object_type = ObjectType::try_from(kind)?;
        let size = size
            .parse::<usize>()
            .map_err(|_| anyhow::anyhow!("invalid object length '{size}'"))?;

        Ok((object_type, size, &data[nul + 1..]))
    }
}

impl TryFrom<&str> for ObjectType {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> anyhow::Result<Self> {
        match value {
            "blob" => Ok(ObjectType::Blob),
            "tree" => Ok(ObjectType::Tree),
            "commit" => Ok(ObjectType::Commit),
            _ => Err(anyhow::anyhow!("Invalid object type '{value}'")),
        }
    }
}

impl std::fmt::Display for ObjectType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(b"blob 5\0hello", ObjectType::Blob, 5, b"hello".as_slice())]
    #[case(b"tree 0\0", ObjectType::Tree, 0, b"".as_slice())]
    #[case(b"commit 3\0a\0b", ObjectType::Commit, 3, b"a\0b".as_slice())]
    fn parses_framed_headers(
        #[case] data: &[u8],
        #[case] expected_type: ObjectType,
        #[case] expected_size: usize,
        #[case] expected_payload: &[u8],
    ) {
        let (object_type, size, payload) = ObjectType::parse_header(data).unwrap();

        assert_eq!(object_type, expected_type);
        assert_eq!(size, expected_size);
        assert_eq!(payload, expected_payload);
    }

    #[rstest]
    #[case(b"blob 5hello".as_slice())]
    #[case(b"blob\0hello".as_slice())]
    #[case(b"tag 5\0hello".as_slice())]
    #[case(b"blob five\0hello".as_slice())]
    fn rejects_malformed_headers(#[case] data: &[u8]) {
        assert!(ObjectType::parse_header(data).is_err());
    }
}
