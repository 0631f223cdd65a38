//! Ref advertisement returned by `info/refs?service=git-upload-pack`
//!
//! Smart servers frame the body as pkt-lines: a `# service=` announcement, a
//! flush, then `<id> <name>` records with capabilities after a NUL on the
//! first one. Dumb servers answer with plain `<id>\t<name>` lines, which are
//! accepted as well.

use crate::areas::refs::is_valid_ref_name;
use crate::artifacts::objects::OBJECT_ID_LENGTH;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::pack::pkt_line::{PktLine, PktLineReader, trim_newline};
use crate::errors::Error;
use bytes::Bytes;
use std::collections::{BTreeMap, BTreeSet};

const PEELED_SUFFIX: &str = "^{}";
const SYMREF_HEAD_PREFIX: &str = "symref=HEAD:";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteRefs {
    pub refs: BTreeMap<String, ObjectId>,
    /// Target of the remote HEAD when the server advertises it
    pub head_symref: Option<String>,
    pub capabilities: BTreeSet<String>,
}

impl RemoteRefs {
    pub fn parse(body: Bytes) -> anyhow::Result<Self> {
        if looks_plain(&body) {
            Self::parse_plain(&body)
        } else {
            Self::parse_framed(body)
        }
    }

    pub fn supports(&self, capability: &str) -> bool {
        self.capabilities.contains(capability)
    }

    /// Branch name (without `refs/heads/`) the remote HEAD points at
    pub fn head_branch(&self) -> Option<&str> {
        self.head_symref
            .as_deref()
            .and_then(|target| target.strip_prefix("refs/heads/"))
    }

    /// Advertised branches, keyed by short name
    pub fn branches(&self) -> impl Iterator<Item = (&str, &ObjectId)> {
        self.refs
            .iter()
            .filter_map(|(name, oid)| name.strip_prefix("refs/heads/").map(|branch| (branch, oid)))
    }

    /// Every distinct advertised id, in ref order
    pub fn wanted_ids(&self) -> Vec<ObjectId> {
        let mut seen = BTreeSet::new();
        self.refs
            .values()
            .filter(|oid| seen.insert((*oid).clone()))
            .cloned()
            .collect()
    }

    fn parse_framed(body: Bytes) -> anyhow::Result<Self> {
        let mut reader = PktLineReader::new(body);
        let mut remote = RemoteRefs::default();
        let mut first = true;

        while let Some(line) = reader.read()? {
            let PktLine::Data(data) = line else {
                continue;
            };
            let data = trim_newline(&data);
            if data.starts_with(b"# service=") {
                continue;
            }

            let (record, capabilities) = match data.iter().position(|&b| b == 0) {
                Some(nul) => (&data[..nul], Some(&data[nul + 1..])),
                None => (data, None),
            };
            if let Some(capabilities) = capabilities.filter(|_| first) {
                remote.read_capabilities(capabilities);
            }
            first = false;

            let record = std::str::from_utf8(record)
                .map_err(|_| Error::protocol_error("ref advertisement is not valid UTF-8"))?;
            let (oid, name) = record.split_once(' ').ok_or_else(|| {
                Error::protocol_error(format!("malformed ref advertisement line {record:?}"))
            })?;
            remote.insert(oid, name)?;
        }

        Ok(remote)
    }

    fn parse_plain(body: &[u8]) -> anyhow::Result<Self> {
        let body = std::str::from_utf8(body)
            .map_err(|_| Error::protocol_error("ref advertisement is not valid UTF-8"))?;
        let mut remote = RemoteRefs::default();

        for line in body.lines().filter(|line| !line.trim().is_empty()) {
            let (oid, name) = line
                .split_once(['\t', ' '])
                .ok_or_else(|| Error::protocol_error(format!("malformed ref line {line:?}")))?;
            remote.insert(oid, name.trim())?;
        }

        Ok(remote)
    }

    fn insert(&mut self, oid: &str, name: &str) -> anyhow::Result<()> {
        // an empty repository advertises the zero id with a capabilities^{} placeholder
        if name.ends_with(PEELED_SUFFIX) {
            return Ok(());
        }
        if !is_valid_ref_name(name) {
            tracing::warn!(name, "ignoring advertised ref with an unsafe name");
            return Ok(());
        }

        let oid = ObjectId::try_parse(oid.to_string())
            .map_err(|_| Error::protocol_error(format!("invalid object id {oid:?} for {name}")))?;

        if name == "HEAD" {
            tracing::debug!(%oid, "remote HEAD advertised");
        }
        self.refs.insert(name.to_string(), oid);

        Ok(())
    }

    fn read_capabilities(&mut self, raw: &[u8]) {
        for capability in String::from_utf8_lossy(raw).split_whitespace() {
            if let Some(target) = capability.strip_prefix(SYMREF_HEAD_PREFIX) {
                self.head_symref = Some(target.to_string());
            }
            self.capabilities.insert(capability.to_string());
        }
    }
}

/// Whether the body opens with a bare `<id>\t` rather than a pkt-line length
fn looks_plain(body: &[u8]) -> bool {
    body.len() > OBJECT_ID_LENGTH
        && body[..OBJECT_ID_LENGTH].iter().all(u8::is_ascii_hexdigit)
        && body[OBJECT_ID_LENGTH] == b'\t'
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::pack::pkt_line::encode;
    use pretty_assertions::assert_eq;

    const A: &str = "1111111111111111111111111111111111111111";
    const B: &str = "2222222222222222222222222222222222222222";

    fn framed(lines: &[&[u8]]) -> Bytes {
        let mut body = encode(b"# service=git-upload-pack\n").unwrap();
        body.extend_from_slice(b"0000");
        for line in lines {
            body.extend(encode(line).unwrap());
        }
        body.extend_from_slice(b"0000");
        body.into()
    }

    #[test]
    fn framed_advertisement_with_capabilities() {
        let first = format!("{A} HEAD\0multi_ack side-band-64k symref=HEAD:refs/heads/main\n");
        let main = format!("{A} refs/heads/main\n");
        let dev = format!("{B} refs/heads/dev\n");
        let tag = format!("{B} refs/tags/v1\n");
        let peeled = format!("{A} refs/tags/v1^{{}}\n");

        let remote = RemoteRefs::parse(framed(&[
            first.as_bytes(),
            main.as_bytes(),
            dev.as_bytes(),
            tag.as_bytes(),
            peeled.as_bytes(),
        ]))
        .unwrap();

        assert_eq!(remote.refs.len(), 4);
        assert_eq!(remote.head_branch(), Some("main"));
        assert!(remote.supports("side-band-64k"));
        assert!(!remote.supports("ofs-delta"));
        assert_eq!(
            remote.branches().map(|(name, _)| name).collect::<Vec<_>>(),
            vec!["dev", "main"]
        );
        assert_eq!(remote.wanted_ids().len(), 2);
    }

    #[test]
    fn plain_tab_separated_lines() {
        let body = format!("{A}\trefs/heads/master\n{B}\trefs/heads/topic\n");

        let remote = RemoteRefs::parse(Bytes::from(body)).unwrap();

        assert_eq!(remote.refs.len(), 2);
        assert_eq!(remote.head_branch(), None);
        assert_eq!(remote.refs["refs/heads/master"].as_ref(), A);
    }

    #[test]
    fn empty_remote_has_no_refs() {
        let zero = "0".repeat(40);
        let line = format!("{zero} capabilities^{{}}\0agent=git/2\n");

        let remote = RemoteRefs::parse(framed(&[line.as_bytes()])).unwrap();

        assert!(remote.refs.is_empty());
        assert!(remote.supports("agent=git/2"));
    }

    #[test]
    fn refs_with_traversal_names_are_dropped() {
        let body = format!(
            "{A}\trefs/heads/../../../../victim.txt\n{A}\trefs/heads/./x\n{B}\trefs/heads/main\n"
        );

        let remote = RemoteRefs::parse(Bytes::from(body)).unwrap();

        assert_eq!(
            remote.branches().map(|(name, _)| name).collect::<Vec<_>>(),
            vec!["main"]
        );
        assert_eq!(remote.wanted_ids().len(), 1);
    }

    #[test]
    fn garbage_is_a_protocol_error() {
        let err = RemoteRefs::parse(Bytes::from_static(b"<html>not found</html>")).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::ProtocolError { .. })
        ));
    }
}
