//! Pkt-line framing
//!
//! Every record starts with four hex digits giving its total length,
//! prefix included. `0000` is a flush packet and carries no data; `0001`
//! and `0002` are the delimiter and response-end packets of protocol v2.

use crate::errors::Error;
use bytes::Bytes;

/// Largest record the protocol allows, prefix included
pub const MAX_PKT_LEN: usize = 65520;

pub const FLUSH_PKT: &[u8] = b"0000";

const PREFIX_LEN: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PktLine {
    Flush,
    Delimiter,
    ResponseEnd,
    Data(Bytes),
}

/// Frame `data` as a single record
pub fn encode(data: &[u8]) -> anyhow::Result<Vec<u8>> {
    let len = data.len() + PREFIX_LEN;
    if len > MAX_PKT_LEN {
        return Err(Error::protocol_error(format!("pkt-line of {len} bytes is too long")).into());
    }

    let mut framed = format!("{len:04x}").into_bytes();
    framed.extend_from_slice(data);

    Ok(framed)
}

/// Sequential reader over a buffer of pkt-lines
#[derive(Debug)]
pub struct PktLineReader {
    data: Bytes,
    pos: usize,
}

impl PktLineReader {
    pub fn new(data: Bytes) -> Self {
        PktLineReader { data, pos: 0 }
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Bytes not consumed yet
    pub fn remaining(&self) -> Bytes {
        self.data.slice(self.pos.min(self.data.len())..)
    }

    /// Next record, or `None` at the end of the buffer
    pub fn read(&mut self) -> anyhow::Result<Option<PktLine>> {
        if self.is_empty() {
            return Ok(None);
        }

        let prefix = self
            .data
            .get(self.pos..self.pos + PREFIX_LEN)
            .ok_or_else(|| Error::protocol_error("truncated pkt-line length"))?;
        let prefix = std::str::from_utf8(prefix)
            .ok()
            .and_then(|hex| usize::from_str_radix(hex, 16).ok())
            .ok_or_else(|| {
                Error::protocol_error(format!(
                    "invalid pkt-line length {:?}",
                    String::from_utf8_lossy(prefix)
                ))
            })?;

        let line = match prefix {
            0 => PktLine::Flush,
            1 => PktLine::Delimiter,
            2 => PktLine::ResponseEnd,
            3 => return Err(Error::protocol_error("invalid pkt-line length 3").into()),
            len => {
                let end = self.pos + len;
                if end > self.data.len() {
                    return Err(Error::protocol_error("truncated pkt-line payload").into());
                }
                let payload = self.data.slice(self.pos + PREFIX_LEN..end);
                self.pos = end;
                return Ok(Some(PktLine::Data(payload)));
            }
        };

        self.pos += PREFIX_LEN;
        Ok(Some(line))
    }
}

/// Strip one trailing newline from a text record
pub fn trim_newline(data: &[u8]) -> &[u8] {
    data.strip_suffix(b"\n").unwrap_or(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn encodes_with_hex_length_prefix() {
        assert_eq!(encode(b"done\n").unwrap(), b"0009done\n");
        assert_eq!(encode(b"").unwrap(), b"0004");
    }

    #[test]
    fn reads_data_and_special_packets() {
        let mut reader = PktLineReader::new(Bytes::from_static(b"0009done\n000000010002"));

        assert_eq!(
            reader.read().unwrap(),
            Some(PktLine::Data(Bytes::from_static(b"done\n")))
        );
        assert_eq!(reader.read().unwrap(), Some(PktLine::Flush));
        assert_eq!(reader.read().unwrap(), Some(PktLine::Delimiter));
        assert_eq!(reader.read().unwrap(), Some(PktLine::ResponseEnd));
        assert_eq!(reader.read().unwrap(), None);
    }

    #[test]
    fn malformed_lengths_are_protocol_errors() {
        for raw in [&b"zzzz"[..], b"00", b"0003", b"00ffshort"] {
            let err = PktLineReader::new(Bytes::copy_from_slice(raw))
                .read()
                .unwrap_err();

            assert!(matches!(
                err.downcast_ref::<Error>(),
                Some(Error::ProtocolError { .. })
            ));
        }
    }
}
