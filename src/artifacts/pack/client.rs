//! Smart-HTTP client for the upload-pack service
//!
//! Two round trips: a GET for the ref advertisement and a POST carrying the
//! `want` lines and `done`. Negotiation is a single shot (no `have` lines), so
//! the server always answers with `NAK` followed by the full pack.

use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::pack::advertisement::RemoteRefs;
use crate::artifacts::pack::pack_file::PACK_SIGNATURE;
use crate::artifacts::pack::pkt_line::{FLUSH_PKT, PktLine, PktLineReader, encode};
use crate::errors::Error;
use anyhow::Context;
use bytes::{Bytes, BytesMut};

const USER_AGENT: &str = concat!("kit/", env!("CARGO_PKG_VERSION"));
const ADVERTISEMENT_CONTENT_TYPE: &str = "application/x-git-upload-pack-advertisement";
const REQUEST_CONTENT_TYPE: &str = "application/x-git-upload-pack-request";
const RESULT_CONTENT_TYPE: &str = "application/x-git-upload-pack-result";
const SIDE_BAND_64K: &str = "side-band-64k";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Band {
    Data,
    Progress,
    Fatal,
}

impl TryFrom<u8> for Band {
    type Error = anyhow::Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Band::Data),
            2 => Ok(Band::Progress),
            3 => Ok(Band::Fatal),
            other => Err(Error::protocol_error(format!("unexpected side-band channel {other}")).into()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PackClient {
    http: reqwest::Client,
    url: String,
}

impl PackClient {
    pub fn new(url: &str) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .context("build reqwest client")?;

        Ok(PackClient {
            http,
            url: url.trim_end_matches('/').to_string(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn discover_refs(&self) -> anyhow::Result<RemoteRefs> {
        let url = format!("{}/info/refs?service=git-upload-pack", self.url);
        tracing::debug!(%url, "discovering remote refs");

        let request = self
            .http
            .get(&url)
            .header(reqwest::header::ACCEPT, ADVERTISEMENT_CONTENT_TYPE);
        let body = self.send(&url, request).await?;
        let remote = RemoteRefs::parse(body)?;

        tracing::info!(
            refs = remote.refs.len(),
            head = remote.head_symref.as_deref().unwrap_or("-"),
            "remote refs discovered"
        );

        Ok(remote)
    }

    /// Request every id in `wants` and return the raw pack stream
    pub async fn fetch_pack(&self, wants: &[ObjectId], side_band: bool) -> anyhow::Result<Bytes> {
        let url = format!("{}/git-upload-pack", self.url);
        let body = Self::want_request(wants, side_band)?;
        tracing::debug!(%url, wants = wants.len(), side_band, "requesting pack");

        let request = self
            .http
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, REQUEST_CONTENT_TYPE)
            .header(reqwest::header::ACCEPT, RESULT_CONTENT_TYPE)
            .body(body);
        let response = self.send(&url, request).await?;

        let pack = Self::extract_pack(response)?;
        tracing::info!(bytes = pack.len(), "pack received");

        Ok(pack)
    }

    /// Whether a fetch from this remote can use side-band framing
    pub fn wants_side_band(remote: &RemoteRefs) -> bool {
        remote.supports(SIDE_BAND_64K)
    }

    /// `want` lines (capabilities on the first), a flush, then `done`
    pub fn want_request(wants: &[ObjectId], side_band: bool) -> anyhow::Result<Vec<u8>> {
        let mut body = Vec::new();
        let mut seen = std::collections::BTreeSet::new();

        for oid in wants.iter().filter(|oid| seen.insert(*oid)) {
            let line = if body.is_empty() {
                let mut capabilities = vec!["ofs-delta"];
                if side_band {
                    capabilities.push(SIDE_BAND_64K);
                }
                format!("want {oid} {} agent={USER_AGENT}\n", capabilities.join(" "))
            } else {
                format!("want {oid}\n")
            };
            body.extend(encode(line.as_bytes())?);
        }

        body.extend_from_slice(FLUSH_PKT);
        body.extend(encode(b"done\n")?);

        Ok(body)
    }

    /// Strip acknowledgements and side-band framing from an upload-pack response
    pub fn extract_pack(response: Bytes) -> anyhow::Result<Bytes> {
        let mut reader = PktLineReader::new(response);
        let mut pack = BytesMut::new();

        loop {
            if pack.is_empty() && reader.remaining().starts_with(PACK_SIGNATURE) {
                return Ok(reader.remaining());
            }

            let Some(line) = reader.read()? else {
                break;
            };
            let PktLine::Data(data) = line else {
                continue;
            };
            if data.starts_with(b"NAK") || data.starts_with(b"ACK") {
                continue;
            }

            let (&channel, payload) = data
                .split_first()
                .ok_or_else(|| Error::protocol_error("empty side-band packet"))?;
            match Band::try_from(channel)? {
                Band::Data => pack.extend_from_slice(payload),
                Band::Progress => {
                    tracing::info!(remote = %String::from_utf8_lossy(payload).trim_end(), "progress");
                }
                Band::Fatal => {
                    return Err(Error::protocol_error(format!(
                        "remote error: {}",
                        String::from_utf8_lossy(payload).trim_end()
                    ))
                    .into());
                }
            }
        }

        if !pack.starts_with(PACK_SIGNATURE) {
            return Err(Error::protocol_error("response does not contain a pack").into());
        }

        Ok(pack.freeze())
    }

    async fn send(&self, url: &str, request: reqwest::RequestBuilder) -> anyhow::Result<Bytes> {
        let response = request
            .send()
            .await
            .map_err(|err| Error::network_failure(url, err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::network_failure(url, format!("HTTP {status}")).into());
        }

        let body = response
            .bytes()
            .await
            .map_err(|err| Error::network_failure(url, err.to_string()))?;
        tracing::debug!(%url, %status, bytes = body.len(), "response received");

        Ok(body)
    }
}
