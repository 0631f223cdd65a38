//! Fetching objects from a remote over smart HTTP
//!
//! - `pkt_line`: Length-prefixed record framing
//! - `advertisement`: Parsing the remote's ref list and capabilities
//! - `client`: HTTP round trips for ref discovery and pack download
//! - `pack_file`: Validating a pack and writing its objects to the store

pub mod advertisement;
pub mod client;
pub mod pack_file;
pub mod pkt_line;
