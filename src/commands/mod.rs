//! Command implementations
//!
//! Every command is an `impl Repository` block that loads what it needs,
//! performs one operation and writes its result to the repository's writer.
//!
//! - `plumbing`: Low-level commands over objects, the index and trees
//! - `porcelain`: Everyday workflows composed from the plumbing

pub mod plumbing;
pub mod porcelain;
