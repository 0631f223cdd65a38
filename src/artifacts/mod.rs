//! Data structures and algorithms
//!
//! - `diff`: Path-level and line-level change detection
//! - `index`: Binary index records and their encoding
//! - `objects`: Object kinds (blob, tree, commit), ids and framing
//! - `pack`: Smart-HTTP ref discovery and pack ingestion
//! - `tree_builder`: Building trees from the working tree or staged paths

pub mod diff;
pub mod index;
pub mod objects;
pub mod pack;
pub mod tree_builder;
