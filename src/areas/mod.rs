//! On-disk areas of a repository
//!
//! - `database`: Object store for blobs, trees, and commits
//! - `index`: Staging area
//! - `refs`: Branches and HEAD
//! - `repository`: Bundles the areas for the commands
//! - `workspace`: Working tree file system access

pub mod database;
pub mod index;
pub mod refs;
pub mod repository;
pub mod workspace;
