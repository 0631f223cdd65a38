//! Plumbing commands (low-level object and index operations)
//!
//! Each one maps to a single component operation and prints its result,
//! usually an object id, for scripting.
//!
//! ## Commands
//!
//! - `cat-file`: Print an object's payload
//! - `hash-object`: Compute a blob id and optionally store the blob
//! - `ls-tree`: List one level of a tree
//! - `update-index`: Stage or unstage a single file
//! - `write-tree`: Record the staged files as a tree
//! - `commit-tree`: Create a commit from the staged tree
//! - `compare-blobs`: Line-by-line comparison of two blobs
//! - `diff`: Path-level comparison of working tree, index and trees

pub mod cat_file;
pub mod commit_tree;
pub mod compare_blobs;
pub mod diff;
pub mod hash_object;
pub mod ls_tree;
pub mod update_index;
pub mod write_tree;
