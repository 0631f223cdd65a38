//! Change detection
//!
//! - `file_change`: Change records and their printed form
//! - `line_diff`: Line-by-line comparison of two blobs
//! - `tree_diff`: Path-level comparison of working tree, index and trees

pub mod file_change;
pub mod line_diff;
pub mod tree_diff;
