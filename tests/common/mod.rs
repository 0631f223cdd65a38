#![allow(dead_code)]

pub mod command;
pub mod file;

/// Well-known blob id of the five bytes `hello`
pub const HELLO_BLOB_OID: &str = "b6fc4c620b67d95f953a5c1c1230aaab5db5a1b0";

/// Id of the tree with no entries
pub const EMPTY_TREE_OID: &str = "4b825dc642cb6eb9a060e54bf8d69288fbee4904";

pub fn stdout_of(assert: &assert_cmd::assert::Assert) -> String {
    String::from_utf8_lossy(&assert.get_output().stdout).to_string()
}
