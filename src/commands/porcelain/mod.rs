//! Porcelain commands (user-facing workflows)
//!
//! They compose the plumbing and the on-disk areas into the everyday
//! operations of a repository.
//!
//! ## Commands
//!
//! - `init`: Create the control directory layout
//! - `add`: Stage files or whole directories
//! - `commit`: Record the staged tree on the current branch
//! - `status`: Show modified, deleted and untracked files
//! - `log`: Walk the history of HEAD
//! - `clone`: Fetch a remote repository over smart HTTP

pub mod add;
pub mod clone;
pub mod commit;
pub mod init;
pub mod log;
pub mod status;
