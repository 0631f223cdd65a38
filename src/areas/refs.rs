//! References (branches and HEAD)
//!
//! References are text files under the control directory:
//! - `refs/heads/<branch>` holds a 40-hex commit id and a newline
//! - `HEAD` holds either `ref: refs/heads/<branch>` or a literal id
//!
//! Only one level of symbolic indirection is followed.

use crate::artifacts::objects::object_id::ObjectId;
use crate::errors::Error;
use anyhow::Context;
use derive_new::new;
use file_guard::Lock;
use std::io::Write;
use std::ops::DerefMut;
use std::path::{Component, Path};

#[derive(Debug, new)]
pub struct Refs {
    /// Path to the control directory (typically `.git`)
    path: Box<Path>,
}

/// Regex pattern for parsing symbolic references
const SYMREF_REGEX: &str = r"^ref: (.+)$";

/// Name of the HEAD reference
pub const HEAD_REF_NAME: &str = "HEAD";

/// Branch HEAD points at in a freshly initialized repository
pub const DEFAULT_BRANCH: &str = "master";

/// Prefix of branch refs
pub const HEADS_PREFIX: &str = "refs/heads/";

const LOCK_SUFFIX: &str = ".lock";

/// Whether `name` can be stored as a file below the refs directory
///
/// Every `/`-separated segment must be a plain, non-empty file name: no `.`
/// or `..`, no leading `/`, no control bytes and no `.lock` suffix.
pub fn is_valid_ref_name(name: &str) -> bool {
    if name.is_empty() || name.bytes().any(|b| b.is_ascii_control()) {
        return false;
    }

    name.split('/').all(|segment| {
        !segment.is_empty()
            && !segment.ends_with(LOCK_SUFFIX)
            && matches!(
                Path::new(segment).components().collect::<Vec<_>>().as_slice(),
                [Component::Normal(_)]
            )
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum SymRefOrOid {
    /// Symbolic reference, e.g. `refs/heads/master`
    SymRef(String),
    Oid(ObjectId),
}

impl SymRefOrOid {
    fn read_symref_or_oid(path: &Path) -> anyhow::Result<Option<SymRefOrOid>> {
        if !path.is_file() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read ref file at {:?}", path))?;
        let content = content.trim();

        if content.is_empty() {
            return Ok(None);
        }

        let symref_match = regex::Regex::new(SYMREF_REGEX)?.captures(content);
        if let Some(symref_match) = symref_match {
            return Ok(Some(SymRefOrOid::SymRef(symref_match[1].to_string())));
        }

        Ok(ObjectId::try_parse(content.to_string())
            .ok()
            .map(SymRefOrOid::Oid))
    }
}

impl Refs {
    /// Resolve a literal id, `HEAD`, or a branch name to an object id
    pub fn resolve(&self, name: &str) -> anyhow::Result<ObjectId> {
        if ObjectId::is_full_hex(name) {
            return ObjectId::try_parse(name.to_string());
        }

        let resolved = if name == HEAD_REF_NAME {
            self.read_head()?
        } else {
            self.read_branch(name)?
        };

        resolved.ok_or_else(|| Error::unresolvable_ref(name).into())
    }

    /// Object id HEAD points at, or `None` on an unborn branch
    pub fn read_head(&self) -> anyhow::Result<Option<ObjectId>> {
        match SymRefOrOid::read_symref_or_oid(&self.head_path())? {
            Some(SymRefOrOid::SymRef(target)) => self.read_oid_at(&target),
            Some(SymRefOrOid::Oid(oid)) => Ok(Some(oid)),
            None => Ok(None),
        }
    }

    pub fn read_branch(&self, branch: &str) -> anyhow::Result<Option<ObjectId>> {
        self.read_oid_at(&format!("{HEADS_PREFIX}{branch}"))
    }

    /// Name of the branch HEAD points at, `None` when HEAD is detached
    pub fn current_branch(&self) -> anyhow::Result<Option<String>> {
        match SymRefOrOid::read_symref_or_oid(&self.head_path())? {
            Some(SymRefOrOid::SymRef(target)) => Ok(Some(
                target
                    .strip_prefix(HEADS_PREFIX)
                    .unwrap_or(&target)
                    .to_string(),
            )),
            _ => Ok(None),
        }
    }

    /// Advance whatever HEAD points at: the current branch, or HEAD itself
    /// when detached
    pub fn update_head(&self, oid: &ObjectId) -> anyhow::Result<()> {
        match SymRefOrOid::read_symref_or_oid(&self.head_path())? {
            Some(SymRefOrOid::SymRef(target)) => {
                self.update_ref_file(&self.path.join(&target), format!("{oid}\n"))?;
                tracing::info!(%oid, target, "advanced branch");
            }
            _ => {
                self.update_ref_file(&self.head_path(), format!("{oid}\n"))?;
                tracing::info!(%oid, "advanced detached HEAD");
            }
        }

        Ok(())
    }

    pub fn update_branch(&self, branch: &str, oid: &ObjectId) -> anyhow::Result<()> {
        if !is_valid_ref_name(branch) {
            anyhow::bail!("'{branch}' is not a valid branch name");
        }
        let branch_path = self.heads_path().join(branch);
        self.update_ref_file(&branch_path, format!("{oid}\n"))?;
        tracing::debug!(%oid, branch, "updated branch");

        Ok(())
    }

    pub fn set_head_to_branch(&self, branch: &str) -> anyhow::Result<()> {
        self.update_ref_file(&self.head_path(), format!("ref: {HEADS_PREFIX}{branch}\n"))
    }

    fn read_oid_at(&self, ref_name: &str) -> anyhow::Result<Option<ObjectId>> {
        match SymRefOrOid::read_symref_or_oid(&self.path.join(ref_name))? {
            Some(SymRefOrOid::Oid(oid)) => Ok(Some(oid)),
            // a second level of indirection is not followed
            Some(SymRefOrOid::SymRef(_)) | None => Ok(None),
        }
    }

    fn update_ref_file(&self, path: &Path, raw_ref: String) -> anyhow::Result<()> {
        std::fs::create_dir_all(path.parent().with_context(|| {
            format!(
                "failed to create parent directories for ref file at {:?}",
                path
            )
        })?)?;

        let mut ref_file = std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .with_context(|| format!("failed to open ref file at {:?}", path))?;
        let mut lock = file_guard::lock(&mut ref_file, Lock::Exclusive, 0, 1)?;
        lock.deref_mut().write_all(raw_ref.as_bytes())?;

        Ok(())
    }

    pub fn head_path(&self) -> Box<Path> {
        self.path.join(HEAD_REF_NAME).into_boxed_path()
    }

    pub fn refs_path(&self) -> Box<Path> {
        self.path.join("refs").into_boxed_path()
    }

    pub fn heads_path(&self) -> Box<Path> {
        self.refs_path().join("heads").into_boxed_path()
    }
}
