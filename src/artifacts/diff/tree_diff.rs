//! Path-level comparison of snapshots
//!
//! Every snapshot (working tree, index, stored tree) is reduced to a flat
//! map from `/`-separated path to blob id before comparing.

use crate::areas::database::Database;
use crate::areas::workspace::Workspace;
use crate::artifacts::diff::file_change::{ChangeKind, FileChange, TreeChange};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::errors::Error;
use std::collections::{BTreeMap, BTreeSet};

pub type FlatTree = BTreeMap<String, ObjectId>;

#[derive(Debug)]
pub struct TreeDiff<'r> {
    database: &'r Database,
}

impl<'r> TreeDiff<'r> {
    pub fn new(database: &'r Database) -> Self {
        TreeDiff { database }
    }

    /// Expand a tree (or the tree of a commit) into every file below it
    pub fn flatten(&self, oid: &ObjectId) -> anyhow::Result<FlatTree> {
        let tree_oid = self.database.peel_to_tree(oid)?;
        let mut flat = FlatTree::new();
        self.flatten_into(&tree_oid, "", &mut flat)?;

        Ok(flat)
    }

    fn flatten_into(&self, oid: &ObjectId, prefix: &str, flat: &mut FlatTree) -> anyhow::Result<()> {
        let tree = self.database.parse_object_as_tree(oid)?.ok_or_else(|| {
            Error::malformed_object(oid.as_ref(), "expected a tree")
        })?;

        for entry in tree.entries() {
            let path = if prefix.is_empty() {
                entry.name.clone()
            } else {
                format!("{prefix}/{}", entry.name)
            };

            if entry.mode.is_tree() {
                self.flatten_into(&entry.oid, &path, flat)?;
            } else {
                flat.insert(path, entry.oid.clone());
            }
        }

        Ok(())
    }
}

/// Compare the working tree against a baseline
///
/// Only baseline paths are examined: a missing file is deleted, a file whose
/// current blob id differs is modified. Untracked files are not reported.
pub fn compare_worktree(workspace: &Workspace, baseline: &FlatTree) -> anyhow::Result<Vec<FileChange>> {
    let mut changes = Vec::new();

    for (path, oid) in baseline {
        if !workspace.exists(path) {
            changes.push(FileChange::new(path, ChangeKind::Deleted));
            continue;
        }

        let data = workspace.read_file(path)?;
        let current = crate::artifacts::objects::object::hash_object(ObjectType::Blob, &data)?;
        if &current != oid {
            changes.push(FileChange::new(path, ChangeKind::Modified));
        }
    }

    Ok(changes)
}

/// Compare staged blob ids against a tree
///
/// A staged path absent from the tree is added, a tree path absent from the
/// index is deleted.
pub fn compare_staged(staged: &FlatTree, tree: &FlatTree) -> Vec<FileChange> {
    let paths = staged.keys().chain(tree.keys()).collect::<BTreeSet<_>>();

    paths
        .into_iter()
        .filter_map(|path| match (tree.get(path), staged.get(path)) {
            (None, Some(_)) => Some(FileChange::new(path, ChangeKind::Added)),
            (Some(_), None) => Some(FileChange::new(path, ChangeKind::Deleted)),
            (Some(old), Some(new)) if old != new => {
                Some(FileChange::new(path, ChangeKind::Modified))
            }
            _ => None,
        })
        .collect()
}

/// Every path whose blob id differs between two trees
pub fn compare_trees(old: &FlatTree, new: &FlatTree) -> Vec<TreeChange> {
    let paths = old.keys().chain(new.keys()).collect::<BTreeSet<_>>();

    paths
        .into_iter()
        .filter_map(|path| {
            let (old, new) = (old.get(path), new.get(path));
            (old != new).then(|| TreeChange {
                path: path.clone(),
                old: old.cloned(),
                new: new.cloned(),
            })
        })
        .collect()
}
