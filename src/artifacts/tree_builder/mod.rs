//! Tree construction from the working tree
//!
//! Directories are walked depth-first. Every file becomes a blob, every
//! non-empty subdirectory a tree, and child trees are written before the tree
//! that references them. Sibling subdirectories are processed concurrently;
//! the result does not depend on that order because `Tree::build` sorts the
//! entries before hashing.

use crate::areas::database::Database;
use crate::areas::workspace::Workspace;
use crate::artifacts::index::entry_mode::EntryMode;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::artifacts::objects::tree::{Tree, TreeEntry};
use anyhow::Context;
use derive_new::new;
use futures::future::try_join_all;
use std::collections::BTreeSet;
use std::path::Path;

#[derive(Debug, new)]
pub struct TreeBuilder<'r> {
    database: &'r Database,
    root: &'r Path,
}

impl TreeBuilder<'_> {
    /// Snapshot every file below the root
    ///
    /// Returns `None` when there is nothing to record.
    pub async fn build_from_workspace(&self) -> anyhow::Result<Option<ObjectId>> {
        let tree_oid = self.build_dir(String::new(), None).await?;
        tracing::debug!(tree = ?tree_oid, "built tree from workspace");

        Ok(tree_oid)
    }

    /// Snapshot only the files whose paths are in `staged`
    ///
    /// Staged paths missing from the working tree are left out, and so are
    /// directories without any staged descendant.
    pub async fn build_from_staged(
        &self,
        staged: &BTreeSet<String>,
    ) -> anyhow::Result<Option<ObjectId>> {
        let tree_oid = self.build_dir(String::new(), Some(staged)).await?;
        tracing::debug!(tree = ?tree_oid, staged = staged.len(), "built tree from staged paths");

        Ok(tree_oid)
    }

    async fn build_dir(
        &self,
        relative: String,
        staged: Option<&BTreeSet<String>>,
    ) -> anyhow::Result<Option<ObjectId>> {
        let dir = self.root.join(&relative);
        let mut read_dir = tokio::fs::read_dir(&dir)
            .await
            .with_context(|| format!("Unable to read directory {}", dir.display()))?;

        let mut files = Vec::new();
        let mut subdirs = Vec::new();

        while let Some(entry) = read_dir.next_entry().await? {
            let file_name = entry.file_name();
            if Workspace::is_ignored(&file_name) {
                continue;
            }
            let Some(name) = file_name.to_str().map(str::to_string) else {
                tracing::warn!(name = ?file_name, "skipping non UTF-8 file name");
                continue;
            };
            let path = if relative.is_empty() {
                name.clone()
            } else {
                format!("{relative}/{name}")
            };

            let file_type = entry.file_type().await?;
            if file_type.is_dir() {
                if staged.is_none_or(|staged| has_staged_descendant(staged, &path)) {
                    subdirs.push((name, path));
                }
            } else if file_type.is_file() && staged.is_none_or(|staged| staged.contains(&path)) {
                files.push((name, path));
            }
        }

        let blobs = try_join_all(files.into_iter().map(|(name, path)| async move {
            let data = tokio::fs::read(self.root.join(&path))
                .await
                .with_context(|| format!("Unable to read file {path}"))?;
            let oid = self.database.write(ObjectType::Blob, &data)?;

            Ok::<_, anyhow::Error>(TreeEntry::new(EntryMode::default(), name, oid))
        }))
        .await?;

        let subtrees = try_join_all(subdirs.into_iter().map(|(name, path)| async move {
            let subtree = Box::pin(self.build_dir(path, staged)).await?;

            Ok::<_, anyhow::Error>(
                subtree.map(|oid| TreeEntry::new(EntryMode::Directory, name, oid)),
            )
        }))
        .await?;

        let entries = blobs
            .into_iter()
            .chain(subtrees.into_iter().flatten())
            .collect::<Vec<_>>();

        if entries.is_empty() {
            return Ok(None);
        }

        let tree = Tree::build(entries)?;
        Ok(Some(self.database.store(&tree)?))
    }
}

fn has_staged_descendant(staged: &BTreeSet<String>, dir: &str) -> bool {
    let prefix = format!("{dir}/");
    staged
        .range(prefix.clone()..)
        .next()
        .is_some_and(|path| path.starts_with(&prefix))
}
