use crate::areas::refs::HEAD_REF_NAME;
use crate::areas::repository::Repository;
use crate::artifacts::diff::tree_diff::{
    FlatTree, TreeDiff, compare_staged, compare_trees, compare_worktree,
};

/// Which two snapshots to compare
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffMode {
    WorktreeIndex,
    IndexTree(String),
    WorktreeTree(String),
    TreeTree(String, String),
}

impl Repository {
    pub async fn diff(&self, mode: &DiffMode) -> anyhow::Result<()> {
        let changes = match mode {
            DiffMode::WorktreeIndex => {
                compare_worktree(self.workspace(), &self.staged_snapshot().await?)?
            }
            DiffMode::IndexTree(revision) => {
                compare_staged(&self.staged_snapshot().await?, &self.tree_snapshot(revision)?)
            }
            DiffMode::WorktreeTree(revision) => {
                compare_worktree(self.workspace(), &self.tree_snapshot(revision)?)?
            }
            DiffMode::TreeTree(old, new) => {
                let changes = compare_trees(&self.tree_snapshot(old)?, &self.tree_snapshot(new)?);
                for change in changes {
                    writeln!(self.writer(), "{change}")?;
                }
                return Ok(());
            }
        };

        for change in changes {
            writeln!(self.writer(), "{change}")?;
        }

        Ok(())
    }

    /// Staged blob id of every tracked path
    pub(crate) async fn staged_snapshot(&self) -> anyhow::Result<FlatTree> {
        let index = self.index();
        let mut index = index.lock().await;
        index.rehydrate()?;

        Ok(index
            .entries()
            .map(|entry| (entry.path.clone(), entry.oid.clone()))
            .collect())
    }

    /// Files of the tree a revision names; an unborn HEAD is the empty tree
    fn tree_snapshot(&self, revision: &str) -> anyhow::Result<FlatTree> {
        if revision == HEAD_REF_NAME && self.refs().read_head()?.is_none() {
            return Ok(FlatTree::new());
        }

        let oid = self.refs().resolve(revision)?;
        TreeDiff::new(self.database()).flatten(&oid)
    }
}
