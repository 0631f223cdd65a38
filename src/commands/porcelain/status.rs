use crate::areas::repository::Repository;
use crate::artifacts::diff::tree_diff::compare_worktree;

// Terminology:
// - modified files: tracked by the index, content differs in the workspace
// - deleted files: tracked by the index, missing from the workspace
// - untracked files: present in the workspace, not tracked by the index
impl Repository {
    pub async fn status(&self) -> anyhow::Result<()> {
        let staged = self.staged_snapshot().await?;

        let changes = compare_worktree(self.workspace(), &staged)?;
        let untracked = self
            .workspace()
            .list_files("")?
            .into_iter()
            .filter(|path| !staged.contains_key(path))
            .collect::<Vec<_>>();

        if changes.is_empty() && untracked.is_empty() {
            writeln!(self.writer(), "nothing to commit, working tree clean")?;
            return Ok(());
        }

        for change in changes {
            writeln!(self.writer(), " {} {}", change.kind.short_code(), change.path)?;
        }
        for path in untracked {
            writeln!(self.writer(), "?? {path}")?;
        }

        Ok(())
    }
}
