use crate::areas::repository::Repository;
use crate::artifacts::objects::commit::{Author, Commit};
use crate::artifacts::objects::object_id::ObjectId;

impl Repository {
    pub async fn commit_tree(&self, message: &str, parent: Option<&str>) -> anyhow::Result<()> {
        let parent = parent
            .map(|revision| self.refs().resolve(revision))
            .transpose()?;
        let (commit_oid, _) = self.write_commit(parent, message).await?;

        writeln!(self.writer(), "{commit_oid}")?;

        Ok(())
    }

    /// Store a commit of the staged tree and advance HEAD to it
    pub(crate) async fn write_commit(
        &self,
        parent: Option<ObjectId>,
        message: &str,
    ) -> anyhow::Result<(ObjectId, Commit)> {
        let tree_oid = self.write_staged_tree().await?;

        let author = Author::load_from_env()?;
        let committer = Author::committer_from_env(&author);
        let commit = Commit::new(parent, tree_oid, author, committer, message.to_string());

        let commit_oid = self.database().store(&commit)?;
        self.refs().update_head(&commit_oid)?;

        Ok((commit_oid, commit))
    }
}
