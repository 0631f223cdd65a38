use crate::areas::repository::Repository;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::tree::Tree;
use crate::artifacts::tree_builder::TreeBuilder;

impl Repository {
    pub async fn write_tree(&self, from_workspace: bool) -> anyhow::Result<()> {
        let tree_oid = if from_workspace {
            let builder = TreeBuilder::new(self.database(), self.path());
            match builder.build_from_workspace().await? {
                Some(oid) => oid,
                None => self.database().store(&Tree::empty())?,
            }
        } else {
            self.write_staged_tree().await?
        };

        writeln!(self.writer(), "{tree_oid}")?;

        Ok(())
    }

    /// Record the staged files as trees; the empty tree when nothing is staged
    pub(crate) async fn write_staged_tree(&self) -> anyhow::Result<ObjectId> {
        let staged = {
            let index = self.index();
            let mut index = index.lock().await;
            index.rehydrate()?;
            index.paths()
        };

        let builder = TreeBuilder::new(self.database(), self.path());
        match builder.build_from_staged(&staged).await? {
            Some(oid) => Ok(oid),
            None => self.database().store(&Tree::empty()),
        }
    }
}
