use crate::areas::repository::Repository;
use crate::errors::Error;

impl Repository {
    /// List the direct entries of a tree, or of the tree of a commit
    pub fn ls_tree(&self, revision: &str, name_only: bool) -> anyhow::Result<()> {
        let oid = self.refs().resolve(revision)?;
        let tree_oid = self.database().peel_to_tree(&oid)?;
        let tree = self
            .database()
            .parse_object_as_tree(&tree_oid)?
            .ok_or_else(|| Error::malformed_object(tree_oid.as_ref(), "expected a tree"))?;

        for entry in tree.entries() {
            if name_only {
                writeln!(self.writer(), "{}", entry.name)?;
            } else {
                writeln!(
                    self.writer(),
                    "{} {} {}\t{}",
                    entry.mode,
                    entry.object_type(),
                    entry.oid,
                    entry.name
                )?;
            }
        }

        Ok(())
    }
}
