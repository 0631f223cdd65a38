use crate::areas::repository::Repository;

impl Repository {
    pub fn cat_file(&self, revision: &str) -> anyhow::Result<()> {
        let oid = self.refs().resolve(revision)?;
        let object = self.database().parse_object(&oid)?;

        write!(self.writer(), "{}", object.display())?;

        Ok(())
    }
}
