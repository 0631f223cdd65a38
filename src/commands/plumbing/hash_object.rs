use crate::areas::repository::Repository;
use crate::artifacts::objects::object_type::ObjectType;

impl Repository {
    pub fn hash_object(&self, file_path: &str, write: bool) -> anyhow::Result<()> {
        let data = self.workspace().read_file(file_path)?;

        let oid = if write {
            self.database().write(ObjectType::Blob, &data)?
        } else {
            self.database().hash(ObjectType::Blob, &data)?
        };

        writeln!(self.writer(), "{oid}")?;

        Ok(())
    }
}
