use crate::areas::repository::Repository;
use crate::artifacts::diff::line_diff::compare_lines;
use crate::artifacts::objects::blob::Blob;
use crate::errors::Error;

impl Repository {
    pub fn compare_blobs(&self, old: &str, new: &str) -> anyhow::Result<()> {
        let old = self.load_blob(old)?;
        let new = self.load_blob(new)?;

        for change in compare_lines(&old.lines(), &new.lines()) {
            writeln!(self.writer(), "{change}")?;
        }

        Ok(())
    }

    fn load_blob(&self, revision: &str) -> anyhow::Result<Blob> {
        let oid = self.refs().resolve(revision)?;

        self.database()
            .parse_object_as_blob(&oid)?
            .ok_or_else(|| Error::malformed_object(oid.as_ref(), "both objects must be blobs").into())
    }
}
