use crate::areas::repository::Repository;
use crate::artifacts::index::index_entry::IndexEntry;
use crate::artifacts::objects::object_type::ObjectType;
use crate::errors::Error;

impl Repository {
    /// Stage the current content of one file, or drop it from the index
    pub async fn update_index(&self, pathspec: &str, remove: bool) -> anyhow::Result<()> {
        let index = self.index();
        let mut index = index.lock().await;
        index.rehydrate()?;

        if remove {
            let path = self
                .workspace()
                .normalize_pathspec(pathspec)
                .unwrap_or_else(|_| pathspec.trim_start_matches("./").to_string());
            if !index.is_tracked(&path) {
                return Err(Error::invalid_pathspec(pathspec).into());
            }
            index.remove(&path);
        } else {
            let path = self.workspace().normalize_pathspec(pathspec)?;
            if !self.workspace().exists(&path) {
                return Err(Error::invalid_pathspec(pathspec).into());
            }
            index.upsert(self.stage_file(&path)?);
        }

        index.write_updates()?;

        Ok(())
    }

    /// Store the blob for `path` and build its index record
    pub(crate) fn stage_file(&self, path: &str) -> anyhow::Result<IndexEntry> {
        let data = self.workspace().read_file(path)?;
        let metadata = self.workspace().stat_file(path)?;
        let oid = self.database().write(ObjectType::Blob, &data)?;

        Ok(IndexEntry::new(path.to_string(), oid, metadata))
    }
}
