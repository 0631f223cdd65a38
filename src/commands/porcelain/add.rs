use crate::areas::repository::Repository;

impl Repository {
    /// Stage files, expanding directories (and `.`) to every file below them
    ///
    /// Tracked files that no longer exist under an added directory are
    /// unstaged, so `add .` records deletions too.
    pub async fn add(&self, pathspecs: &[String]) -> anyhow::Result<()> {
        let index = self.index();
        let mut index = index.lock().await;
        index.rehydrate()?;

        for pathspec in pathspecs {
            let root = match self.workspace().normalize_pathspec(pathspec) {
                Ok(root) => root,
                Err(err) => {
                    // a tracked file deleted from disk is still a valid pathspec
                    let tracked = pathspec.trim_start_matches("./").trim_end_matches('/');
                    if index.is_tracked(tracked) {
                        index.remove(tracked);
                        continue;
                    }
                    return Err(err);
                }
            };

            let files = self.workspace().list_files(&root)?;
            for gone in index
                .paths_under(&root)
                .into_iter()
                .filter(|path| !self.workspace().exists(path))
            {
                tracing::debug!(path = gone, "unstaging deleted file");
                index.remove(&gone);
            }

            for file in files {
                index.upsert(self.stage_file(&file)?);
            }
        }

        index.write_updates()?;

        Ok(())
    }
}
