use crate::areas::refs::DEFAULT_BRANCH;
use crate::areas::repository::Repository;
use anyhow::Context;
use std::fs;

impl Repository {
    pub fn init(&self) -> anyhow::Result<()> {
        self.create_layout()?;

        writeln!(
            self.writer(),
            "Initialized empty Git repository in {}",
            self.git_path().display()
        )?;

        Ok(())
    }

    /// Object and ref directories plus HEAD on the default branch
    ///
    /// An existing HEAD is left alone, so re-running init is harmless.
    pub(crate) fn create_layout(&self) -> anyhow::Result<()> {
        fs::create_dir_all(self.database().objects_path())
            .context("Failed to create .git/objects directory")?;

        fs::create_dir_all(self.refs().heads_path())
            .context("Failed to create .git/refs/heads directory")?;

        if !self.refs().head_path().exists() {
            self.refs()
                .set_head_to_branch(DEFAULT_BRANCH)
                .context("Failed to create initial HEAD reference")?;
        }
        tracing::debug!(path = %self.git_path().display(), "repository layout ready");

        Ok(())
    }
}
