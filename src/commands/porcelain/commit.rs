use crate::areas::repository::Repository;

impl Repository {
    pub async fn commit(&self, message: &str) -> anyhow::Result<()> {
        let parent = self.refs().read_head()?;
        let is_root = if parent.is_none() { " (root-commit)" } else { "" };

        let (commit_oid, commit) = self.write_commit(parent, message).await?;
        let branch = self
            .refs()
            .current_branch()?
            .unwrap_or_else(|| "detached HEAD".to_string());

        writeln!(
            self.writer(),
            "[{branch}{is_root} {}] {}",
            commit_oid.to_short_oid(),
            commit.short_message()
        )?;

        Ok(())
    }
}
