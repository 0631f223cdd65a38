use crate::areas::refs::DEFAULT_BRANCH;
use crate::areas::repository::Repository;
use crate::artifacts::pack::client::PackClient;
use crate::artifacts::pack::pack_file::ingest_pack;

impl Repository {
    /// Populate this (fresh) repository from a remote over smart HTTP
    ///
    /// Only objects the pack carries in full end up in the store. A branch
    /// ref is written when its commit is present; HEAD follows the remote's
    /// HEAD, falling back to `master` and then to the first branch.
    pub async fn clone_from(&self, url: &str) -> anyhow::Result<()> {
        writeln!(self.writer(), "Cloning into '{}'...", self.path().display())?;
        self.create_layout()?;

        let client = PackClient::new(url)?;
        let remote = client.discover_refs().await?;
        let wants = remote.wanted_ids();
        if wants.is_empty() {
            writeln!(
                self.writer(),
                "warning: You appear to have cloned an empty repository."
            )?;
            return Ok(());
        }

        let pack = client
            .fetch_pack(&wants, PackClient::wants_side_band(&remote))
            .await?;
        let summary = ingest_pack(&pack, self.database())?;

        let mut written = Vec::new();
        for (branch, oid) in remote.branches() {
            if self.database().exists(oid) {
                self.refs().update_branch(branch, oid)?;
                written.push(branch);
            } else {
                tracing::warn!(branch, %oid, "branch commit not in pack, ref not written");
            }
        }

        let head = remote
            .head_branch()
            .filter(|branch| written.contains(branch))
            .or_else(|| written.iter().copied().find(|branch| *branch == DEFAULT_BRANCH))
            .or_else(|| written.first().copied());
        if let Some(branch) = head {
            self.refs().set_head_to_branch(branch)?;
        }

        writeln!(
            self.writer(),
            "Received {} objects: {} stored, {} deltas not reconstructed",
            summary.declared,
            summary.stored,
            summary.deltas
        )?;

        Ok(())
    }
}
