use crate::areas::repository::Repository;
use crate::artifacts::objects::commit::Commit;
use crate::artifacts::objects::object_id::ObjectId;
use crate::errors::Error;
use colored::Colorize;

impl Repository {
    /// Walk first parents from HEAD, newest first
    pub fn log(&self, oneline: bool) -> anyhow::Result<()> {
        let mut current = self.refs().read_head()?;
        let mut first = true;

        while let Some(oid) = current {
            let commit = self
                .database()
                .parse_object_as_commit(&oid)?
                .ok_or_else(|| Error::malformed_object(oid.as_ref(), "expected a commit"))?;

            if oneline {
                self.show_commit_oneline(&oid, &commit)?;
            } else {
                if !first {
                    writeln!(self.writer())?;
                }
                self.show_commit_medium(&oid, &commit)?;
            }

            first = false;
            current = commit.parent().cloned();
        }

        Ok(())
    }

    fn show_commit_medium(&self, oid: &ObjectId, commit: &Commit) -> anyhow::Result<()> {
        writeln!(self.writer(), "{}", format!("commit {oid}").yellow())?;
        writeln!(self.writer(), "Author: {}", commit.author().display_name())?;
        writeln!(
            self.writer(),
            "Date:   {}",
            commit.author().readable_timestamp()
        )?;
        writeln!(self.writer())?;
        for message_line in commit.message().lines() {
            writeln!(self.writer(), "    {message_line}")?;
        }

        Ok(())
    }

    fn show_commit_oneline(&self, oid: &ObjectId, commit: &Commit) -> anyhow::Result<()> {
        writeln!(
            self.writer(),
            "{} {}",
            oid.to_short_oid().yellow(),
            commit.short_message()
        )?;

        Ok(())
    }
}
