use anyhow::Result;
use clap::{Parser, Subcommand};
use is_terminal::IsTerminal;
use kit::areas::repository::Repository;
use kit::commands::plumbing::diff::DiffMode;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "kit",
    version = "0.1.0",
    author = "Sami Barbut-Dica",
    about = "A content-addressed version control storage core",
    long_about = "kit stores files as content-addressed objects, stages them in a binary index, \
    records trees and commits, compares snapshots and clones remotes over smart HTTP.",
    help_template = r"
{name} {version} - {about}

USAGE:
    {usage}

OPTIONS:
    {all-args}
",
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(
        name = "init",
        about = "Initialize a new repository",
        long_about = "This command initializes a new repository in the current directory or at the specified path."
    )]
    Init {
        #[arg(index = 1, help = "The path to the repository")]
        path: Option<String>,
    },
    #[command(name = "cat-file", about = "Print the content of an object")]
    CatFile {
        #[arg(short = 'p', long = "pretty", help = "The object id (or ref) to print")]
        revision: String,
    },
    #[command(
        name = "hash-object",
        about = "Compute the blob id of a file and optionally write it to the object store"
    )]
    HashObject {
        #[arg(short, long, help = "Write the object to the object store")]
        write: bool,
        #[arg(index = 1)]
        file: String,
    },
    #[command(name = "ls-tree", about = "List the entries of a tree")]
    LsTree {
        #[arg(long, help = "Print only entry names")]
        name_only: bool,
        #[arg(index = 1, help = "A tree or commit id, or a ref")]
        revision: String,
    },
    #[command(name = "update-index", about = "Stage or unstage a single file")]
    UpdateIndex {
        #[arg(long, help = "Remove the file from the index")]
        remove: bool,
        #[arg(index = 1)]
        path: String,
    },
    #[command(name = "write-tree", about = "Record the staged files as a tree")]
    WriteTree {
        #[arg(long, help = "Snapshot every file in the working tree instead")]
        workspace: bool,
    },
    #[command(name = "commit-tree", about = "Create a commit from the staged tree")]
    CommitTree {
        #[arg(index = 1)]
        message: String,
        #[arg(index = 2, help = "The parent commit")]
        parent: Option<String>,
    },
    #[command(name = "add", about = "Stage files or directories")]
    Add {
        #[arg(index = 1, required = true)]
        paths: Vec<String>,
    },
    #[command(name = "commit", about = "Record the staged files on the current branch")]
    Commit {
        #[arg(short, long, help = "The commit message")]
        message: String,
    },
    #[command(name = "status", about = "Show modified, deleted and untracked files")]
    Status,
    #[command(name = "log", about = "Show the history of HEAD")]
    Log {
        #[arg(long, help = "One line per commit")]
        oneline: bool,
    },
    #[command(name = "diff", about = "Compare two snapshots path by path")]
    Diff {
        #[command(subcommand)]
        mode: DiffCommand,
    },
    #[command(name = "compare-blobs", about = "Compare two blobs line by line")]
    CompareBlobs {
        #[arg(index = 1)]
        old: String,
        #[arg(index = 2)]
        new: String,
    },
    #[command(name = "clone", about = "Clone a repository over smart HTTP")]
    Clone {
        #[arg(index = 1)]
        url: String,
        #[arg(index = 2, help = "Target directory, defaults to the last URL segment")]
        directory: Option<String>,
    },
}

#[derive(Subcommand)]
enum DiffCommand {
    #[command(name = "worktree-index", alias = "1")]
    WorktreeIndex,
    #[command(name = "index-tree", alias = "2")]
    IndexTree {
        #[arg(index = 1, default_value = "HEAD")]
        revision: String,
    },
    #[command(name = "worktree-tree", alias = "3")]
    WorktreeTree {
        #[arg(index = 1, default_value = "HEAD")]
        revision: String,
    },
    #[command(name = "tree-tree", alias = "4")]
    TreeTree {
        #[arg(index = 1)]
        old: String,
        #[arg(index = 2)]
        new: String,
    },
}

impl From<&DiffCommand> for DiffMode {
    fn from(command: &DiffCommand) -> Self {
        match command {
            DiffCommand::WorktreeIndex => DiffMode::WorktreeIndex,
            DiffCommand::IndexTree { revision } => DiffMode::IndexTree(revision.clone()),
            DiffCommand::WorktreeTree { revision } => DiffMode::WorktreeTree(revision.clone()),
            DiffCommand::TreeTree { old, new } => DiffMode::TreeTree(old.clone(), new.clone()),
        }
    }
}

fn open_current() -> Result<Repository> {
    let pwd = std::env::current_dir()?;
    Repository::open(&pwd, Box::new(std::io::stdout()))
}

/// `https://host/group/project.git/` -> `project`
fn clone_directory(url: &str) -> PathBuf {
    let name = url
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .trim_end_matches(".git");

    if name.is_empty() {
        PathBuf::from("repository")
    } else {
        PathBuf::from(name)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("KIT_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
    colored::control::set_override(std::io::stdout().is_terminal());

    let cli = Cli::parse();

    match &cli.command {
        Commands::Init { path } => {
            let path = match path {
                Some(path) => PathBuf::from(path),
                None => std::env::current_dir()?,
            };
            Repository::new(&path, Box::new(std::io::stdout()))?.init()?
        }
        Commands::CatFile { revision } => open_current()?.cat_file(revision)?,
        Commands::HashObject { write, file } => open_current()?.hash_object(file, *write)?,
        Commands::LsTree {
            name_only,
            revision,
        } => open_current()?.ls_tree(revision, *name_only)?,
        Commands::UpdateIndex { remove, path } => {
            open_current()?.update_index(path, *remove).await?
        }
        Commands::WriteTree { workspace } => open_current()?.write_tree(*workspace).await?,
        Commands::CommitTree { message, parent } => {
            open_current()?
                .commit_tree(message, parent.as_deref())
                .await?
        }
        Commands::Add { paths } => open_current()?.add(paths).await?,
        Commands::Commit { message } => open_current()?.commit(message).await?,
        Commands::Status => open_current()?.status().await?,
        Commands::Log { oneline } => open_current()?.log(*oneline)?,
        Commands::Diff { mode } => open_current()?.diff(&DiffMode::from(mode)).await?,
        Commands::CompareBlobs { old, new } => open_current()?.compare_blobs(old, new)?,
        Commands::Clone { url, directory } => {
            let target = match directory {
                Some(directory) => PathBuf::from(directory),
                None => clone_directory(url),
            };
            if target.join(".git").exists() {
                anyhow::bail!("destination path '{}' already exists", target.display());
            }
            Repository::new(Path::new(&target), Box::new(std::io::stdout()))?
                .clone_from(url)
                .await?
        }
    }

    Ok(())
}
