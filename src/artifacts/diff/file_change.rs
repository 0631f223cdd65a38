use crate::artifacts::objects::object_id::ObjectId;
use colored::Colorize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ChangeKind {
    Added,
    Modified,
    Deleted,
}

impl ChangeKind {
    /// Label printed before the path, padded so paths line up
    pub fn label(&self) -> &'static str {
        match self {
            ChangeKind::Added => "added:     ",
            ChangeKind::Modified => "modified:  ",
            ChangeKind::Deleted => "deleted:   ",
        }
    }

    /// One-letter code used by `status`
    pub fn short_code(&self) -> char {
        match self {
            ChangeKind::Added => 'A',
            ChangeKind::Modified => 'M',
            ChangeKind::Deleted => 'D',
        }
    }
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let colored_str = match self {
            ChangeKind::Added => self.label().green(),
            ChangeKind::Modified => self.label().yellow(),
            ChangeKind::Deleted => self.label().red(),
        };
        write!(f, "{colored_str}")
    }
}

/// A path whose content differs between two snapshots
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct FileChange {
    pub path: String,
    pub kind: ChangeKind,
}

impl FileChange {
    pub fn new(path: impl Into<String>, kind: ChangeKind) -> Self {
        FileChange {
            path: path.into(),
            kind,
        }
    }
}

impl std::fmt::Display for FileChange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.kind, self.path)
    }
}

/// A path whose blob id differs between two trees; `None` means absent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeChange {
    pub path: String,
    pub old: Option<ObjectId>,
    pub new: Option<ObjectId>,
}

impl TreeChange {
    pub fn kind(&self) -> ChangeKind {
        match (&self.old, &self.new) {
            (None, _) => ChangeKind::Added,
            (_, None) => ChangeKind::Deleted,
            _ => ChangeKind::Modified,
        }
    }
}

impl std::fmt::Display for TreeChange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let side = |oid: &Option<ObjectId>| {
            oid.as_ref()
                .map(ToString::to_string)
                .unwrap_or_else(|| "-".to_string())
        };
        write!(f, "{} {} {}", self.path, side(&self.old), side(&self.new))
    }
}
