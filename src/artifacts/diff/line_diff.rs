//! Line-level comparison of two blobs
//!
//! This is a greedy pointer walk, not a minimal edit script: on repeated or
//! reordered lines it can report more removals and additions than strictly
//! needed.

use colored::Colorize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineChange {
    Equal(String),
    Removed(String),
    Added(String),
}

impl std::fmt::Display for LineChange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LineChange::Equal(line) => write!(f, "  {line}"),
            LineChange::Removed(line) => write!(f, "{}", format!("- {line}").red()),
            LineChange::Added(line) => write!(f, "{}", format!("+ {line}").green()),
        }
    }
}

/// Walk both line lists in step
///
/// At each position: equal lines advance both sides; a line missing
/// anywhere on the other side is reported on its own; otherwise the pair is
/// reported as a removal followed by an addition.
pub fn compare_lines(old: &[String], new: &[String]) -> Vec<LineChange> {
    let mut changes = Vec::with_capacity(old.len().max(new.len()));
    let (mut i, mut j) = (0, 0);

    while i < old.len() || j < new.len() {
        let (left, right) = (old.get(i), new.get(j));

        match (left, right) {
            (Some(l), Some(r)) if l == r => {
                changes.push(LineChange::Equal(l.clone()));
                i += 1;
                j += 1;
            }
            (Some(l), r) if r.is_none() || !new.contains(l) => {
                changes.push(LineChange::Removed(l.clone()));
                i += 1;
            }
            (l, Some(r)) if l.is_none() || !old.contains(r) => {
                changes.push(LineChange::Added(r.clone()));
                j += 1;
            }
            (Some(l), Some(r)) => {
                changes.push(LineChange::Removed(l.clone()));
                changes.push(LineChange::Added(r.clone()));
                i += 1;
                j += 1;
            }
            _ => break,
        }
    }

    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|l| l.to_string()).collect()
    }

    #[test]
    fn identical_inputs_are_all_equal() {
        let text = lines(&["a", "b"]);

        assert_eq!(
            compare_lines(&text, &text),
            vec![LineChange::Equal("a".into()), LineChange::Equal("b".into())]
        );
    }

    #[test]
    fn inserted_line_is_added() {
        let changes = compare_lines(&lines(&["a", "c"]), &lines(&["a", "b", "c"]));

        assert_eq!(
            changes,
            vec![
                LineChange::Equal("a".into()),
                LineChange::Added("b".into()),
                LineChange::Equal("c".into()),
            ]
        );
    }

    #[test]
    fn replaced_line_is_removed_then_added() {
        let changes = compare_lines(&lines(&["a", "x", "c"]), &lines(&["a", "y", "c"]));

        assert_eq!(
            changes,
            vec![
                LineChange::Equal("a".into()),
                LineChange::Removed("x".into()),
                LineChange::Added("y".into()),
                LineChange::Equal("c".into()),
            ]
        );
    }

    #[test]
    fn swapped_lines_are_not_minimal() {
        let changes = compare_lines(&lines(&["a", "b"]), &lines(&["b", "a"]));

        assert_eq!(
            changes,
            vec![
                LineChange::Removed("a".into()),
                LineChange::Added("b".into()),
                LineChange::Removed("b".into()),
                LineChange::Added("a".into()),
            ]
        );
    }

    #[test]
    fn one_side_empty() {
        assert_eq!(
            compare_lines(&[], &lines(&["a"])),
            vec![LineChange::Added("a".into())]
        );
        assert_eq!(
            compare_lines(&lines(&["a"]), &[]),
            vec![LineChange::Removed("a".into())]
        );
    }
}
