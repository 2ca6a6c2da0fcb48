use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::Serialize;

/// Path to modification time for every Markdown file seen by one walk.
///
/// A snapshot is never updated in place; the next poll builds a new one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileSnapshot {
    files: BTreeMap<PathBuf, SystemTime>,
}

impl FileSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: PathBuf, modified: SystemTime) {
        self.files.insert(path, modified);
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn get(&self, path: &Path) -> Option<SystemTime> {
        self.files.get(path).copied()
    }

    /// Classifies every path that differs between `previous` and `current`.
    ///
    /// Timestamps are compared with exact inequality; any difference at all,
    /// including a clock moving backwards, counts as a modification.
    pub fn diff(previous: &FileSnapshot, current: &FileSnapshot) -> ChangeSet {
        let mut changes = Vec::new();

        for (path, modified) in &current.files {
            match previous.files.get(path) {
                None => changes.push(Change::new(ChangeKind::Added, path.clone())),
                Some(before) if before != modified => {
                    changes.push(Change::new(ChangeKind::Modified, path.clone()))
                }
                Some(_) => {}
            }
        }

        for path in previous.files.keys() {
            if !current.files.contains_key(path) {
                changes.push(Change::new(ChangeKind::Removed, path.clone()));
            }
        }

        ChangeSet { changes }
    }
}

impl FromIterator<(PathBuf, SystemTime)> for FileSnapshot {
    fn from_iter<T: IntoIterator<Item = (PathBuf, SystemTime)>>(iter: T) -> Self {
        Self {
            files: iter.into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Modified,
    Removed,
}

impl ChangeKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            ChangeKind::Added => "added",
            ChangeKind::Modified => "modified",
            ChangeKind::Removed => "removed",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Change {
    pub kind: ChangeKind,
    pub path: PathBuf,
}

impl Change {
    pub fn new(kind: ChangeKind, path: PathBuf) -> Self {
        Self { kind, path }
    }
}

/// Result of comparing two snapshots. Transient; only used to decide on a
/// trigger and to print change lines.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    changes: Vec<Change>,
}

impl ChangeSet {
    pub fn is_changed(&self) -> bool {
        !self.changes.is_empty()
    }

    pub fn changes(&self) -> &[Change] {
        &self.changes
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn count(&self, kind: ChangeKind) -> usize {
        self.changes.iter().filter(|c| c.kind == kind).count()
    }

    pub fn kind_of(&self, path: &Path) -> Option<ChangeKind> {
        self.changes
            .iter()
            .find(|c| c.path == path)
            .map(|c| c.kind)
    }
}
