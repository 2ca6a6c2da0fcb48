use std::collections::BTreeMap;

use serde::Serialize;

/// Label used for Markdown files sitting directly in the tree root. A real
/// top-level directory with this name is labeled with a trailing `/`.
pub const ROOT_LABEL: &str = "(root)";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectoryCount {
    pub directory: String,
    pub count: u64,
}

/// Markdown files directly contained in each directory, keyed by the
/// directory path relative to the scanned root. Directories without any
/// Markdown file never appear.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryCounts {
    counts: BTreeMap<String, u64>,
}

impl DirectoryCounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&mut self, directory: impl Into<String>) {
        let acc = self.counts.entry(directory.into()).or_insert(0);
        *acc = acc.saturating_add(1);
    }

    pub fn get(&self, directory: &str) -> Option<u64> {
        self.counts.get(directory).copied()
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    /// Count descending; equal counts fall back to the label so output is stable.
    pub fn sorted(&self) -> Vec<DirectoryCount> {
        let mut rows: Vec<DirectoryCount> = self
            .counts
            .iter()
            .map(|(directory, count)| DirectoryCount {
                directory: directory.clone(),
                count: *count,
            })
            .collect();
        rows.sort_by(|a, b| {
            b.count
                .cmp(&a.count)
                .then_with(|| a.directory.cmp(&b.directory))
        });
        rows
    }
}

impl<S: Into<String>> FromIterator<(S, u64)> for DirectoryCounts {
    fn from_iter<T: IntoIterator<Item = (S, u64)>>(iter: T) -> Self {
        let counts = iter
            .into_iter()
            .filter(|(_, n)| *n > 0)
            .map(|(d, n)| (d.into(), n))
            .collect();
        Self { counts }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sorted_orders_by_count_then_label() {
        let counts: DirectoryCounts = [("b", 2), ("a", 2), ("c", 5), (ROOT_LABEL, 1)]
            .into_iter()
            .collect();
        let labels: Vec<String> = counts.sorted().into_iter().map(|r| r.directory).collect();
        assert_eq!(labels, vec!["c", "a", "b", ROOT_LABEL]);
        assert_eq!(counts.total(), 10);
    }

    #[test]
    fn zero_counts_are_dropped() {
        let counts: DirectoryCounts = [("docs", 0), ("notes", 3)].into_iter().collect();
        assert_eq!(counts.len(), 1);
        assert_eq!(counts.get("docs"), None);
    }

    #[test]
    fn increment_accumulates() {
        let mut counts = DirectoryCounts::new();
        counts.increment("docs");
        counts.increment("docs");
        counts.increment(ROOT_LABEL);
        assert_eq!(counts.get("docs"), Some(2));
        assert_eq!(counts.total(), 3);
    }
}
