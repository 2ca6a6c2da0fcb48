use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use walkdir::{DirEntry, WalkDir};

use crate::core::{DirectoryCounts, FileSnapshot, ROOT_LABEL};

/// Decides which walk entries are Markdown files and which subtrees are skipped.
#[derive(Debug, Clone)]
pub struct MarkdownFilter {
    suffix: String,
    excludes: GlobSet,
}

impl MarkdownFilter {
    pub fn new(suffix: &str, excludes: &[String]) -> Result<Self> {
        Ok(Self {
            suffix: suffix.to_string(),
            excludes: build_exclude_set(excludes)?,
        })
    }

    pub fn is_markdown(&self, path: &Path) -> bool {
        path.file_name()
            .map(|name| name.to_string_lossy().ends_with(self.suffix.as_str()))
            .unwrap_or(false)
    }

    fn keep(&self, entry: &DirEntry) -> bool {
        entry.depth() == 0 || !self.excludes.is_match(entry.path())
    }
}

#[derive(Debug, Clone)]
pub struct ScanError {
    pub path: Option<PathBuf>,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct SnapshotScan {
    pub snapshot: FileSnapshot,
    pub errors: Vec<ScanError>,
}

#[derive(Debug, Clone)]
pub struct CountScan {
    pub root: PathBuf,
    pub counts: DirectoryCounts,
    pub errors: Vec<ScanError>,
}

pub fn validate_excludes(excludes: &[String]) -> Result<()> {
    let _ = build_exclude_set(excludes)?;
    Ok(())
}

fn build_exclude_set(excludes: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in excludes {
        builder.add(Glob::new(pat).with_context(|| format!("invalid exclude glob: {pat}"))?);
    }
    Ok(builder.build()?)
}

fn ensure_root(root: &Path) -> Result<()> {
    let meta = std::fs::metadata(root)
        .with_context(|| format!("root directory is not accessible: {}", root.display()))?;
    if !meta.is_dir() {
        anyhow::bail!("root is not a directory: {}", root.display());
    }
    Ok(())
}

fn walk_error(err: walkdir::Error) -> ScanError {
    ScanError {
        path: err.path().map(Path::to_path_buf),
        message: err.to_string(),
    }
}

/// Walks `root` and records the modification time of every Markdown file.
///
/// Entries whose metadata cannot be read (removed mid-walk, permission denied)
/// are left out of the snapshot and reported in `errors`. Only a missing or
/// unreadable root fails the whole scan.
pub fn snapshot(root: &Path, filter: &MarkdownFilter) -> Result<SnapshotScan> {
    ensure_root(root)?;

    let mut snapshot = FileSnapshot::new();
    let mut errors = Vec::new();

    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| filter.keep(e));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                errors.push(walk_error(err));
                continue;
            }
        };
        if !entry.file_type().is_file() || !filter.is_markdown(entry.path()) {
            continue;
        }

        let modified = entry
            .metadata()
            .map_err(anyhow::Error::from)
            .and_then(|meta| meta.modified().map_err(anyhow::Error::from));
        match modified {
            Ok(modified) => snapshot.insert(entry.path().to_path_buf(), modified),
            Err(err) => errors.push(ScanError {
                path: Some(entry.path().to_path_buf()),
                message: format!("failed to read modification time: {err}"),
            }),
        }
    }

    Ok(SnapshotScan { snapshot, errors })
}

/// Tallies Markdown files per containing directory, relative to `root`.
pub fn count_directories(root: &Path, filter: &MarkdownFilter) -> Result<CountScan> {
    ensure_root(root)?;

    let mut counts = DirectoryCounts::new();
    let mut errors = Vec::new();

    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| filter.keep(e));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                errors.push(walk_error(err));
                continue;
            }
        };
        if !entry.file_type().is_file() || !filter.is_markdown(entry.path()) {
            continue;
        }
        if let Some(label) = directory_label(entry.path(), root) {
            counts.increment(label);
        }
    }

    Ok(CountScan {
        root: root.to_path_buf(),
        counts,
        errors,
    })
}

fn directory_label(file_path: &Path, root: &Path) -> Option<String> {
    let parent = file_path.parent()?;
    let rel = parent.strip_prefix(root).ok()?;
    if rel.as_os_str().is_empty() {
        return Some(ROOT_LABEL.to_string());
    }
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    let label = parts.join("/");
    // a real top-level directory named like the root label must stay a separate row
    if label == ROOT_LABEL {
        return Some(format!("{label}/"));
    }
    Some(label)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    fn make_temp_root(tag: &str) -> PathBuf {
        static ROOT_SEQ: AtomicU64 = AtomicU64::new(0);

        let seq = ROOT_SEQ.fetch_add(1, Ordering::Relaxed);
        let dir = std::env::temp_dir().join(format!(
            "mdtally-scan-{tag}-{}-{seq}",
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).expect("create root");
        dir
    }

    fn write_file(path: &Path) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("mkdirs");
        }
        std::fs::write(path, b"# title\n").expect("write");
    }

    fn md_filter() -> MarkdownFilter {
        MarkdownFilter::new(".md", &[]).expect("filter")
    }

    #[test]
    fn count_directories_matches_reference_layout() {
        let root = make_temp_root("layout");
        write_file(&root.join("docs/a.md"));
        write_file(&root.join("docs/sub/b.md"));
        write_file(&root.join("notes.md"));
        write_file(&root.join("docs/readme.txt"));
        std::fs::create_dir_all(root.join("empty")).expect("mkdir");

        let scan = count_directories(&root, &md_filter()).expect("count");
        assert_eq!(scan.counts.get(ROOT_LABEL), Some(1));
        assert_eq!(scan.counts.get("docs"), Some(1));
        assert_eq!(scan.counts.get("docs/sub"), Some(1));
        assert_eq!(scan.counts.get("empty"), None);
        assert_eq!(scan.counts.len(), 3);
        assert_eq!(scan.counts.total(), 3);

        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn count_total_equals_snapshot_size() {
        let root = make_temp_root("roundtrip");
        for p in ["a.md", "x/b.md", "x/c.md", "x/y/z/d.md", "x/y/e.markdown", "f.MD"] {
            write_file(&root.join(p));
        }

        let filter = md_filter();
        let counts = count_directories(&root, &filter).expect("count");
        let snap = snapshot(&root, &filter).expect("snapshot");
        assert_eq!(counts.counts.total(), snap.snapshot.len() as u64);
        assert_eq!(snap.snapshot.len(), 4);

        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn snapshot_records_absolute_paths_with_mtimes() {
        let root = make_temp_root("snapshot");
        let file = root.join("docs/a.md");
        write_file(&file);
        write_file(&root.join("docs/b.txt"));

        let scan = snapshot(&root, &md_filter()).expect("snapshot");
        assert!(scan.errors.is_empty());
        assert_eq!(scan.snapshot.len(), 1);
        let expected = std::fs::metadata(&file)
            .and_then(|m| m.modified())
            .expect("mtime");
        assert_eq!(scan.snapshot.get(&file), Some(expected));

        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn excludes_prune_matching_subtrees() {
        let root = make_temp_root("exclude");
        write_file(&root.join("keep/a.md"));
        write_file(&root.join("node_modules/pkg/README.md"));

        let filter =
            MarkdownFilter::new(".md", &["**/node_modules".to_string()]).expect("filter");
        let scan = count_directories(&root, &filter).expect("count");
        assert_eq!(scan.counts.total(), 1);
        assert_eq!(scan.counts.get("keep"), Some(1));

        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn missing_root_is_an_error() {
        let root = make_temp_root("missing");
        let _ = std::fs::remove_dir_all(&root);
        assert!(snapshot(&root, &md_filter()).is_err());
        assert!(count_directories(&root, &md_filter()).is_err());
    }

    #[test]
    fn directory_named_like_the_root_label_keeps_its_own_row() {
        let root = make_temp_root("root-named");
        write_file(&root.join("top.md"));
        write_file(&root.join(ROOT_LABEL).join("inner.md"));

        let scan = count_directories(&root, &md_filter()).expect("count");
        assert_eq!(scan.counts.len(), 2);
        assert_eq!(scan.counts.get(ROOT_LABEL), Some(1));
        assert_eq!(scan.counts.get(&format!("{ROOT_LABEL}/")), Some(1));
        assert_eq!(scan.counts.total(), 2);

        let _ = std::fs::remove_dir_all(&root);
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_directory_is_reported_and_siblings_are_kept() {
        use std::os::unix::fs::PermissionsExt;

        let root = make_temp_root("unreadable");
        let kept = root.join("open/a.md");
        write_file(&kept);
        write_file(&root.join("locked/b.md"));
        let locked = root.join("locked");
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o000))
            .expect("chmod");

        // permission bits do not bind a privileged user
        if std::fs::read_dir(&locked).is_ok() {
            let _ = std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o755));
            let _ = std::fs::remove_dir_all(&root);
            return;
        }

        let filter = md_filter();
        let scan = snapshot(&root, &filter);
        let counted = count_directories(&root, &filter);
        let _ = std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o755));

        let scan = scan.expect("snapshot");
        assert_eq!(scan.snapshot.len(), 1);
        assert!(scan.snapshot.get(&kept).is_some());
        assert!(
            scan.errors
                .iter()
                .any(|e| e.path.as_deref() == Some(locked.as_path())),
            "errors={:?}",
            scan.errors
        );

        let counted = counted.expect("count");
        assert_eq!(counted.counts.total(), 1);
        assert!(!counted.errors.is_empty());

        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn invalid_exclude_glob_is_rejected() {
        assert!(validate_excludes(&["[".to_string()]).is_err());
        assert!(validate_excludes(&["**/.git".to_string()]).is_ok());
    }
}
