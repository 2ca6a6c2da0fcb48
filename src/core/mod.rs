mod counts;
mod snapshot;

pub use counts::{DirectoryCount, DirectoryCounts, ROOT_LABEL};
pub use snapshot::{Change, ChangeKind, ChangeSet, FileSnapshot};
