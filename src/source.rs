//! Flat-file data sources.
//!
//! Both files are re-read on every request; nothing is cached, so edits
//! to the files are visible to the next query.

use crate::protocol::SEGMENT_DELIMITER;
use std::io;
use std::path::{Path, PathBuf};

/// Paths of the lists and values files.
#[derive(Debug, Clone)]
pub struct DataFiles {
    lists: PathBuf,
    values: PathBuf,
}

impl DataFiles {
    pub fn new(lists: impl Into<PathBuf>, values: impl Into<PathBuf>) -> Self {
        Self {
            lists: lists.into(),
            values: values.into(),
        }
    }

    pub fn lists_path(&self) -> &Path {
        &self.lists
    }

    pub fn values_path(&self) -> &Path {
        &self.values
    }

    /// Full contents of the lists file.
    pub async fn lists(&self) -> io::Result<String> {
        tokio::fs::read_to_string(&self.lists).await
    }

    /// Full contents of the values file.
    pub async fn values(&self) -> io::Result<String> {
        tokio::fs::read_to_string(&self.values).await
    }
}

/// Segment `index` of `#`-separated `content`, if present.
pub fn segment(content: &str, index: usize) -> Option<&str> {
    content.split(SEGMENT_DELIMITER).nth(index)
}

/// Number of `#`-separated segments in `content`.
pub fn segment_count(content: &str) -> usize {
    content.split(SEGMENT_DELIMITER).count()
}

#[cfg(test)]
pub(crate) mod fixture {
    use super::DataFiles;
    use tempfile::{tempdir, TempDir};

    /// Temporary directory holding a lists and a values file.
    pub struct Fixture {
        _dir: TempDir,
        pub files: DataFiles,
    }

    impl Fixture {
        pub fn new(lists: &str, values: &str) -> Self {
            let dir = tempdir().unwrap();
            let lists_path = dir.path().join("lists.txt");
            let values_path = dir.path().join("values.txt");
            std::fs::write(&lists_path, lists).unwrap();
            std::fs::write(&values_path, values).unwrap();

            Self {
                _dir: dir,
                files: DataFiles::new(lists_path, values_path),
            }
        }

        /// Data files pointing at paths that do not exist.
        pub fn missing() -> Self {
            let fixture = Self::new("", "");
            std::fs::remove_file(fixture.files.lists_path()).unwrap();
            std::fs::remove_file(fixture.files.values_path()).unwrap();
            fixture
        }
    }
}
