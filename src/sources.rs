use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::Config;

/// A named set of input files: a root directory plus the extensions that
/// belong in the group. Groups are fixed once the config is loaded;
/// scanning is the only operation.
pub struct SourceGroup {
    name: &'static str,
    root: PathBuf,
    extensions: &'static [&'static str],
}

impl SourceGroup {
    pub fn styles(config: &Config) -> Self {
        Self {
            name: "styles",
            root: config.styles.src.clone(),
            extensions: &["scss"],
        }
    }

    pub fn scripts(config: &Config) -> Self {
        Self {
            name: "scripts",
            root: config.scripts.src.clone(),
            extensions: &["js"],
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Every matching file under the root, sorted by path. The sort is
    /// what keeps bundle concatenation order stable across platforms and
    /// filesystems. A missing root scans to an empty set, not an error.
    pub fn scan(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = WalkDir::new(&self.root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.path().to_path_buf())
            .filter(|p| self.matches(p))
            .collect();
        files.sort();
        files
    }

    fn matches(&self, path: &Path) -> bool {
        path.extension()
            .map(|ext| ext.to_string_lossy())
            .is_some_and(|ext| self.extensions.contains(&ext.as_ref()))
    }
}
