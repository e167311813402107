// This product includes software developed at Datadog (https://www.datadoghq.com/) Copyright 2024 Datadog, Inc.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Sentinel directory marking where a project keeps its hotpath configuration
pub const CONFIG_DIR: &str = ".hotpath";

/// Name of the allowlist file inside [`CONFIG_DIR`]
pub const ALLOWLIST_FILE_NAME: &str = "allowlist.txt";

/// Where a project's configuration lives, as discovered from the source files
/// the front end resolved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectContext {
    /// Distinct directories containing the project's source files
    pub source_dirs: Vec<PathBuf>,
}

impl ProjectContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a context from source file paths. Empty paths are dropped and
    /// directories are deduplicated while keeping first-seen order.
    pub fn from_source_files<I, P>(files: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut seen = BTreeSet::new();
        let mut source_dirs = Vec::new();

        for file in files {
            let file = file.as_ref();
            if file.as_os_str().is_empty() {
                continue;
            }
            let dir = match file.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
                _ => PathBuf::from("."),
            };
            if seen.insert(dir.clone()) {
                source_dirs.push(dir);
            }
        }

        Self { source_dirs }
    }

    /// Finds the allowlist path for this project.
    ///
    /// Each source directory is searched outward for [`CONFIG_DIR`]. The first
    /// candidate whose allowlist file exists wins; failing that the last
    /// candidate found is returned so callers can report it as invalid.
    pub fn locate_allowlist(&self, file_name: &str) -> Option<PathBuf> {
        let mut candidate = None;

        for dir in &self.source_dirs {
            let Some(config_dir) = find_configuration_directory(dir) else {
                continue;
            };

            let path = config_dir.join(file_name);
            debug!(path = %path.display(), "allowlist candidate");
            if path.is_file() {
                return Some(path);
            }
            candidate = Some(path);
        }

        candidate
    }
}

/// Walks from `start` towards the filesystem root looking for a directory
/// containing [`CONFIG_DIR`].
pub fn find_configuration_directory(start: &Path) -> Option<PathBuf> {
    let mut current = Some(start);
    while let Some(dir) = current {
        let candidate = dir.join(CONFIG_DIR);
        if candidate.is_dir() {
            return Some(candidate);
        }
        current = dir.parent();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_from_source_files_deduplicates_directories() {
        let context = ProjectContext::from_source_files([
            "src/a.cs",
            "src/b.cs",
            "",
            "lib/c.cs",
            "top.cs",
        ]);
        assert_eq!(
            context.source_dirs,
            vec![
                PathBuf::from("src"),
                PathBuf::from("lib"),
                PathBuf::from(".")
            ]
        );
    }

    #[test]
    fn test_find_configuration_directory_walks_upwards() {
        let root = TempDir::new().unwrap();
        let nested = root.path().join("project/src/deep");
        fs::create_dir_all(&nested).unwrap();
        fs::create_dir_all(root.path().join("project").join(CONFIG_DIR)).unwrap();

        let found = find_configuration_directory(&nested).unwrap();
        assert_eq!(found, root.path().join("project").join(CONFIG_DIR));
    }

    #[test]
    fn test_locate_allowlist_prefers_existing_file() {
        let root = TempDir::new().unwrap();

        // First project has a config dir but no allowlist
        let first = root.path().join("first/src");
        fs::create_dir_all(&first).unwrap();
        fs::create_dir_all(root.path().join("first").join(CONFIG_DIR)).unwrap();

        // Second project has the file
        let second = root.path().join("second/src");
        fs::create_dir_all(&second).unwrap();
        let second_config = root.path().join("second").join(CONFIG_DIR);
        fs::create_dir_all(&second_config).unwrap();
        fs::write(second_config.join(ALLOWLIST_FILE_NAME), "string.Length\n").unwrap();

        let context =
            ProjectContext::from_source_files([first.join("a.cs"), second.join("b.cs")]);
        let located = context.locate_allowlist(ALLOWLIST_FILE_NAME).unwrap();
        assert_eq!(located, second_config.join(ALLOWLIST_FILE_NAME));
    }

    #[test]
    fn test_locate_allowlist_returns_missing_candidate() {
        let root = TempDir::new().unwrap();
        let src = root.path().join("src");
        fs::create_dir_all(&src).unwrap();
        fs::create_dir_all(root.path().join(CONFIG_DIR)).unwrap();

        let context = ProjectContext::from_source_files([src.join("a.cs")]);
        let located = context.locate_allowlist(ALLOWLIST_FILE_NAME).unwrap();
        assert!(!located.exists());
    }

    #[test]
    fn test_locate_allowlist_without_config_dir() {
        let root = TempDir::new().unwrap();
        let context = ProjectContext::from_source_files([root.path().join("a.cs")]);
        // tempdirs usually live under /tmp which has no .hotpath above it
        if find_configuration_directory(root.path()).is_none() {
            assert_eq!(context.locate_allowlist(ALLOWLIST_FILE_NAME), None);
        }
    }
}
