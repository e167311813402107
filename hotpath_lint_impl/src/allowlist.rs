// This product includes software developed at Datadog (https://www.datadoghq.com/) Copyright 2024 Datadog, Inc.

use std::collections::HashSet;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::{OnceLock, PoisonError, RwLock};

use hotpath_common::project_context::ProjectContext;
use tracing::{debug, warn};

/// Allowlist files larger than this are read only up to this many bytes
pub const MAX_ALLOWLIST_BYTES: u64 = 16 * 1024 * 1024;

/// What we know about the allowlist file, for diagnostic detail only
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowlistState {
    /// No configuration directory was found
    NotLocated,
    /// A path was derived but no file exists there
    Invalid(PathBuf),
    /// The store holds no signatures at all
    Empty(PathBuf),
    Loaded(PathBuf),
}

///
/// Member signatures that are pre-approved as allocation-free.
///
/// One store per analysis session. Entries come from the allowlist file
/// located at session start and from [`AllowlistStore::add`]. Matching is
/// exact and case-sensitive.
///
#[derive(Debug, Default)]
pub struct AllowlistStore {
    entries: RwLock<HashSet<String>>,
    location: OnceLock<Option<PathBuf>>,
    loaded: OnceLock<()>,
}

impl AllowlistStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let store = Self::new();
        for entry in entries {
            store.add(entry);
        }
        store
    }

    pub fn contains(&self, signature: &str) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(signature)
    }

    pub fn add(&self, signature: impl Into<String>) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(signature.into());
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The path located at session start, if any
    pub fn location(&self) -> Option<&Path> {
        self.location.get().and_then(|path| path.as_deref())
    }

    /// Locates the allowlist for `context` and merges it in. Only the first
    /// call does any work; later calls are no-ops.
    pub fn load_once(&self, context: &ProjectContext, file_name: &str) {
        self.loaded.get_or_init(|| {
            let located = self
                .location
                .get_or_init(|| context.locate_allowlist(file_name));

            match located {
                Some(path) if path.is_file() => {
                    let added = self.load_from(path);
                    debug!(path = %path.display(), added, "allowlist loaded");
                }
                Some(path) => debug!(path = %path.display(), "allowlist path has no file"),
                None => debug!("no allowlist located"),
            }
        });
    }

    /// Merges one signature per line of the file at `path` into the store,
    /// returning how many lines were read. Never fails: an unreadable file
    /// contributes nothing, as does any line that isn't valid UTF-8.
    pub fn load_from(&self, path: &Path) -> usize {
        self.load_capped(path, MAX_ALLOWLIST_BYTES)
    }

    fn load_capped(&self, path: &Path, cap: u64) -> usize {
        let bytes = match read_capped(path, cap) {
            Ok(bytes) => bytes,
            Err(error) => {
                warn!(path = %path.display(), %error, "failed to read allowlist, ignoring it");
                return 0;
            }
        };

        let mut added = 0;
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        for (number, line) in bytes.split(|b| *b == b'\n').enumerate() {
            let Ok(line) = std::str::from_utf8(line) else {
                warn!(path = %path.display(), line = number + 1, "skipping allowlist line that is not UTF-8");
                continue;
            };
            let line = line.trim_end_matches('\r');
            if line.trim().is_empty() {
                continue;
            }
            entries.insert(line.to_string());
            added += 1;
        }
        added
    }

    pub fn state(&self) -> AllowlistState {
        match self.location() {
            None => AllowlistState::NotLocated,
            Some(path) if !path.is_file() => AllowlistState::Invalid(path.to_path_buf()),
            Some(path) if self.is_empty() => AllowlistState::Empty(path.to_path_buf()),
            Some(path) => AllowlistState::Loaded(path.to_path_buf()),
        }
    }
}

/// Reads at most `cap` bytes. When the file is longer, the line cut off by
/// the cap is dropped.
fn read_capped(path: &Path, cap: u64) -> io::Result<Vec<u8>> {
    let mut bytes = Vec::new();
    File::open(path)?
        .take(cap.saturating_add(1))
        .read_to_end(&mut bytes)?;

    let cap = usize::try_from(cap).unwrap_or(usize::MAX);
    if bytes.len() > cap {
        warn!(path = %path.display(), cap, "allowlist is too large, reading only the first bytes");
        bytes.truncate(cap);
        let complete = bytes.iter().rposition(|b| *b == b'\n').map_or(0, |i| i + 1);
        bytes.truncate(complete);
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hotpath_common::project_context::{ALLOWLIST_FILE_NAME, CONFIG_DIR};
    use std::fs;
    use tempfile::{NamedTempFile, TempDir};

    #[test]
    fn test_contains_is_exact_and_case_sensitive() {
        let store = AllowlistStore::with_entries(["System.Array.Length"]);
        assert!(store.contains("System.Array.Length"));
        assert!(!store.contains("system.array.length"));
        assert!(!store.contains("System.Array"));
        assert!(!store.contains("System.Array.Length "));
    }

    #[test]
    fn test_load_from_merges_lines() {
        let file = NamedTempFile::new().unwrap();
        fs::write(file.path(), "string.Length\r\n\n   \nSystem.Nullable<T>.Value\n").unwrap();

        let store = AllowlistStore::with_entries(["Preloaded.Entry"]);
        let added = store.load_from(file.path());

        assert_eq!(added, 2);
        assert!(store.contains("string.Length"));
        assert!(store.contains("System.Nullable<T>.Value"));
        assert!(store.contains("Preloaded.Entry"));
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_load_from_skips_invalid_utf8_lines() {
        let file = NamedTempFile::new().unwrap();
        fs::write(file.path(), b"good.Entry\n\xff\xfe\nother.Entry\n").unwrap();

        let store = AllowlistStore::new();
        assert_eq!(store.load_from(file.path()), 2);
        assert!(store.contains("good.Entry"));
        assert!(store.contains("other.Entry"));
    }

    #[test]
    fn test_oversized_file_drops_the_cut_line() {
        let file = NamedTempFile::new().unwrap();
        fs::write(file.path(), "string.Length\nSystem.Array.Length\n").unwrap();

        // The cap lands inside the second line
        let store = AllowlistStore::new();
        assert_eq!(store.load_capped(file.path(), 20), 1);
        assert!(store.contains("string.Length"));
        assert!(!store.contains("System."));
        assert_eq!(store.len(), 1);

        // A cap on a line boundary keeps every complete line
        let store = AllowlistStore::new();
        assert_eq!(store.load_capped(file.path(), 14), 1);
        assert!(store.contains("string.Length"));

        // A file that fits is read whole, final newline or not
        fs::write(file.path(), "string.Length\nSystem.Array.Length").unwrap();
        let store = AllowlistStore::new();
        assert_eq!(store.load_capped(file.path(), 64), 2);
        assert!(store.contains("System.Array.Length"));
    }

    #[test]
    fn test_missing_file_is_not_an_error() {
        let dir = TempDir::new().unwrap();
        let store = AllowlistStore::with_entries(["a.B"]);
        assert_eq!(store.load_from(&dir.path().join("nope.txt")), 0);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_load_once_locates_and_loads_a_single_time() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        fs::create_dir_all(&src).unwrap();
        let config = dir.path().join(CONFIG_DIR);
        fs::create_dir_all(&config).unwrap();
        let allowlist = config.join(ALLOWLIST_FILE_NAME);
        fs::write(&allowlist, "string.Length\n").unwrap();

        let context = ProjectContext::from_source_files([src.join("Program.cs")]);
        let store = AllowlistStore::new();
        store.load_once(&context, ALLOWLIST_FILE_NAME);
        assert!(store.contains("string.Length"));
        assert_eq!(store.location(), Some(allowlist.as_path()));
        assert_eq!(store.state(), AllowlistState::Loaded(allowlist.clone()));

        // Changing the file afterwards has no effect on this session
        fs::write(&allowlist, "string.Length\nSystem.Array.Length\n").unwrap();
        store.load_once(&context, ALLOWLIST_FILE_NAME);
        assert!(!store.contains("System.Array.Length"));
    }

    #[test]
    fn test_state_reports_invalid_and_empty() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        fs::create_dir_all(&src).unwrap();
        fs::create_dir_all(dir.path().join(CONFIG_DIR)).unwrap();
        let context = ProjectContext::from_source_files([src.join("Program.cs")]);

        let store = AllowlistStore::new();
        store.load_once(&context, ALLOWLIST_FILE_NAME);
        let expected = dir.path().join(CONFIG_DIR).join(ALLOWLIST_FILE_NAME);
        assert_eq!(store.state(), AllowlistState::Invalid(expected.clone()));

        fs::write(&expected, "\n").unwrap();
        assert_eq!(store.state(), AllowlistState::Empty(expected));
    }

    #[test]
    fn test_state_without_location() {
        let store = AllowlistStore::with_entries(["string.Length"]);
        assert_eq!(store.state(), AllowlistState::NotLocated);
    }
}
