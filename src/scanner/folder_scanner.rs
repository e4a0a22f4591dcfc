use crate::config::ScanConfig;
use crate::error::{ExtractorError, Result};
use crate::scanner::format_registry::{archive_stem, ArchiveFormat, FormatRegistry};
use log::{debug, trace, warn};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use walkdir::{DirEntry, WalkDir};

/// The archive chosen for extraction in one folder.
#[derive(Debug, Clone)]
pub struct ArchiveCandidate {
    pub path: PathBuf,
    pub folder: PathBuf,
    pub file_name: String,
    pub format: ArchiveFormat,
    pub size: u64,
    pub modified: SystemTime,
    pub created: Option<SystemTime>,
}

impl ArchiveCandidate {
    pub fn output_folder(&self, prefix: &str) -> PathBuf {
        self.folder
            .join(format!("{}{}", prefix, archive_stem(&self.file_name)))
    }
}

pub struct FolderScanner {
    registry: FormatRegistry,
    max_depth: usize,
    follow_links: bool,
    skip_prefix: Option<String>,
}

impl FolderScanner {
    pub fn new(config: &ScanConfig) -> Self {
        Self {
            registry: FormatRegistry::with_suffixes(&config.extensions),
            max_depth: config.max_depth,
            follow_links: config.follow_links,
            skip_prefix: None,
        }
    }

    /// Do not descend into folders whose name starts with `prefix`.
    pub fn with_skip_prefix<S: Into<String>>(mut self, prefix: Option<S>) -> Self {
        self.skip_prefix = prefix.map(Into::into);
        self
    }

    pub fn registry(&self) -> &FormatRegistry {
        &self.registry
    }

    /// Every folder under `root` (root included) that directly contains a recognized archive.
    pub fn discover_folders<P: AsRef<Path>>(&self, root: P) -> Result<Vec<PathBuf>> {
        let root_path = root.as_ref();

        if !root_path.exists() {
            return Err(ExtractorError::InvalidPath {
                path: root_path.display().to_string(),
            });
        }

        if !root_path.is_dir() {
            return Err(ExtractorError::InvalidPath {
                path: format!("{} is not a directory", root_path.display()),
            });
        }

        let mut folders = BTreeSet::new();

        let walker = WalkDir::new(root_path)
            .max_depth(self.max_depth)
            .follow_links(self.follow_links)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| self.should_traverse(e));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!("Skipping unreadable entry during scan: {}", err);
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            if self.registry.is_archive(entry.path()) {
                if let Some(parent) = entry.path().parent() {
                    trace!("Archive found: {}", entry.path().display());
                    folders.insert(parent.to_path_buf());
                }
            }
        }

        debug!(
            "Discovered {} folder(s) with archives under {}",
            folders.len(),
            root_path.display()
        );

        Ok(folders.into_iter().collect())
    }

    fn should_traverse(&self, entry: &DirEntry) -> bool {
        if entry.depth() == 0 || !entry.file_type().is_dir() {
            return true;
        }

        match (&self.skip_prefix, entry.file_name().to_str()) {
            (Some(prefix), Some(name)) => !name.starts_with(prefix.as_str()),
            _ => true,
        }
    }

    /// Newest archive directly inside `folder` by modification time.
    /// Ties go to the lexicographically smallest path.
    pub fn latest_archive<P: AsRef<Path>>(&self, folder: P) -> Result<Option<ArchiveCandidate>> {
        let folder = folder.as_ref();
        let mut newest: Option<ArchiveCandidate> = None;

        for entry in fs::read_dir(folder)? {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!("Skipping unreadable entry in {}: {}", folder.display(), err);
                    continue;
                }
            };

            let path = entry.path();
            let Some(format) = self.registry.resolve_path(&path) else {
                continue;
            };

            let metadata = match fs::metadata(&path) {
                Ok(metadata) if metadata.is_file() => metadata,
                Ok(_) => continue,
                Err(err) => {
                    warn!("Cannot read metadata for {}: {}", path.display(), err);
                    continue;
                }
            };

            let candidate = ArchiveCandidate {
                file_name: entry.file_name().to_string_lossy().to_string(),
                folder: folder.to_path_buf(),
                format,
                size: metadata.len(),
                modified: metadata.modified()?,
                created: metadata.created().ok(),
                path,
            };

            let replace = match &newest {
                None => true,
                Some(current) => {
                    candidate.modified > current.modified
                        || (candidate.modified == current.modified && candidate.path < current.path)
                }
            };

            if replace {
                newest = Some(candidate);
            }
        }

        Ok(newest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScanConfig;
    use filetime::{set_file_mtime, FileTime};
    use tempfile::TempDir;

    fn scanner() -> FolderScanner {
        FolderScanner::new(&ScanConfig::default()).with_skip_prefix(Some("extracted_"))
    }

    fn touch(path: &Path, mtime: i64) {
        fs::write(path, b"data").unwrap();
        set_file_mtime(path, FileTime::from_unix_time(mtime, 0)).unwrap();
    }

    #[test]
    fn test_discover_folders_only_with_archives() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        fs::create_dir_all(root.join("A")).unwrap();
        fs::create_dir_all(root.join("B")).unwrap();
        fs::create_dir_all(root.join("C/deep")).unwrap();
        touch(&root.join("A/backup1.zip"), 1_000);
        touch(&root.join("B/notes.txt"), 1_000);
        touch(&root.join("C/deep/data.tar.gz"), 1_000);

        let folders = scanner().discover_folders(root).unwrap();
        assert_eq!(folders, vec![root.join("A"), root.join("C/deep")]);
    }

    #[test]
    fn test_discover_includes_root_itself() {
        let temp_dir = TempDir::new().unwrap();
        touch(&temp_dir.path().join("top.7z"), 1_000);

        let folders = scanner().discover_folders(temp_dir.path()).unwrap();
        assert_eq!(folders, vec![temp_dir.path().to_path_buf()]);
    }

    #[test]
    fn test_discover_skips_extracted_output() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("A/extracted_backup")).unwrap();
        touch(&root.join("A/backup.zip"), 1_000);
        touch(&root.join("A/extracted_backup/inner.zip"), 1_000);

        let folders = scanner().discover_folders(root).unwrap();
        assert_eq!(folders, vec![root.join("A")]);
    }

    #[test]
    fn test_discover_invalid_root() {
        let result = scanner().discover_folders("/definitely/not/a/real/root");
        assert!(matches!(result, Err(ExtractorError::InvalidPath { .. })));
    }

    #[test]
    fn test_latest_archive_by_mtime() {
        let temp_dir = TempDir::new().unwrap();
        let folder = temp_dir.path();
        touch(&folder.join("backup1.zip"), 1_000);
        touch(&folder.join("backup2.zip"), 2_000);
        touch(&folder.join("notes.txt"), 3_000);

        let candidate = scanner().latest_archive(folder).unwrap().unwrap();
        assert_eq!(candidate.file_name, "backup2.zip");
        assert_eq!(candidate.size, 4);
        assert_eq!(
            candidate.output_folder("extracted_"),
            folder.join("extracted_backup2")
        );
    }

    #[test]
    fn test_latest_archive_tie_prefers_smallest_path() {
        let temp_dir = TempDir::new().unwrap();
        let folder = temp_dir.path();
        touch(&folder.join("b.zip"), 5_000);
        touch(&folder.join("a.rar"), 5_000);

        let candidate = scanner().latest_archive(folder).unwrap().unwrap();
        assert_eq!(candidate.file_name, "a.rar");
    }

    #[test]
    fn test_latest_archive_none_when_empty() {
        let temp_dir = TempDir::new().unwrap();
        touch(&temp_dir.path().join("readme.md"), 1_000);

        assert!(scanner().latest_archive(temp_dir.path()).unwrap().is_none());
    }

    #[test]
    fn test_latest_archive_ignores_directories_named_like_archives() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir(temp_dir.path().join("folder.zip")).unwrap();

        assert!(scanner().latest_archive(temp_dir.path()).unwrap().is_none());
    }
}
