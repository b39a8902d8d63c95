//! File scanner for discovering job scripts.
//!
//! This module walks the job archive and selects script files, respecting
//! configuration for extensions, excludes, and file size limits.

use anyhow::{bail, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

/// Configuration for file scanning.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Script file extensions to include (e.g., ["SC"])
    pub extensions: Vec<String>,
    /// Names to exclude (e.g., ["tmp", ".git"])
    pub excludes: Vec<String>,
    /// Maximum file size in bytes
    pub max_file_size: u64,
    /// Maximum number of files to scan
    pub max_files: Option<usize>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            extensions: vec!["SC".to_string()],
            excludes: vec![".git".to_string()],
            max_file_size: 1024 * 1024, // 1MB
            max_files: None,
        }
    }
}

impl From<&crate::config::ScannerConfig> for ScanConfig {
    fn from(config: &crate::config::ScannerConfig) -> Self {
        Self {
            extensions: config.extensions.clone(),
            excludes: config.excludes.clone(),
            max_file_size: config.max_file_size,
            max_files: (config.max_files > 0).then_some(config.max_files),
        }
    }
}

/// File scanner for discovering job scripts.
pub struct FileScanner {
    config: ScanConfig,
    roots: Vec<PathBuf>,
}

impl FileScanner {
    /// Create a new scanner over directories or individual files.
    pub fn new(roots: Vec<PathBuf>, config: ScanConfig) -> Self {
        Self { config, roots }
    }

    /// Scan for all matching script files, sorted by path.
    ///
    /// Files named explicitly as roots are taken as they are; directories
    /// are walked recursively.
    pub fn scan(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();

        for root in &self.roots {
            if root.is_file() {
                files.push(root.clone());
            } else if root.is_dir() {
                self.walk_dir(root, &mut files);
            } else {
                bail!("Path does not exist: {}", root.display());
            }
        }

        files.sort();
        files.dedup();

        if let Some(max) = self.config.max_files {
            files.truncate(max);
        }

        Ok(files)
    }

    /// Check if a file matches scan criteria.
    pub fn matches(&self, path: &Path) -> bool {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        if !self.config.extensions.iter().any(|e| e == ext) {
            return false;
        }

        match std::fs::metadata(path) {
            Ok(metadata) if metadata.len() > self.config.max_file_size => {
                debug!("Skipping oversized script: {}", path.display());
                false
            }
            Ok(_) => true,
            Err(_) => false,
        }
    }

    /// Check if a name matches exclusion patterns.
    fn is_excluded(&self, name: &str) -> bool {
        // Hidden files
        if name.starts_with('.') {
            return true;
        }

        self.config.excludes.iter().any(|pattern| name == pattern)
    }

    fn keep(&self, entry: &DirEntry) -> bool {
        entry.depth() == 0 || !self.is_excluded(&entry.file_name().to_string_lossy())
    }

    /// Walk directory recursively.
    fn walk_dir(&self, dir: &Path, files: &mut Vec<PathBuf>) {
        let walker = WalkDir::new(dir)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| self.keep(e));

        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!("Cannot read directory entry: {}", e);
                    continue;
                }
            };

            if entry.file_type().is_file() && self.matches(entry.path()) {
                files.push(entry.into_path());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(path: &Path, content: &str) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    fn names(files: &[PathBuf], root: &Path) -> Vec<String> {
        files
            .iter()
            .map(|p| p.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/"))
            .collect()
    }

    #[test]
    fn test_scan_finds_scripts_recursively() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("2017-10-12/1.moab.SC"), "module load A/1.0");
        touch(&root.join("2017-10-12/1.moab.JB"), "<Job/>");
        touch(&root.join("2017-10-13/2.moab.SC"), "");
        touch(&root.join(".hidden/3.moab.SC"), "");
        touch(&root.join("tmp/4.moab.SC"), "");

        let config = ScanConfig {
            excludes: vec!["tmp".to_string()],
            ..ScanConfig::default()
        };
        let files = FileScanner::new(vec![root.to_path_buf()], config)
            .scan()
            .unwrap();

        assert_eq!(
            names(&files, root),
            vec!["2017-10-12/1.moab.SC", "2017-10-13/2.moab.SC"]
        );
    }

    #[test]
    fn test_max_files_and_size() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("a.SC"), "");
        touch(&root.join("b.SC"), &"x".repeat(64));
        touch(&root.join("c.SC"), "");

        let config = ScanConfig {
            max_file_size: 16,
            max_files: Some(1),
            ..ScanConfig::default()
        };
        let files = FileScanner::new(vec![root.to_path_buf()], config.clone())
            .scan()
            .unwrap();
        assert_eq!(names(&files, root), vec!["a.SC"]);

        let unlimited = ScanConfig {
            max_files: None,
            ..config
        };
        let files = FileScanner::new(vec![root.to_path_buf()], unlimited)
            .scan()
            .unwrap();
        assert_eq!(names(&files, root), vec!["a.SC", "c.SC"]);
    }

    #[test]
    fn test_explicit_file_and_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("job.sh");
        touch(&script, "module load A/1.0");

        let files = FileScanner::new(vec![script.clone()], ScanConfig::default())
            .scan()
            .unwrap();
        assert_eq!(files, vec![script]);

        let missing = FileScanner::new(vec![dir.path().join("nope")], ScanConfig::default());
        assert!(missing.scan().is_err());
    }
}
