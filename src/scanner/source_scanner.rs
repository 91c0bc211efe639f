use crate::config::SourceConfig;
use crate::error::{Result, ZenSheetError};
use crate::scanner::csv_source;
use crate::scanner::file_filter::FileFilter;
use crate::schema::Record;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// What an input path looks like before any source is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SourceClass {
    pub is_single_file: bool,
    pub is_csv_like: bool,
}

impl SourceClass {
    /// An existing file that is not a CSV export is reused as the workbook.
    pub fn is_pass_through(&self) -> bool {
        self.is_single_file && !self.is_csv_like
    }
}

/// Records grouped by source file name, ordered by name.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceSet {
    pub sources: BTreeMap<String, Vec<Record>>,
    /// Files that carried the prefix but were not readable exports.
    pub skipped: Vec<SkippedSource>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedSource {
    pub path: PathBuf,
    pub reason: String,
}

impl SourceSet {
    pub fn total_records(&self) -> usize {
        self.sources.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

/// Capability the job needs from the CSV side.
pub trait SourceCatalog {
    fn classify(&self, path: &Path) -> Result<SourceClass>;
    fn scan(&self, path: &Path) -> Result<SourceSet>;
}

pub struct CsvSourceCatalog {
    filter: FileFilter,
    delimiters: Vec<char>,
    max_depth: usize,
}

impl CsvSourceCatalog {
    pub fn new(config: &SourceConfig) -> Self {
        Self {
            filter: FileFilter::new(config),
            delimiters: config.delimiters.clone(),
            max_depth: config.max_depth,
        }
    }

    /// Lists prefix-matching CSV files under `root` in name order.
    pub fn candidate_files(&self, root: &Path) -> Result<Vec<PathBuf>> {
        if root.is_file() {
            return Ok(if self.filter.is_source_candidate(root) {
                vec![root.to_path_buf()]
            } else {
                Vec::new()
            });
        }

        let walker = WalkDir::new(root)
            .max_depth(self.max_depth)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| self.should_traverse(e));

        let mut files = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                // The root itself must be readable, anything below is best effort
                Err(err) if err.depth() == 0 => return Err(err.into()),
                Err(_) => continue,
            };

            if entry.file_type().is_file() && self.filter.is_source_candidate(entry.path()) {
                files.push(entry.into_path());
            }
        }

        Ok(files)
    }

    fn should_traverse(&self, entry: &DirEntry) -> bool {
        if entry.depth() == 0 || !entry.file_type().is_dir() {
            return true;
        }
        self.filter.should_traverse_directory(entry.path())
    }

    fn source_name(root: &Path, file: &Path) -> String {
        let relative = file.strip_prefix(root).unwrap_or(file);
        if relative.as_os_str().is_empty() {
            return file
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
        }
        relative.to_string_lossy().replace('\\', "/")
    }
}

impl Default for CsvSourceCatalog {
    fn default() -> Self {
        Self::new(&SourceConfig::default())
    }
}

impl SourceCatalog for CsvSourceCatalog {
    fn classify(&self, path: &Path) -> Result<SourceClass> {
        let metadata = std::fs::metadata(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ZenSheetError::InvalidPath {
                path: format!("{} does not exist", path.display()),
            },
            std::io::ErrorKind::PermissionDenied => ZenSheetError::Permission {
                path: path.display().to_string(),
            },
            _ => ZenSheetError::Io(e),
        })?;

        if !metadata.is_file() && !metadata.is_dir() {
            return Err(ZenSheetError::InvalidPath {
                path: format!("{} is neither a file nor a directory", path.display()),
            });
        }

        Ok(SourceClass {
            is_single_file: metadata.is_file(),
            is_csv_like: metadata.is_file() && self.filter.is_csv_file(path),
        })
    }

    fn scan(&self, path: &Path) -> Result<SourceSet> {
        let files = self.candidate_files(path)?;

        let mut sources = BTreeMap::new();
        let mut skipped = Vec::new();

        for file in files {
            match csv_source::read_records(&file, &self.delimiters) {
                Ok(records) => {
                    sources.insert(Self::source_name(path, &file), records);
                }
                Err(err) => skipped.push(SkippedSource {
                    path: file,
                    reason: err.to_string(),
                }),
            }
        }

        if sources.is_empty() {
            return Err(ZenSheetError::NoSourcesFound {
                path: path.display().to_string(),
                prefix: self.filter.get_prefix().to_string(),
                skipped: skipped.iter().map(|s| s.path.display().to_string()).collect(),
            });
        }

        Ok(SourceSet { sources, skipped })
    }
}
