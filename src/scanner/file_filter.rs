use crate::config::SourceConfig;
use regex::Regex;
use std::path::Path;

pub struct FileFilter {
    file_prefix: String,
    csv_extensions: Vec<String>,
    exclude_patterns: Vec<Regex>,
}

impl FileFilter {
    pub fn new(config: &SourceConfig) -> Self {
        let exclude_patterns = config
            .exclude_patterns
            .iter()
            .filter_map(|pattern| Regex::new(pattern).ok())
            .collect();

        Self {
            file_prefix: config.file_prefix.clone(),
            csv_extensions: config
                .csv_extensions
                .iter()
                .map(|e| e.to_lowercase())
                .collect(),
            exclude_patterns,
        }
    }

    /// True when the extension marks the file as CSV, whatever its name.
    pub fn is_csv_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|s| s.to_str())
            .is_some_and(|ext| self.csv_extensions.contains(&ext.to_lowercase()))
    }

    /// True for CSV files carrying the export prefix and not excluded.
    pub fn is_source_candidate(&self, path: &Path) -> bool {
        if !self.is_csv_file(path) {
            return false;
        }

        let Some(filename) = path.file_name().and_then(|s| s.to_str()) else {
            return false;
        };

        filename.starts_with(&self.file_prefix) && !self.matches_any_pattern(filename)
    }

    pub fn should_traverse_directory(&self, path: &Path) -> bool {
        if let Some(dir_name) = path.file_name().and_then(|s| s.to_str()) {
            // Skip hidden directories (starting with .)
            if dir_name.starts_with('.') && dir_name != "." && dir_name != ".." {
                return false;
            }

            if self.matches_any_pattern(dir_name) {
                return false;
            }
        }

        true
    }

    pub fn matches_any_pattern(&self, text: &str) -> bool {
        self.exclude_patterns
            .iter()
            .any(|pattern| pattern.is_match(text))
    }

    pub fn get_prefix(&self) -> &str {
        &self.file_prefix
    }
}

impl Default for FileFilter {
    fn default() -> Self {
        let config = SourceConfig::default();
        Self::new(&config)
    }
}
