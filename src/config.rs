use crate::error::{Result, ZenSheetError};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_FILE_PREFIX: &str = "zen_";
pub const DEFAULT_EXTENSION: &str = "xlsm";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub sources: SourceConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SourceConfig {
    pub file_prefix: String,
    pub csv_extensions: Vec<String>,
    pub delimiters: Vec<char>,
    pub exclude_patterns: Vec<String>,
    pub max_depth: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OutputConfig {
    pub extension: String,
    pub per_source_sheets: bool,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            file_prefix: DEFAULT_FILE_PREFIX.to_string(),
            csv_extensions: vec!["csv".to_string()],
            delimiters: vec![',', ';', '\t'],
            exclude_patterns: vec![r"^~\$".to_string(), r"\.tmp$".to_string()],
            max_depth: 1,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            extension: DEFAULT_EXTENSION.to_string(),
            per_source_sheets: true,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ZenSheetError::Config {
                message: format!("Configuration file not found: {}", path.display()),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| ZenSheetError::Config {
            message: format!("Failed to read config file {}: {}", path.display(), e),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ZenSheetError::Config {
            message: format!("Failed to parse config file {}: {}", path.display(), e),
        })?;

        Ok(config)
    }

    pub fn load_with_defaults<P: AsRef<Path>>(config_path: Option<P>) -> Result<Self> {
        match config_path {
            Some(path) => Self::load_from_file(path),
            None => {
                let default_paths = ["zensheet.toml", ".zensheet.toml"];

                for default_path in &default_paths {
                    if Path::new(default_path).exists() {
                        return Self::load_from_file(default_path);
                    }
                }

                Ok(Self::default())
            }
        }
    }

    pub fn merge_with_cli_args(&mut self, cli_args: &CliOverrides) {
        if let Some(ref prefix) = cli_args.file_prefix {
            self.sources.file_prefix = prefix.clone();
        }

        if let Some(ref extension) = cli_args.extension {
            self.output.extension = extension.trim_start_matches('.').to_string();
        }

        if let Some(max_depth) = cli_args.max_depth {
            self.sources.max_depth = max_depth;
        }

        if let Some(per_source_sheets) = cli_args.per_source_sheets {
            self.output.per_source_sheets = per_source_sheets;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.sources.file_prefix.is_empty() {
            return Err(ZenSheetError::Config {
                message: "Source file prefix must not be empty".to_string(),
            });
        }

        if self.sources.csv_extensions.is_empty() {
            return Err(ZenSheetError::Config {
                message: "At least one CSV file extension must be specified".to_string(),
            });
        }

        if self.sources.delimiters.is_empty() {
            return Err(ZenSheetError::Config {
                message: "At least one CSV delimiter must be specified".to_string(),
            });
        }

        if let Some(d) = self.sources.delimiters.iter().find(|d| !d.is_ascii()) {
            return Err(ZenSheetError::Config {
                message: format!("CSV delimiter must be a single ASCII character: {:?}", d),
            });
        }

        if self.sources.max_depth == 0 {
            return Err(ZenSheetError::Config {
                message: "Maximum directory depth must be greater than 0".to_string(),
            });
        }

        for pattern in &self.sources.exclude_patterns {
            Regex::new(pattern).map_err(|e| ZenSheetError::Config {
                message: format!("Invalid exclude pattern '{}': {}", pattern, e),
            })?;
        }

        let extension = &self.output.extension;
        if extension.is_empty()
            || extension.contains(['.', '/', '\\'])
            || extension.chars().any(char::is_whitespace)
        {
            return Err(ZenSheetError::Config {
                message: format!("Invalid workbook extension: '{}'", extension),
            });
        }

        Ok(())
    }

    pub fn create_sample_config() -> String {
        let sample_config = Self::default();
        toml::to_string_pretty(&sample_config).unwrap_or_else(|_| String::new())
    }
}

#[derive(Debug, Default)]
pub struct CliOverrides {
    pub file_prefix: Option<String>,
    pub extension: Option<String>,
    pub max_depth: Option<usize>,
    pub per_source_sheets: Option<bool>,
}

impl CliOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file_prefix(mut self, prefix: Option<String>) -> Self {
        self.file_prefix = prefix;
        self
    }

    pub fn with_extension(mut self, extension: Option<String>) -> Self {
        self.extension = extension;
        self
    }

    pub fn with_max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_per_source_sheets(mut self, per_source_sheets: Option<bool>) -> Self {
        self.per_source_sheets = per_source_sheets;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.sources.file_prefix, "zen_");
        assert_eq!(config.sources.delimiters, vec![',', ';', '\t']);
        assert_eq!(config.output.extension, "xlsm");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        config.sources.csv_extensions.clear();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.sources.max_depth = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.output.extension = "x.lsx".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.sources.exclude_patterns.push("(".to_string());
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.sources.delimiters = vec!['¦'];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_file_operations() {
        let mut config = Config::default();
        config.sources.file_prefix = "money_".to_string();
        let temp_file = NamedTempFile::new().unwrap();

        std::fs::write(temp_file.path(), toml::to_string_pretty(&config).unwrap()).unwrap();

        let loaded_config = Config::load_from_file(temp_file.path()).unwrap();
        assert_eq!(loaded_config.sources.file_prefix, "money_");
        assert_eq!(loaded_config.sources.delimiters, config.sources.delimiters);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "[output]\nextension = \"xlsx\"").unwrap();

        let config = Config::load_from_file(temp_file.path()).unwrap();
        assert_eq!(config.output.extension, "xlsx");
        assert!(config.output.per_source_sheets);
        assert_eq!(config.sources.file_prefix, "zen_");
    }

    #[test]
    fn test_missing_config_file() {
        let result = Config::load_from_file("/definitely/not/here.toml");
        assert!(matches!(result, Err(ZenSheetError::Config { .. })));
    }

    #[test]
    fn test_cli_overrides() {
        let mut config = Config::default();

        let overrides = CliOverrides::new()
            .with_file_prefix(Some("export_".to_string()))
            .with_extension(Some(".xlsx".to_string()))
            .with_max_depth(Some(3));

        config.merge_with_cli_args(&overrides);

        assert_eq!(config.sources.file_prefix, "export_");
        assert_eq!(config.output.extension, "xlsx");
        assert_eq!(config.sources.max_depth, 3);
        assert!(config.output.per_source_sheets);
    }

    #[test]
    fn test_sample_config_generation() {
        let sample = Config::create_sample_config();
        assert!(!sample.is_empty());
        assert!(sample.contains("[sources]"));
        assert!(sample.contains("[output]"));
        assert!(sample.contains("file_prefix"));
    }
}
