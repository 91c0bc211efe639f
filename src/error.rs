use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ZenSheetError {
    #[error("IO operation failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid input path: {path}")]
    InvalidPath { path: String },

    #[error("No source files found in {path}")]
    NoSourcesFound {
        path: String,
        prefix: String,
        skipped: Vec<String>,
    },

    #[error("File does not match the export schema: {path}")]
    SchemaMismatch { path: String, reason: String },

    #[error("CSV parsing failed: {message}")]
    Csv {
        message: String,
        #[source]
        source: csv::Error,
    },

    #[error("Workbook operation failed: {message}")]
    Workbook {
        message: String,
        #[source]
        source: Option<rust_xlsxwriter::XlsxError>,
    },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Permission denied: {path}")]
    Permission { path: String },
}

pub trait UserFriendlyError {
    fn user_message(&self) -> String;
    fn suggestion(&self) -> Option<String>;
}

impl UserFriendlyError for ZenSheetError {
    fn user_message(&self) -> String {
        match self {
            ZenSheetError::InvalidPath { path } => {
                format!("Invalid input path: {}", path)
            }
            ZenSheetError::NoSourcesFound { path, prefix, skipped } => {
                if skipped.is_empty() {
                    format!("No '{}*.csv' export files found in {}", prefix, path)
                } else {
                    format!(
                        "No usable '{}*.csv' export files found in {} ({} skipped)",
                        prefix,
                        path,
                        skipped.len()
                    )
                }
            }
            ZenSheetError::SchemaMismatch { path, reason } => {
                format!("{} is not a ZenMoney export: {}", path, reason)
            }
            ZenSheetError::Csv { message, .. } => {
                format!("Could not read CSV data: {}", message)
            }
            ZenSheetError::Workbook { message, .. } => {
                format!("Could not write workbook: {}", message)
            }
            ZenSheetError::Config { message } => {
                format!("Configuration error: {}", message)
            }
            ZenSheetError::Permission { path } => {
                format!("Permission denied accessing: {}", path)
            }
            _ => self.to_string(),
        }
    }

    fn suggestion(&self) -> Option<String> {
        match self {
            ZenSheetError::InvalidPath { .. } => Some(
                "Check that the path exists and points to a directory of exports or to a single file.".to_string()
            ),
            ZenSheetError::NoSourcesFound { .. } => Some(
                "Export the transactions from ZenMoney as CSV, keep the 'zen_' file name prefix, or pass --prefix to match your file names.".to_string()
            ),
            ZenSheetError::SchemaMismatch { .. } => Some(
                "The header row must list the 12 ZenMoney export columns, starting with 'date' and ending with 'changedDate'.".to_string()
            ),
            ZenSheetError::Config { .. } => Some(
                "Check your configuration file syntax and ensure all required fields are present.".to_string()
            ),
            ZenSheetError::Permission { .. } => Some(
                "Ensure you have write permission for the target directory and that the workbook is not open in another program.".to_string()
            ),
            ZenSheetError::Workbook { .. } => Some(
                "Ensure you have write permission for the target directory and that the workbook is not open in another program. \
                 Workbook names are timestamped to the second, so a second run within the same second finds the first one's file; \
                 wait a moment and run again.".to_string()
            ),
            _ => None,
        }
    }
}

impl From<csv::Error> for ZenSheetError {
    fn from(error: csv::Error) -> Self {
        ZenSheetError::Csv {
            message: error.to_string(),
            source: error,
        }
    }
}

impl From<rust_xlsxwriter::XlsxError> for ZenSheetError {
    fn from(error: rust_xlsxwriter::XlsxError) -> Self {
        ZenSheetError::Workbook {
            message: error.to_string(),
            source: Some(error),
        }
    }
}

impl From<walkdir::Error> for ZenSheetError {
    fn from(error: walkdir::Error) -> Self {
        let path = error
            .path()
            .map(|p| p.display().to_string())
            .unwrap_or_default();

        if error
            .io_error()
            .is_some_and(|e| e.kind() == std::io::ErrorKind::PermissionDenied)
        {
            return ZenSheetError::Permission { path };
        }

        match error.into_io_error() {
            Some(io) => ZenSheetError::Io(io),
            None => ZenSheetError::InvalidPath {
                path: format!("{} (filesystem loop)", path),
            },
        }
    }
}

impl From<toml::de::Error> for ZenSheetError {
    fn from(error: toml::de::Error) -> Self {
        ZenSheetError::Config {
            message: error.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ZenSheetError>;

/// Pipeline step a [`JobError`] was raised from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStage {
    Resolve,
    Collect,
    Write,
}

impl fmt::Display for JobStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobStage::Resolve => "resolve",
            JobStage::Collect => "collect",
            JobStage::Write => "write",
        };
        f.write_str(name)
    }
}

/// The only error type returned by a job run.
///
/// Wraps whatever the source catalog or the workbook sink reported, keeping
/// the original error reachable through [`std::error::Error::source`].
#[derive(Error, Debug)]
#[error("{message}")]
pub struct JobError {
    pub stage: JobStage,
    pub message: String,
    #[source]
    pub source: ZenSheetError,
}

impl JobError {
    pub fn new<S: Into<String>>(stage: JobStage, message: S, source: ZenSheetError) -> Self {
        Self {
            stage,
            message: message.into(),
            source,
        }
    }

    pub fn cause(&self) -> &ZenSheetError {
        &self.source
    }

    pub fn is_resolution_error(&self) -> bool {
        matches!(self.stage, JobStage::Resolve | JobStage::Collect)
    }

    pub fn is_write_error(&self) -> bool {
        self.stage == JobStage::Write
    }
}

impl UserFriendlyError for JobError {
    fn user_message(&self) -> String {
        format!("{}\n{}", self.message, self.source.user_message())
    }

    fn suggestion(&self) -> Option<String> {
        self.source.suggestion()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_user_friendly_messages() {
        let error = ZenSheetError::NoSourcesFound {
            path: "/tmp/exports".to_string(),
            prefix: "zen_".to_string(),
            skipped: vec![],
        };
        assert!(error.user_message().contains("zen_*.csv"));
        assert!(error.suggestion().is_some());
    }

    #[test]
    fn test_skipped_files_are_counted() {
        let error = ZenSheetError::NoSourcesFound {
            path: "/tmp/exports".to_string(),
            prefix: "zen_".to_string(),
            skipped: vec!["zen_bad.csv".to_string()],
        };
        assert!(error.user_message().contains("1 skipped"));
    }

    #[test]
    fn test_existing_workbook_suggests_rerun() {
        let error = ZenSheetError::Workbook {
            message: "Workbook already exists: /tmp/exports/2024-03-15_10-20-30.xlsm".to_string(),
            source: None,
        };
        let suggestion = error.suggestion().unwrap();
        assert!(suggestion.contains("same second"));
        assert!(suggestion.contains("run again"));

        let job_error = JobError::new(JobStage::Write, "Could not create workbook", error);
        assert!(job_error.suggestion().unwrap().contains("same second"));
    }

    #[test]
    fn test_job_error_keeps_cause() {
        let cause = ZenSheetError::InvalidPath {
            path: "/missing".to_string(),
        };
        let error = JobError::new(JobStage::Resolve, "Could not resolve sources", cause);

        assert_eq!(error.to_string(), "Could not resolve sources");
        assert!(error.is_resolution_error());
        assert!(!error.is_write_error());
        assert!(error.source().is_some());
        assert!(error.user_message().contains("/missing"));
        assert!(matches!(error.cause(), ZenSheetError::InvalidPath { .. }));
    }

    #[test]
    fn test_toml_error_conversion() {
        let toml_error = toml::from_str::<toml::Value>("= broken").unwrap_err();
        let error = ZenSheetError::from(toml_error);
        assert!(matches!(error, ZenSheetError::Config { .. }));
    }
}
