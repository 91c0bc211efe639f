pub mod cli;
pub mod config;
pub mod error;
pub mod job;
pub mod normalizer;
pub mod scanner;
pub mod schema;
pub mod ui;
pub mod workbook;

// Public API re-exports
pub use cli::{Cli, OutputFormat};
pub use config::{CliOverrides, Config, OutputConfig, SourceConfig};
pub use error::{JobError, JobStage, Result, UserFriendlyError, ZenSheetError};

// Core functionality re-exports
pub use job::{JobConfig, JobEvent, JobPreview, JobReport, SourceSummary, ZenJob};
pub use normalizer::{CoercionWarning, FieldNormalizer};
pub use scanner::{CsvSourceCatalog, FileFilter, SourceCatalog, SourceClass, SourceSet};
pub use schema::{Field, FieldValue, Record};
pub use ui::{JobProgress, OutputFormatter, OutputMode, ProgressManager};
pub use workbook::{JobMode, WorkbookPlan, WorkbookSink, XlsxWorkbookWriter};

use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;
use std::time::Instant;

/// Main library interface for ZenSheet functionality
pub struct ZenSheet {
    config: Config,
    output_formatter: OutputFormatter,
    progress_manager: ProgressManager,
}

impl ZenSheet {
    pub fn new(config: Config, output_mode: OutputMode, verbose: u8, quiet: bool) -> Self {
        let output_formatter = OutputFormatter::new(output_mode, verbose, quiet);
        let progress_manager = ProgressManager::new(!quiet && output_mode == OutputMode::Human);

        Self {
            config,
            output_formatter,
            progress_manager,
        }
    }

    /// Create a ZenSheet instance from CLI arguments
    pub fn from_cli(cli_args: &Cli) -> Result<Self> {
        let config = cli_args.load_config()?;

        Ok(Self::new(
            config,
            cli_args.output_format.into(),
            cli_args.verbosity_level(),
            cli_args.quiet,
        ))
    }

    /// Runs one job over `input` with progress bars and prints the report.
    pub fn process<P: AsRef<Path>>(&self, input: P) -> std::result::Result<JobReport, JobError> {
        let start_time = Instant::now();
        let input = input.as_ref();

        self.output_formatter
            .start_operation(&format!("Processing {}", input.display()));

        let progress = Rc::new(RefCell::new(JobProgress::new(&self.progress_manager)));
        let events = Rc::clone(&progress);

        let mut job = ZenJob::from_config(input, &self.config)?
            .with_progress(move |event| events.borrow_mut().handle(event));
        self.output_formatter.debug(&format!(
            "Mode: {}, destination: {}",
            job.mode(),
            job.plan().destination.display()
        ));

        let result = job.run();
        match &result {
            Ok(report) => {
                progress
                    .borrow_mut()
                    .finish("Workbook written", start_time.elapsed());
                self.output_formatter
                    .print_job_report(report, start_time.elapsed());
            }
            Err(_) => progress.borrow_mut().abandon(),
        }

        result
    }

    /// Resolves sources and plans the workbook without writing anything.
    pub fn preview<P: AsRef<Path>>(&self, input: P) -> std::result::Result<JobPreview, JobError> {
        let job = ZenJob::from_config(input, &self.config)?;
        let preview = job.preview()?;
        self.output_formatter.print_preview(&preview);
        Ok(preview)
    }

    /// Generate sample configuration file
    pub fn generate_sample_config<P: AsRef<Path>>(output_path: P) -> Result<()> {
        let sample_config = Config::create_sample_config();
        std::fs::write(output_path.as_ref(), sample_config)?;
        Ok(())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn output_formatter(&self) -> &OutputFormatter {
        &self.output_formatter
    }

    pub fn progress_manager(&self) -> &ProgressManager {
        &self.progress_manager
    }

    /// Handle error with user-friendly output
    pub fn handle_error<E: UserFriendlyError>(&self, error: &E) {
        self.progress_manager.clear();
        self.output_formatter.print_user_friendly_error(error);
    }
}

/// Runs a job over `input_path` silently and returns the workbook path.
///
/// A directory (or a single export) is aggregated into a new workbook; any
/// other existing file is returned exactly as given. Configuration is read
/// from `zensheet.toml` in the working directory when present.
pub fn run(input_path: &str) -> std::result::Result<String, JobError> {
    let input_path = input_path.trim();

    let config = Config::load_with_defaults(None::<&Path>)
        .and_then(|config| config.validate().map(|_| config))
        .map_err(|e| JobError::new(JobStage::Resolve, "Could not load configuration", e))?;

    let mut job = ZenJob::from_config(input_path, &config)?;
    let report = job.run()?;

    Ok(match report.mode {
        JobMode::PassThrough => input_path.to_string(),
        JobMode::Aggregate => report.output_path.display().to_string(),
    })
}

/// Get version information
pub fn version_info() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FIELD_NAMES;
    use std::fs;
    use tempfile::TempDir;

    const ROW: &str = "2024-03-15;Groceries;Market;;Card;1234,56;RUB;;;;2024-03-15 10:20:30;2024-03-16 08:00:00";

    fn write_export(dir: &Path, name: &str) {
        let content = format!("{}\n{}\n", FIELD_NAMES.join(";"), ROW);
        fs::write(dir.join(name), content).unwrap();
    }

    #[test]
    fn test_run_aggregates_directory() {
        let temp_dir = TempDir::new().unwrap();
        write_export(temp_dir.path(), "zen_a.csv");
        write_export(temp_dir.path(), "zen_b.csv");

        let output = run(&temp_dir.path().display().to_string()).unwrap();

        assert!(output.ends_with(".xlsm"));
        assert!(Path::new(&output).exists());
        assert_eq!(Path::new(&output).parent(), Some(temp_dir.path()));
    }

    #[test]
    fn test_run_passes_workbook_through() {
        let temp_dir = TempDir::new().unwrap();
        let workbook = temp_dir.path().join("budget.xlsm");
        fs::write(&workbook, b"PK").unwrap();

        let input = workbook.display().to_string();
        let output = run(&format!("{}\n", input)).unwrap();

        assert_eq!(output, input);
        assert_eq!(fs::read_dir(temp_dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_run_reports_missing_sources() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("notes.txt"), "nothing here").unwrap();

        let error = run(&temp_dir.path().display().to_string()).unwrap_err();
        assert!(error.is_resolution_error());
        assert!(matches!(error.cause(), ZenSheetError::NoSourcesFound { .. }));
    }

    #[test]
    fn test_run_rejects_missing_path() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("missing");

        let error = run(&missing.display().to_string()).unwrap_err();
        assert_eq!(error.stage, JobStage::Resolve);
    }

    #[test]
    fn test_process_returns_report() {
        let temp_dir = TempDir::new().unwrap();
        write_export(temp_dir.path(), "zen_a.csv");

        let zensheet = ZenSheet::new(Config::default(), OutputMode::Plain, 0, true);
        let report = zensheet.process(temp_dir.path()).unwrap();

        assert_eq!(report.mode, JobMode::Aggregate);
        assert_eq!(report.total_records, 1);
        assert!(report.output_path.exists());
    }

    #[test]
    fn test_preview_writes_nothing() {
        let temp_dir = TempDir::new().unwrap();
        write_export(temp_dir.path(), "zen_a.csv");

        let zensheet = ZenSheet::new(Config::default(), OutputMode::Plain, 0, true);
        let preview = zensheet.preview(temp_dir.path()).unwrap();

        assert_eq!(preview.sources.len(), 1);
        assert!(!preview.plan.destination.exists());
        assert_eq!(fs::read_dir(temp_dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_sample_config_generation() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("sample.toml");

        ZenSheet::generate_sample_config(&config_path).unwrap();

        let content = fs::read_to_string(&config_path).unwrap();
        assert!(content.contains("[sources]"));
        assert!(content.contains("[output]"));
    }

    #[test]
    fn test_version_info() {
        assert!(!version_info().is_empty());
    }
}
