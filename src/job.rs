//! The resolve → normalize → write pipeline behind `zensheet::run`.

use crate::config::Config;
use crate::error::{JobError, JobStage, ZenSheetError};
use crate::normalizer::{CoercionWarning, FieldNormalizer};
use crate::scanner::{CsvSourceCatalog, SkippedSource, SourceCatalog, SourceClass, SourceSet};
use crate::workbook::planner::{self, JobMode, WorkbookPlan};
use crate::workbook::{WorkbookContent, WorkbookSink, XlsxWorkbookWriter};
use chrono::{Local, NaiveDateTime};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Everything decided once when a job is constructed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobConfig {
    pub input: PathBuf,
    pub file_prefix: String,
    pub extension: String,
    pub timestamp: NaiveDateTime,
    pub class: SourceClass,
    pub mode: JobMode,
}

#[derive(Debug, Clone, PartialEq)]
pub enum JobEvent {
    Scanning,
    Scanned { sources: usize, records: usize },
    Normalized { source: String, done: usize, total: usize },
    Writing,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceSummary {
    pub name: String,
    pub records: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    pub output_path: PathBuf,
    pub input: PathBuf,
    pub mode: JobMode,
    pub generated_at: NaiveDateTime,
    pub sources: Vec<SourceSummary>,
    pub total_records: usize,
    pub skipped: Vec<SkippedSource>,
    pub warnings: Vec<CoercionWarning>,
    /// Non-fatal remarks from the workbook side.
    pub notes: Vec<String>,
}

impl JobReport {
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty() || !self.skipped.is_empty()
    }
}

/// What a run would do, computed without writing anything.
#[derive(Debug, Clone, Serialize)]
pub struct JobPreview {
    pub config: JobConfig,
    pub plan: WorkbookPlan,
    pub sources: Vec<SourceSummary>,
    pub skipped: Vec<SkippedSource>,
}

type ProgressCallback = Box<dyn Fn(&JobEvent)>;

pub struct ZenJob<C: SourceCatalog, S: WorkbookSink> {
    config: JobConfig,
    catalog: C,
    sink: S,
    progress: Option<ProgressCallback>,
}

impl ZenJob<CsvSourceCatalog, XlsxWorkbookWriter> {
    /// Builds a job over the real CSV catalog and xlsx writer, stamped with
    /// the current local time.
    pub fn from_config<P: AsRef<Path>>(input: P, settings: &Config) -> Result<Self, JobError> {
        let catalog = CsvSourceCatalog::new(&settings.sources);
        let sink = XlsxWorkbookWriter::new().with_per_source_sheets(settings.output.per_source_sheets);

        Self::with_parts(input, settings, catalog, sink, Local::now().naive_local())
    }
}

impl<C: SourceCatalog, S: WorkbookSink> ZenJob<C, S> {
    pub fn with_parts<P: AsRef<Path>>(
        input: P,
        settings: &Config,
        catalog: C,
        sink: S,
        timestamp: NaiveDateTime,
    ) -> Result<Self, JobError> {
        let input = absolute_input(input.as_ref()).map_err(|e| {
            JobError::new(JobStage::Resolve, "Could not resolve the input path", e)
        })?;

        let class = catalog.classify(&input).map_err(|e| {
            JobError::new(
                JobStage::Resolve,
                format!("Could not resolve sources at {}", input.display()),
                e,
            )
        })?;

        let config = JobConfig {
            input,
            file_prefix: settings.sources.file_prefix.clone(),
            extension: settings.output.extension.clone(),
            timestamp,
            mode: JobMode::from_class(class),
            class,
        };

        Ok(Self {
            config,
            catalog,
            sink,
            progress: None,
        })
    }

    pub fn with_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(&JobEvent) + 'static,
    {
        self.progress = Some(Box::new(callback));
        self
    }

    pub fn config(&self) -> &JobConfig {
        &self.config
    }

    pub fn mode(&self) -> JobMode {
        self.config.mode
    }

    pub fn plan(&self) -> WorkbookPlan {
        planner::plan(
            self.config.mode,
            &self.config.input,
            self.config.class,
            self.config.timestamp,
            &self.config.extension,
        )
    }

    /// Resolves sources and plans the output without writing.
    pub fn preview(&self) -> Result<JobPreview, JobError> {
        let (sources, skipped) = match self.config.mode {
            JobMode::PassThrough => (Vec::new(), Vec::new()),
            JobMode::Aggregate => {
                let set = self.collect()?;
                (summarize(&set), set.skipped)
            }
        };

        Ok(JobPreview {
            config: self.config.clone(),
            plan: self.plan(),
            sources,
            skipped,
        })
    }

    pub fn run(&mut self) -> Result<JobReport, JobError> {
        let plan = self.plan();

        let (content, sources, skipped, warnings) = match self.config.mode {
            JobMode::PassThrough => (WorkbookContent::default(), Vec::new(), Vec::new(), Vec::new()),
            JobMode::Aggregate => {
                let mut set = self.collect()?;
                let warnings = self.normalize(&mut set);
                let sources = summarize(&set);
                let metadata = self.metadata(&sources, &set.skipped, warnings.len());
                let content = WorkbookContent {
                    sources: set.sources,
                    metadata,
                };
                (content, sources, set.skipped, warnings)
            }
        };

        self.emit(&JobEvent::Writing);
        let handle = self.sink.create(&plan).map_err(|e| {
            JobError::new(
                JobStage::Write,
                format!("Could not create workbook {}", plan.destination.display()),
                e,
            )
        })?;
        let output_path = self.sink.write(handle, &content).map_err(|e| {
            JobError::new(
                JobStage::Write,
                format!("Could not write workbook {}", plan.destination.display()),
                e,
            )
        })?;
        let notes = self.sink.take_notes();

        Ok(JobReport {
            output_path,
            input: self.config.input.clone(),
            mode: self.config.mode,
            generated_at: self.config.timestamp,
            total_records: sources.iter().map(|s| s.records).sum(),
            sources,
            skipped,
            warnings,
            notes,
        })
    }

    fn collect(&self) -> Result<SourceSet, JobError> {
        self.emit(&JobEvent::Scanning);

        let set = self.catalog.scan(&self.config.input).map_err(|e| {
            JobError::new(
                JobStage::Collect,
                format!("Could not collect sources from {}", self.config.input.display()),
                e,
            )
        })?;

        // A catalog may hand back an empty set; that is still "nothing found"
        if set.is_empty() {
            return Err(JobError::new(
                JobStage::Collect,
                format!("Could not collect sources from {}", self.config.input.display()),
                ZenSheetError::NoSourcesFound {
                    path: self.config.input.display().to_string(),
                    prefix: self.config.file_prefix.clone(),
                    skipped: set.skipped.iter().map(|s| s.path.display().to_string()).collect(),
                },
            ));
        }

        self.emit(&JobEvent::Scanned {
            sources: set.sources.len(),
            records: set.total_records(),
        });
        Ok(set)
    }

    fn normalize(&self, set: &mut SourceSet) -> Vec<CoercionWarning> {
        let total = set.total_records();
        let mut done = 0;
        let mut normalizer = FieldNormalizer::new();

        for (name, records) in set.sources.iter_mut() {
            normalizer.normalize_all(name, records);
            done += records.len();
            self.emit(&JobEvent::Normalized {
                source: name.clone(),
                done,
                total,
            });
        }

        normalizer.into_warnings()
    }

    fn metadata(
        &self,
        sources: &[SourceSummary],
        skipped: &[SkippedSource],
        warning_count: usize,
    ) -> Vec<(String, String)> {
        let mut lines = vec![
            ("input".to_string(), self.config.input.display().to_string()),
            ("file_prefix".to_string(), self.config.file_prefix.clone()),
            (
                "generated_at".to_string(),
                self.config.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            ),
            ("generator".to_string(), format!("zensheet {}", env!("CARGO_PKG_VERSION"))),
        ];

        for source in sources {
            lines.push((format!("source:{}", source.name), source.records.to_string()));
        }
        lines.push((
            "total_records".to_string(),
            sources.iter().map(|s| s.records).sum::<usize>().to_string(),
        ));
        lines.push(("coercion_warnings".to_string(), warning_count.to_string()));
        for skip in skipped {
            lines.push((format!("skipped:{}", skip.path.display()), skip.reason.clone()));
        }

        lines
    }

    fn emit(&self, event: &JobEvent) {
        if let Some(callback) = &self.progress {
            callback(event);
        }
    }
}

fn summarize(set: &SourceSet) -> Vec<SourceSummary> {
    set.sources
        .iter()
        .map(|(name, records)| SourceSummary {
            name: name.clone(),
            records: records.len(),
        })
        .collect()
}

fn absolute_input(input: &Path) -> crate::error::Result<PathBuf> {
    if input.as_os_str().is_empty() {
        return Err(ZenSheetError::InvalidPath {
            path: "no input path given".to_string(),
        });
    }

    if input.is_absolute() {
        Ok(input.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(input))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Result, UserFriendlyError};
    use crate::schema::{Field, FieldValue, Record};
    use chrono::NaiveDate;
    use std::cell::RefCell;
    use std::collections::BTreeMap;
    use std::rc::Rc;

    struct FakeCatalog {
        class: SourceClass,
        sources: Option<BTreeMap<String, Vec<Record>>>,
    }

    impl FakeCatalog {
        fn directory(sources: BTreeMap<String, Vec<Record>>) -> Self {
            Self {
                class: SourceClass {
                    is_single_file: false,
                    is_csv_like: false,
                },
                sources: Some(sources),
            }
        }

        fn workbook() -> Self {
            Self {
                class: SourceClass {
                    is_single_file: true,
                    is_csv_like: false,
                },
                sources: None,
            }
        }
    }

    impl SourceCatalog for FakeCatalog {
        fn classify(&self, _path: &Path) -> Result<SourceClass> {
            Ok(self.class)
        }

        fn scan(&self, path: &Path) -> Result<SourceSet> {
            match &self.sources {
                Some(sources) if !sources.is_empty() => Ok(SourceSet {
                    sources: sources.clone(),
                    skipped: Vec::new(),
                }),
                _ => Err(ZenSheetError::NoSourcesFound {
                    path: path.display().to_string(),
                    prefix: "zen_".to_string(),
                    skipped: Vec::new(),
                }),
            }
        }
    }

    struct MissingCatalog;

    impl SourceCatalog for MissingCatalog {
        fn classify(&self, path: &Path) -> Result<SourceClass> {
            Err(ZenSheetError::InvalidPath {
                path: path.display().to_string(),
            })
        }

        fn scan(&self, _path: &Path) -> Result<SourceSet> {
            unreachable!("scan must not run after a failed classify")
        }
    }

    #[derive(Default)]
    struct Written {
        plans: Vec<WorkbookPlan>,
        content: Option<WorkbookContent>,
    }

    #[derive(Default)]
    struct FakeSink {
        written: Rc<RefCell<Written>>,
        fail_write: bool,
        notes: Vec<String>,
    }

    impl WorkbookSink for FakeSink {
        type Handle = WorkbookPlan;

        fn create(&mut self, plan: &WorkbookPlan) -> Result<WorkbookPlan> {
            self.written.borrow_mut().plans.push(plan.clone());
            Ok(plan.clone())
        }

        fn write(&mut self, handle: WorkbookPlan, content: &WorkbookContent) -> Result<PathBuf> {
            if self.fail_write {
                return Err(ZenSheetError::Workbook {
                    message: "disk full".to_string(),
                    source: None,
                });
            }
            self.written.borrow_mut().content = Some(content.clone());
            Ok(handle.destination)
        }

        fn take_notes(&mut self) -> Vec<String> {
            std::mem::take(&mut self.notes)
        }
    }

    fn ts() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 15)
            .unwrap()
            .and_hms_opt(10, 20, 30)
            .unwrap()
    }

    fn raw(date: &str, outcome: &str) -> Record {
        Record::from_raw(vec![
            date, "Food", "Cafe", "", "Card", outcome, "RUB", "", "", "",
            "2024-03-15 10:20:30", "2024-03-16 08:00:00",
        ])
        .unwrap()
    }

    fn sources() -> BTreeMap<String, Vec<Record>> {
        BTreeMap::from([
            ("zen_a.csv".to_string(), vec![raw("2024-03-15", "1234,56"), raw("bad-date", "")]),
            ("zen_b.csv".to_string(), vec![raw("2024-03-16", "7")]),
        ])
    }

    #[test]
    fn test_aggregate_run() {
        let sink = FakeSink::default();
        let written = Rc::clone(&sink.written);
        let mut job = ZenJob::with_parts(
            "/data/exports",
            &Config::default(),
            FakeCatalog::directory(sources()),
            sink,
            ts(),
        )
        .unwrap();

        assert_eq!(job.mode(), JobMode::Aggregate);
        let report = job.run().unwrap();

        assert_eq!(
            report.output_path,
            PathBuf::from("/data/exports/2024-03-15T10-20-30.xlsm")
        );
        assert_eq!(report.total_records, 3);
        assert_eq!(report.sources.len(), 2);
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].field, Field::Date);
        assert_eq!(report.warnings[0].source, "zen_a.csv");
        assert_eq!(report.warnings[0].row, 2);
        assert!(report.has_warnings());

        let written = written.borrow();
        assert_eq!(written.plans[0].sheets, vec!["Total", "Config"]);
        let content = written.content.as_ref().unwrap();
        let first = &content.sources["zen_a.csv"][0];
        assert_eq!(first.get(Field::Outcome), &FieldValue::Amount(1234.56));
        let second = &content.sources["zen_a.csv"][1];
        assert_eq!(second.get(Field::Date), &FieldValue::from("bad-date"));
        assert!(second.get(Field::Outcome).is_empty());
        assert!(matches!(second.get(Field::CreatedDate), FieldValue::DateTime(_)));
        assert!(content.metadata.iter().any(|(k, v)| k == "source:zen_b.csv" && v == "1"));
    }

    #[test]
    fn test_pass_through_run_skips_collection() {
        let sink = FakeSink::default();
        let written = Rc::clone(&sink.written);
        let mut job = ZenJob::with_parts(
            "/data/budget.xlsm",
            &Config::default(),
            FakeCatalog::workbook(),
            sink,
            ts(),
        )
        .unwrap();

        assert_eq!(job.mode(), JobMode::PassThrough);
        let report = job.run().unwrap();

        assert_eq!(report.output_path, PathBuf::from("/data/budget.xlsm"));
        assert_eq!(report.total_records, 0);

        let written = written.borrow();
        assert!(written.plans[0].is_reuse());
        assert!(written.content.as_ref().unwrap().sources.is_empty());
    }

    #[test]
    fn test_no_sources_is_a_resolution_error() {
        let mut job = ZenJob::with_parts(
            "/data/empty",
            &Config::default(),
            FakeCatalog::directory(BTreeMap::new()),
            FakeSink::default(),
            ts(),
        )
        .unwrap();

        let error = job.run().unwrap_err();
        assert!(error.is_resolution_error());
        assert!(matches!(error.cause(), ZenSheetError::NoSourcesFound { .. }));
    }

    #[test]
    fn test_missing_input_fails_construction() {
        let result = ZenJob::with_parts(
            "/nope",
            &Config::default(),
            MissingCatalog,
            FakeSink::default(),
            ts(),
        );

        let error = result.err().unwrap();
        assert_eq!(error.stage, JobStage::Resolve);
        assert!(error.message.contains("/nope"));
    }

    #[test]
    fn test_empty_input_path() {
        let result = ZenJob::with_parts(
            "",
            &Config::default(),
            FakeCatalog::workbook(),
            FakeSink::default(),
            ts(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_write_failure_is_wrapped() {
        let sink = FakeSink {
            fail_write: true,
            ..FakeSink::default()
        };
        let mut job = ZenJob::with_parts(
            "/data/exports",
            &Config::default(),
            FakeCatalog::directory(sources()),
            sink,
            ts(),
        )
        .unwrap();

        let error = job.run().unwrap_err();
        assert!(error.is_write_error());
        assert!(error.user_message().contains("disk full"));
    }

    #[test]
    fn test_sink_notes_reach_the_report() {
        let sink = FakeSink {
            notes: vec!["Could not remove write test file /data/exports/.zensheet_write_test".to_string()],
            ..FakeSink::default()
        };
        let mut job = ZenJob::with_parts(
            "/data/exports",
            &Config::default(),
            FakeCatalog::directory(sources()),
            sink,
            ts(),
        )
        .unwrap();

        let report = job.run().unwrap();
        assert_eq!(report.notes.len(), 1);
        assert!(report.notes[0].contains(".zensheet_write_test"));
        assert_eq!(report.warnings.len(), 1);
    }

    #[test]
    fn test_progress_events() {
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink_events = Rc::clone(&events);

        let mut job = ZenJob::with_parts(
            "/data/exports",
            &Config::default(),
            FakeCatalog::directory(sources()),
            FakeSink::default(),
            ts(),
        )
        .unwrap()
        .with_progress(move |e| sink_events.borrow_mut().push(e.clone()));

        job.run().unwrap();

        let events = events.borrow();
        assert_eq!(events.first(), Some(&JobEvent::Scanning));
        assert!(events.contains(&JobEvent::Scanned { sources: 2, records: 3 }));
        assert_eq!(events.last(), Some(&JobEvent::Writing));
    }

    #[test]
    fn test_preview_does_not_write() {
        let sink = FakeSink::default();
        let written = Rc::clone(&sink.written);
        let job = ZenJob::with_parts(
            "/data/exports",
            &Config::default(),
            FakeCatalog::directory(sources()),
            sink,
            ts(),
        )
        .unwrap();

        let preview = job.preview().unwrap();
        assert_eq!(preview.sources.len(), 2);
        assert!(preview.plan.destination.ends_with("2024-03-15T10-20-30.xlsm"));
        assert!(written.borrow().plans.is_empty());
    }
}
