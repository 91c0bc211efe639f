use crate::job::JobEvent;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::time::Duration;

#[derive(Clone)]
pub struct ProgressManager {
    multi_progress: MultiProgress,
    enabled: bool,
}

impl ProgressManager {
    pub fn new(enabled: bool) -> Self {
        Self {
            multi_progress: MultiProgress::new(),
            enabled,
        }
    }

    pub fn create_spinner(&self, message: &str) -> ProgressBar {
        if !self.enabled {
            return ProgressBar::hidden();
        }

        let pb = self.multi_progress.add(ProgressBar::new_spinner());
        pb.enable_steady_tick(Duration::from_millis(100));
        pb.set_style(
            ProgressStyle::with_template("{spinner:.green} {msg} ({elapsed})")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        pb.set_message(message.to_string());
        pb
    }

    pub fn create_record_progress(&self, total_records: u64) -> ProgressBar {
        if !self.enabled {
            return ProgressBar::hidden();
        }

        let pb = self.multi_progress.add(ProgressBar::new(total_records));
        pb.set_style(
            ProgressStyle::with_template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>7}/{len:7} records {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
        );
        pb.set_message("Normalizing...");
        pb
    }

    pub fn clear(&self) {
        if self.enabled {
            self.multi_progress.clear().ok();
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

impl Default for ProgressManager {
    fn default() -> Self {
        Self::new(true)
    }
}

/// Drives a scanning spinner, a normalization bar and a writing spinner
/// from job events.
pub struct JobProgress {
    manager: ProgressManager,
    spinner: Option<ProgressBar>,
    records: Option<ProgressBar>,
}

impl JobProgress {
    pub fn new(manager: &ProgressManager) -> Self {
        Self {
            manager: manager.clone(),
            spinner: None,
            records: None,
        }
    }

    pub fn handle(&mut self, event: &JobEvent) {
        match event {
            JobEvent::Scanning => {
                self.spinner = Some(self.manager.create_spinner("Scanning for exports..."));
            }
            JobEvent::Scanned { sources, records } => {
                if let Some(spinner) = self.spinner.take() {
                    spinner.finish_with_message(format!(
                        "Found {} sources with {} records",
                        sources, records
                    ));
                }
                self.records = Some(self.manager.create_record_progress(*records as u64));
            }
            JobEvent::Normalized { source, done, .. } => {
                if let Some(pb) = &self.records {
                    pb.set_position(*done as u64);
                    pb.set_message(source.clone());
                }
            }
            JobEvent::Writing => {
                if let Some(pb) = self.records.take() {
                    pb.finish_with_message("normalized");
                }
                self.spinner = Some(self.manager.create_spinner("Writing workbook..."));
            }
        }
    }

    pub fn finish(&mut self, message: &str, duration: Duration) {
        if let Some(pb) = self.records.take() {
            pb.abandon();
        }
        if let Some(spinner) = self.spinner.take() {
            finish_progress_with_summary(&spinner, message, duration);
        }
    }

    pub fn abandon(&mut self) {
        for pb in [self.spinner.take(), self.records.take()].into_iter().flatten() {
            pb.abandon();
        }
    }
}

pub fn finish_progress_with_summary(pb: &ProgressBar, message: &str, duration: Duration) {
    let final_message = format!("{} (completed in {})", message, format_duration(duration));
    pb.finish_with_message(final_message);
}

fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs >= 60 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else if secs > 0 {
        format!("{}s", secs)
    } else {
        format!("{}ms", duration.as_millis())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_manager_creation() {
        let manager = ProgressManager::new(true);
        assert!(manager.is_enabled());

        let disabled_manager = ProgressManager::new(false);
        assert!(!disabled_manager.is_enabled());
    }

    #[test]
    fn test_disabled_progress_bars() {
        let manager = ProgressManager::new(false);

        assert!(manager.create_spinner("scan").is_hidden());
        assert!(manager.create_record_progress(10).is_hidden());
    }

    #[test]
    fn test_record_progress_length() {
        let manager = ProgressManager::new(true);
        let pb = manager.create_record_progress(42);
        assert_eq!(pb.length(), Some(42));
    }

    #[test]
    fn test_job_progress_follows_events() {
        let manager = ProgressManager::new(false);
        let mut progress = JobProgress::new(&manager);

        progress.handle(&JobEvent::Scanning);
        progress.handle(&JobEvent::Scanned { sources: 2, records: 5 });
        assert!(progress.records.is_some());

        progress.handle(&JobEvent::Normalized {
            source: "zen_a.csv".to_string(),
            done: 3,
            total: 5,
        });
        assert_eq!(progress.records.as_ref().map(|pb| pb.position()), Some(3));

        progress.handle(&JobEvent::Writing);
        assert!(progress.records.is_none());
        assert!(progress.spinner.is_some());

        progress.finish("done", Duration::from_millis(5));
        assert!(progress.spinner.is_none());
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(30)), "30s");
        assert_eq!(format_duration(Duration::from_secs(90)), "1m 30s");
        assert_eq!(format_duration(Duration::from_millis(500)), "500ms");
    }
}
