use crate::error::UserFriendlyError;
use crate::job::{JobPreview, JobReport};
use crate::normalizer::CoercionWarning;
use crate::scanner::SkippedSource;
use crate::workbook::JobMode;
use console::{style, Emoji, Term};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputMode {
    Human,
    Json,
    Plain,
}

static CHECKMARK: Emoji = Emoji("✅ ", "✓ ");
static CROSS: Emoji = Emoji("❌ ", "✗ ");
static INFO: Emoji = Emoji("ℹ️  ", "i ");
static WARNING: Emoji = Emoji("⚠️  ", "! ");
static ROCKET: Emoji = Emoji("🚀 ", "> ");
static SPARKLES: Emoji = Emoji("✨ ", "* ");

/// Warnings listed one by one before the rest is summarized.
const WARNING_DETAIL_LIMIT: usize = 20;

pub struct OutputFormatter {
    mode: OutputMode,
    use_colors: bool,
    verbose_level: u8,
    quiet: bool,
}

impl OutputFormatter {
    pub fn new(mode: OutputMode, verbose: u8, quiet: bool) -> Self {
        let use_colors = match mode {
            OutputMode::Human => Term::stdout().features().colors_supported() && !quiet,
            _ => false,
        };

        Self {
            mode,
            use_colors,
            verbose_level: if quiet { 0 } else { verbose },
            quiet,
        }
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    pub fn success(&self, message: &str) {
        match self.mode {
            OutputMode::Human => self.print_human_message(MessageType::Success, message),
            OutputMode::Json => self.print_json_message("success", message),
            OutputMode::Plain => println!("SUCCESS: {}", message),
        }
    }

    pub fn error(&self, message: &str) {
        match self.mode {
            OutputMode::Human => self.print_human_message(MessageType::Error, message),
            OutputMode::Json => self.print_json_message("error", message),
            OutputMode::Plain => eprintln!("ERROR: {}", message),
        }
    }

    pub fn warning(&self, message: &str) {
        if self.should_show_message(0) {
            match self.mode {
                OutputMode::Human => self.print_human_message(MessageType::Warning, message),
                OutputMode::Json => self.print_json_message("warning", message),
                OutputMode::Plain => println!("WARNING: {}", message),
            }
        }
    }

    pub fn info(&self, message: &str) {
        if self.should_show_message(1) {
            match self.mode {
                OutputMode::Human => self.print_human_message(MessageType::Info, message),
                OutputMode::Json => self.print_json_message("info", message),
                OutputMode::Plain => println!("INFO: {}", message),
            }
        }
    }

    pub fn debug(&self, message: &str) {
        if self.should_show_message(2) {
            match self.mode {
                OutputMode::Human => {
                    if self.use_colors {
                        println!("  {}", style(message).dim());
                    } else {
                        println!("  DEBUG: {}", message);
                    }
                }
                OutputMode::Json => self.print_json_message("debug", message),
                OutputMode::Plain => println!("DEBUG: {}", message),
            }
        }
    }

    pub fn start_operation(&self, operation: &str) {
        if self.should_show_message(1) {
            match self.mode {
                OutputMode::Human => {
                    if self.use_colors {
                        println!("{}{}", ROCKET, style(operation).bold());
                    } else {
                        println!("> {}", operation);
                    }
                }
                OutputMode::Json => self.print_json_message("operation_start", operation),
                OutputMode::Plain => println!("STARTING: {}", operation),
            }
        }
    }

    pub fn print_user_friendly_error<E: UserFriendlyError>(&self, error: &E) {
        self.error(&error.user_message());

        if let Some(suggestion) = error.suggestion() {
            match self.mode {
                OutputMode::Human => {
                    eprintln!();
                    if self.use_colors {
                        eprintln!(
                            "{}{}",
                            INFO,
                            style(format!("Suggestion: {}", suggestion)).cyan()
                        );
                    } else {
                        eprintln!("Suggestion: {}", suggestion);
                    }
                }
                OutputMode::Json => {
                    self.print_json_object(&serde_json::json!({
                        "type": "suggestion",
                        "message": suggestion
                    }));
                }
                OutputMode::Plain => eprintln!("SUGGESTION: {}", suggestion),
            }
        }
    }

    /// Prints the outcome of a finished job. JSON mode emits the whole
    /// report as one pretty-printed document.
    pub fn print_job_report(&self, report: &JobReport, duration: Duration) {
        match self.mode {
            OutputMode::Human => self.print_human_report(report, duration),
            OutputMode::Json => {
                let json_output =
                    serde_json::to_string_pretty(report).unwrap_or_else(|_| "{}".to_string());
                println!("{}", json_output);
            }
            OutputMode::Plain => self.print_plain_report(report, duration),
        }
    }

    pub fn print_preview(&self, preview: &JobPreview) {
        match self.mode {
            OutputMode::Json => {
                let json_output =
                    serde_json::to_string_pretty(preview).unwrap_or_else(|_| "{}".to_string());
                println!("{}", json_output);
            }
            OutputMode::Human | OutputMode::Plain => {
                self.print_header("Dry run");
                println!("  Input:        {}", preview.config.input.display());
                println!("  Mode:         {}", preview.config.mode);
                println!("  Destination:  {}", preview.plan.destination.display());

                if preview.plan.is_reuse() {
                    println!("  Workbook:     reused as is");
                } else {
                    println!("  Sheets:       {}", preview.plan.sheets.join(", "));
                    for (format, columns) in &preview.plan.date_columns {
                        println!("  {:<13} {}", format!("{}:", columns.join(",")), format);
                    }
                }

                if !preview.sources.is_empty() {
                    println!();
                    println!("Sources:");
                    for source in &preview.sources {
                        println!("  {} ({} records)", source.name, source.records);
                    }
                }
                self.print_skipped(&preview.skipped);
                self.print_separator();
            }
        }
    }

    pub fn print_header(&self, title: &str) {
        if self.quiet {
            return;
        }

        match self.mode {
            OutputMode::Human => {
                println!();
                if self.use_colors {
                    println!("{} {}", SPARKLES, style(title).bold().cyan());
                } else {
                    println!("=== {} ===", title);
                }
                println!();
            }
            OutputMode::Json => {
                self.print_json_object(&serde_json::json!({
                    "type": "header",
                    "title": title
                }));
            }
            OutputMode::Plain => println!("=== {} ===", title),
        }
    }

    pub fn print_separator(&self) {
        if self.quiet {
            return;
        }

        match self.mode {
            OutputMode::Human => {
                if self.use_colors {
                    println!("{}", style("─".repeat(60)).dim());
                } else {
                    println!("{}", "-".repeat(60));
                }
            }
            OutputMode::Plain => println!("{}", "-".repeat(60)),
            OutputMode::Json => {}
        }
    }

    fn should_show_message(&self, min_verbose_level: u8) -> bool {
        !self.quiet && self.verbose_level >= min_verbose_level
    }

    fn print_human_message(&self, msg_type: MessageType, message: &str) {
        if self.use_colors {
            let styled = match msg_type {
                MessageType::Success => style(message).green().bold(),
                MessageType::Error => style(message).red().bold(),
                MessageType::Warning => style(message).yellow().bold(),
                MessageType::Info => style(message).cyan(),
            };
            let emoji = match msg_type {
                MessageType::Success => CHECKMARK,
                MessageType::Error => CROSS,
                MessageType::Warning => WARNING,
                MessageType::Info => INFO,
            };

            match msg_type {
                MessageType::Error => eprintln!("{}{}", emoji, styled),
                _ => println!("{}{}", emoji, styled),
            }
        } else {
            let prefix = match msg_type {
                MessageType::Success => "✓",
                MessageType::Error => "✗",
                MessageType::Warning => "!",
                MessageType::Info => "i",
            };

            match msg_type {
                MessageType::Error => eprintln!("{} {}", prefix, message),
                _ => println!("{} {}", prefix, message),
            }
        }
    }

    fn print_json_message(&self, level: &str, message: &str) {
        self.print_json_object(&serde_json::json!({
            "type": "message",
            "level": level,
            "message": message,
            "timestamp": chrono::Utc::now().to_rfc3339()
        }));
    }

    fn print_json_object(&self, obj: &serde_json::Value) {
        println!(
            "{}",
            serde_json::to_string(obj).unwrap_or_else(|_| "{}".to_string())
        );
    }

    fn highlight(&self, value: impl ToString) -> String {
        if self.use_colors {
            style(value.to_string()).cyan().bold().to_string()
        } else {
            value.to_string()
        }
    }

    fn print_human_report(&self, report: &JobReport, duration: Duration) {
        if self.quiet {
            println!("{}", report.output_path.display());
            return;
        }

        self.print_separator();
        match report.mode {
            JobMode::PassThrough => {
                self.success("Workbook reused as is");
            }
            JobMode::Aggregate => {
                self.success("Exports aggregated");
            }
        }

        println!();
        println!("  Workbook:    {}", self.highlight(report.output_path.display()));
        if report.mode == JobMode::Aggregate {
            println!("  Sources:     {}", self.highlight(report.sources.len()));
            println!("  Records:     {}", self.highlight(report.total_records));
        }
        println!("  Time taken:  {}", self.highlight(format_duration(duration)));

        if self.verbose_level >= 1 {
            for source in &report.sources {
                println!("    {} ({} records)", source.name, source.records);
            }
        }

        if !report.warnings.is_empty() {
            println!();
            self.warning(&format!(
                "{} values could not be converted and were kept as text",
                report.warnings.len()
            ));
            self.print_coercion_warnings(&report.warnings);
        }
        self.print_skipped(&report.skipped);
        self.print_notes(&report.notes);
        self.print_separator();
    }

    fn print_plain_report(&self, report: &JobReport, duration: Duration) {
        if self.quiet {
            println!("{}", report.output_path.display());
            return;
        }

        println!("COMPLETED: {}", report.mode);
        println!("Workbook: {}", report.output_path.display());
        println!("Sources: {}", report.sources.len());
        println!("Records: {}", report.total_records);
        println!("Duration: {:?}", duration);
        if !report.warnings.is_empty() {
            println!("Warnings: {}", report.warnings.len());
            self.print_coercion_warnings(&report.warnings);
        }
        if !report.skipped.is_empty() {
            println!("Skipped: {}", report.skipped.len());
        }
        self.print_notes(&report.notes);
    }

    /// Workbook-side remarks; shown at `-vv`.
    pub fn print_notes(&self, notes: &[String]) {
        for note in notes {
            self.debug(note);
        }
    }

    /// Lists individual coercion warnings; needs `-v`.
    pub fn print_coercion_warnings(&self, warnings: &[CoercionWarning]) {
        if !self.should_show_message(1) {
            return;
        }

        for warning in warnings.iter().take(WARNING_DETAIL_LIMIT) {
            println!("  - {}", warning);
        }
        if warnings.len() > WARNING_DETAIL_LIMIT {
            println!("  ... and {} more", warnings.len() - WARNING_DETAIL_LIMIT);
        }
    }

    fn print_skipped(&self, skipped: &[SkippedSource]) {
        if skipped.is_empty() || self.quiet {
            return;
        }

        println!();
        self.warning(&format!("{} files were skipped", skipped.len()));
        if self.should_show_message(1) {
            for skip in skipped {
                println!("  - {}: {}", skip.path.display(), skip.reason);
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum MessageType {
    Success,
    Error,
    Warning,
    Info,
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
    fn test_formatter_creation() {
        let formatter = OutputFormatter::new(OutputMode::Plain, 1, false);
        assert_eq!(formatter.mode(), OutputMode::Plain);
        assert_eq!(formatter.verbose_level, 1);
        assert!(!formatter.use_colors);
    }

    #[test]
    fn test_quiet_mode() {
        let formatter = OutputFormatter::new(OutputMode::Human, 2, true);
        assert_eq!(formatter.verbose_level, 0);
        assert!(formatter.quiet);
        assert!(!formatter.use_colors);
    }

    #[test]
    fn test_should_show_message() {
        let formatter = OutputFormatter::new(OutputMode::Human, 2, false);
        assert!(formatter.should_show_message(0));
        assert!(formatter.should_show_message(2));
        assert!(!formatter.should_show_message(3));

        let quiet_formatter = OutputFormatter::new(OutputMode::Human, 2, true);
        assert!(!quiet_formatter.should_show_message(0));
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(30)), "30s");
        assert_eq!(format_duration(Duration::from_secs(90)), "1m 30s");
        assert_eq!(format_duration(Duration::from_millis(0)), "0ms");
    }
}
