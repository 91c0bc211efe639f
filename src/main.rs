use clap::Parser;
use std::path::{Path, PathBuf};
use std::process;
use zensheet::{
    Cli, JobError, OutputFormatter, OutputMode, UserFriendlyError, ZenSheet, ZenSheetError,
};

const EXIT_SUCCESS: i32 = 0;
const EXIT_GENERAL: i32 = 1;
const EXIT_WARNINGS: i32 = 2;
const EXIT_RESOLUTION: i32 = 3;
const EXIT_WRITE: i32 = 4;
const EXIT_CONFIG: i32 = 5;

fn main() {
    let exit_code = run();
    process::exit(exit_code);
}

fn run() -> i32 {
    let cli = Cli::parse();

    if cli.generate_config {
        return handle_generate_config(&cli);
    }

    let zensheet = match ZenSheet::from_cli(&cli) {
        Ok(zensheet) => zensheet,
        Err(e) => {
            print_startup_error(&cli, &e);
            return startup_exit_code(&e);
        }
    };

    let Some(path) = cli.path.as_deref() else {
        zensheet.output_formatter().error("No input path given");
        return EXIT_GENERAL;
    };

    if cli.dry_run {
        return handle_dry_run(&zensheet, path);
    }

    match zensheet.process(path) {
        Ok(report) => {
            if report.has_warnings() {
                EXIT_WARNINGS
            } else {
                EXIT_SUCCESS
            }
        }
        Err(e) => {
            zensheet.handle_error(&e);
            job_exit_code(&e)
        }
    }
}

fn handle_generate_config(cli: &Cli) -> i32 {
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from("zensheet.toml"));

    if config_path.exists() {
        eprintln!(
            "Refusing to overwrite existing configuration file: {}",
            config_path.display()
        );
        return EXIT_CONFIG;
    }

    match ZenSheet::generate_sample_config(&config_path) {
        Ok(()) => {
            println!("Generated sample configuration file: {}", config_path.display());
            println!("\nTo use this configuration:");
            println!("  zensheet <path> --config {}", config_path.display());
            println!("\nEdit the file to customize settings for your needs.");
            EXIT_SUCCESS
        }
        Err(e) => {
            eprintln!("Failed to generate configuration file: {}", e.user_message());
            if let Some(suggestion) = e.suggestion() {
                eprintln!("Suggestion: {}", suggestion);
            }
            EXIT_GENERAL
        }
    }
}

fn handle_dry_run(zensheet: &ZenSheet, path: &Path) -> i32 {
    let formatter = zensheet.output_formatter();
    formatter.info("DRY RUN MODE - no workbook will be written");

    match zensheet.preview(path) {
        Ok(_) => {
            formatter.success("Dry run completed successfully");
            formatter.info("Run without --dry-run to write the workbook");
            EXIT_SUCCESS
        }
        Err(e) => {
            zensheet.handle_error(&e);
            job_exit_code(&e)
        }
    }
}

fn job_exit_code(error: &JobError) -> i32 {
    if error.is_resolution_error() {
        EXIT_RESOLUTION
    } else if error.is_write_error() {
        EXIT_WRITE
    } else {
        EXIT_GENERAL
    }
}

fn startup_exit_code(error: &ZenSheetError) -> i32 {
    match error {
        // Startup only touches the configuration file
        ZenSheetError::Config { .. } | ZenSheetError::Io(_) | ZenSheetError::Permission { .. } => {
            EXIT_CONFIG
        }
        _ => EXIT_GENERAL,
    }
}

fn print_startup_error(cli: &Cli, error: &ZenSheetError) {
    let formatter = OutputFormatter::new(OutputMode::from(cli.output_format), 0, false);
    formatter.print_user_friendly_error(error);
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use zensheet::{Config, JobStage, OutputFormat};

    fn cli_for(config: Option<PathBuf>) -> Cli {
        Cli {
            path: None,
            prefix: None,
            extension: None,
            max_depth: None,
            config,
            output_format: OutputFormat::Plain,
            no_source_sheets: false,
            verbose: 0,
            quiet: true,
            dry_run: false,
            generate_config: true,
        }
    }

    #[test]
    fn test_generate_config_command() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let exit_code = handle_generate_config(&cli_for(Some(config_path.clone())));
        assert_eq!(exit_code, EXIT_SUCCESS);

        let content = std::fs::read_to_string(&config_path).unwrap();
        assert!(content.contains("[sources]"));
    }

    #[test]
    fn test_generate_config_keeps_existing_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");
        std::fs::write(&config_path, "# mine").unwrap();

        let exit_code = handle_generate_config(&cli_for(Some(config_path.clone())));
        assert_eq!(exit_code, EXIT_CONFIG);
        assert_eq!(std::fs::read_to_string(&config_path).unwrap(), "# mine");
    }

    #[test]
    fn test_exit_codes() {
        let resolve = JobError::new(
            JobStage::Collect,
            "nothing",
            ZenSheetError::InvalidPath { path: "/x".to_string() },
        );
        assert_eq!(job_exit_code(&resolve), EXIT_RESOLUTION);

        let write = JobError::new(
            JobStage::Write,
            "disk",
            ZenSheetError::Workbook { message: "full".to_string(), source: None },
        );
        assert_eq!(job_exit_code(&write), EXIT_WRITE);

        let config = ZenSheetError::Config { message: "bad".to_string() };
        assert_eq!(startup_exit_code(&config), EXIT_CONFIG);
    }

    #[test]
    fn test_dry_run_on_missing_path() {
        let temp_dir = TempDir::new().unwrap();
        let zensheet = ZenSheet::new(Config::default(), OutputMode::Plain, 0, true);

        let exit_code = handle_dry_run(&zensheet, &temp_dir.path().join("missing"));
        assert_eq!(exit_code, EXIT_RESOLUTION);
    }
}
