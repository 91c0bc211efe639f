use crate::config::{CliOverrides, Config};
use crate::error::Result;
use crate::ui::OutputMode;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "zensheet")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Aggregate ZenMoney CSV exports into a single workbook")]
#[command(
    long_about = "ZenSheet collects ZenMoney transaction exports (zen_*.csv) from a directory, \
                  converts dates and amounts into typed cells and writes them into one \
                  timestamped workbook next to the sources. Pointing it at an existing \
                  workbook returns that workbook untouched."
)]
#[command(after_help = "EXAMPLES:\n  \
    zensheet ~/Downloads/zenmoney\n  \
    zensheet ~/Downloads/zenmoney/zen_2024.csv --verbose\n  \
    zensheet ./exports --prefix zenmoney_ --extension xlsx\n  \
    zensheet ./exports --output-format json\n  \
    zensheet ./exports --dry-run")]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Directory of exports, a single export file, or an existing workbook
    #[arg(required_unless_present = "generate_config")]
    pub path: Option<PathBuf>,

    /// File name prefix an export must carry
    #[arg(short, long, help = "Source file name prefix (default: zen_)")]
    pub prefix: Option<String>,

    /// Extension of the generated workbook
    #[arg(short, long, help = "Workbook file extension without the dot (default: xlsm)")]
    pub extension: Option<String>,

    /// How deep to look for exports below PATH
    #[arg(long, help = "Directory depth to scan (1 = only PATH itself)")]
    pub max_depth: Option<usize>,

    /// Configuration file path
    #[arg(short, long, help = "Path to TOML configuration file")]
    pub config: Option<PathBuf>,

    /// Output format for results
    #[arg(long, value_enum, default_value_t = OutputFormat::Human)]
    pub output_format: OutputFormat,

    /// Only write the Total and Config sheets
    #[arg(long, help = "Do not add one sheet per source file")]
    pub no_source_sheets: bool,

    /// Verbose output level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (print only the workbook path)
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Dry run (show what would be done without executing)
    #[arg(long, help = "Show the plan and matched sources without writing")]
    pub dry_run: bool,

    /// Generate sample configuration file
    #[arg(long, help = "Generate a sample configuration file")]
    pub generate_config: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable colored output
    Human,
    /// JSON formatted output
    Json,
    /// Plain text output
    Plain,
}

impl From<OutputFormat> for OutputMode {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Human => OutputMode::Human,
            OutputFormat::Json => OutputMode::Json,
            OutputFormat::Plain => OutputMode::Plain,
        }
    }
}

impl Cli {
    pub fn load_config(&self) -> Result<Config> {
        let mut config = Config::load_with_defaults(self.config.as_ref())?;

        let overrides = self.create_cli_overrides();
        config.merge_with_cli_args(&overrides);
        config.validate()?;

        Ok(config)
    }

    pub fn create_cli_overrides(&self) -> CliOverrides {
        let extension = self
            .extension
            .as_ref()
            .map(|e| e.trim_start_matches('.').to_string());

        CliOverrides::new()
            .with_file_prefix(self.prefix.clone())
            .with_extension(extension)
            .with_max_depth(self.max_depth)
            .with_per_source_sheets(self.no_source_sheets.then_some(false))
    }

    pub fn verbosity_level(&self) -> u8 {
        if self.quiet {
            0
        } else {
            self.verbose
        }
    }
}
