pub mod csv_source;
pub mod file_filter;
pub mod source_scanner;

pub use file_filter::FileFilter;
pub use source_scanner::{CsvSourceCatalog, SkippedSource, SourceCatalog, SourceClass, SourceSet};
