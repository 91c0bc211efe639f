pub mod planner;
pub mod xlsx_writer;

pub use planner::{plan, JobMode, WorkbookPlan};
pub use xlsx_writer::{WorkbookContent, WorkbookSink, XlsxHandle, XlsxWorkbookWriter};
