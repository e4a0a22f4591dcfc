pub mod report_builder;

pub use report_builder::{folder_label, ReportBuilder, RunReport, RunTotals};
