//! Issue ledger domain.
//!
//! Operators file reports against articles; administrators triage them.

pub mod report;
pub mod statistics;

pub use report::{CreateReport, NewReport, Report, ReportPatch, ReportStatus, ReportType};
pub use statistics::ReportStatistics;
