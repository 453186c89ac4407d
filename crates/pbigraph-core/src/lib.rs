//! pbigraph core
//!
//! Shared, versioned types used across the workspace: diagnostics,
//! configuration and the report.json schema.
//! Never rename diagnostic codes - they are part of the report format.

pub mod diagnostic;
pub mod report;
pub mod config;

pub use diagnostic::{Diagnostic, DiagnosticCode, Severity, Location};
pub use report::{Report, ReportVersion, ReportSummary, ReportNode, ReportEdge};
pub use config::{Config, ConfigError, GraphPolicy, SeverityThreshold, DEFAULT_DATE_TABLE_PREFIX};
