use std::path::PathBuf;

use async_trait::async_trait;

use crate::domain::{AnalysisReport, DomainError};

/// Port for presenting a finished analysis report.
///
/// The submission pipeline hands every parsed response here unconditionally;
/// failure reports flow through the same sink as successes.
#[async_trait]
pub trait ReportSink: Send + Sync {
    /// Render and persist the report, returning where it landed.
    async fn present(&self, report: &AnalysisReport) -> Result<PathBuf, DomainError>;
}
