//! Scan report schema (stable v1)
//!
//! This schema is STABLE and VERSIONED.
//! Breaking changes require a new version.

use crate::diagnostic::{Diagnostic, DiagnosticCode, Severity};
use serde::{Deserialize, Serialize};

/// One per-item failure collected during a catalog scan
///
/// A failing table never aborts the scan of its siblings; it becomes one of
/// these entries instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanError {
    /// Dataset the failure occurred in
    pub dataset: String,

    /// Table the failure occurred on, if the failure was table-level
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,

    /// What went wrong
    pub message: String,

    /// Whether the caller may retry this item
    pub retryable: bool,
}

/// Summary of one catalog scan (report.json v1)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanReport {
    /// Source that was scanned
    pub source_id: String,

    /// Datasets successfully scanned
    pub datasets_scanned: usize,

    /// Tables successfully upserted
    pub tables_scanned: usize,

    /// Columns successfully upserted
    pub columns_scanned: usize,

    /// Per-item failures (empty on a clean scan)
    pub errors: Vec<ScanError>,

    /// Scan start timestamp (ISO 8601)
    pub started_at: String,

    /// Scan end timestamp (ISO 8601)
    pub finished_at: String,
}

impl ScanReport {
    /// Create an empty report for a source, stamped with the current time
    pub fn new(source_id: impl Into<String>) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            source_id: source_id.into(),
            datasets_scanned: 0,
            tables_scanned: 0,
            columns_scanned: 0,
            errors: Vec::new(),
            started_at: now.clone(),
            finished_at: now,
        }
    }

    /// Record a dataset-level failure
    pub fn record_dataset_error(
        &mut self,
        dataset: impl Into<String>,
        message: impl Into<String>,
        retryable: bool,
    ) {
        self.errors.push(ScanError {
            dataset: dataset.into(),
            table: None,
            message: message.into(),
            retryable,
        });
    }

    /// Record a table-level failure
    pub fn record_table_error(
        &mut self,
        dataset: impl Into<String>,
        table: impl Into<String>,
        message: impl Into<String>,
        retryable: bool,
    ) {
        self.errors.push(ScanError {
            dataset: dataset.into(),
            table: Some(table.into()),
            message: message.into(),
            retryable,
        });
    }

    /// Stamp the end of the scan
    pub fn finish(&mut self) {
        self.finished_at = chrono::Utc::now().to_rfc3339();
    }

    /// Whether the scan completed without any per-item failure
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    /// Per-item failures as diagnostics, for rendering next to other results
    ///
    /// Dataset-level failures map to `SCAN_DATASET_FAILED`, table-level ones
    /// to `SCAN_TABLE_FAILED`, with the failed item as the subject.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.errors
            .iter()
            .map(|error| {
                let (code, subject) = match &error.table {
                    Some(table) => (
                        DiagnosticCode::ScanTableFailed,
                        format!("{}.{}", error.dataset, table),
                    ),
                    None => (DiagnosticCode::ScanDatasetFailed, error.dataset.clone()),
                };
                let message = if error.retryable {
                    format!("{} (retryable)", error.message)
                } else {
                    error.message.clone()
                };
                Diagnostic::new(code, Severity::Error, message).with_subject(subject)
            })
            .collect()
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Save to file
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let json = self
            .to_json()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        std::fs::write(path, json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_report_is_clean() {
        let report = ScanReport::new("crm");
        assert!(report.is_clean());
        assert_eq!(report.datasets_scanned, 0);
    }

    #[test]
    fn report_collects_item_errors() {
        let mut report = ScanReport::new("crm");
        report.datasets_scanned = 2;
        report.record_dataset_error("billing", "listing timed out", true);
        report.record_table_error("sales", "orders", "permission denied", false);

        assert!(!report.is_clean());
        assert_eq!(report.errors.len(), 2);
        assert_eq!(report.errors[0].table, None);
        assert_eq!(report.errors[1].table.as_deref(), Some("orders"));
        assert!(report.errors[0].retryable);
        assert!(!report.errors[1].retryable);
    }

    #[test]
    fn item_errors_become_scan_diagnostics() {
        let mut report = ScanReport::new("crm");
        report.record_dataset_error("billing", "listing timed out", true);
        report.record_table_error("sales", "orders", "permission denied", false);

        let diagnostics = report.diagnostics();
        assert_eq!(diagnostics.len(), 2);
        assert_eq!(diagnostics[0].code, DiagnosticCode::ScanDatasetFailed);
        assert_eq!(diagnostics[0].subject.as_deref(), Some("billing"));
        assert_eq!(diagnostics[0].message, "listing timed out (retryable)");
        assert_eq!(diagnostics[1].code, DiagnosticCode::ScanTableFailed);
        assert_eq!(diagnostics[1].subject.as_deref(), Some("sales.orders"));
    }

    #[test]
    fn report_serialization() {
        let report = ScanReport::new("crm");
        let json = report.to_json().unwrap();
        assert!(json.contains("\"source_id\""));
        assert!(json.contains("\"errors\""));
    }
}
