//! Diagnostic codes and result annotations
//!
//! IMPORTANT: Diagnostic codes are versioned and stable.
//! NEVER rename or remove codes - they are part of the public API.
//! Add new codes with new names only.
//!
//! Every derived result (scan report, graph, score) carries diagnostics so
//! downstream consumers can distinguish "fully computed" from "computed with
//! gaps" and render caveats accordingly.

use serde::{Deserialize, Serialize};

/// Diagnostic code registry (v1)
///
/// These codes are STABLE and VERSIONED.
/// Do NOT rename or remove codes - only add new ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiagnosticCode {
    // Catalog scan (1xxx)
    /// A dataset could not be listed or scanned; remaining datasets continued
    ScanDatasetFailed,

    /// A table's schema could not be fetched; remaining tables continued
    ScanTableFailed,

    // Semantic layer (2xxx)
    /// A mapping references a table absent from the catalog
    MappingUnresolvedTable,

    /// A mapping references a column absent from the catalog
    MappingUnresolvedColumn,

    /// Value-overlap sampling failed; edge kept at name-match confidence
    InferenceSampleFailed,

    // Graph builder (3xxx)
    /// A node or edge was skipped because its catalog backing is missing
    GraphNodeSkipped,

    /// The graph exceeded the node cap and was truncated
    GraphTruncated,

    // Data quality (4xxx)
    /// Subscription minus credits was negative before clamping
    DataQualityNegativeMrr,

    /// An account id present in one row set could not be joined to the other
    DataQualityUnjoinableAccount,

    /// A scoring factor had no input and contributed zero
    ScoreFactorMissing,
}

impl DiagnosticCode {
    /// Get the diagnostic code as a stable string identifier
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ScanDatasetFailed => "SCAN_DATASET_FAILED",
            Self::ScanTableFailed => "SCAN_TABLE_FAILED",
            Self::MappingUnresolvedTable => "MAPPING_UNRESOLVED_TABLE",
            Self::MappingUnresolvedColumn => "MAPPING_UNRESOLVED_COLUMN",
            Self::InferenceSampleFailed => "INFERENCE_SAMPLE_FAILED",
            Self::GraphNodeSkipped => "GRAPH_NODE_SKIPPED",
            Self::GraphTruncated => "GRAPH_TRUNCATED",
            Self::DataQualityNegativeMrr => "DATA_QUALITY_NEGATIVE_MRR",
            Self::DataQualityUnjoinableAccount => "DATA_QUALITY_UNJOINABLE_ACCOUNT",
            Self::ScoreFactorMissing => "SCORE_FACTOR_MISSING",
        }
    }
}

impl std::fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Diagnostic severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational message
    Info,

    /// Warning - should be reviewed but not blocking
    Warn,

    /// Error - the item it refers to was skipped or degraded
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// A diagnostic message with structured metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Stable diagnostic code
    pub code: DiagnosticCode,

    /// Severity level
    pub severity: Severity,

    /// Human-readable message
    pub message: String,

    /// The entity this diagnostic refers to (fqn, account id, ...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
}

impl Diagnostic {
    /// Create a new diagnostic with minimal fields
    pub fn new(code: DiagnosticCode, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            code,
            severity,
            message: message.into(),
            subject: None,
        }
    }

    /// Set the subject
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }
}
