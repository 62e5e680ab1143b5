//! Relationship inference engine
//!
//! Proposes join edges between catalog tables from two signals:
//!
//! 1. Naming: a key-like column in one table (suffix `_id`/`_key`/`id`)
//!    whose stem matches the other table's name or a column shared by both.
//! 2. Value overlap: a bounded `SELECT DISTINCT ... LIMIT n` sample of both
//!    candidate columns shares at least one value. Never a full scan.
//!
//! Name match alone yields `Low` confidence; name match plus sampled overlap
//! yields `High`. Proposals are advisory only - they never override an
//! explicit mapping or relation - and at most one edge is kept per unordered
//! table pair. Self-edges are never proposed.

use clientpulse_connector::{Connector, QueryResult};
use clientpulse_core::{Diagnostic, DiagnosticCode, InferenceConfig, Schema, Severity};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

/// Confidence level of an inferred edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    /// Name match only
    Low,

    /// Name match plus sampled value overlap
    High,
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::High => write!(f, "high"),
        }
    }
}

/// A proposed join edge between two tables
///
/// Always re-derivable; never persisted as authoritative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferredEdge {
    /// One side of the join
    pub left_table: String,

    /// Join column on the left table
    pub left_column: String,

    /// Other side of the join
    pub right_table: String,

    /// Join column on the right table
    pub right_column: String,

    /// Confidence level
    pub confidence: Confidence,

    /// Numeric score, taken from the inference config, always < 1.0
    pub score: f64,

    /// Human-readable evidence for the proposal
    pub basis: String,
}

/// One candidate column pair, before confidence is settled
#[derive(Debug, Clone)]
struct Candidate {
    left_table: String,
    left_column: String,
    right_table: String,
    right_column: String,
    basis: String,
}

/// Relationship inference engine
pub struct RelationshipInference {
    config: InferenceConfig,
    key_suffix: Regex,
}

impl RelationshipInference {
    /// Create an engine with the given configuration
    pub fn new(config: InferenceConfig) -> Self {
        Self {
            config,
            // Leftmost match strips "_id"/"_key" before a bare trailing "id"
            key_suffix: Regex::new(r"(?i)(?:_id|_key|id)$").expect("static regex"),
        }
    }

    /// Infer edges from naming alone (no warehouse access)
    pub fn infer_by_name(&self, tables: &[(String, Schema)]) -> Vec<InferredEdge> {
        self.candidate_pairs(tables)
            .into_values()
            .filter_map(|candidates| candidates.into_iter().next())
            .map(|c| self.edge(c, Confidence::Low))
            .collect()
    }

    /// Infer edges, upgrading confidence via bounded value sampling
    ///
    /// Sampling failures downgrade the affected pair to name-match confidence
    /// and emit an `INFERENCE_SAMPLE_FAILED` diagnostic; they never abort
    /// inference as a whole.
    pub async fn infer(
        &self,
        tables: &[(String, Schema)],
        connector: Option<&dyn Connector>,
    ) -> (Vec<InferredEdge>, Vec<Diagnostic>) {
        let mut edges = Vec::new();
        let mut diagnostics = Vec::new();

        for (_, candidates) in self.candidate_pairs(tables) {
            let mut chosen: Option<InferredEdge> = None;

            if let Some(connector) = connector.filter(|_| self.config.enable_sampling) {
                for candidate in &candidates {
                    match self.values_overlap(candidate, connector).await {
                        Ok(true) => {
                            chosen = Some(self.edge(candidate.clone(), Confidence::High));
                            break;
                        }
                        Ok(false) => {}
                        Err(message) => {
                            diagnostics.push(
                                Diagnostic::new(
                                    DiagnosticCode::InferenceSampleFailed,
                                    Severity::Warn,
                                    message,
                                )
                                .with_subject(format!(
                                    "{} <-> {}",
                                    candidate.left_table, candidate.right_table
                                )),
                            );
                        }
                    }
                }
            }

            // The most confident candidate wins; one edge per unordered pair
            let edge = chosen.unwrap_or_else(|| {
                self.edge(
                    candidates.into_iter().next().expect("non-empty candidates"),
                    Confidence::Low,
                )
            });
            debug!(
                left = %edge.left_table,
                right = %edge.right_table,
                confidence = %edge.confidence,
                "proposed join edge"
            );
            edges.push(edge);
        }

        (edges, diagnostics)
    }

    /// Candidates for every unordered table pair, keyed for determinism
    fn candidate_pairs(
        &self,
        tables: &[(String, Schema)],
    ) -> BTreeMap<(String, String), Vec<Candidate>> {
        let mut pairs: BTreeMap<(String, String), Vec<Candidate>> = BTreeMap::new();

        for i in 0..tables.len() {
            for j in (i + 1)..tables.len() {
                let (a_fqn, a_schema) = &tables[i];
                let (b_fqn, b_schema) = &tables[j];
                if a_fqn == b_fqn {
                    continue;
                }

                let mut candidates = self.candidates_between(a_fqn, a_schema, b_fqn, b_schema);
                candidates.extend(self.candidates_between(b_fqn, b_schema, a_fqn, a_schema));
                dedupe_candidates(&mut candidates);

                if !candidates.is_empty() {
                    let key = if a_fqn < b_fqn {
                        (a_fqn.clone(), b_fqn.clone())
                    } else {
                        (b_fqn.clone(), a_fqn.clone())
                    };
                    pairs.entry(key).or_default().extend(candidates);
                }
            }
        }
        pairs
    }

    /// Directed candidate search: key-like columns of `left` against `right`
    fn candidates_between(
        &self,
        left_fqn: &str,
        left: &Schema,
        right_fqn: &str,
        right: &Schema,
    ) -> Vec<Candidate> {
        let right_base = table_base_name(right_fqn);
        let mut found = Vec::new();

        for column in &left.columns {
            let lower = column.name.to_lowercase();
            let Some(suffix) = self.key_suffix.find(&lower) else {
                continue;
            };
            let stem = &lower[..suffix.start()];
            if stem.is_empty() {
                continue;
            }
            let stem = stem.trim_end_matches('_');

            // Shared key column present on both sides
            if let Some(shared) = right.find_column(&column.name) {
                found.push(Candidate {
                    left_table: left_fqn.to_string(),
                    left_column: column.name.clone(),
                    right_table: right_fqn.to_string(),
                    right_column: shared.name.clone(),
                    basis: format!("shared key column '{}'", column.name),
                });
                continue;
            }

            // Foreign-key naming: stem matches the other table's name
            if names_match(stem, &right_base) {
                let target = right
                    .find_column("id")
                    .or_else(|| right.find_column(&format!("{}_id", stem)));
                if let Some(target) = target {
                    found.push(Candidate {
                        left_table: left_fqn.to_string(),
                        left_column: column.name.clone(),
                        right_table: right_fqn.to_string(),
                        right_column: target.name.clone(),
                        basis: format!(
                            "column '{}' matches table '{}'",
                            column.name, right_base
                        ),
                    });
                }
            }
        }
        found
    }

    /// Sample both candidate columns and check for at least one shared value
    async fn values_overlap(
        &self,
        candidate: &Candidate,
        connector: &dyn Connector,
    ) -> Result<bool, String> {
        let left = self
            .sample_column(connector, &candidate.left_table, &candidate.left_column)
            .await?;
        if left.is_empty() {
            return Ok(false);
        }
        let right = self
            .sample_column(connector, &candidate.right_table, &candidate.right_column)
            .await?;
        Ok(left.iter().any(|v| right.contains(v)))
    }

    async fn sample_column(
        &self,
        connector: &dyn Connector,
        table_fqn: &str,
        column: &str,
    ) -> Result<HashSet<String>, String> {
        let sql = format!(
            "SELECT DISTINCT {} FROM {} LIMIT {}",
            column,
            sql_table_name(table_fqn),
            self.config.sample_limit
        );
        let result = connector
            .execute_query(&sql)
            .await
            .map_err(|e| format!("sampling {}.{} failed: {}", table_fqn, column, e))?;
        Ok(distinct_values(&result))
    }

    fn edge(&self, candidate: Candidate, confidence: Confidence) -> InferredEdge {
        let score = match confidence {
            Confidence::Low => self.config.low_confidence,
            Confidence::High => self.config.high_confidence,
        };
        InferredEdge {
            left_table: candidate.left_table,
            left_column: candidate.left_column,
            right_table: candidate.right_table,
            right_column: candidate.right_column,
            confidence,
            score,
            basis: candidate.basis,
        }
    }
}

/// Unqualified table name, lowercased
fn table_base_name(fqn: &str) -> String {
    fqn.rsplit('.').next().unwrap_or(fqn).to_lowercase()
}

/// Singular/plural tolerant name comparison
fn names_match(stem: &str, table: &str) -> bool {
    stem == table || format!("{}s", stem) == table || stem == table.trim_end_matches('s')
}

/// Strip the source prefix: SQL sees `dataset.table`, not `source.dataset.table`
fn sql_table_name(fqn: &str) -> &str {
    match fqn.find('.') {
        Some(idx) => &fqn[idx + 1..],
        None => fqn,
    }
}

/// Stringified distinct values of the first column of a sample result
fn distinct_values(result: &QueryResult) -> HashSet<String> {
    result
        .rows
        .iter()
        .filter_map(|row| row.first())
        .filter(|v| !v.is_null())
        .map(|v| match v {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect()
}

/// Drop duplicate candidates found from both directions of a pair
fn dedupe_candidates(candidates: &mut Vec<Candidate>) {
    let mut seen = HashSet::new();
    candidates.retain(|c| {
        let mut key = [
            format!("{}::{}", c.left_table, c.left_column.to_lowercase()),
            format!("{}::{}", c.right_table, c.right_column.to_lowercase()),
        ];
        key.sort();
        seen.insert(key.join("|"))
    });
}
