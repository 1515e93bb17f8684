//! Ingestion progress and outcome models.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stage of an ingestion run. Runs move strictly forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestStage {
    Idle,
    Scanning,
    Loading,
    Splitting,
    Embedding,
    Persisting,
}

impl fmt::Display for IngestStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IngestStage::Idle => "idle",
            IngestStage::Scanning => "scanning",
            IngestStage::Loading => "loading",
            IngestStage::Splitting => "splitting",
            IngestStage::Embedding => "embedding",
            IngestStage::Persisting => "persisting",
        };
        f.write_str(name)
    }
}

/// A file that could not be loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileFailure {
    pub filename: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IngestReport {
    /// Files whose chunks were written
    pub ingested: Vec<String>,
    /// Files already in the registry
    pub skipped: Vec<String>,
    pub failures: Vec<FileFailure>,
    pub documents: usize,
    pub chunks: usize,
}

impl IngestReport {
    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IngestOutcome {
    /// The run stopped early because a stage produced nothing.
    NothingToIngest {
        stage: IngestStage,
        reason: String,
        report: IngestReport,
    },
    Ingested { report: IngestReport },
}

impl IngestOutcome {
    pub fn report(&self) -> &IngestReport {
        match self {
            IngestOutcome::NothingToIngest { report, .. } | IngestOutcome::Ingested { report } => {
                report
            }
        }
    }

    pub fn summary(&self) -> String {
        match self {
            IngestOutcome::NothingToIngest { reason, .. } => format!("Nothing to ingest: {}", reason),
            IngestOutcome::Ingested { report } => {
                let mut summary = format!(
                    "Ingested {} chunks from {} file(s)",
                    report.chunks,
                    report.ingested.len()
                );
                if report.is_partial() {
                    summary.push_str(&format!(", {} file(s) failed", report.failures.len()));
                }
                summary
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_serializes_with_status_tag() {
        let outcome = IngestOutcome::NothingToIngest {
            stage: IngestStage::Scanning,
            reason: "no files".to_string(),
            report: IngestReport::default(),
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "nothing_to_ingest");
        assert_eq!(json["stage"], "scanning");
    }

    #[test]
    fn test_summary_mentions_failures() {
        let outcome = IngestOutcome::Ingested {
            report: IngestReport {
                ingested: vec!["a.txt".to_string()],
                failures: vec![FileFailure {
                    filename: "b.txt".to_string(),
                    error: "bad utf-8".to_string(),
                }],
                documents: 1,
                chunks: 4,
                ..Default::default()
            },
        };
        assert_eq!(
            outcome.summary(),
            "Ingested 4 chunks from 1 file(s), 1 file(s) failed"
        );
    }
}
