use std::fmt::Write as FmtWrite;

use serde::Serialize;

use crate::models::{Answer, DocumentRecord, IngestOutcome, OutputFormat};

pub trait Formatter {
    fn format_answer(&self, answer: &Answer) -> String;
    fn format_ingest(&self, outcome: &IngestOutcome) -> String;
    fn format_status(&self, status: &StatusInfo) -> String;
    fn format_documents(&self, documents: &[DocumentRecord]) -> String;
    fn format_message(&self, message: &str) -> String;
    fn format_error(&self, error: &str) -> String;
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusInfo {
    pub config_path: Option<String>,
    pub upload_dir: String,
    pub upload_files: usize,
    pub vector_store_driver: String,
    pub vector_store_location: String,
    pub vector_store_connected: bool,
    pub documents: u64,
    pub chunks: u64,
    pub embedding_provider: String,
    pub embedding_model: String,
    pub completion_model: String,
    pub completion_key_set: bool,
}

pub struct TextFormatter;

impl Formatter for TextFormatter {
    fn format_answer(&self, answer: &Answer) -> String {
        let mut output = String::new();
        writeln!(output, "{}", answer.answer).unwrap();

        if !answer.sources.is_empty() {
            writeln!(output).unwrap();
            writeln!(output, "Sources:").unwrap();
            for (i, source) in answer.sources.iter().enumerate() {
                match source.page {
                    Some(page) => writeln!(
                        output,
                        "  {}. {} (page {}) [Score: {:.3}]",
                        i + 1,
                        source.filename,
                        page,
                        source.score
                    )
                    .unwrap(),
                    None => writeln!(
                        output,
                        "  {}. {} [Score: {:.3}]",
                        i + 1,
                        source.filename,
                        source.score
                    )
                    .unwrap(),
                }
            }
        }

        output
    }

    fn format_ingest(&self, outcome: &IngestOutcome) -> String {
        let mut output = String::new();
        writeln!(output, "{}", outcome.summary()).unwrap();

        let report = outcome.report();
        for filename in &report.ingested {
            writeln!(output, "  + {}", filename).unwrap();
        }
        for filename in &report.skipped {
            writeln!(output, "  = {} (already ingested)", filename).unwrap();
        }
        for failure in &report.failures {
            writeln!(output, "  ! {}: {}", failure.filename, failure.error).unwrap();
        }

        output
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        let mut output = String::new();
        writeln!(output, "Status").unwrap();
        writeln!(output, "------").unwrap();

        writeln!(
            output,
            "Config:        {}",
            status.config_path.as_deref().unwrap_or("(defaults)")
        )
        .unwrap();
        writeln!(output, "Uploads:       {}", status.upload_dir).unwrap();
        writeln!(output, "  Files:       {}", status.upload_files).unwrap();
        writeln!(output).unwrap();

        let vector_status = if status.vector_store_connected {
            "[CONNECTED]"
        } else {
            "[DISCONNECTED]"
        };
        writeln!(
            output,
            "Vector Store:  {} ({})",
            status.vector_store_driver, vector_status
        )
        .unwrap();
        writeln!(output, "  Location:    {}", status.vector_store_location).unwrap();
        if status.vector_store_connected {
            writeln!(output, "  Documents:   {}", status.documents).unwrap();
            writeln!(output, "  Chunks:      {}", status.chunks).unwrap();
        }
        writeln!(output).unwrap();

        writeln!(
            output,
            "Embedding:     {} ({})",
            status.embedding_model, status.embedding_provider
        )
        .unwrap();
        let key_status = if status.completion_key_set {
            "[KEY SET]"
        } else {
            "[KEY MISSING]"
        };
        writeln!(
            output,
            "Completion:    {} {}",
            status.completion_model, key_status
        )
        .unwrap();

        output
    }

    fn format_documents(&self, documents: &[DocumentRecord]) -> String {
        if documents.is_empty() {
            return "No documents ingested.\n".to_string();
        }

        let mut output = String::new();
        writeln!(output, "{} document(s)\n", documents.len()).unwrap();
        for doc in documents {
            writeln!(
                output,
                "  {:<40} {:>6} chunks  {}",
                doc.filename, doc.chunk_count, doc.created_at
            )
            .unwrap();
        }
        output
    }

    fn format_message(&self, message: &str) -> String {
        format!("{}\n", message)
    }

    fn format_error(&self, error: &str) -> String {
        format!("Error: {}\n", error)
    }
}

pub struct JsonFormatter {
    pretty: bool,
}

impl JsonFormatter {
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    fn to_json<T: Serialize + ?Sized>(&self, value: &T) -> String {
        let result = if self.pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        };
        result.unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}", e))
    }
}

impl Formatter for JsonFormatter {
    fn format_answer(&self, answer: &Answer) -> String {
        self.to_json(answer)
    }

    fn format_ingest(&self, outcome: &IngestOutcome) -> String {
        self.to_json(outcome)
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        self.to_json(status)
    }

    fn format_documents(&self, documents: &[DocumentRecord]) -> String {
        self.to_json(&serde_json::json!({ "documents": documents }))
    }

    fn format_message(&self, message: &str) -> String {
        self.to_json(&serde_json::json!({ "message": message }))
    }

    fn format_error(&self, error: &str) -> String {
        self.to_json(&serde_json::json!({ "error": error }))
    }
}

pub fn get_formatter(format: OutputFormat) -> Box<dyn Formatter> {
    match format {
        OutputFormat::Text => Box::new(TextFormatter),
        OutputFormat::Json => Box::new(JsonFormatter::new(true)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AnswerKind, IngestReport, SourceRef};

    #[test]
    fn test_text_answer_lists_sources() {
        let answer = Answer {
            answer: "Blue.".to_string(),
            kind: AnswerKind::Generated,
            sources: vec![SourceRef {
                filename: "sky.pdf".to_string(),
                page: Some(2),
                score: 0.9,
            }],
        };
        let output = TextFormatter.format_answer(&answer);
        assert!(output.starts_with("Blue.\n"));
        assert!(output.contains("1. sky.pdf (page 2) [Score: 0.900]"));
    }

    #[test]
    fn test_json_ingest_is_parseable() {
        let outcome = IngestOutcome::Ingested {
            report: IngestReport {
                ingested: vec!["a.txt".to_string()],
                chunks: 2,
                documents: 1,
                ..Default::default()
            },
        };
        let output = JsonFormatter::new(false).format_ingest(&outcome);
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["status"], "ingested");
        assert_eq!(value["report"]["chunks"], 2);
    }

    #[test]
    fn test_text_documents_empty() {
        assert_eq!(TextFormatter.format_documents(&[]), "No documents ingested.\n");
    }
}
