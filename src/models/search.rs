//! Retrieval and answer models.

use serde::{Deserialize, Serialize};

/// Output format for command results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// Machine-parseable JSON format
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("unknown output format: {}", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// Stage of answering a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryStage {
    Idle,
    EmbeddingQuery,
    Searching,
    AssemblingPrompt,
    Completing,
}

impl std::fmt::Display for QueryStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            QueryStage::Idle => "idle",
            QueryStage::EmbeddingQuery => "embedding_query",
            QueryStage::Searching => "searching",
            QueryStage::AssemblingPrompt => "assembling_prompt",
            QueryStage::Completing => "completing",
        };
        f.write_str(name)
    }
}

/// A chunk returned by similarity search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub chunk_id: String,
    pub content: String,
    pub filename: String,
    pub page: Option<u32>,
    /// Cosine distance to the query (0.0 = identical direction)
    pub distance: f32,
}

impl RetrievedChunk {
    /// Cosine similarity, `1 - distance`.
    pub fn score(&self) -> f32 {
        1.0 - self.distance
    }
}

/// How an answer was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerKind {
    /// Completion over retrieved context
    Generated,
    /// The store holds no documents
    NoDocuments,
    /// Nothing in the store matched the question
    NoRelevant,
}

/// Where part of an answer's context came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRef {
    pub filename: String,
    pub page: Option<u32>,
    pub score: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub answer: String,
    pub kind: AnswerKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<SourceRef>,
}

impl Answer {
    pub fn canned(answer: &str, kind: AnswerKind) -> Self {
        Self {
            answer: answer.to_string(),
            kind,
            sources: Vec::new(),
        }
    }

    pub fn generated(answer: String, chunks: &[RetrievedChunk]) -> Self {
        let sources = chunks
            .iter()
            .map(|c| SourceRef {
                filename: c.filename.clone(),
                page: c.page,
                score: c.score(),
            })
            .collect();
        Self {
            answer,
            kind: AnswerKind::Generated,
            sources,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_format_parse() {
        assert_eq!("text".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert!("yaml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_generated_answer_carries_sources() {
        let chunk = RetrievedChunk {
            chunk_id: "c1".to_string(),
            content: "The sky is blue.".to_string(),
            filename: "sky.txt".to_string(),
            page: None,
            distance: 0.25,
        };
        let answer = Answer::generated("Blue.".to_string(), &[chunk]);
        assert_eq!(answer.kind, AnswerKind::Generated);
        assert_eq!(answer.sources.len(), 1);
        assert!((answer.sources[0].score - 0.75).abs() < f32::EPSILON);
    }

    #[test]
    fn test_canned_answer_serializes_without_sources() {
        let answer = Answer::canned("nothing", AnswerKind::NoDocuments);
        let json = serde_json::to_value(&answer).unwrap();
        assert_eq!(json["kind"], "no_documents");
        assert!(json.get("sources").is_none());
    }
}
