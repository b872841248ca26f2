use serde::{Deserialize, Serialize};

/// Free-form chunk metadata. Always carries `source`; may carry
/// `conversation_id` and `file_type`.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Metadata key naming the document a chunk came from.
pub const SOURCE_KEY: &str = "source";
/// Metadata key naming the conversation a chunk was uploaded into.
pub const CONVERSATION_KEY: &str = "conversation_id";

/// Maximum characters of chunk text exposed in an answer's source list.
pub const EXCERPT_CHARS: usize = 200;

// =============================================================================
// Chunks
// =============================================================================

/// A bounded span of source text, the unit of storage and retrieval.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Chunk {
    pub fn new(text: impl Into<String>, source: &str) -> Self {
        let mut metadata = Metadata::new();
        metadata.insert(SOURCE_KEY.to_string(), source.into());
        Self {
            text: text.into(),
            metadata,
        }
    }

    pub fn source(&self) -> Option<&str> {
        self.metadata.get(SOURCE_KEY).and_then(|v| v.as_str())
    }

    pub fn conversation_id(&self) -> Option<&str> {
        self.metadata.get(CONVERSATION_KEY).and_then(|v| v.as_str())
    }

    /// Tag the chunk with a conversation scope.
    pub fn with_conversation(mut self, conversation_id: &str) -> Self {
        self.metadata
            .insert(CONVERSATION_KEY.to_string(), conversation_id.into());
        self
    }
}

/// A chunk returned by a retrieval query. Only lives for one request.
pub type RetrievedChunk = Chunk;

// =============================================================================
// Answers
// =============================================================================

/// Whether an answer was grounded in retrieved chunks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerMode {
    Rag,
    General,
}

impl std::fmt::Display for AnswerMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnswerMode::Rag => write!(f, "rag"),
            AnswerMode::General => write!(f, "general"),
        }
    }
}

/// A retrieved chunk as shown to the caller: truncated text plus metadata.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SourceRef {
    pub excerpt: String,
    pub metadata: Metadata,
}

impl SourceRef {
    pub fn from_chunk(chunk: &Chunk) -> Self {
        Self {
            excerpt: excerpt(&chunk.text, EXCERPT_CHARS),
            metadata: chunk.metadata.clone(),
        }
    }
}

/// The single return contract of the question-answering path.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnswerResult {
    pub answer: String,
    pub sources: Vec<SourceRef>,
    pub mode: AnswerMode,
}

impl AnswerResult {
    /// A general-mode answer with no sources.
    pub fn general(answer: impl Into<String>) -> Self {
        Self {
            answer: answer.into(),
            sources: Vec::new(),
            mode: AnswerMode::General,
        }
    }

    /// Build a result from whatever retrieval returned.
    pub fn from_retrieval(answer: impl Into<String>, chunks: &[Chunk]) -> Self {
        let mode = if chunks.is_empty() {
            AnswerMode::General
        } else {
            AnswerMode::Rag
        };
        Self {
            answer: answer.into(),
            sources: chunks.iter().map(SourceRef::from_chunk).collect(),
            mode,
        }
    }
}

/// Truncate `text` to `max_chars` characters, appending "..." when cut.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

// =============================================================================
// Conversation history
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Human,
    Assistant,
}

/// One side of a question/answer exchange.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub text: String,
}

impl ConversationTurn {
    pub fn human(text: impl Into<String>) -> Self {
        Self {
            role: Role::Human,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
        }
    }
}

// =============================================================================
// Collection status
// =============================================================================

/// Status of the backing vector collection. Never an error: failures are
/// reported in the `Unavailable` shape.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CollectionInfo {
    Ready {
        name: String,
        vectors_count: u64,
        points_count: u64,
    },
    Unavailable {
        error: String,
    },
}

impl CollectionInfo {
    pub fn is_ready(&self) -> bool {
        matches!(self, CollectionInfo::Ready { .. })
    }
}

/// A stored document and the number of chunks it produced.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSummary {
    pub name: String,
    pub chunks: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_excerpt_short_text_unchanged() {
        assert_eq!(excerpt("hello", 200), "hello");
    }

    #[test]
    fn test_excerpt_exact_length_unchanged() {
        let text = "a".repeat(200);
        assert_eq!(excerpt(&text, 200), text);
    }

    #[test]
    fn test_excerpt_truncates_with_marker() {
        let text = "b".repeat(250);
        let out = excerpt(&text, 200);
        assert_eq!(out.len(), 203);
        assert!(out.ends_with("..."));
    }

    #[test]
    fn test_excerpt_respects_char_boundaries() {
        let text = "é".repeat(210);
        let out = excerpt(&text, 200);
        assert_eq!(out.chars().count(), 203);
    }

    #[test]
    fn test_chunk_tags() {
        let chunk = Chunk::new("body", "handbook.pdf").with_conversation("c1");
        assert_eq!(chunk.source(), Some("handbook.pdf"));
        assert_eq!(chunk.conversation_id(), Some("c1"));
    }

    #[test]
    fn test_answer_mode_follows_retrieval() {
        let empty = AnswerResult::from_retrieval("x", &[]);
        assert_eq!(empty.mode, AnswerMode::General);
        assert!(empty.sources.is_empty());

        let chunks = vec![Chunk::new("support hours are 9-5", "faq.txt")];
        let rag = AnswerResult::from_retrieval("x", &chunks);
        assert_eq!(rag.mode, AnswerMode::Rag);
        assert_eq!(rag.sources.len(), 1);
        assert_eq!(rag.sources[0].metadata["source"], "faq.txt");
    }

    #[test]
    fn test_answer_mode_serializes_lowercase() {
        let json = serde_json::to_value(AnswerResult::general("hi")).unwrap();
        assert_eq!(json["mode"], "general");
        assert_eq!(json["sources"], serde_json::json!([]));
    }

    #[test]
    fn test_collection_info_shapes() {
        let ready = CollectionInfo::Ready {
            name: "company_docs".into(),
            vectors_count: 3,
            points_count: 3,
        };
        let json = serde_json::to_value(&ready).unwrap();
        assert_eq!(json["name"], "company_docs");
        assert!(ready.is_ready());

        let down = CollectionInfo::Unavailable {
            error: "connection refused".into(),
        };
        let json = serde_json::to_value(&down).unwrap();
        assert_eq!(json, serde_json::json!({"error": "connection refused"}));
    }
}
