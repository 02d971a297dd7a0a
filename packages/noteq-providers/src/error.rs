pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Stable outward classification of upstream LLM-proxy failures. The service
/// layer reasons only about this kind, never about the raw HTTP status.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LlmErrorKind {
	RateLimit,
	Auth,
	Timeout,
	Connection,
	Other,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("embedding request failed: {0}")]
	Embedding(String),
	#[error("embedding request timed out")]
	EmbeddingTimeout,
	#[error("embedding dimension mismatch: expected {expected}, got {got}")]
	EmbeddingDimensionMismatch { expected: u32, got: usize },
	#[error("llm request failed ({kind:?}): {message}")]
	Llm { kind: LlmErrorKind, message: String },
	#[error("structured output did not conform to the declared schema, even after one corrective retry: {0}")]
	StructuredOutput(String),
	#[error("tool-call budget exhausted with no structured output available")]
	ToolBudgetExhausted,
	#[error("mcp request failed: {0}")]
	Mcp(String),
	#[error("mcp request timed out")]
	McpTimeout,
}

impl Error {
	pub fn llm_kind(&self) -> Option<LlmErrorKind> {
		match self {
			Self::Llm { kind, .. } => Some(*kind),
			_ => None,
		}
	}
}

impl LlmErrorKind {
	/// The outward label used in the `error` field of a 503 body (§6/§8
	/// scenario 6), e.g. `rate_limit`.
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::RateLimit => "rate_limit",
			Self::Auth => "auth",
			Self::Timeout => "timeout",
			Self::Connection => "connection",
			Self::Other => "other",
		}
	}
}

pub(crate) fn classify_status(status: reqwest::StatusCode) -> LlmErrorKind {
	match status.as_u16() {
		429 => LlmErrorKind::RateLimit,
		401 | 403 => LlmErrorKind::Auth,
		408 => LlmErrorKind::Timeout,
		_ => LlmErrorKind::Other,
	}
}
