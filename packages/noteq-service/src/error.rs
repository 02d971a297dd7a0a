pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Unifies the per-crate client errors into the stable outward taxonomy the
/// query service reasons about at its state-machine edges.
#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("embedding request failed: {0}")]
	Embedding(String),
	#[error(transparent)]
	VectorStore(#[from] noteq_domain::VectorStoreError),
	#[error("llm request failed ({kind:?}): {message}")]
	Llm { kind: noteq_providers::LlmErrorKind, message: String },
	#[error("synthesis agent produced no usable output: {0}")]
	AgentOutput(String),
	#[error("request deadline elapsed")]
	Cancelled,
	#[error("{0}")]
	Other(String),
}

impl Error {
	/// The outward error-kind label for a 503 body (§6/§8 scenario 6): the
	/// specific `LlmErrorKind` for LLM failures, or a generic stage label
	/// otherwise.
	pub fn outward_kind(&self, stage: &'static str) -> String {
		match self {
			Self::Llm { kind, .. } => kind.as_str().to_string(),
			_ => stage.to_string(),
		}
	}
}

impl From<noteq_providers::Error> for Error {
	fn from(err: noteq_providers::Error) -> Self {
		match err {
			noteq_providers::Error::Embedding(message) => Self::Embedding(message),
			noteq_providers::Error::EmbeddingTimeout => Self::Embedding("timed out".to_string()),
			noteq_providers::Error::EmbeddingDimensionMismatch { expected, got } =>
				Self::Embedding(format!("expected dimension {expected}, got {got}")),
			noteq_providers::Error::Llm { kind, message } => Self::Llm { kind, message },
			noteq_providers::Error::StructuredOutput(message) => Self::AgentOutput(message),
			noteq_providers::Error::ToolBudgetExhausted =>
				Self::AgentOutput("tool-call budget exhausted with no structured output".to_string()),
			// MCP failures never reach this boundary: noteq-service absorbs them locally (see assemble).
			noteq_providers::Error::Mcp(message) => Self::Other(message),
			noteq_providers::Error::McpTimeout => Self::Other("mcp request timed out".to_string()),
		}
	}
}

impl From<noteq_storage::Error> for Error {
	fn from(err: noteq_storage::Error) -> Self {
		Self::VectorStore(noteq_domain::VectorStoreError::Request(err.to_string()))
	}
}
