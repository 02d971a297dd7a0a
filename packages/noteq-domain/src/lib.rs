pub mod guardrail;
pub mod types;
pub mod vector_store;

pub use guardrail::{PrefilterReject, prefilter};
pub use types::{
	AgentAnswer, GuardrailIdentifier, JudgeScore, JudgeVerdict, NoteQueryResponse, NoteReference,
	RetrievalResult, ToolCallRecord, ToolTrace, UsageReport,
};
pub use vector_store::{VectorStore, VectorStoreError};
