pub mod embedding;
pub mod llm;
pub mod mcp;
pub mod tool;

mod error;

pub use embedding::EmbeddingClient;
pub use error::{Error, LlmErrorKind, Result};
pub use llm::{AgentOutcome, AgentRequest, ApiType, LlmClient, Message, ModelIdentity};
pub use mcp::{DeriveXcallbackUrlTool, McpClient};
pub use tool::{BoxFuture, ToolCallRequest, ToolDefinition, ToolHandler};
