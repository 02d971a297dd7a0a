use std::sync::Arc;

use noteq_config::Settings;
use noteq_domain::VectorStore;
use noteq_providers::{DeriveXcallbackUrlTool, EmbeddingClient, LlmClient, McpClient};
use noteq_storage::QdrantVectorStore;

use crate::error::Result;

/// Eagerly-constructed client managers, owned for the lifetime of the
/// process. No field is lazily initialised and nothing here is a global:
/// callers receive a `&Dependencies` explicitly down the call chain, which
/// makes substituting a test double a matter of constructing a different
/// value, never a matter of patching module state.
pub struct Dependencies {
	pub settings: Settings,
	pub embedding: EmbeddingClient,
	pub vector_store: Arc<dyn VectorStore>,
	pub llm: LlmClient,
	/// Raw MCP client, used directly by the assembler's best-effort
	/// `xcallback_url` enrichment (outside the agent's tool-call loop).
	pub mcp: McpClient,
	/// The same client bound as a tool the synthesis agent can call.
	pub mcp_tool: Arc<DeriveXcallbackUrlTool>,
}

impl Dependencies {
	/// Constructs every client manager and bootstraps the Qdrant collection
	/// (idempotent create-if-absent at the configured vector dimension) as a
	/// startup-time side effect. The HTTP server must not begin serving
	/// traffic if this fails.
	pub async fn build(settings: Settings) -> Result<Self> {
		let vector_dim = settings.embedding_dim().ok_or_else(|| {
			crate::error::Error::Other(format!(
				"no embedding dimension configured for model {:?}",
				settings.embedding_model
			))
		})?;
		let vector_store = QdrantVectorStore::connect(
			&settings.qdrant_url,
			&settings.collection_name,
			vector_dim,
			settings.vector_search_timeout,
		)
		.await
		.map_err(crate::error::Error::from)?;

		Self::with_vector_store(settings, Arc::new(vector_store))
	}

	/// Test-time entry point: substitutes the Qdrant-backed store for any
	/// other `VectorStore` implementation (typically `noteq-testkit`'s
	/// in-memory fake) without touching the rest of construction.
	pub fn with_vector_store(settings: Settings, vector_store: Arc<dyn VectorStore>) -> Result<Self> {
		let embedding = EmbeddingClient::new(settings.proxy_base_url.clone());
		let llm =
			LlmClient::new(settings.proxy_base_url.clone(), &settings.responses_api_pattern, settings.chat_timeout);
		let mcp = McpClient::new(settings.mcp_url.clone(), settings.mcp_timeout);
		let mcp_tool = Arc::new(DeriveXcallbackUrlTool::new(mcp.clone()));

		Ok(Self { settings, embedding, vector_store, llm, mcp, mcp_tool })
	}
}
