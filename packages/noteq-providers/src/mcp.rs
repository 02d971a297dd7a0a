use std::time::Duration;

use reqwest::Client;
use serde_json::{Value, json};

use crate::{
	error::Error,
	tool::{BoxFuture, ToolDefinition, ToolHandler},
};

pub const DERIVE_XCALLBACK_URL_TOOL: &str = "derive_xcallback_url_from_noteplan_file";

/// Adapter for the single MCP tool this system binds: translating a note's
/// file path into a NotePlan `x-callback-url`. Failure is non-fatal to
/// callers (see `noteq-service::assemble`); this type only reports it.
#[derive(Clone)]
pub struct McpClient {
	http: Client,
	base_url: String,
	timeout: Duration,
}

impl McpClient {
	pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
		Self { http: Client::new(), base_url: base_url.into(), timeout }
	}

	pub async fn derive_xcallback_url(&self, file_path: &str) -> Result<String, Error> {
		let url = format!(
			"{}/tools/{DERIVE_XCALLBACK_URL_TOOL}",
			self.base_url.trim_end_matches('/')
		);
		let response = tokio::time::timeout(
			self.timeout,
			self.http.post(&url).json(&json!({ "file_path": file_path })).send(),
		)
		.await
		.map_err(|_| Error::McpTimeout)?
		.map_err(|err| Error::Mcp(err.to_string()))?;

		if !response.status().is_success() {
			let status = response.status();
			let text = response.text().await.unwrap_or_default();
			return Err(Error::Mcp(format!("mcp service returned {status}: {text}")));
		}

		let payload: Value = response.json().await.map_err(|err| Error::Mcp(err.to_string()))?;

		payload["url"]
			.as_str()
			.map(str::to_string)
			.ok_or_else(|| Error::Mcp("mcp response missing url field".to_string()))
	}
}

/// Binds `McpClient` as a tool the synthesis agent can call mid-generation.
pub struct DeriveXcallbackUrlTool {
	client: McpClient,
}

impl DeriveXcallbackUrlTool {
	pub fn new(client: McpClient) -> Self {
		Self { client }
	}
}

impl ToolHandler for DeriveXcallbackUrlTool {
	fn definition(&self) -> ToolDefinition {
		ToolDefinition {
			name: DERIVE_XCALLBACK_URL_TOOL.to_string(),
			description: "Derives the NotePlan x-callback-url for a note file path.".to_string(),
			parameters_schema: json!({
				"type": "object",
				"properties": { "file_path": { "type": "string" } },
				"required": ["file_path"],
				"additionalProperties": false,
			}),
		}
	}

	fn call<'a>(&'a self, input: Value) -> BoxFuture<'a, Result<Value, Error>> {
		Box::pin(async move {
			let file_path = input["file_path"]
				.as_str()
				.ok_or_else(|| Error::Mcp("tool call missing file_path argument".to_string()))?;
			let url = self.client.derive_xcallback_url(file_path).await?;

			Ok(json!({ "url": url }))
		})
	}
}
