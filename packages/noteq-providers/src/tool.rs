use std::{future::Future, pin::Pin};

use crate::error::Error;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

#[derive(Clone, Debug)]
pub struct ToolDefinition {
	pub name: String,
	pub description: String,
	pub parameters_schema: serde_json::Value,
}

/// A callable the synthesis agent may invoke during generation. The only
/// production implementation is the MCP adapter's
/// `derive_xcallback_url_from_noteplan_file` tool; tests substitute fakes.
pub trait ToolHandler: Send + Sync {
	fn definition(&self) -> ToolDefinition;

	fn call<'a>(&'a self, input: serde_json::Value) -> BoxFuture<'a, Result<serde_json::Value, Error>>;
}

#[derive(Clone, Debug)]
pub struct ToolCallRequest {
	pub id: String,
	pub name: String,
	pub arguments: serde_json::Value,
}
