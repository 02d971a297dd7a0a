use noteq_domain::UsageReport;

use crate::tool::ToolCallRequest;

#[derive(Clone, Debug)]
pub enum Message {
	System(String),
	User(String),
	Assistant { content: Option<String>, tool_calls: Vec<ToolCallRequest> },
	Tool { tool_call_id: String, name: String, content: String },
}

/// One round trip's worth of model output: either a final answer, a set of
/// tool calls to fold back into the conversation, or both (a model may emit
/// prose alongside a tool call).
#[derive(Clone, Debug, Default)]
pub struct BackendTurn {
	pub content: Option<String>,
	pub tool_calls: Vec<ToolCallRequest>,
	pub usage: UsageReport,
}
