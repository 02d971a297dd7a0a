use std::time::Duration;

use noteq_domain::UsageReport;
use reqwest::Client;
use serde_json::{Value, json};

use super::messages::{BackendTurn, Message};
use crate::{
	error::{Error, classify_status},
	tool::{ToolCallRequest, ToolDefinition},
};

/// Standard `/v1/chat/completions` path. One round trip: serializes the
/// running transcript plus tool definitions, and returns whatever the model
/// produced (final content, tool calls, or both).
pub async fn turn(
	http: &Client,
	base_url: &str,
	model: &str,
	api_token: &str,
	timeout: Duration,
	messages: &[Message],
	tools: &[ToolDefinition],
) -> Result<BackendTurn, Error> {
	let url = format!("{}/v1/chat/completions", base_url.trim_end_matches('/'));
	let body = json!({
		"model": model,
		"messages": messages.iter().map(to_wire_message).collect::<Vec<_>>(),
		"tools": tools.iter().map(to_wire_tool).collect::<Vec<_>>(),
	});

	let response = tokio::time::timeout(timeout, http.post(&url).bearer_auth(api_token).json(&body).send())
		.await
		.map_err(|_| Error::Llm { kind: crate::error::LlmErrorKind::Timeout, message: "chat completion timed out".to_string() })?
		.map_err(|err| Error::Llm { kind: crate::error::LlmErrorKind::Connection, message: err.to_string() })?;

	if !response.status().is_success() {
		let kind = classify_status(response.status());
		let text = response.text().await.unwrap_or_default();
		return Err(Error::Llm { kind, message: text });
	}

	let payload: Value =
		response.json().await.map_err(|err| Error::Llm { kind: crate::error::LlmErrorKind::Other, message: err.to_string() })?;

	parse_turn(&payload)
}

fn to_wire_message(message: &Message) -> Value {
	match message {
		Message::System(content) => json!({ "role": "system", "content": content }),
		Message::User(content) => json!({ "role": "user", "content": content }),
		Message::Assistant { content, tool_calls } => json!({
			"role": "assistant",
			"content": content,
			"tool_calls": tool_calls.iter().map(|call| json!({
				"id": call.id,
				"type": "function",
				"function": { "name": call.name, "arguments": call.arguments.to_string() },
			})).collect::<Vec<_>>(),
		}),
		Message::Tool { tool_call_id, name, content } => json!({
			"role": "tool",
			"tool_call_id": tool_call_id,
			"name": name,
			"content": content,
		}),
	}
}

fn to_wire_tool(tool: &ToolDefinition) -> Value {
	json!({
		"type": "function",
		"function": {
			"name": tool.name,
			"description": tool.description,
			"parameters": tool.parameters_schema,
		},
	})
}

fn parse_turn(payload: &Value) -> Result<BackendTurn, Error> {
	let message = &payload["choices"][0]["message"];
	let content = message["content"].as_str().map(str::to_string);
	let tool_calls = message["tool_calls"]
		.as_array()
		.cloned()
		.unwrap_or_default()
		.iter()
		.filter_map(parse_tool_call)
		.collect();
	let usage = parse_usage(&payload["usage"]);

	Ok(BackendTurn { content, tool_calls, usage })
}

fn parse_tool_call(raw: &Value) -> Option<ToolCallRequest> {
	let id = raw["id"].as_str()?.to_string();
	let name = raw["function"]["name"].as_str()?.to_string();
	let arguments_raw = raw["function"]["arguments"].as_str().unwrap_or("{}");
	let arguments = serde_json::from_str(arguments_raw).unwrap_or(Value::Null);

	Some(ToolCallRequest { id, name, arguments })
}

fn parse_usage(raw: &Value) -> UsageReport {
	UsageReport {
		input_tokens: raw["prompt_tokens"].as_u64(),
		output_tokens: raw["completion_tokens"].as_u64(),
		total_tokens: raw["total_tokens"].as_u64(),
	}
}
