use std::time::Duration;

use noteq_domain::UsageReport;
use reqwest::Client;
use serde_json::{Value, json};

use super::messages::{BackendTurn, Message};
use crate::{
	error::{Error, classify_status},
	tool::{ToolCallRequest, ToolDefinition},
};

/// The "responses" path: natively binds tools via `input` items rather than
/// OpenAI's legacy `messages` + `tool_calls` shape. Selected when the model
/// name matches `Settings::responses_api_pattern`.
pub async fn turn(
	http: &Client,
	base_url: &str,
	model: &str,
	api_token: &str,
	timeout: Duration,
	messages: &[Message],
	tools: &[ToolDefinition],
) -> Result<BackendTurn, Error> {
	let url = format!("{}/v1/responses", base_url.trim_end_matches('/'));
	let body = json!({
		"model": model,
		"input": messages.iter().map(to_wire_item).collect::<Vec<_>>(),
		"tools": tools.iter().map(to_wire_tool).collect::<Vec<_>>(),
	});

	let response = tokio::time::timeout(timeout, http.post(&url).bearer_auth(api_token).json(&body).send())
		.await
		.map_err(|_| Error::Llm { kind: crate::error::LlmErrorKind::Timeout, message: "responses call timed out".to_string() })?
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

fn to_wire_item(message: &Message) -> Value {
	match message {
		Message::System(content) => json!({ "role": "system", "content": content }),
		Message::User(content) => json!({ "role": "user", "content": content }),
		Message::Assistant { content, tool_calls } if tool_calls.is_empty() =>
			json!({ "role": "assistant", "content": content }),
		Message::Assistant { tool_calls, .. } => json!({
			"type": "function_call",
			"calls": tool_calls.iter().map(|call| json!({
				"call_id": call.id,
				"name": call.name,
				"arguments": call.arguments.to_string(),
			})).collect::<Vec<_>>(),
		}),
		Message::Tool { tool_call_id, content, .. } =>
			json!({ "type": "function_call_output", "call_id": tool_call_id, "output": content }),
	}
}

fn to_wire_tool(tool: &ToolDefinition) -> Value {
	json!({
		"type": "function",
		"name": tool.name,
		"description": tool.description,
		"parameters": tool.parameters_schema,
	})
}

fn parse_turn(payload: &Value) -> Result<BackendTurn, Error> {
	let output = payload["output"].as_array().cloned().unwrap_or_default();
	let mut content = None;
	let mut tool_calls = Vec::new();

	for item in &output {
		match item["type"].as_str() {
			Some("message") => {
				if let Some(text) = item["content"][0]["text"].as_str() {
					content = Some(text.to_string());
				}
			},
			Some("function_call") => {
				if let Some(call) = parse_tool_call(item) {
					tool_calls.push(call);
				}
			},
			_ => {},
		}
	}

	let usage = parse_usage(&payload["usage"]);

	Ok(BackendTurn { content, tool_calls, usage })
}

fn parse_tool_call(raw: &Value) -> Option<ToolCallRequest> {
	let id = raw["call_id"].as_str()?.to_string();
	let name = raw["name"].as_str()?.to_string();
	let arguments_raw = raw["arguments"].as_str().unwrap_or("{}");
	let arguments = serde_json::from_str(arguments_raw).unwrap_or(Value::Null);

	Some(ToolCallRequest { id, name, arguments })
}

/// The Responses API reports usage as `input_tokens`/`output_tokens`, unlike
/// chat-completions' `prompt_tokens`/`completion_tokens`.
fn parse_usage(raw: &Value) -> UsageReport {
	UsageReport {
		input_tokens: raw["input_tokens"].as_u64(),
		output_tokens: raw["output_tokens"].as_u64(),
		total_tokens: raw["total_tokens"].as_u64(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_responses_shaped_usage_field_names() {
		let payload = json!({
			"output": [],
			"usage": { "input_tokens": 12, "output_tokens": 34, "total_tokens": 46 },
		});

		let turn = parse_turn(&payload).unwrap();

		assert_eq!(turn.usage.input_tokens, Some(12));
		assert_eq!(turn.usage.output_tokens, Some(34));
		assert_eq!(turn.usage.total_tokens, Some(46));
	}
}
