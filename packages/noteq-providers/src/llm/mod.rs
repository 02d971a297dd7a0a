mod chat;
mod messages;
mod responses;

pub use messages::Message;

use std::{collections::HashMap, sync::Arc, time::Duration};

use noteq_domain::{ToolCallRecord, ToolTrace, UsageReport};
use regex::Regex;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{
	error::{Error, LlmErrorKind},
	tool::{ToolCallRequest, ToolDefinition, ToolHandler},
};

/// Which wire protocol a model name routes to. A pure function of the
/// configured model name against `Settings::responses_api_pattern`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ApiType {
	ChatCompletions,
	ResponsesApi,
}

impl ApiType {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::ChatCompletions => "chat_completions",
			Self::ResponsesApi => "responses",
		}
	}
}

#[derive(Clone, Debug)]
pub struct ModelIdentity {
	pub model: String,
	pub api_type: ApiType,
}

pub struct AgentRequest {
	pub system: String,
	pub user_message: String,
	pub tools: Vec<Arc<dyn ToolHandler>>,
	pub schema_instructions: String,
	pub model: String,
	pub api_token: String,
	pub max_tool_calls: u32,
}

pub struct AgentOutcome<T> {
	pub value: T,
	pub usage: UsageReport,
	pub tool_trace: ToolTrace,
	pub model_identity: ModelIdentity,
}

#[derive(Clone)]
pub struct LlmClient {
	http: Client,
	base_url: String,
	responses_api_pattern: Regex,
	timeout: Duration,
}

impl LlmClient {
	pub fn new(base_url: impl Into<String>, responses_api_pattern: &str, timeout: Duration) -> Self {
		Self {
			http: Client::new(),
			base_url: base_url.into(),
			responses_api_pattern: Regex::new(responses_api_pattern)
				.expect("responses_api_pattern validated by noteq-config at startup"),
			timeout,
		}
	}

	pub fn api_type_for(&self, model: &str) -> ApiType {
		if self.responses_api_pattern.is_match(model) {
			ApiType::ResponsesApi
		} else {
			ApiType::ChatCompletions
		}
	}

	/// Runs the bounded tool-call loop and returns structured output
	/// conforming to `T`. One corrective retry is attempted if the model's
	/// final content fails to parse as JSON matching `T`; a second failure
	/// raises `Error::StructuredOutput`. Exceeding `max_tool_calls` while the
	/// model keeps requesting tools terminates the loop and parses whatever
	/// content is available, else raises `Error::ToolBudgetExhausted`.
	pub async fn run_agent<T: DeserializeOwned>(
		&self,
		request: AgentRequest,
	) -> Result<AgentOutcome<T>, Error> {
		let api_type = self.api_type_for(&request.model);
		let tool_defs: Vec<ToolDefinition> =
			request.tools.iter().map(|handler| handler.definition()).collect();
		let handlers: HashMap<String, Arc<dyn ToolHandler>> =
			request.tools.iter().map(|handler| (handler.definition().name, handler.clone())).collect();

		let mut messages = vec![
			Message::System(format!("{}\n\n{}", request.system, request.schema_instructions)),
			Message::User(request.user_message),
		];
		let mut usage = UsageReport::default();
		let mut tool_trace = ToolTrace::default();
		let mut tool_calls_made: u32 = 0;
		let mut budget_exceeded = false;
		let mut last_content: Option<String> = None;

		loop {
			let turn = self.dispatch(api_type, &request.model, &request.api_token, &messages, &tool_defs).await?;
			usage.accumulate(&turn.usage);

			if turn.tool_calls.is_empty() {
				last_content = turn.content;
				break;
			}

			if tool_calls_made >= request.max_tool_calls {
				budget_exceeded = true;
				last_content = turn.content;
				break;
			}

			messages.push(Message::Assistant { content: turn.content, tool_calls: turn.tool_calls.clone() });

			for call in &turn.tool_calls {
				if tool_calls_made >= request.max_tool_calls {
					budget_exceeded = true;
					break;
				}

				let (record, tool_message) = self.execute_tool(&handlers, call).await;
				tool_calls_made += 1;
				tool_trace.push(record);
				messages.push(tool_message);
			}

			if budget_exceeded {
				break;
			}
		}

		match Self::parse_structured(last_content.as_deref()) {
			Ok(value) => Ok(AgentOutcome {
				value,
				usage,
				tool_trace,
				model_identity: ModelIdentity { model: request.model, api_type },
			}),
			Err(parse_err) if budget_exceeded => {
				tracing::warn!(error = %parse_err, "tool-call budget exhausted with unparsable output");
				Err(Error::ToolBudgetExhausted)
			},
			Err(_) => {
				// One corrective retry: ask explicitly for valid JSON.
				messages.push(Message::User(
					"Your previous reply did not parse as valid JSON conforming to the schema. Return only valid JSON.".to_string(),
				));
				let retry_turn =
					self.dispatch(api_type, &request.model, &request.api_token, &messages, &[]).await?;
				usage.accumulate(&retry_turn.usage);

				Self::parse_structured(retry_turn.content.as_deref())
					.map(|value| AgentOutcome {
						value,
						usage,
						tool_trace,
						model_identity: ModelIdentity { model: request.model, api_type },
					})
					.map_err(|err| Error::StructuredOutput(err.to_string()))
			},
		}
	}

	async fn dispatch(
		&self,
		api_type: ApiType,
		model: &str,
		api_token: &str,
		messages: &[Message],
		tools: &[ToolDefinition],
	) -> Result<messages::BackendTurn, Error> {
		match api_type {
			ApiType::ChatCompletions =>
				chat::turn(&self.http, &self.base_url, model, api_token, self.timeout, messages, tools).await,
			ApiType::ResponsesApi =>
				responses::turn(&self.http, &self.base_url, model, api_token, self.timeout, messages, tools).await,
		}
	}

	async fn execute_tool(
		&self,
		handlers: &HashMap<String, Arc<dyn ToolHandler>>,
		call: &ToolCallRequest,
	) -> (ToolCallRecord, Message) {
		let Some(handler) = handlers.get(&call.name) else {
			return (
				ToolCallRecord { tool_name: call.name.clone(), input: call.arguments.clone(), succeeded: false },
				Message::Tool {
					tool_call_id: call.id.clone(),
					name: call.name.clone(),
					content: format!("error: unknown tool {}", call.name),
				},
			);
		};

		match handler.call(call.arguments.clone()).await {
			Ok(output) => (
				ToolCallRecord { tool_name: call.name.clone(), input: call.arguments.clone(), succeeded: true },
				Message::Tool { tool_call_id: call.id.clone(), name: call.name.clone(), content: output.to_string() },
			),
			Err(err) => (
				ToolCallRecord { tool_name: call.name.clone(), input: call.arguments.clone(), succeeded: false },
				Message::Tool {
					tool_call_id: call.id.clone(),
					name: call.name.clone(),
					content: format!("error: {err}"),
				},
			),
		}
	}

	fn parse_structured<T: DeserializeOwned>(content: Option<&str>) -> Result<T, serde_json::Error> {
		let content = content.unwrap_or_default();
		let candidate = extract_json_object(content).unwrap_or(content);

		serde_json::from_str(candidate)
	}

	/// A small LLM call used by the guardrails (C7/C10): no tools, no schema
	/// retry loop, just a single structured turn.
	pub async fn classify<T: DeserializeOwned>(
		&self,
		model: &str,
		api_token: &str,
		system: &str,
		user_message: &str,
	) -> Result<(T, UsageReport), Error> {
		let api_type = self.api_type_for(model);
		let messages = vec![Message::System(system.to_string()), Message::User(user_message.to_string())];
		let turn = self.dispatch(api_type, model, api_token, &messages, &[]).await?;
		let value = Self::parse_structured(turn.content.as_deref())
			.map_err(|err| Error::StructuredOutput(err.to_string()))?;

		Ok((value, turn.usage))
	}
}

/// Models sometimes wrap JSON in prose or code fences despite instructions;
/// pull out the first balanced `{...}` object as a best-effort fallback
/// before giving up.
fn extract_json_object(text: &str) -> Option<&str> {
	let start = text.find('{')?;
	let end = text.rfind('}')?;

	if end <= start { None } else { Some(&text[start..=end]) }
}
