use serde_json::{Value, json};
use wiremock::{
	Mock, MockServer, ResponseTemplate,
	matchers::{method, path},
};

/// Registers a `/v1/embeddings` mock returning `vector` for any request body.
pub async fn mount_embeddings(server: &MockServer, vector: Vec<f32>) {
	Mock::given(method("POST"))
		.and(path("/v1/embeddings"))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [{ "embedding": vector }] })))
		.mount(server)
		.await;
}

/// A chat-completions response body whose assistant message content is
/// `content` (typically a JSON string for structured-output callers) with no
/// tool calls.
pub fn chat_completion_body(content: &str) -> Value {
	json!({
		"choices": [{
			"message": { "role": "assistant", "content": content },
			"finish_reason": "stop",
		}],
		"usage": { "prompt_tokens": 100, "completion_tokens": 50, "total_tokens": 150 },
	})
}

/// A "responses"-API body whose output text is `content`, structurally
/// parallel to `chat_completion_body` but in the responses wire shape. Usage
/// uses the Responses API's own field names (`input_tokens`/`output_tokens`),
/// which differ from chat-completions' `prompt_tokens`/`completion_tokens`.
pub fn responses_body(content: &str) -> Value {
	json!({
		"output": [{
			"type": "message",
			"role": "assistant",
			"content": [{ "type": "output_text", "text": content }],
		}],
		"usage": { "input_tokens": 100, "output_tokens": 50, "total_tokens": 150 },
	})
}

/// Registers a `/v1/chat/completions` mock that always replies with `body`.
pub async fn mount_chat_completions(server: &MockServer, body: Value) {
	Mock::given(method("POST"))
		.and(path("/v1/chat/completions"))
		.respond_with(ResponseTemplate::new(200).set_body_json(body))
		.mount(server)
		.await;
}

/// Registers a `/v1/responses` mock that always replies with `body`.
pub async fn mount_responses(server: &MockServer, body: Value) {
	Mock::given(method("POST"))
		.and(path("/v1/responses"))
		.respond_with(ResponseTemplate::new(200).set_body_json(body))
		.mount(server)
		.await;
}

/// Registers the MCP `derive_xcallback_url_from_noteplan_file` mock,
/// returning `url` for any file path.
pub async fn mount_mcp_xcallback(server: &MockServer, url: &str) {
	Mock::given(method("POST"))
		.and(path("/tools/derive_xcallback_url_from_noteplan_file"))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({ "url": url })))
		.mount(server)
		.await;
}
