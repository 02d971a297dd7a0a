use std::collections::HashMap;

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct RawSettings {
	pub service: Service,
	pub proxy: Proxy,
	pub embedding: Embedding,
	pub completion: Completion,
	pub retrieval: Retrieval,
	pub qdrant: Qdrant,
	pub mcp: Mcp,
	pub agent: Agent,
	pub security: Security,
}

#[derive(Debug, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub log_level: String,
	pub whole_request_timeout_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct Proxy {
	pub base_url: String,
	pub embedding_timeout_ms: u64,
	pub chat_timeout_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct Embedding {
	pub model: String,
	pub dimensions: HashMap<String, u32>,
}

#[derive(Debug, Deserialize)]
pub struct Completion {
	pub model: String,
	pub responses_api_pattern: String,
}

#[derive(Debug, Deserialize)]
pub struct Retrieval {
	pub top_n: u32,
	pub similarity_floor: Option<f32>,
}

#[derive(Debug, Deserialize)]
pub struct Qdrant {
	pub url: String,
	pub collection: String,
	pub search_timeout_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct Mcp {
	pub url: String,
	pub timeout_ms: u64,
	pub concurrency: u32,
}

#[derive(Debug, Deserialize)]
pub struct Agent {
	pub tool_call_budget: u32,
	pub usage_reporting: bool,
	pub guardrail_domain_description: String,
}

#[derive(Debug, Deserialize)]
pub struct Security {
	pub dev_fallback_token_allowed: bool,
	pub api_token_mounted_path: Option<String>,
	pub api_token_local_path: Option<String>,
	pub api_token_env_var: String,
	pub api_token_dev_fallback: Option<String>,
}
