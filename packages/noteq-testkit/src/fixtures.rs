use std::{collections::HashMap, time::Duration};

use noteq_config::Settings;
use noteq_domain::NoteReference;
use time::OffsetDateTime;

/// A `Settings` value pointed at the given proxy/MCP base URLs (typically
/// `wiremock::MockServer::uri()`), with every timeout short enough that a
/// misbehaving test fails fast instead of hanging.
pub fn settings(proxy_base_url: &str, mcp_url: &str) -> Settings {
	let mut embedding_dimensions = HashMap::new();
	embedding_dimensions.insert("text-embedding-3-small".to_string(), 3);

	Settings {
		http_bind: "127.0.0.1:0".to_string(),
		log_level: "info".to_string(),
		whole_request_timeout: Duration::from_secs(5),
		proxy_base_url: proxy_base_url.to_string(),
		embedding_timeout: Duration::from_secs(2),
		chat_timeout: Duration::from_secs(2),
		embedding_model: "text-embedding-3-small".to_string(),
		embedding_dimensions,
		completion_model: "gpt-4o".to_string(),
		responses_api_pattern: "^(o[0-9]|gpt-5)".to_string(),
		qdrant_url: "http://localhost:6334".to_string(),
		collection_name: "noteplan_notes_test".to_string(),
		vector_search_timeout: Duration::from_secs(2),
		top_n: 8,
		similarity_floor: None,
		mcp_url: mcp_url.to_string(),
		mcp_timeout: Duration::from_secs(2),
		mcp_concurrency: 4,
		tool_call_budget: 8,
		usage_reporting: true,
		guardrail_domain_description: "personal Markdown notes".to_string(),
		api_token: "sk-test-token".to_string(),
	}
}

/// `settings` with an explicit similarity floor, for retrieval tests.
pub fn settings_with_similarity_floor(proxy_base_url: &str, mcp_url: &str, floor: Option<f32>) -> Settings {
	Settings { similarity_floor: floor, ..settings(proxy_base_url, mcp_url) }
}

pub fn sample_note(file_path: &str, similarity_score: f32) -> NoteReference {
	NoteReference::new(file_path, OffsetDateTime::UNIX_EPOCH, similarity_score, 512)
}

/// A handful of candidate notes spanning the similarity range, useful for
/// exercising retrieval's dedup/sort/floor behaviour.
pub fn sample_notes() -> Vec<NoteReference> {
	vec![
		sample_note("journal/2025-01-15.md", 0.82),
		sample_note("projects/onboarding-plan.md", 0.77),
		sample_note("archive/old-idea.md", 0.31),
	]
}
