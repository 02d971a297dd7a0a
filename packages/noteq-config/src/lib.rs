mod error;
mod secrets;
mod types;

pub use error::{Error, Result};
pub use secrets::SecretSource;
pub use types::{Agent, Completion, Embedding, Mcp, Proxy, Qdrant, RawSettings, Retrieval, Security, Service};

use std::{collections::HashMap, fs, path::Path, time::Duration};

/// The fully resolved, immutable configuration value. Constructed once at
/// startup (or explicitly in tests) and owned exclusively by the
/// `Dependencies` container; nothing downstream mutates it.
#[derive(Debug, Clone)]
pub struct Settings {
	pub http_bind: String,
	pub log_level: String,
	pub whole_request_timeout: Duration,

	pub proxy_base_url: String,
	pub embedding_timeout: Duration,
	pub chat_timeout: Duration,

	pub embedding_model: String,
	pub embedding_dimensions: HashMap<String, u32>,

	pub completion_model: String,
	pub responses_api_pattern: String,

	pub qdrant_url: String,
	pub collection_name: String,
	pub vector_search_timeout: Duration,
	pub top_n: u32,
	pub similarity_floor: Option<f32>,

	pub mcp_url: String,
	pub mcp_timeout: Duration,
	pub mcp_concurrency: u32,

	pub tool_call_budget: u32,
	pub usage_reporting: bool,
	pub guardrail_domain_description: String,

	/// The shared bearer credential: validated on inbound requests and
	/// forwarded to the LLM proxy. Single-tenant by design (see DESIGN.md).
	pub api_token: String,
}

impl Settings {
	/// Reads and validates a TOML config file, resolving secret-bearing
	/// fields through [`SecretSource`].
	pub fn load(path: &Path) -> Result<Self> {
		let raw = fs::read_to_string(path)
			.map_err(|source| Error::ReadConfig { path: path.to_path_buf(), source })?;
		let raw: RawSettings = toml::from_str(&raw)
			.map_err(|source| Error::ParseConfig { path: path.to_path_buf(), source: Box::new(source) })?;

		Self::from_raw(raw)
	}

	pub fn from_raw(raw: RawSettings) -> Result<Self> {
		validate(&raw)?;

		let api_token = SecretSource {
			name: "security.api_token".to_string(),
			mounted_path: raw.security.api_token_mounted_path.clone().map(Into::into),
			local_path: raw.security.api_token_local_path.clone().map(Into::into),
			env_var: Some(raw.security.api_token_env_var.clone()),
			dev_fallback: raw.security.api_token_dev_fallback.clone(),
			allow_dev_fallback: raw.security.dev_fallback_token_allowed,
		}
		.resolve(true)?
		.expect("resolve(true) never returns Ok(None)");

		Ok(Self {
			http_bind: raw.service.http_bind,
			log_level: raw.service.log_level,
			whole_request_timeout: Duration::from_millis(raw.service.whole_request_timeout_ms),
			proxy_base_url: raw.proxy.base_url,
			embedding_timeout: Duration::from_millis(raw.proxy.embedding_timeout_ms),
			chat_timeout: Duration::from_millis(raw.proxy.chat_timeout_ms),
			embedding_model: raw.embedding.model,
			embedding_dimensions: raw.embedding.dimensions,
			completion_model: raw.completion.model,
			responses_api_pattern: raw.completion.responses_api_pattern,
			qdrant_url: raw.qdrant.url,
			collection_name: raw.qdrant.collection,
			vector_search_timeout: Duration::from_millis(raw.qdrant.search_timeout_ms),
			top_n: raw.retrieval.top_n,
			similarity_floor: raw.retrieval.similarity_floor,
			mcp_url: raw.mcp.url,
			mcp_timeout: Duration::from_millis(raw.mcp.timeout_ms),
			mcp_concurrency: raw.mcp.concurrency,
			tool_call_budget: raw.agent.tool_call_budget,
			usage_reporting: raw.agent.usage_reporting,
			guardrail_domain_description: raw.agent.guardrail_domain_description,
			api_token,
		})
	}

	/// The embedding dimension configured for the active embedding model.
	pub fn embedding_dim(&self) -> Option<u32> {
		self.embedding_dimensions.get(&self.embedding_model).copied()
	}
}

/// One `validate_*` function per config section, aggregated so a
/// misconfigured deployment fails fast with a single diagnostic rather than
/// panicking deep in a request handler.
fn validate(raw: &RawSettings) -> Result<()> {
	validate_service(raw)?;
	validate_proxy(raw)?;
	validate_embedding(raw)?;
	validate_completion(raw)?;
	validate_retrieval(raw)?;
	validate_qdrant(raw)?;
	validate_mcp(raw)?;
	validate_agent(raw)?;
	validate_security(raw)?;

	Ok(())
}

fn fail(message: impl Into<String>) -> Error {
	Error::Validation { message: message.into() }
}

fn validate_service(raw: &RawSettings) -> Result<()> {
	if raw.service.http_bind.parse::<std::net::SocketAddr>().is_err() {
		return Err(fail("service.http_bind must be a valid socket address."));
	}
	if raw.service.whole_request_timeout_ms == 0 {
		return Err(fail("service.whole_request_timeout_ms must be positive."));
	}

	Ok(())
}

fn validate_proxy(raw: &RawSettings) -> Result<()> {
	if raw.proxy.base_url.trim().is_empty() {
		return Err(fail("proxy.base_url must be non-empty."));
	}
	if raw.proxy.embedding_timeout_ms == 0 || raw.proxy.chat_timeout_ms == 0 {
		return Err(fail("proxy timeouts must be positive."));
	}

	Ok(())
}

fn validate_embedding(raw: &RawSettings) -> Result<()> {
	if raw.embedding.model.trim().is_empty() {
		return Err(fail("embedding.model must be non-empty."));
	}
	if !raw.embedding.dimensions.contains_key(&raw.embedding.model) {
		return Err(fail(format!(
			"embedding.dimensions must contain an entry for embedding.model ({:?}).",
			raw.embedding.model
		)));
	}

	Ok(())
}

fn validate_completion(raw: &RawSettings) -> Result<()> {
	if raw.completion.model.trim().is_empty() {
		return Err(fail("completion.model must be non-empty."));
	}
	if regex::Regex::new(&raw.completion.responses_api_pattern).is_err() {
		return Err(fail("completion.responses_api_pattern must be a valid regex."));
	}

	Ok(())
}

fn validate_retrieval(raw: &RawSettings) -> Result<()> {
	if raw.retrieval.top_n == 0 {
		return Err(fail("retrieval.top_n must be positive."));
	}
	if let Some(floor) = raw.retrieval.similarity_floor
		&& !(0.0..=1.0).contains(&floor)
	{
		return Err(fail("retrieval.similarity_floor must be within [0, 1]."));
	}

	Ok(())
}

fn validate_qdrant(raw: &RawSettings) -> Result<()> {
	if raw.qdrant.url.trim().is_empty() {
		return Err(fail("qdrant.url must be non-empty."));
	}
	if raw.qdrant.collection.trim().is_empty() {
		return Err(fail("qdrant.collection must be non-empty."));
	}
	if raw.qdrant.search_timeout_ms == 0 {
		return Err(fail("qdrant.search_timeout_ms must be positive."));
	}

	Ok(())
}

fn validate_mcp(raw: &RawSettings) -> Result<()> {
	if raw.mcp.url.trim().is_empty() {
		return Err(fail("mcp.url must be non-empty."));
	}
	if raw.mcp.timeout_ms == 0 {
		return Err(fail("mcp.timeout_ms must be positive."));
	}
	if raw.mcp.concurrency == 0 {
		return Err(fail("mcp.concurrency must be positive."));
	}

	Ok(())
}

fn validate_agent(raw: &RawSettings) -> Result<()> {
	if raw.agent.tool_call_budget == 0 {
		return Err(fail("agent.tool_call_budget must be positive."));
	}
	if raw.agent.guardrail_domain_description.trim().is_empty() {
		return Err(fail("agent.guardrail_domain_description must be non-empty."));
	}

	Ok(())
}

fn validate_security(raw: &RawSettings) -> Result<()> {
	if raw.security.api_token_env_var.trim().is_empty() {
		return Err(fail("security.api_token_env_var must be non-empty."));
	}
	if !raw.security.dev_fallback_token_allowed && raw.security.api_token_dev_fallback.is_some() {
		return Err(fail(
			"security.api_token_dev_fallback must be unset unless dev_fallback_token_allowed is true.",
		));
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	use std::io::Write;

	use super::*;

	fn sample_toml() -> &'static str {
		r#"
[service]
http_bind = "127.0.0.1:8080"
log_level = "info"
whole_request_timeout_ms = 180000

[proxy]
base_url = "http://localhost:4000"
embedding_timeout_ms = 30000
chat_timeout_ms = 120000

[embedding]
model = "text-embedding-3-small"
[embedding.dimensions]
"text-embedding-3-small" = 1536

[completion]
model = "gpt-4o"
responses_api_pattern = "^(o[0-9]|gpt-5)"

[retrieval]
top_n = 8
similarity_floor = 0.2

[qdrant]
url = "http://localhost:6334"
collection = "noteplan_notes"
search_timeout_ms = 15000

[mcp]
url = "http://localhost:5000"
timeout_ms = 10000
concurrency = 4

[agent]
tool_call_budget = 8
usage_reporting = true
guardrail_domain_description = "personal Markdown notes"

[security]
dev_fallback_token_allowed = true
api_token_env_var = "NOTEQ_API_TOKEN_UNSET_TEST"
api_token_dev_fallback = "sk-test-valid"
"#
	}

	#[test]
	fn loads_valid_config_and_resolves_dev_fallback_token() {
		let dir = tempfile::tempdir().expect("tempdir");
		let path = dir.path().join("config.toml");
		fs::File::create(&path).unwrap().write_all(sample_toml().as_bytes()).unwrap();

		let settings = Settings::load(&path).expect("config should load");

		assert_eq!(settings.api_token, "sk-test-valid");
		assert_eq!(settings.embedding_dim(), Some(1536));
		assert_eq!(settings.top_n, 8);
	}

	#[test]
	fn rejects_similarity_floor_outside_unit_interval() {
		let mut raw: RawSettings = toml::from_str(sample_toml()).unwrap();
		raw.retrieval.similarity_floor = Some(1.5);

		assert!(matches!(Settings::from_raw(raw), Err(Error::Validation { .. })));
	}

	#[test]
	fn rejects_zero_top_n() {
		let mut raw: RawSettings = toml::from_str(sample_toml()).unwrap();
		raw.retrieval.top_n = 0;

		assert!(matches!(Settings::from_raw(raw), Err(Error::Validation { .. })));
	}

	#[test]
	fn rejects_zero_tool_call_budget() {
		let mut raw: RawSettings = toml::from_str(sample_toml()).unwrap();
		raw.agent.tool_call_budget = 0;

		assert!(matches!(Settings::from_raw(raw), Err(Error::Validation { .. })));
	}

	#[test]
	fn rejects_dev_fallback_value_without_flag() {
		let mut raw: RawSettings = toml::from_str(sample_toml()).unwrap();
		raw.security.dev_fallback_token_allowed = false;

		assert!(matches!(Settings::from_raw(raw), Err(Error::Validation { .. })));
	}

	#[test]
	fn embedding_model_must_have_a_dimension_entry() {
		let mut raw: RawSettings = toml::from_str(sample_toml()).unwrap();
		raw.embedding.model = "unconfigured-model".to_string();

		assert!(matches!(Settings::from_raw(raw), Err(Error::Validation { .. })));
	}

	#[test]
	fn rejects_zero_vector_search_timeout() {
		let mut raw: RawSettings = toml::from_str(sample_toml()).unwrap();
		raw.qdrant.search_timeout_ms = 0;

		assert!(matches!(Settings::from_raw(raw), Err(Error::Validation { .. })));
	}

	#[test]
	fn vector_search_timeout_is_resolved_from_config() {
		let raw: RawSettings = toml::from_str(sample_toml()).unwrap();
		let settings = Settings::from_raw(raw).unwrap();

		assert_eq!(settings.vector_search_timeout, Duration::from_millis(15000));
	}
}
