use std::time::Duration;

use futures::StreamExt;
use noteq_domain::{GuardrailIdentifier, NoteQueryResponse, NoteReference, RetrievalResult, UsageReport};
use noteq_providers::ModelIdentity;

use crate::dependencies::Dependencies;

/// Everything the HTTP layer needs beyond the JSON body: the header values
/// described in §4.10, already resolved against the usage-reporting setting.
pub struct ResponseMetadata {
	pub model_name: String,
	pub api_type: &'static str,
	pub generation_time_seconds: f64,
	pub usage: Option<UsageReport>,
}

pub struct AssembledResponse {
	pub body: NoteQueryResponse,
	pub metadata: ResponseMetadata,
}

/// Joins `cited_file_paths` back to full `NoteReference` records, enriches
/// each with a best-effort `xcallback_url`, and folds everything into the
/// final response plus header metadata. Always succeeds: a per-reference MCP
/// failure is logged and the reference is returned without a URL, never
/// treated as a request failure.
#[allow(clippy::too_many_arguments)]
pub async fn assemble(
	deps: &Dependencies,
	request_id: &str,
	original_query: &str,
	retrieval: &RetrievalResult,
	answer: &str,
	reasoning: &str,
	cited_file_paths: &std::collections::BTreeSet<String>,
	query_answered: bool,
	guardrails_tripped: Vec<GuardrailIdentifier>,
	usage: UsageReport,
	model_identity: &ModelIdentity,
	elapsed: Duration,
) -> AssembledResponse {
	let mut cited: Vec<NoteReference> = Vec::with_capacity(cited_file_paths.len());
	for file_path in cited_file_paths {
		match retrieval.find(file_path) {
			Some(reference) => cited.push(reference.clone()),
			None => tracing::warn!(
				file_path = file_path.as_str(),
				"cited file path has no matching retrieval candidate; dropping"
			),
		}
	}

	let enriched = enrich_with_xcallback_urls(deps, cited).await;

	let body = NoteQueryResponse {
		request_id: request_id.to_string(),
		answer: answer.to_string(),
		reasoning: reasoning.to_string(),
		relevant_files: enriched,
		original_query: original_query.to_string(),
		query_answered,
		guardrails_tripped,
	};

	let usage = if deps.settings.usage_reporting { Some(usage) } else { None };

	AssembledResponse {
		body,
		metadata: ResponseMetadata {
			model_name: model_identity.model.clone(),
			api_type: model_identity.api_type.as_str(),
			generation_time_seconds: elapsed.as_secs_f64(),
			usage,
		},
	}
}

/// Concurrently resolves `xcallback_url` for each reference, bounded by
/// `settings.mcp_concurrency` and order-preserving. A failure for any single
/// reference is logged at `warn` (file path and error kind only, never the
/// caller's token) and that reference is returned unmodified.
async fn enrich_with_xcallback_urls(deps: &Dependencies, references: Vec<NoteReference>) -> Vec<NoteReference> {
	let bound = (deps.settings.mcp_concurrency as usize).max(1);

	futures::stream::iter(references.into_iter().map(|mut reference| async move {
		match deps.mcp.derive_xcallback_url(&reference.file_path).await {
			Ok(url) => reference.xcallback_url = Some(url),
			Err(err) => tracing::warn!(
				file_path = reference.file_path.as_str(),
				error = %err,
				"assemble.mcp_failed: could not derive xcallback_url"
			),
		}
		reference
	}))
	.buffered(bound)
	.collect()
	.await
}
