use std::sync::Arc;

use noteq_domain::{AgentAnswer, RetrievalResult, ToolTrace, UsageReport};
use noteq_providers::{AgentRequest, ModelIdentity, ToolHandler};

use crate::{dependencies::Dependencies, error::{Error, Result}};

/// Everything C11 needs from a completed synthesis pass.
pub struct SynthesisOutcome {
	pub answer: AgentAnswer,
	pub usage: UsageReport,
	pub tool_trace: ToolTrace,
	pub model_identity: ModelIdentity,
}

const SCHEMA_INSTRUCTIONS: &str = "\
Respond with JSON only, conforming exactly to this schema: \
{\"answer\": string, \"reasoning\": string, \"cited_file_paths\": [string]}. \
`cited_file_paths` must be a JSON array of strings, each exactly one of the \
candidate `file_path` values given above, or an empty array.";

/// Builds the system prompt enumerating the notes domain, the citation-subset
/// rule, the empty-candidate rule, and the tool binding, per the synthesis
/// agent's contract.
fn system_prompt(deps: &Dependencies) -> String {
	format!(
		"You are a retrieval-augmented assistant answering questions about the \
		user's personal notes corpus: {domain}.\n\
		You will be given the user's query and a list of candidate notes (file \
		name, path, last-modified timestamp, and similarity score only — never \
		raw file content). You must answer using only information you can \
		reasonably infer from that metadata and your own knowledge of the \
		query's subject; cite a note only when it plausibly supports the \
		answer.\n\
		Rule: `cited_file_paths` in your output must be a subset of the \
		candidate file paths you were given. Never cite a file path that was \
		not in the candidate list.\n\
		Rule: if the candidate list is empty, say so explicitly in `answer` \
		(for example, \"I couldn't find any notes about that.\") rather than \
		fabricating an answer or a citation.\n\
		You may call the `derive_xcallback_url_from_noteplan_file` tool to \
		resolve a NotePlan deep link for a candidate file path; this is \
		optional and does not change what you may cite.",
		domain = deps.settings.guardrail_domain_description,
	)
}

fn user_message(query_text: &str, retrieval: &RetrievalResult) -> String {
	if retrieval.is_empty() {
		return format!("Query: {query_text}\n\nCandidate notes: none.");
	}

	let mut message = format!("Query: {query_text}\n\nCandidate notes:\n");
	for reference in &retrieval.references {
		message.push_str(&format!(
			"- file_name: {name}, file_path: {path}, modified_at: {modified}, similarity_score: {score:.3}\n",
			name = reference.file_name,
			path = reference.file_path,
			modified = reference.modified_at,
			score = reference.similarity_score,
		));
	}

	message
}

fn is_valid(answer: &AgentAnswer, retrieval: &RetrievalResult) -> bool {
	!answer.answer.trim().is_empty() && answer.citations_subset_of(retrieval)
}

/// Runs the synthesis agent once, validates its output against the candidate
/// set, and performs the single corrective retry mandated by §4.8 when the
/// first attempt violates the citation-subset rule or returns an empty
/// answer. Usage and the tool-call trace are additive across the retry, never
/// replaced, so a retried call cannot double-count anything the assembler
/// observes.
pub async fn synthesize(
	deps: &Dependencies,
	query_text: &str,
	retrieval: &RetrievalResult,
	api_token: &str,
) -> Result<SynthesisOutcome> {
	let system = system_prompt(deps);
	let user = user_message(query_text, retrieval);
	let tools: Vec<Arc<dyn ToolHandler>> = vec![deps.mcp_tool.clone()];

	let first = run_once(deps, &system, &user, tools.clone(), api_token).await?;

	if is_valid(&first.value, retrieval) {
		return Ok(SynthesisOutcome {
			answer: first.value,
			usage: first.usage,
			tool_trace: first.tool_trace,
			model_identity: first.model_identity,
		});
	}

	let corrective_user = format!(
		"{user}\n\nYour previous answer either cited a file path that was not \
		in the candidate list above, or left `answer` empty. Cite only file \
		paths from the candidate list, and do not leave `answer` empty.",
	);
	let retry = run_once(deps, &system, &corrective_user, tools, api_token).await?;

	let mut usage = first.usage;
	usage.accumulate(&retry.usage);
	let mut tool_trace = first.tool_trace;
	for call in retry.tool_trace.calls {
		tool_trace.push(call);
	}

	if is_valid(&retry.value, retrieval) {
		Ok(SynthesisOutcome { answer: retry.value, usage, tool_trace, model_identity: retry.model_identity })
	} else {
		Err(Error::AgentOutput(
			"synthesis agent violated the citation-subset rule (or returned an empty answer) after one corrective retry"
				.to_string(),
		))
	}
}

async fn run_once(
	deps: &Dependencies,
	system: &str,
	user_message: &str,
	tools: Vec<Arc<dyn ToolHandler>>,
	api_token: &str,
) -> Result<noteq_providers::AgentOutcome<AgentAnswer>> {
	let request = AgentRequest {
		system: system.to_string(),
		user_message: user_message.to_string(),
		tools,
		schema_instructions: SCHEMA_INSTRUCTIONS.to_string(),
		model: deps.settings.completion_model.clone(),
		api_token: api_token.to_string(),
		max_tool_calls: deps.settings.tool_call_budget,
	};

	deps.llm.run_agent::<AgentAnswer>(request).await.map_err(Error::from)
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;

	use noteq_testkit::{InMemoryVectorStore, llm_fixtures};
	use serde_json::json;
	use wiremock::MockServer;

	use super::*;
	use crate::dependencies::Dependencies;

	fn candidates() -> RetrievalResult {
		RetrievalResult::from_candidates(
			vec![noteq_testkit::fixtures::sample_note("journal/2025-01-15.md", 0.92)],
			3,
			"notes",
			None,
		)
	}

	async fn deps_for(proxy: &MockServer) -> Dependencies {
		let settings = noteq_testkit::fixtures::settings(&proxy.uri(), "http://unused");
		let store = Arc::new(InMemoryVectorStore::new(vec![]));
		Dependencies::with_vector_store(settings, store).unwrap()
	}

	#[tokio::test]
	async fn valid_first_attempt_is_returned_without_retry() {
		let proxy = MockServer::start().await;
		let body = llm_fixtures::chat_completion_body(
			&json!({
				"answer": "You wrote about onboarding on 2025-01-15.",
				"reasoning": "Matched the journal entry.",
				"cited_file_paths": ["journal/2025-01-15.md"],
			})
			.to_string(),
		);
		llm_fixtures::mount_chat_completions(&proxy, body).await;
		let deps = deps_for(&proxy).await;

		let outcome = synthesize(&deps, "what did I write about onboarding?", &candidates(), "sk-test").await.unwrap();

		assert_eq!(outcome.answer.cited_file_paths.len(), 1);
		assert!(outcome.answer.cited_file_paths.contains("journal/2025-01-15.md"));
	}

	#[tokio::test]
	async fn citation_violation_recovers_on_corrective_retry() {
		let proxy = MockServer::start().await;

		// wiremock matches requests against mounted Mocks in registration
		// order for the first Mock whose matcher passes; here we use the
		// generic `expect` builder to hand back different bodies on
		// successive calls to the same endpoint.
		let bad = json!({
			"answer": "Found it in fake.md",
			"reasoning": "bad",
			"cited_file_paths": ["fake.md"],
		})
		.to_string();
		let good = json!({
			"answer": "You wrote about onboarding on 2025-01-15.",
			"reasoning": "Matched the journal entry.",
			"cited_file_paths": ["journal/2025-01-15.md"],
		})
		.to_string();

		mount_sequential_chat_completions(&proxy, vec![bad, good]).await;
		let deps = deps_for(&proxy).await;

		let outcome = synthesize(&deps, "what did I write about onboarding?", &candidates(), "sk-test").await.unwrap();

		assert!(outcome.answer.cited_file_paths.contains("journal/2025-01-15.md"));
		assert!(!outcome.answer.cited_file_paths.contains("fake.md"));
	}

	#[tokio::test]
	async fn persistent_citation_violation_is_agent_output_error() {
		let proxy = MockServer::start().await;
		let bad = llm_fixtures::chat_completion_body(
			&json!({ "answer": "Found it.", "reasoning": "bad", "cited_file_paths": ["fake.md"] }).to_string(),
		);
		llm_fixtures::mount_chat_completions(&proxy, bad).await;
		let deps = deps_for(&proxy).await;

		let err = synthesize(&deps, "what did I write about onboarding?", &candidates(), "sk-test").await.unwrap_err();

		assert!(matches!(err, Error::AgentOutput(_)));
	}

	/// A responder that replays `bodies` in order, one per call, then repeats
	/// the last body for any further calls — used to simulate the model's
	/// second (corrective) attempt returning a different answer than its
	/// first.
	struct SequentialResponder {
		bodies: Vec<serde_json::Value>,
		calls: std::sync::atomic::AtomicUsize,
	}

	impl wiremock::Respond for SequentialResponder {
		fn respond(&self, _request: &wiremock::Request) -> wiremock::ResponseTemplate {
			let index = self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
			let body = &self.bodies[index.min(self.bodies.len() - 1)];
			wiremock::ResponseTemplate::new(200).set_body_json(body)
		}
	}

	async fn mount_sequential_chat_completions(server: &MockServer, bodies: Vec<String>) {
		use wiremock::{Mock, matchers::{method, path}};

		let responder = SequentialResponder {
			bodies: bodies.iter().map(|content| llm_fixtures::chat_completion_body(content)).collect(),
			calls: std::sync::atomic::AtomicUsize::new(0),
		};

		Mock::given(method("POST")).and(path("/v1/chat/completions")).respond_with(responder).mount(server).await;
	}
}
