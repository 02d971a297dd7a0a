use std::time::{Duration, Instant};

use noteq_domain::{GuardrailIdentifier, JudgeScore, RetrievalResult, UsageReport};
use noteq_providers::ModelIdentity;

use crate::{
	assemble::{self, AssembledResponse},
	dependencies::Dependencies,
	error::Error,
	guardrail_in::{self, GuardrailInOutcome},
	guardrail_out, retrieval, synthesis,
};

/// A single request's immutable inputs, constructed by the HTTP layer once
/// the bearer token has been validated.
pub struct Query {
	pub query_text: String,
	pub request_id: String,
	pub api_token: String,
}

/// The three shapes a completed request can take. `Completed` covers both a
/// normal answer and a guardrail trip: both are 200 responses carrying a full
/// `NoteQueryResponse`, distinguished by `query_answered`/`guardrails_tripped`
/// in the body, not by a separate outcome variant.
pub enum QueryOutcome {
	Completed(AssembledResponse),
	UpstreamError { kind: String, message: String },
	Cancelled,
}

/// Runs the `AUTH → GUARDRAIL_IN → RETRIEVE → SYNTHESIZE → GUARDRAIL_OUT →
/// ASSEMBLE → DONE` state machine for one request. `AUTH` itself is the HTTP
/// layer's concern (bearer-token extraction happens before a `Query` exists);
/// everything from `GUARDRAIL_IN` on is driven from here. The whole pass is
/// wrapped in the configured whole-request timeout; a client disconnect is
/// the HTTP layer's concern and is not modelled here.
pub async fn run(deps: &Dependencies, query: Query) -> QueryOutcome {
	let started = Instant::now();

	match tokio::time::timeout(deps.settings.whole_request_timeout, run_inner(deps, &query, started)).await {
		Ok(outcome) => outcome,
		Err(_) => QueryOutcome::Cancelled,
	}
}

async fn run_inner(deps: &Dependencies, query: &Query, started: Instant) -> QueryOutcome {
	match guardrail_in::evaluate(deps, &query.query_text, &query.api_token).await {
		GuardrailInOutcome::Reject { reason } =>
			return QueryOutcome::Completed(
				guardrail_trip_response(
					deps,
					query,
					&reason,
					GuardrailIdentifier::DescribesNoteQuery,
					started.elapsed(),
				)
				.await,
			),
		GuardrailInOutcome::Accept => {},
	}

	let retrieval_result = match retrieval::retrieve(deps, &query.query_text, &query.api_token).await {
		Ok(result) => result,
		Err(err) => return upstream_error("retrieval_error", err),
	};

	let synthesis_outcome = match synthesis::synthesize(deps, &query.query_text, &retrieval_result, &query.api_token).await {
		Ok(outcome) => outcome,
		Err(err) => return upstream_error("synthesis_error", err),
	};

	let (verdict, judge_usage) =
		guardrail_out::evaluate(deps, &query.query_text, &synthesis_outcome.answer, &query.api_token).await;

	let mut usage = synthesis_outcome.usage;
	usage.accumulate(&judge_usage);

	let (query_answered, guardrails_tripped, reasoning) = match verdict.score {
		JudgeScore::Pass | JudgeScore::NeedsImprovement => (true, vec![], synthesis_outcome.answer.reasoning.clone()),
		JudgeScore::Fail => (false, vec![GuardrailIdentifier::JudgesAnswerQuality], verdict.feedback.clone()),
	};

	let assembled = assemble::assemble(
		deps,
		&query.request_id,
		&query.query_text,
		&retrieval_result,
		&synthesis_outcome.answer.answer,
		&reasoning,
		&synthesis_outcome.answer.cited_file_paths,
		query_answered,
		guardrails_tripped,
		usage,
		&synthesis_outcome.model_identity,
		started.elapsed(),
	)
	.await;

	QueryOutcome::Completed(assembled)
}

async fn guardrail_trip_response(
	deps: &Dependencies,
	query: &Query,
	reason: &str,
	tripped: GuardrailIdentifier,
	elapsed: Duration,
) -> AssembledResponse {
	let empty_retrieval = RetrievalResult::from_candidates(vec![], 0, deps.settings.collection_name.clone(), None);
	let model_identity = ModelIdentity {
		model: deps.settings.completion_model.clone(),
		api_type: deps.llm.api_type_for(&deps.settings.completion_model),
	};

	assemble::assemble(
		deps,
		&query.request_id,
		&query.query_text,
		&empty_retrieval,
		"",
		reason,
		&std::collections::BTreeSet::new(),
		false,
		vec![tripped],
		UsageReport::default(),
		&model_identity,
		elapsed,
	)
	.await
}

/// `stage` labels the edge that failed (`"retrieval_error"`,
/// `"synthesis_error"`); an LLM failure overrides it with its own
/// `LlmErrorKind` label (e.g. `"rate_limit"`), per §8 scenario 6.
fn upstream_error(stage: &'static str, err: Error) -> QueryOutcome {
	let kind = err.outward_kind(stage);
	tracing::warn!(kind = %kind, error = %err, "upstream failure terminated the request");
	QueryOutcome::UpstreamError { kind, message: err.to_string() }
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;

	use noteq_testkit::{InMemoryVectorStore, llm_fixtures};
	use serde_json::json;
	use wiremock::MockServer;

	use super::*;
	use crate::dependencies::Dependencies;

	fn query(text: &str) -> Query {
		Query { query_text: text.to_string(), request_id: "req-1".to_string(), api_token: "sk-test".to_string() }
	}

	async fn deps_with_store(proxy: &MockServer, notes: Vec<noteq_domain::NoteReference>) -> Dependencies {
		let settings = noteq_testkit::fixtures::settings(&proxy.uri(), &proxy.uri());
		let store = Arc::new(InMemoryVectorStore::new(notes));
		Dependencies::with_vector_store(settings, store).unwrap()
	}

	fn chat_body(value: serde_json::Value) -> serde_json::Value {
		llm_fixtures::chat_completion_body(&value.to_string())
	}

	/// Mounts distinct responses for the guardrail classifier, the synthesis
	/// agent, and the output judge by matching on distinguishing request-body
	/// content, since all three hit the same `/v1/chat/completions` endpoint.
	async fn mount_pipeline(
		proxy: &MockServer,
		guardrail_accept: bool,
		synthesis_answer: serde_json::Value,
		judge_verdict: serde_json::Value,
	) {
		use wiremock::{Mock, Request, Respond, ResponseTemplate, matchers::{method, path}};

		struct RoutingResponder {
			guardrail_accept: bool,
			synthesis_answer: serde_json::Value,
			judge_verdict: serde_json::Value,
		}

		impl Respond for RoutingResponder {
			fn respond(&self, request: &Request) -> ResponseTemplate {
				let body: serde_json::Value = serde_json::from_slice(&request.body).unwrap_or(serde_json::Value::Null);
				let text = body.to_string();
				let content = if text.contains("is_note_question") {
					json!({ "is_note_question": self.guardrail_accept, "reason": "classified" }).to_string()
				} else if text.contains("intent_match_score") || text.contains("strict grader") {
					self.judge_verdict.to_string()
				} else {
					self.synthesis_answer.to_string()
				};
				ResponseTemplate::new(200).set_body_json(chat_body(serde_json::from_str(&content).unwrap()))
			}
		}

		Mock::given(method("POST"))
			.and(path("/v1/chat/completions"))
			.respond_with(RoutingResponder { guardrail_accept, synthesis_answer, judge_verdict })
			.mount(proxy)
			.await;
	}

	#[tokio::test]
	async fn happy_path_returns_answered_response() {
		let proxy = MockServer::start().await;
		llm_fixtures::mount_embeddings(&proxy, vec![0.1, 0.2, 0.3]).await;
		mount_pipeline(
			&proxy,
			true,
			json!({
				"answer": "You wrote about onboarding on 2025-01-15.",
				"reasoning": "matched the journal entry",
				"cited_file_paths": ["journal/2025-01-15.md"],
			}),
			json!({ "score": "pass", "feedback": "addresses the query", "intent_match_score": 0.9 }),
		)
		.await;
		let deps = deps_with_store(&proxy, noteq_testkit::fixtures::sample_notes()).await;

		let outcome = run(&deps, query("what did I write about onboarding?")).await;

		match outcome {
			QueryOutcome::Completed(assembled) => {
				assert!(assembled.body.query_answered);
				assert!(assembled.body.guardrails_tripped.is_empty());
			},
			_ => panic!("expected a completed response"),
		}
	}

	#[tokio::test]
	async fn input_guardrail_rejection_short_circuits_before_retrieval() {
		let proxy = MockServer::start().await;
		mount_pipeline(&proxy, false, json!({}), json!({})).await;
		let deps = deps_with_store(&proxy, vec![]).await;

		let outcome = run(&deps, query("what's the weather tomorrow?")).await;

		match outcome {
			QueryOutcome::Completed(assembled) => {
				assert!(!assembled.body.query_answered);
				assert_eq!(assembled.body.guardrails_tripped, vec![GuardrailIdentifier::DescribesNoteQuery]);
				assert!(assembled.body.relevant_files.is_empty());
			},
			_ => panic!("expected a guardrail-trip response"),
		}
	}

	#[tokio::test]
	async fn empty_retrieval_still_produces_an_answer() {
		let proxy = MockServer::start().await;
		llm_fixtures::mount_embeddings(&proxy, vec![0.1, 0.2, 0.3]).await;
		mount_pipeline(
			&proxy,
			true,
			json!({ "answer": "I couldn't find any notes about that.", "reasoning": "no candidates", "cited_file_paths": [] }),
			json!({ "score": "pass", "feedback": "grounded refusal", "intent_match_score": 0.8 }),
		)
		.await;
		let deps = deps_with_store(&proxy, vec![]).await;

		let outcome = run(&deps, query("what did I write about a topic with no notes?")).await;

		match outcome {
			QueryOutcome::Completed(assembled) => {
				assert!(assembled.body.query_answered);
				assert!(assembled.body.relevant_files.is_empty());
			},
			_ => panic!("expected a completed response"),
		}
	}

	#[tokio::test]
	async fn citation_violation_recovers_through_the_corrective_retry() {
		let proxy = MockServer::start().await;
		llm_fixtures::mount_embeddings(&proxy, vec![0.1, 0.2, 0.3]).await;

		use wiremock::{Mock, Request, Respond, ResponseTemplate, matchers::{method, path}};
		struct RetryingResponder {
			calls: std::sync::atomic::AtomicUsize,
		}
		impl Respond for RetryingResponder {
			fn respond(&self, request: &Request) -> ResponseTemplate {
				let body: serde_json::Value = serde_json::from_slice(&request.body).unwrap_or(serde_json::Value::Null);
				let text = body.to_string();
				if text.contains("is_note_question") {
					return ResponseTemplate::new(200)
						.set_body_json(chat_body(json!({ "is_note_question": true, "reason": "ok" })));
				}
				if text.contains("intent_match_score") || text.contains("strict grader") {
					return ResponseTemplate::new(200)
						.set_body_json(chat_body(json!({ "score": "pass", "feedback": "ok", "intent_match_score": 0.9 })));
				}
				let index = self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
				let content = if index == 0 {
					json!({ "answer": "bad", "reasoning": "bad", "cited_file_paths": ["fake.md"] })
				} else {
					json!({
						"answer": "You wrote about onboarding on 2025-01-15.",
						"reasoning": "matched",
						"cited_file_paths": ["journal/2025-01-15.md"],
					})
				};
				ResponseTemplate::new(200).set_body_json(chat_body(content))
			}
		}
		Mock::given(method("POST"))
			.and(path("/v1/chat/completions"))
			.respond_with(RetryingResponder { calls: std::sync::atomic::AtomicUsize::new(0) })
			.mount(&proxy)
			.await;

		let deps = deps_with_store(&proxy, noteq_testkit::fixtures::sample_notes()).await;

		let outcome = run(&deps, query("what did I write about onboarding?")).await;

		match outcome {
			QueryOutcome::Completed(assembled) => {
				assert!(assembled.body.query_answered);
				assert!(assembled.body.relevant_files.iter().any(|r| r.file_path == "journal/2025-01-15.md"));
			},
			_ => panic!("expected a completed response after corrective retry"),
		}
	}

	#[tokio::test]
	async fn output_judge_failure_trips_the_guardrail() {
		let proxy = MockServer::start().await;
		llm_fixtures::mount_embeddings(&proxy, vec![0.1, 0.2, 0.3]).await;
		mount_pipeline(
			&proxy,
			true,
			json!({
				"answer": "You wrote about onboarding on 2025-01-15.",
				"reasoning": "matched",
				"cited_file_paths": ["journal/2025-01-15.md"],
			}),
			json!({ "score": "fail", "feedback": "fabricated a detail", "intent_match_score": 0.2 }),
		)
		.await;
		let deps = deps_with_store(&proxy, noteq_testkit::fixtures::sample_notes()).await;

		let outcome = run(&deps, query("what did I write about onboarding?")).await;

		match outcome {
			QueryOutcome::Completed(assembled) => {
				assert!(!assembled.body.query_answered);
				assert_eq!(assembled.body.guardrails_tripped, vec![GuardrailIdentifier::JudgesAnswerQuality]);
				assert_eq!(assembled.body.reasoning, "fabricated a detail");
			},
			_ => panic!("expected a guardrail-trip response"),
		}
	}

	#[tokio::test]
	async fn rate_limited_embeddings_surface_as_upstream_error() {
		let proxy = MockServer::start().await;
		use wiremock::{Mock, ResponseTemplate, matchers::{method, path}};
		Mock::given(method("POST"))
			.and(path("/v1/embeddings"))
			.respond_with(ResponseTemplate::new(429).set_body_json(json!({ "error": "rate limited" })))
			.mount(&proxy)
			.await;
		let deps = deps_with_store(&proxy, vec![]).await;

		let outcome = run(&deps, query("what did I write about onboarding?")).await;

		match outcome {
			QueryOutcome::UpstreamError { kind, .. } => assert_eq!(kind, "retrieval_error"),
			_ => panic!("expected an upstream error"),
		}
	}

	/// §8 scenario 6: a 429 from the proxy during synthesis must surface as
	/// `LLMError("rate_limit")`, not the generic `"synthesis_error"` stage
	/// label.
	#[tokio::test]
	async fn rate_limited_synthesis_surfaces_its_llm_error_kind() {
		let proxy = MockServer::start().await;
		llm_fixtures::mount_embeddings(&proxy, vec![0.1, 0.2, 0.3]).await;

		use wiremock::{Mock, Request, Respond, ResponseTemplate, matchers::{method, path}};
		struct RateLimitAfterGuardrail;
		impl Respond for RateLimitAfterGuardrail {
			fn respond(&self, request: &Request) -> ResponseTemplate {
				let body: serde_json::Value = serde_json::from_slice(&request.body).unwrap_or(serde_json::Value::Null);
				if body.to_string().contains("is_note_question") {
					return ResponseTemplate::new(200)
						.set_body_json(chat_body(json!({ "is_note_question": true, "reason": "ok" })));
				}
				ResponseTemplate::new(429).set_body_json(json!({ "error": "rate limited" }))
			}
		}
		Mock::given(method("POST"))
			.and(path("/v1/chat/completions"))
			.respond_with(RateLimitAfterGuardrail)
			.mount(&proxy)
			.await;
		let deps = deps_with_store(&proxy, noteq_testkit::fixtures::sample_notes()).await;

		let outcome = run(&deps, query("what did I write about onboarding?")).await;

		match outcome {
			QueryOutcome::UpstreamError { kind, .. } => assert_eq!(kind, "rate_limit"),
			_ => panic!("expected an upstream error"),
		}
	}
}
