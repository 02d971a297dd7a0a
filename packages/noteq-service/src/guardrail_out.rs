use noteq_domain::{AgentAnswer, JudgeScore, JudgeVerdict, UsageReport};

use crate::dependencies::Dependencies;

const SYSTEM_PROMPT: &str = "\
You are a strict grader for a retrieval-augmented notes assistant. You will \
be given the user's original query, the assistant's answer, and the file \
paths it cited. Score the answer: \
\"pass\" if it addresses the query's intent and cites only the given files; \
\"needs_improvement\" if it partially addresses the intent or has stylistic \
issues but is still usable; \
\"fail\" if it does not address the intent, contradicts the cited files, or \
fabricates citations. \
A grounded refusal (the answer truthfully states no relevant notes were \
found, and no files are cited) must be scored \"pass\".\n\
Reply with JSON only: {\"score\": \"pass\"|\"needs_improvement\"|\"fail\", \
\"feedback\": string, \"intent_match_score\": number between 0 and 1}.";

/// Runs the output judge. A transient failure (classifier error, timeout,
/// malformed output) fails open per §4.9: it is *not* propagated as an error,
/// it is scored as `needs_improvement` with feedback explaining why, so a
/// flaky judge cannot deny service.
pub async fn evaluate(
	deps: &Dependencies,
	query_text: &str,
	answer: &AgentAnswer,
	api_token: &str,
) -> (JudgeVerdict, UsageReport) {
	let user = format!(
		"Original query: {query_text}\n\nAnswer: {}\n\nCited file paths: {}",
		answer.answer,
		answer.cited_file_paths.iter().cloned().collect::<Vec<_>>().join(", "),
	);

	match deps.llm.classify::<JudgeVerdict>(&deps.settings.completion_model, api_token, SYSTEM_PROMPT, &user).await {
		Ok((verdict, usage)) => (verdict, usage),
		Err(err) => {
			tracing::warn!(error = %err, "output judge call failed; failing open to needs_improvement");
			(
				JudgeVerdict {
					score: JudgeScore::NeedsImprovement,
					feedback: "transient judge failure; treated as needs_improvement".to_string(),
					intent_match_score: 0.5,
				},
				UsageReport::default(),
			)
		},
	}
}
