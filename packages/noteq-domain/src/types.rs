use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// A single note-file candidate surfaced by retrieval, and optionally enriched
/// with an x-callback-url during response assembly.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NoteReference {
	pub file_path: String,
	pub file_name: String,
	#[serde(with = "time::serde::rfc3339")]
	pub modified_at: OffsetDateTime,
	pub similarity_score: f32,
	pub size_bytes: u64,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub xcallback_url: Option<String>,
}

impl NoteReference {
	/// Builds a reference, deriving `file_name` from the last POSIX segment of
	/// `file_path` and clamping `similarity_score` into `[0, 1]`.
	pub fn new(
		file_path: impl Into<String>,
		modified_at: OffsetDateTime,
		similarity_score: f32,
		size_bytes: u64,
	) -> Self {
		let file_path = file_path.into();
		let file_name =
			file_path.rsplit('/').next().unwrap_or(file_path.as_str()).to_string();

		Self {
			file_path,
			file_name,
			modified_at,
			similarity_score: similarity_score.clamp(0.0, 1.0),
			size_bytes,
			xcallback_url: None,
		}
	}
}

/// The ordered, deduplicated outcome of a retrieval pass.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetrievalResult {
	pub references: Vec<NoteReference>,
	pub query_embedding_dim: usize,
	pub collection_name: String,
}

impl RetrievalResult {
	/// Deduplicates `candidates` by `file_path` (keeping the highest
	/// `similarity_score`), drops anything below `similarity_floor`, and sorts
	/// descending by score with an ascending `file_path` tie-break.
	pub fn from_candidates(
		candidates: Vec<NoteReference>,
		query_embedding_dim: usize,
		collection_name: impl Into<String>,
		similarity_floor: Option<f32>,
	) -> Self {
		let mut best: Vec<NoteReference> = Vec::with_capacity(candidates.len());

		for candidate in candidates {
			if let Some(floor) = similarity_floor
				&& candidate.similarity_score < floor
			{
				continue;
			}

			match best.iter_mut().find(|existing| existing.file_path == candidate.file_path) {
				Some(existing) =>
					if candidate.similarity_score > existing.similarity_score {
						*existing = candidate;
					},
				None => best.push(candidate),
			}
		}

		best.sort_by(|a, b| {
			b.similarity_score
				.partial_cmp(&a.similarity_score)
				.unwrap_or(std::cmp::Ordering::Equal)
				.then_with(|| a.file_path.cmp(&b.file_path))
		});

		Self { references: best, query_embedding_dim, collection_name: collection_name.into() }
	}

	pub fn is_empty(&self) -> bool {
		self.references.is_empty()
	}

	pub fn find(&self, file_path: &str) -> Option<&NoteReference> {
		self.references.iter().find(|reference| reference.file_path == file_path)
	}
}

/// A single recorded tool invocation during synthesis, folded into the
/// running context so the assembler and tests can observe tool usage without
/// re-deriving it from raw transcript text.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolCallRecord {
	pub tool_name: String,
	pub input: serde_json::Value,
	pub succeeded: bool,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ToolTrace {
	pub calls: Vec<ToolCallRecord>,
}

impl ToolTrace {
	pub fn push(&mut self, record: ToolCallRecord) {
		self.calls.push(record);
	}

	pub fn len(&self) -> usize {
		self.calls.len()
	}

	pub fn is_empty(&self) -> bool {
		self.calls.is_empty()
	}
}

/// Token accounting from the LLM client. Each counter is independently
/// optional: a client that can report output tokens but not input tokens
/// must not coerce the unknown field to zero.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct UsageReport {
	pub input_tokens: Option<u64>,
	pub output_tokens: Option<u64>,
	pub total_tokens: Option<u64>,
}

impl UsageReport {
	/// Adds a second report's known fields onto this one. Used when a
	/// corrective retry must accumulate, not replace, usage.
	pub fn accumulate(&mut self, other: &UsageReport) {
		self.input_tokens = add_optional(self.input_tokens, other.input_tokens);
		self.output_tokens = add_optional(self.output_tokens, other.output_tokens);
		self.total_tokens = add_optional(self.total_tokens, other.total_tokens);
	}
}

fn add_optional(a: Option<u64>, b: Option<u64>) -> Option<u64> {
	match (a, b) {
		(Some(a), Some(b)) => Some(a + b),
		(Some(a), None) => Some(a),
		(None, Some(b)) => Some(b),
		(None, None) => None,
	}
}

/// The synthesis agent's structured output.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AgentAnswer {
	pub answer: String,
	pub reasoning: String,
	pub cited_file_paths: BTreeSet<String>,
}

impl AgentAnswer {
	/// True when every citation is drawn from `candidates`.
	pub fn citations_subset_of(&self, candidates: &RetrievalResult) -> bool {
		self.cited_file_paths
			.iter()
			.all(|path| candidates.references.iter().any(|reference| &reference.file_path == path))
	}
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JudgeScore {
	Pass,
	NeedsImprovement,
	Fail,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JudgeVerdict {
	pub score: JudgeScore,
	pub feedback: String,
	pub intent_match_score: f32,
}

/// Identifies which guardrail tripped, in triggering order.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardrailIdentifier {
	DescribesNoteQuery,
	JudgesAnswerQuality,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NoteQueryResponse {
	pub request_id: String,
	pub answer: String,
	pub reasoning: String,
	pub relevant_files: Vec<NoteReference>,
	pub original_query: String,
	pub query_answered: bool,
	pub guardrails_tripped: Vec<GuardrailIdentifier>,
}
