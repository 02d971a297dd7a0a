use std::sync::LazyLock;

use regex::RegexSet;

/// Deterministic, cheap rejection reasons the input guardrail's pre-filter can
/// raise before ever calling the classifier LLM: reject fast on structural
/// grounds first, before paying for a model call.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PrefilterReject {
	Empty,
	TooLong,
	DisallowedControlChar,
	PromptInjection,
}

const MAX_QUERY_CHARS: usize = 4_000;

static INJECTION_PATTERNS: LazyLock<RegexSet> = LazyLock::new(|| {
	RegexSet::new([
		r"(?i)ignore (all|any|the)? ?previous instructions",
		r"(?i)disregard (all|any|the)? ?(prior|previous|above) instructions",
		r"(?i)reveal (your|the) system prompt",
		r"(?i)print (your|the) system prompt",
		r"(?i)what (is|are) your (system|initial) (prompt|instructions)",
		r"(?i)you are now (in )?(dan|developer) mode",
		r"(?i)act as (if you (had|have) no restrictions|an unrestricted)",
	])
	.expect("injection pattern set is valid")
});

/// Runs the deterministic checks only; does not call out to the classifier
/// LLM. The service layer applies this first and only invokes the LLM
/// classifier if it passes.
pub fn prefilter(query: &str) -> Result<(), PrefilterReject> {
	if query.trim().is_empty() {
		return Err(PrefilterReject::Empty);
	}
	if query.chars().count() > MAX_QUERY_CHARS {
		return Err(PrefilterReject::TooLong);
	}
	if contains_disallowed_control_char(query) {
		return Err(PrefilterReject::DisallowedControlChar);
	}
	if INJECTION_PATTERNS.is_match(query) {
		return Err(PrefilterReject::PromptInjection);
	}

	Ok(())
}

fn contains_disallowed_control_char(query: &str) -> bool {
	query.chars().any(|ch| ch.is_control() && !matches!(ch, '\n' | '\r' | '\t'))
}

impl PrefilterReject {
	pub fn reason(&self) -> &'static str {
		match self {
			Self::Empty => "query is empty or whitespace-only",
			Self::TooLong => "query exceeds the maximum allowed length",
			Self::DisallowedControlChar => "query contains disallowed control characters",
			Self::PromptInjection => "query matches a recognised prompt-injection pattern",
		}
	}
}
